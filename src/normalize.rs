//! Boundary layer for the archive's wire quirks.
//!
//! The web service encodes booleans as the strings `"true"`/`"false"`,
//! reports an empty file listing through a one-element sentinel, and
//! confirms orders with a free-text sentence. Everything of that shape is
//! translated here; nothing outside this module sees the raw forms.

use std::sync::OnceLock;

use regex::Regex;

/// Parsed acceptance line for a submitted order.
///
/// All three fields are kept as the strings the archive produced; the
/// order id in particular is opaque and must be replayed verbatim in
/// status, cancel and download calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub user: String,
    pub order_id: String,
    pub file_count: String,
}

/// Outcome of an order submission, as decided by the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// The archive accepted the order and issued an order id.
    Accepted(OrderConfirmation),
    /// The archive declined; the server's reply is kept word for word.
    Rejected(String),
}

const NO_DATA_SENTINEL: &str = "No data files found";

/// Exact, case-sensitive match on `"true"`; anything else is `false`.
pub(crate) fn parse_bool(reply: &str) -> bool {
    reply == "true"
}

/// Collapses the service's "no results" sentinel to an empty list.
///
/// Only the exact single-element form is the sentinel. A longer listing
/// that happens to begin with the same text is real data and passes
/// through untouched.
pub(crate) fn normalize_file_list(files: Vec<String>) -> Vec<String> {
    if files.len() == 1 && files[0] == NO_DATA_SENTINEL {
        Vec::new()
    } else {
        files
    }
}

fn confirmation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"user:\s*([a-z]+), order session ID:\s*([0-9]+) number of files ordered:\s*([0-9]+)",
        )
        .expect("confirmation pattern compiles")
    })
}

/// Interprets the free-text reply from `processOrder`.
///
/// The acceptance message has one fixed grammar. Any reply that does not
/// match is a rejection and is surfaced verbatim for display, not
/// reworded.
pub(crate) fn parse_order_confirmation(reply: &str) -> OrderOutcome {
    match confirmation_pattern().captures(reply) {
        Some(caps) => OrderOutcome::Accepted(OrderConfirmation {
            user: caps[1].to_string(),
            order_id: caps[2].to_string(),
            file_count: caps[3].to_string(),
        }),
        None => OrderOutcome::Rejected(reply.to_string()),
    }
}
