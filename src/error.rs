use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by archive operations.
///
/// Only genuine failures to talk to the archive live here. Decisions the
/// archive itself makes (an invalid user, a rejected order, a refused
/// cancellation) are ordinary return values such as `false` or
/// [`OrderOutcome::Rejected`](crate::OrderOutcome::Rejected), never errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The web service could not be reached or the HTTP exchange failed.
    #[error("could not reach the archive web service")]
    Transport(#[from] reqwest::Error),

    /// The web service answered with a non-success HTTP status.
    #[error("archive web service returned HTTP {status}")]
    Status { status: u16, body: String },

    /// A SOAP fault, or a reply that does not carry the expected shape.
    #[error("unusable reply from {op}: {detail}")]
    Soap { op: &'static str, detail: String },

    /// The transfer service refused a command or broke protocol.
    #[error("transfer service error: {detail}")]
    Ftp { detail: String },

    /// Socket or file I/O failed during a transfer.
    #[error("I/O error during transfer")]
    Io(#[from] std::io::Error),

    /// Endpoint configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),

    /// A date argument was not a valid `YYYYMMDD` day.
    #[error("invalid date {0:?}, expected YYYYMMDD")]
    Date(String),
}
