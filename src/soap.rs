//! Minimal SOAP 1.1 plumbing for the archive's RPC contract.
//!
//! The service contract pins down a handful of operations whose parameters
//! and results are flat strings or string lists. That narrow shape is
//! served by a hand-written envelope builder and a namespace-agnostic
//! element scanner instead of a generated binding; the contract document
//! itself is reduced to the operation and parameter names below and the
//! service namespace constant.

use std::fmt::Write as _;

/// Namespace the archive's service publishes its operations under.
pub(crate) const SERVICE_NAMESPACE: &str = "http://www.archive.arm.gov/armws";

const ENVELOPE_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// One RPC parameter. Lists repeat their element once per value, which is
/// how the service's array arguments are encoded.
pub(crate) enum Param<'a> {
    Text(&'a str, &'a str),
    List(&'a str, &'a [String]),
}

/// Builds the request envelope for one operation call.
pub(crate) fn request_envelope(op: &str, params: &[Param<'_>]) -> String {
    let mut xml = String::with_capacity(256);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = write!(xml, r#"<soapenv:Envelope xmlns:soapenv="{ENVELOPE_NAMESPACE}">"#);
    xml.push_str("<soapenv:Body>");
    let _ = write!(xml, r#"<{op} xmlns="{SERVICE_NAMESPACE}">"#);
    for param in params {
        match param {
            Param::Text(name, value) => push_element(&mut xml, name, value),
            Param::List(name, values) => {
                for value in values.iter() {
                    push_element(&mut xml, name, value);
                }
            }
        }
    }
    let _ = write!(xml, "</{op}>");
    xml.push_str("</soapenv:Body></soapenv:Envelope>");
    xml
}

fn push_element(out: &mut String, name: &str, value: &str) {
    let _ = write!(out, "<{name}>{}</{name}>", escape_text(value));
}

/// Every `return` element in the reply body, in document order.
pub(crate) fn return_values(xml: &str) -> Vec<String> {
    element_texts(xml, "return")
}

/// The first `return` element, for single-valued operations.
pub(crate) fn single_return(xml: &str) -> Option<String> {
    element_texts(xml, "return").into_iter().next()
}

/// The `faultstring` of a SOAP fault reply, if this is one.
pub(crate) fn fault_string(xml: &str) -> Option<String> {
    element_texts(xml, "faultstring").into_iter().next()
}

/// Collects the text content of every element named `local`, ignoring
/// namespace prefixes. The service returns flat text payloads, so element
/// content is read up to the next markup character.
fn element_texts(xml: &str, local: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        if rest.starts_with(['/', '?', '!']) {
            match rest.find('>') {
                Some(end) => {
                    rest = &rest[end + 1..];
                    continue;
                }
                None => break,
            }
        }
        let Some(tag_end) = rest.find('>') else { break };
        let tag = &rest[..tag_end];
        let self_closing = tag.ends_with('/');
        let name = tag
            .trim_end_matches('/')
            .split_whitespace()
            .next()
            .unwrap_or("");
        let name = name.rsplit(':').next().unwrap_or(name);
        rest = &rest[tag_end + 1..];
        if name != local {
            continue;
        }
        if self_closing {
            found.push(String::new());
            continue;
        }
        let Some(text_end) = rest.find('<') else { break };
        found.push(unescape_text(&rest[..text_end]));
    }
    found
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_text(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
