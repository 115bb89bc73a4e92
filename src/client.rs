use std::fs::File;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::config::load_config;
use crate::error::{Error, Result};
use crate::ftp::FtpSession;
use crate::normalize::{OrderOutcome, normalize_file_list, parse_bool, parse_order_confirmation};
use crate::soap::{self, Param};
use crate::util::{default_end_date, regex_filter, sorted};

/// Resolved service endpoints.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Metadata/ordering web service URL.
    pub ws_url: String,
    /// Bulk transfer host, `host` or `host:port`.
    pub ftp_host: String,
}

/// Client for the ARM data archive.
///
/// Wraps the archive's two services: the metadata/ordering web service
/// (datastream and file discovery, user validation, the order lifecycle)
/// and the anonymous transfer service files are staged on once an order
/// completes. Every operation is one self-contained round trip; no
/// connection or session outlives a call, so a single client can be
/// shared freely.
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    ws_url: String,
    ftp_host: String,

    timeout: Duration,
    progress: bool,

    http: HttpClient,
}

impl ArchiveClient {
    /// Creates a client using environment variables and/or `.armarchiverc`.
    ///
    /// This is equivalent to `ArchiveClient::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`ftp_host` arguments
    /// - environment variables `ARMARCHIVE_WS_URL` / `ARMARCHIVE_FTP_HOST`
    /// - config file from `ARMARCHIVE_RC` or `.armarchiverc`
    /// - the archive's public addresses
    pub fn new(url: Option<String>, ftp_host: Option<String>) -> Result<Self> {
        let cfg = load_config(url, ftp_host)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("armarchive-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("armarchive-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .build()?;

        Ok(Self {
            ws_url: cfg.ws_url,
            ftp_host: cfg.ftp_host,
            timeout: Duration::from_secs(60),
            progress: true,
            http,
        })
    }

    /// Per-call timeout for both services.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Toggles download progress bars.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Lists datastreams available at the archive, sorted, optionally
    /// narrowed by `pattern`.
    pub fn list_datastreams(&self, pattern: Option<&Regex>) -> Result<Vec<String>> {
        let streams = self.call_list("getDataStreams", &[])?;
        Ok(sorted(regex_filter(streams, pattern)))
    }

    /// Lists the files in one or more datastreams between `start` and
    /// `end` inclusive, both `YYYYMMDD`. An omitted `end` means the day
    /// after `start`, so a bare start date covers that single day. The
    /// result is sorted and optionally narrowed by `pattern`.
    pub fn list_files(
        &self,
        datastreams: &[String],
        start: &str,
        end: Option<&str>,
        pattern: Option<&Regex>,
    ) -> Result<Vec<String>> {
        let end = match end {
            Some(e) => e.to_string(),
            None => default_end_date(start)?,
        };
        let params = [
            Param::List("datastreams", datastreams),
            Param::Text("startDate", start),
            Param::Text("endDate", &end),
        ];
        let files = normalize_file_list(self.call_list("getFiles", &params)?);
        Ok(sorted(regex_filter(files, pattern)))
    }

    /// Asks the archive whether `user` is a registered username.
    pub fn valid_user(&self, user: &str) -> Result<bool> {
        let reply = self.call_single("isValidUser", &[Param::Text("userID", user)])?;
        Ok(parse_bool(&reply))
    }

    /// Submits an order for `files` on behalf of `user`.
    ///
    /// Acceptance or rejection is the archive's decision and comes back
    /// as an [`OrderOutcome`]; an `Err` means the service could not be
    /// asked at all. Submission is not idempotent: ordering the same
    /// list twice creates two orders.
    pub fn order_files(&self, user: &str, files: &[String]) -> Result<OrderOutcome> {
        let params = [
            Param::Text("userID", user),
            Param::List("filesNamesList", files),
        ];
        let reply = self.call_single("processOrder", &params)?;
        let outcome = parse_order_confirmation(&reply);
        if let OrderOutcome::Accepted(c) = &outcome {
            info!(user, order_id = %c.order_id, files = %c.file_count, "order accepted");
        }
        Ok(outcome)
    }

    /// Current status of an order: `complete`, `processing` or `problem`,
    /// exactly as the archive reports it.
    pub fn order_status(&self, order_id: &str) -> Result<String> {
        self.call_single("getOrderStatus", &[Param::Text("sessionID", order_id)])
    }

    /// Clears (cancels) an order. `false` means the archive refused.
    pub fn order_clear(&self, user: &str, order_id: &str) -> Result<bool> {
        let params = [Param::Text("archID", user), Param::Text("sessionID", order_id)];
        let reply = self.call_single("clearOrder", &params)?;
        Ok(parse_bool(&reply))
    }

    /// Lists data quality reports filed against a datastream measurement
    /// over a date range, sorted, optionally narrowed by `pattern`.
    pub fn list_dqrs(
        &self,
        datastream: &str,
        start: &str,
        end: &str,
        measurement: &str,
        pattern: Option<&Regex>,
    ) -> Result<Vec<String>> {
        let params = [
            Param::Text("datastream", datastream),
            Param::Text("startDate", start),
            Param::Text("endDate", end),
            Param::Text("measurement", measurement),
        ];
        let dqrs = self.call_list("getDQRs", &params)?;
        Ok(sorted(regex_filter(dqrs, pattern)))
    }

    /// Lists the files staged for an order, in the transfer service's
    /// own order.
    pub fn list_order_files(&self, user: &str, order_id: &str) -> Result<Vec<String>> {
        let mut ftp = self.transfer_session(user, order_id)?;
        let files = ftp.nlst()?;
        ftp.quit()?;
        Ok(files)
    }

    /// Lists the ids of orders ready for `user` to download.
    pub fn list_orders_ready(&self, user: &str) -> Result<Vec<String>> {
        let mut ftp = self.login()?;
        ftp.cwd(user)?;
        let orders = ftp.nlst()?;
        ftp.quit()?;
        Ok(orders)
    }

    /// Downloads files from an order into the current working directory,
    /// each under its remote name. `None` downloads every file in the
    /// order; a single name is a one-element slice.
    ///
    /// A failed transfer ends the call; files already written stay on
    /// disk, and the session is logged out on every exit path.
    pub fn order_download(
        &self,
        user: &str,
        order_id: &str,
        files: Option<&[String]>,
    ) -> Result<()> {
        let mut ftp = self.transfer_session(user, order_id)?;
        let files: Vec<String> = match files {
            Some(list) => list.to_vec(),
            None => ftp.nlst()?,
        };

        for name in &files {
            info!(file = %name, "retrieving");
            let size = ftp.size(name)?;
            let out = File::create(name)?;

            if self.progress {
                let pb = match size {
                    Some(len) => {
                        let pb = ProgressBar::new(len);
                        pb.set_style(
                            ProgressStyle::with_template(
                                "{msg} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar}",
                            )
                            .unwrap()
                            .progress_chars("=>-"),
                        );
                        pb
                    }
                    None => ProgressBar::new_spinner(),
                };
                pb.set_message(name.clone());
                let mut sink = pb.wrap_write(out);
                ftp.retr(name, &mut sink)?;
                pb.finish_and_clear();
            } else {
                let mut out = out;
                ftp.retr(name, &mut out)?;
            }
        }

        ftp.quit()
    }

    /// Fresh anonymous session positioned at `user/order_id`.
    fn transfer_session(&self, user: &str, order_id: &str) -> Result<FtpSession> {
        let mut ftp = self.login()?;
        ftp.cwd(user)?;
        ftp.cwd(order_id)?;
        Ok(ftp)
    }

    fn login(&self) -> Result<FtpSession> {
        let mut ftp = FtpSession::connect(&self.ftp_host, self.timeout)?;
        ftp.login_anonymous()?;
        Ok(ftp)
    }

    /// One RPC round trip: build the envelope, POST it, surface faults
    /// and HTTP failures, hand back the reply body.
    fn call(&self, op: &'static str, params: &[Param<'_>]) -> Result<String> {
        let envelope = soap::request_envelope(op, params);
        debug!(op, "calling archive web service");

        let resp = self
            .http
            .post(&self.ws_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()?;

        let status = resp.status();
        let body = resp.text()?;

        // Faults usually ride on HTTP 500; the fault text is the more
        // useful message, so it wins over the bare status.
        if let Some(fault) = soap::fault_string(&body) {
            return Err(Error::Soap { op, detail: fault });
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn call_single(&self, op: &'static str, params: &[Param<'_>]) -> Result<String> {
        let body = self.call(op, params)?;
        soap::single_return(&body).ok_or_else(|| Error::Soap {
            op,
            detail: "reply carries no return value".to_string(),
        })
    }

    fn call_list(&self, op: &'static str, params: &[Param<'_>]) -> Result<Vec<String>> {
        Ok(soap::return_values(&self.call(op, params)?))
    }
}
