use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::error::{Error, Result};

/// Public endpoints of the archive.
const DEFAULT_WS_URL: &str = "http://www.archive.arm.gov/armws/services/arm";
const DEFAULT_FTP_HOST: &str = "ftp.archive.arm.gov";

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    ftp: Option<String>,
}

/// Resolves the two service endpoints using (in order of precedence):
/// - explicit `url`/`ftp_host` arguments
/// - environment variables `ARMARCHIVE_WS_URL` / `ARMARCHIVE_FTP_HOST`
/// - config file from `ARMARCHIVE_RC` or `.armarchiverc`
/// - the archive's public addresses
pub(crate) fn load_config(url: Option<String>, ftp_host: Option<String>) -> Result<ClientConfig> {
    let mut url = url.or_else(|| std::env::var("ARMARCHIVE_WS_URL").ok());
    let mut ftp_host = ftp_host.or_else(|| std::env::var("ARMARCHIVE_FTP_HOST").ok());

    if url.is_none() || ftp_host.is_none() {
        for rc_path in rc_candidates() {
            if rc_path.exists() {
                let cfg = read_rc(&rc_path).map_err(|e| {
                    Error::Config(format!(
                        "failed to read configuration file {}: {}",
                        rc_path.display(),
                        e
                    ))
                })?;

                if url.is_none() {
                    url = cfg.url;
                }
                if ftp_host.is_none() {
                    ftp_host = cfg.ftp;
                }
                break;
            }
        }
    }

    Ok(ClientConfig {
        ws_url: url.unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
        ftp_host: ftp_host.unwrap_or_else(|| DEFAULT_FTP_HOST.to_string()),
    })
}

fn read_rc(path: &Path) -> std::io::Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((k, v)) = line.split_once(':') {
            let v = strip_quotes(v.trim());
            if v.is_empty() {
                continue;
            }
            match k.trim() {
                "url" => cfg.url = Some(v.to_string()),
                "ftp" => cfg.ftp = Some(v.to_string()),
                _ => {}
            }
        }
    }

    Ok(cfg)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates() -> Vec<PathBuf> {
    // Search order:
    // 1) ARMARCHIVE_RC (explicit)
    // 2) ./.armarchiverc (current working directory)
    // 3) ~/.armarchiverc
    if let Ok(p) = std::env::var("ARMARCHIVE_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".armarchiverc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".armarchiverc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_arguments_win() {
        let cfg = load_config(
            Some("http://localhost:9000/arm".to_string()),
            Some("localhost:2121".to_string()),
        )
        .unwrap();
        assert_eq!(cfg.ws_url, "http://localhost:9000/arm");
        assert_eq!(cfg.ftp_host, "localhost:2121");
    }

    #[test]
    fn rc_lines_parse_with_quotes_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# archive endpoints").unwrap();
        writeln!(file, "url: 'http://mock/arm'").unwrap();
        writeln!(file, "ftp: \"mock-ftp:21\"").unwrap();
        file.flush().unwrap();

        let cfg = read_rc(file.path()).unwrap();
        assert_eq!(cfg.url.as_deref(), Some("http://mock/arm"));
        assert_eq!(cfg.ftp.as_deref(), Some("mock-ftp:21"));
    }

    #[test]
    fn unknown_keys_and_blank_values_are_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "key: abc123").unwrap();
        writeln!(file, "url:").unwrap();
        file.flush().unwrap();

        let cfg = read_rc(file.path()).unwrap();
        assert!(cfg.url.is_none());
        assert!(cfg.ftp.is_none());
    }
}
