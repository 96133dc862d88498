//! Line-delimited JSON alert intake.
//!
//! Stands in for the HTTP transport: each input line is one alert request
//!
//! ```json
//! {"severity": "critical", "alertType": "overheat", "deviceId": "DEV-001"}
//! ```
//!
//! and each produces one acknowledgement line on the output.  Blank lines
//! and lines starting with `#` are skipped.

use std::io::{BufRead, Write};

use log::{debug, warn};
use serde::Serialize;

use crate::app::commands::{AlertId, AlertRequest};
use crate::app::service::AlertSystem;

/// Acknowledgement written for every request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAck {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
    pub queued: bool,
}

impl AlertAck {
    fn queued(id: AlertId) -> Self {
        Self {
            status: "success",
            message: "Alert received and queued for processing".into(),
            alert_id: Some(id),
            queued: true,
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            status: "error",
            message,
            alert_id: None,
            queued: false,
        }
    }
}

/// Totals for one intake session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Parse one line; `None` for blank and comment lines.
pub fn parse_line(line: &str) -> Option<serde_json::Result<AlertRequest>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

/// Submit every request read from `input` until EOF, acknowledging each on
/// `output`.
pub fn run(
    input: impl BufRead,
    mut output: impl Write,
    system: &AlertSystem,
) -> std::io::Result<IntakeStats> {
    let mut stats = IntakeStats::default();

    for line in input.lines() {
        let line = line?;
        let Some(parsed) = parse_line(&line) else {
            continue;
        };

        let ack = match parsed {
            Ok(request) => match system.submit(request) {
                Ok(id) => {
                    stats.accepted += 1;
                    AlertAck::queued(id)
                }
                Err(e) => {
                    stats.rejected += 1;
                    warn!("Alert rejected: {}", e);
                    AlertAck::rejected(e.to_string())
                }
            },
            Err(e) => {
                stats.rejected += 1;
                debug!("Malformed request line: {}", e);
                AlertAck::rejected(format!("malformed request: {e}"))
            }
        };

        serde_json::to_writer(&mut output, &ack)?;
        writeln!(output)?;
        output.flush()?;
    }

    Ok(stats)
}
