//! Scripted input for a bridge: literal lines and waits, paced in the background.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::bridge::BridgeHandle;
use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Send the line followed by `\n`
    Line(String),
    Wait(Duration),
}

/// What a finished sequence did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceReport {
    pub sent: usize,
    pub waited: Duration,
    /// First delivery failure; the sequence stops there
    pub error: Option<String>,
}

/// Parse a script: one directive per line, `WAIT <seconds>` pauses,
/// blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<Directive>, BridgeError> {
    let mut directives = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut words = trimmed.split_whitespace();
        if words.next() == Some("WAIT") {
            let duration = words
                .next()
                .and_then(|value| value.parse::<f64>().ok())
                .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
                .ok_or_else(|| BridgeError::Script {
                    line: index + 1,
                    message: format!("expected `WAIT <seconds>`, got `{}`", trimmed),
                })?;
            directives.push(Directive::Wait(duration));
        } else {
            directives.push(Directive::Line(line.to_string()));
        }
    }
    Ok(directives)
}

/// Execute directives against a bridge on `runtime`; the caller is never blocked.
pub fn run_sequence(
    runtime: &Handle,
    target: BridgeHandle,
    directives: Vec<Directive>,
    delay: Duration,
) -> JoinHandle<SequenceReport> {
    runtime.spawn(async move {
        let mut report = SequenceReport::default();
        for directive in directives {
            match directive {
                Directive::Wait(duration) => {
                    tokio::time::sleep(duration).await;
                    report.waited += duration;
                }
                Directive::Line(line) => {
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    if let Err(e) = target.send(&bytes) {
                        report.error = Some(e.to_string());
                        break;
                    }
                    report.sent += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        report
    })
}
