//! Relayer status output classification
//!
//! The relayer, run with `--json`, prints one JSON record per line: log
//! records carry a `level` and `fields.message`, the final record carries a
//! `status` and the command `result`. The output contract is assumed, so an
//! undecodable line is a harness fault rather than something to skip.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::common::{truncate_output, Error, Result};

/// Relayer status meaning the command completed
pub const STATUS_SUCCESS: &str = "success";

/// One decoded line of relayer output
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayerRecord {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub fields: Option<RelayerFields>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayerFields {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

impl RelayerRecord {
    /// The nested message, rendered as text
    pub fn message(&self) -> Option<String> {
        self.fields.as_ref()?.message.as_ref().map(render)
    }

    /// The final status, rendered as text
    pub fn status(&self) -> Option<String> {
        self.status.as_ref().map(render)
    }

    fn is_error(&self) -> bool {
        self.level
            .as_deref()
            .is_some_and(|lvl| lvl.eq_ignore_ascii_case("error"))
    }
}

/// Decode and classify a single line
pub fn classify(line: &str) -> Result<RelayerRecord> {
    let record: RelayerRecord = serde_json::from_str(line).map_err(|e| {
        Error::decode(
            "relayer record",
            format!("{} in line '{}'", e, truncate_output(line, 200)),
        )
    })?;

    if record.is_error() {
        return Err(Error::Relayer(
            record.message().unwrap_or_else(|| "<no message>".to_string()),
        ));
    }

    match &record.status {
        None => {}
        Some(serde_json::Value::String(s)) if s == STATUS_SUCCESS => {}
        Some(other) => return Err(Error::RelayerStatus(render(other))),
    }

    Ok(record)
}

fn render(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Scan relayer output line by line
///
/// Returns the last successful record at end of stream, or the first
/// failure without reading further lines. Blank lines are ignored.
pub async fn scan<R>(reader: R) -> Result<Option<RelayerRecord>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut last = None;
    let mut count = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;
        match classify(&line) {
            Ok(record) => last = Some(record),
            Err(e) => {
                tracing::warn!(line = count, error = %e, "Relayer reported failure");
                return Err(e);
            }
        }
    }

    tracing::debug!(records = count, "Relayer output scanned");
    Ok(last)
}

/// Argv for a relayer command with JSON output enabled
pub fn command<S: AsRef<str>>(binary: &str, args: &[S]) -> Vec<String> {
    let mut argv = vec![binary.to_string(), "--json".to_string()];
    argv.extend(args.iter().map(|a| a.as_ref().to_string()));
    argv
}
