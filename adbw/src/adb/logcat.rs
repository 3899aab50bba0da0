//! Logcat snapshots and filtered live streams

use tokio_util::sync::CancellationToken;

use super::Adb;
use crate::error::{AdbwError, Result};
use crate::process::{CommandResult, LineStream};

pub const DEFAULT_PRIORITY: char = 'I';
const PRIORITIES: &str = "VDIWEFS";

/// Validate a logcat priority letter (case-insensitive)
pub fn parse_priority(raw: Option<&str>) -> Result<char> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Ok(DEFAULT_PRIORITY);
    };
    let mut chars = raw.chars();
    match (chars.next().map(|c| c.to_ascii_uppercase()), chars.next()) {
        (Some(c), None) if PRIORITIES.contains(c) => Ok(c),
        _ => Err(AdbwError::invalid(
            "priority",
            format!("expected one of {PRIORITIES}, got '{raw}'"),
        )),
    }
}

/// Logcat filterspec showing `tag` at `priority` and silencing everything else.
/// An empty tag or `*` means every tag at that priority.
pub fn filter_args(tag: &str, priority: char) -> Vec<String> {
    let tag = tag.trim();
    if tag.is_empty() || tag == "*" {
        return vec!["logcat".to_string(), format!("*:{priority}")];
    }
    vec![
        "logcat".to_string(),
        format!("{tag}:{priority}"),
        "*:S".to_string(),
    ]
}

/// Dump the current log buffer
pub async fn snapshot(adb: &Adb, serial: &str) -> Result<String> {
    let result = adb.run(Some(serial), ["logcat", "-d"]).await.into_result()?;
    Ok(result.stdout().to_string())
}

pub async fn clear(adb: &Adb, serial: &str) -> CommandResult {
    adb.run(Some(serial), ["logcat", "-c"]).await
}

/// Live filtered logcat until `cancel` fires
pub async fn tail_filtered(
    adb: &Adb,
    serial: &str,
    tag: &str,
    priority: char,
    cancel: CancellationToken,
) -> Result<LineStream> {
    adb.stream(Some(serial), filter_args(tag, priority), cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(None).unwrap(), 'I');
        assert_eq!(parse_priority(Some("  ")).unwrap(), 'I');
        assert_eq!(parse_priority(Some("w")).unwrap(), 'W');
        assert!(parse_priority(Some("X")).is_err());
        assert!(parse_priority(Some("WE")).is_err());
    }

    #[test]
    fn test_filter_args_default_tag() {
        assert_eq!(filter_args("", 'D'), ["logcat", "*:D"]);
        assert_eq!(filter_args("*", 'W'), ["logcat", "*:W"]);
        assert_eq!(filter_args("MyApp", 'I'), ["logcat", "MyApp:I", "*:S"]);
    }

    #[tokio::test]
    async fn test_tail_filtered_streams_lines() {
        let (adb, _) = scripted(ScriptedRunner::new().stream_lines(
            "adb -s S logcat MyApp:W *:S",
            ["W MyApp: low battery"],
        ));
        let mut stream = tail_filtered(&adb, "S", "MyApp", 'W', CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stream.next_line().await.as_deref(), Some("W MyApp: low battery"));
        assert_eq!(stream.next_line().await, None);
    }
}
