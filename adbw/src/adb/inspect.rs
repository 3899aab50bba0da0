//! Process and service inspection

use serde::{Deserialize, Serialize};

use super::Adb;
use crate::error::Result;

/// Running processes, optionally narrowed to one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub serial: String,
    pub filter: Option<String>,
    /// `ps -A` lines (header kept) matching the filter
    pub processes: Vec<String>,
    /// `pidof` output, only with a filter
    pub pids: Vec<String>,
    /// `dumpsys activity services <filter>`, only with a filter
    pub services: Option<String>,
}

/// Keep the `ps` header plus every line containing `filter`
pub fn filter_processes(ps: &str, filter: Option<&str>) -> Vec<String> {
    let mut lines = ps.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next();
    header
        .into_iter()
        .chain(lines.filter(|line| filter.map_or(true, |f| line.contains(f))))
        .map(str::to_string)
        .collect()
}

/// `ps -A`, and with a package filter also `pidof` and the package's
/// running services. Only the process listing must succeed.
pub async fn inspect_processes(
    adb: &Adb,
    serial: &str,
    filter: Option<&str>,
) -> Result<ProcessReport> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());
    let ps = adb.shell(serial, "ps -A").await.into_result()?;

    let mut report = ProcessReport {
        serial: serial.to_string(),
        filter: filter.map(str::to_string),
        processes: filter_processes(ps.stdout(), filter),
        ..Default::default()
    };

    if let Some(package) = filter {
        // pidof exits 1 when nothing matches
        let pidof = adb.run(Some(serial), ["shell", "pidof", package]).await;
        report.pids = pidof.stdout().split_whitespace().map(str::to_string).collect();

        let services = adb
            .run(Some(serial), ["shell", "dumpsys", "activity", "services", package])
            .await;
        report.services = Some(services.stdout().to_string());
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::testing::{Reply, ScriptedRunner};

    const PS: &str = "USER PID PPID VSZ RSS WCHAN ADDR S NAME\n\
        root 1 0 1 1 0 0 S init\n\
        u0_a123 4242 600 1 1 0 0 S com.example.app\n\
        u0_a123 4250 600 1 1 0 0 S com.example.app:sync\n";

    #[test]
    fn test_filter_keeps_header() {
        let lines = filter_processes(PS, Some("com.example"));
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("USER"));
        assert_eq!(filter_processes(PS, None).len(), 4);
        assert_eq!(filter_processes("", Some("x")), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_inspect_with_package() {
        let (adb, runner) = scripted(
            ScriptedRunner::new()
                .reply("adb -s S shell 'ps -A'", Reply::ok(PS))
                .reply("adb -s S shell pidof com.example.app", Reply::ok("4242\n"))
                .reply(
                    "adb -s S shell dumpsys activity services com.example.app",
                    Reply::ok("ACTIVITY MANAGER SERVICES\n  * ServiceRecord{SyncService}\n"),
                ),
        );

        let report = inspect_processes(&adb, "S", Some("com.example.app")).await.unwrap();

        assert_eq!(report.processes.len(), 3);
        assert_eq!(report.pids, ["4242"]);
        assert!(report.services.unwrap().contains("SyncService"));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_inspect_without_filter_lists_everything() {
        let (adb, runner) = scripted(ScriptedRunner::new().reply("adb -s S shell 'ps -A'", Reply::ok(PS)));

        let report = inspect_processes(&adb, "S", Some("  ")).await.unwrap();

        assert_eq!(report.processes.len(), 4);
        assert!(report.pids.is_empty());
        assert!(report.services.is_none());
        assert_eq!(runner.calls().len(), 1);
    }
}
