//! Device sessions: reboot, wireless connections, port forwarding

use serde::{Deserialize, Serialize};

use super::Adb;
use crate::error::Result;
use crate::process::CommandResult;

pub const DEFAULT_TCPIP_PORT: u16 = 5555;

pub async fn reboot(adb: &Adb, serial: &str) -> CommandResult {
    adb.run(Some(serial), ["reboot"]).await
}

/// Switch a USB device to TCP/IP mode, then connect to it over the network
pub async fn connect_wireless(adb: &Adb, serial: &str, host: &str, port: u16) -> Result<CommandResult> {
    let port = port.to_string();
    adb.run(Some(serial), ["tcpip", port.as_str()])
        .await
        .into_result()?;
    let target = format!("{host}:{port}");
    Ok(adb.run(None, ["connect", target.as_str()]).await)
}

pub async fn disconnect(adb: &Adb, target: &str) -> CommandResult {
    adb.run(None, ["disconnect", target]).await
}

/// Wireless debugging pairing (Android 11+)
pub async fn pair(adb: &Adb, host: &str, code: &str) -> CommandResult {
    adb.run(None, ["pair", host, code]).await
}

/// `adb version`, used by the doctor check
pub async fn version(adb: &Adb) -> CommandResult {
    adb.run(None, ["version"]).await
}

// ============================================================================
// Port forwarding
// ============================================================================

/// One `adb forward --list` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortForward {
    pub serial: String,
    pub local: String,
    pub remote: String,
}

pub fn parse_forward_list(output: &str) -> Vec<PortForward> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some(PortForward {
                serial: parts.next()?.to_string(),
                local: parts.next()?.to_string(),
                remote: parts.next()?.to_string(),
            })
        })
        .collect()
}

pub async fn list_forwards(adb: &Adb, serial: &str) -> Result<Vec<PortForward>> {
    let result = adb
        .run(Some(serial), ["forward", "--list"])
        .await
        .into_result()?;
    Ok(parse_forward_list(result.stdout())
        .into_iter()
        .filter(|f| f.serial == serial)
        .collect())
}

/// Forward a host port to the device (`tcp:8081` style specs)
pub async fn add_forward(adb: &Adb, serial: &str, local: &str, remote: &str) -> CommandResult {
    adb.run(Some(serial), ["forward", local, remote]).await
}

pub async fn remove_forward(adb: &Adb, serial: &str, local: &str) -> CommandResult {
    adb.run(Some(serial), ["forward", "--remove", local]).await
}

/// Expose a host port to the device
pub async fn add_reverse(adb: &Adb, serial: &str, remote: &str, local: &str) -> CommandResult {
    adb.run(Some(serial), ["reverse", remote, local]).await
}

pub async fn remove_reverse(adb: &Adb, serial: &str, remote: &str) -> CommandResult {
    adb.run(Some(serial), ["reverse", "--remove", remote]).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::test_support::scripted;
    use crate::testing::{Reply, ScriptedRunner};

    #[test]
    fn test_parse_forward_list() {
        let forwards = parse_forward_list("S tcp:8081 tcp:8081\nOTHER tcp:9000 localabstract:x\n\n");
        assert_eq!(forwards.len(), 2);
        assert_eq!(forwards[1].remote, "localabstract:x");
    }

    #[tokio::test]
    async fn test_list_forwards_filters_by_serial() {
        let (adb, _) = scripted(ScriptedRunner::new().reply(
            "adb -s S forward --list",
            Reply::ok("S tcp:8081 tcp:8081\nOTHER tcp:9000 tcp:9000\n"),
        ));
        let forwards = list_forwards(&adb, "S").await.unwrap();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].local, "tcp:8081");
    }

    #[tokio::test]
    async fn test_connect_wireless_stops_when_tcpip_fails() {
        let (adb, runner) = scripted(
            ScriptedRunner::new().reply("adb -s S tcpip 5555", Reply::exit(1, "", "error: no devices")),
        );
        assert!(connect_wireless(&adb, "S", "192.168.1.20", DEFAULT_TCPIP_PORT)
            .await
            .is_err());
        assert_eq!(runner.calls(), ["adb -s S tcpip 5555"]);
    }
}
