//! Intents: deep links, explicit components, broadcasts and raw `am`

use super::{shell_quote, Adb};
use crate::error::{AdbwError, Result};
use crate::process::CommandResult;

const VIEW_ACTION: &str = "android.intent.action.VIEW";

/// Open `url` with whatever activity handles VIEW for it
pub async fn open_url(adb: &Adb, serial: &str, url: &str) -> CommandResult {
    let command = format!("am start -a {VIEW_ACTION} -d {}", shell_quote(url));
    adb.shell(serial, &command).await
}

/// `am start -n package/.Activity`
pub async fn start_component(adb: &Adb, serial: &str, component: &str) -> CommandResult {
    adb.run(Some(serial), ["shell", "am", "start", "-n", component])
        .await
}

/// Send a broadcast for `action`, optionally to one package only
pub async fn send_broadcast(
    adb: &Adb,
    serial: &str,
    action: &str,
    package: Option<&str>,
) -> CommandResult {
    let mut args = vec!["shell", "am", "broadcast", "-a", action];
    if let Some(package) = package.filter(|p| !p.is_empty()) {
        args.extend(["-p", package]);
    }
    adb.run(Some(serial), args).await
}

/// `am <args...>`; each argument is passed through as one word
pub async fn am(adb: &Adb, serial: &str, args: &[String]) -> Result<CommandResult> {
    if args.is_empty() {
        return Err(AdbwError::invalid("args", "am needs at least one argument"));
    }
    let words: Vec<String> = args.iter().map(|a| shell_quote(a)).collect();
    Ok(adb.shell(serial, &format!("am {}", words.join(" "))).await)
}
