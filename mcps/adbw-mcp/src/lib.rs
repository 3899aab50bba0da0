//! adbw MCP server
//!
//! Tools mirror the adbw command API one to one: `devices_list`,
//! `device_summary`, `shell_run`, `package_list`, `package_info`,
//! `apk_install`, `file_push`, `file_pull`, `logcat_snapshot` and
//! `workflow_run`.

pub mod handlers;
pub mod params;
pub mod server;

pub use server::AdbwMcpServer;
