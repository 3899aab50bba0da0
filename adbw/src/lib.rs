//! Workflow-driven wrapper around the Android Debug Bridge

pub mod actions;
pub mod adb;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod process;
pub mod report;
pub mod store;
pub mod testing;
pub mod workflow;

pub use error::{AdbwError, ErrorDetail, ErrorKind, Result};
