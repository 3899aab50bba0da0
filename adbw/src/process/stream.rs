//! Line-by-line output of long-running commands (live logcat and friends)

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::system::terminate;
use crate::error::{AdbwError, Result};

const LINE_BUFFER: usize = 256;

/// Incremental stdout of a running process.
///
/// A background pump owns the child. Cancelling the token passed at spawn
/// time, calling [`LineStream::cancel`], or dropping the stream all make the
/// pump kill the process group and reap it.
#[derive(Debug)]
pub struct LineStream {
    lines: mpsc::Receiver<String>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl LineStream {
    /// A finished stream over fixed lines (dry runs and tests)
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // capacity covers every line
            let _ = tx.try_send(line);
        }
        Self {
            lines: rx,
            cancel: CancellationToken::new(),
            pump: None,
        }
    }

    pub(super) fn spawn(mut child: Child, parent: CancellationToken) -> Result<Self> {
        let stdout = child.stdout.take().ok_or_else(|| AdbwError::LaunchFailure {
            program: "stream".to_string(),
            reason: "stdout was not captured".to_string(),
        })?;

        let cancel = parent.child_token();
        let token = cancel.clone();
        let (tx, rx) = mpsc::channel(LINE_BUFFER);

        let pump = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = reader.next_line() => match next {
                        Ok(Some(line)) => {
                            tokio::select! {
                                _ = token.cancelled() => break,
                                sent = tx.send(line) => {
                                    if sent.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::debug!("stream read failed: {}", e);
                            break;
                        }
                    },
                }
            }
            terminate(&mut child).await;
        });

        Ok(Self {
            lines: rx,
            cancel,
            pump: Some(pump),
        })
    }

    /// Next line, or `None` once the process ended or the stream was cancelled
    pub async fn next_line(&mut self) -> Option<String> {
        if self.cancel.is_cancelled() && self.lines.is_empty() {
            return None;
        }
        self.lines.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait until the process has been reaped
    pub async fn finish(mut self) {
        self.cancel.cancel();
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::debug!("stream pump ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
