//! ndt7 measurement tool adapter
//!
//! Runs the external `ndt7-client` binary once per phase in JSON mode and
//! turns its output lines into measurements.

use super::{MeasurementClient, PhaseStream};
use crate::config::SpeedTestConfig;
use crate::error::RunError;
use async_trait::async_trait;
use protocol::{Measurement, Ndt7Event, ProtocolError, TestKind};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct Ndt7Process {
    program: PathBuf,
    fqdn: Arc<Mutex<Option<String>>>,
}

impl Ndt7Process {
    pub fn new(config: &SpeedTestConfig) -> Self {
        Self::with_program(config.ndt7_client.clone())
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program,
            fqdn: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl MeasurementClient for Ndt7Process {
    async fn start(&mut self, kind: TestKind) -> Result<PhaseStream, RunError> {
        let mut child = Command::new(&self.program)
            .args(phase_args(kind))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                kind,
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(RunError::NoOutput(kind))?;
        debug!("Spawned {} for {} test", self.program.display(), kind);

        let (tx, rx) = mpsc::channel(1);
        let fqdn = self.fqdn.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();

            let stop = loop {
                let item = match lines.next_line().await {
                    Ok(Some(line)) => match handle_line(&line, kind, &fqdn) {
                        Some(item) => item,
                        None => continue,
                    },
                    Ok(None) => break false,
                    Err(e) => Err(RunError::Phase {
                        kind,
                        reason: format!("failed to read tool output: {}", e),
                    }),
                };

                let failed = item.is_err();
                if tx.send(item).await.is_err() {
                    debug!("{} measurement consumer gone, stopping tool", kind);
                    break true;
                }
                if failed {
                    break true;
                }
            };

            finish(child, kind, &tx, stop || tx.is_closed()).await;
        });

        Ok(rx)
    }

    fn fqdn(&self) -> Option<String> {
        self.fqdn.lock().ok().and_then(|guard| guard.clone())
    }
}

fn phase_args(kind: TestKind) -> [String; 3] {
    [
        "-format=json".to_string(),
        format!("-download={}", kind == TestKind::Download),
        format!("-upload={}", kind == TestKind::Upload),
    ]
}

/// Interpret one output line, returning the measurement or failure it carries
fn handle_line(
    line: &str,
    kind: TestKind,
    fqdn: &Mutex<Option<String>>,
) -> Option<Result<Measurement, RunError>> {
    match Ndt7Event::from_line(line) {
        Ok(Ndt7Event::Measurement(measurement)) => Some(Ok(measurement)),
        Ok(Ndt7Event::Starting(value)) => {
            debug!("{} test starting", value.test);
            None
        }
        Ok(Ndt7Event::Connected(value)) => {
            info!(
                "{} test connected to {}",
                value.test,
                value.server.as_deref().unwrap_or("unknown server")
            );
            if let (Some(server), Ok(mut current)) = (value.server, fqdn.lock()) {
                *current = Some(server);
            }
            None
        }
        Ok(Ndt7Event::Complete(value)) => {
            debug!("{} test complete", value.test);
            None
        }
        Ok(Ndt7Event::Error(value)) => Some(Err(RunError::Phase {
            kind,
            reason: value.failure.unwrap_or_else(|| "unknown error".to_string()),
        })),
        Err(ProtocolError::EmptyLine) => None,
        Err(e) => {
            debug!("Ignoring tool output {:?}: {}", line, e);
            None
        }
    }
}

/// Reap the tool. A tool that exits unsuccessfully fails the phase even
/// when it printed no error event.
async fn finish(
    mut child: Child,
    kind: TestKind,
    tx: &mpsc::Sender<Result<Measurement, RunError>>,
    stop: bool,
) {
    if stop {
        if let Err(e) = child.kill().await {
            warn!("Failed to stop {} test tool: {}", kind, e);
        }
        return;
    }

    let reason = match child.wait().await {
        Ok(status) if status.success() => return,
        Ok(status) => format!("tool exited with {}", status),
        Err(e) => format!("failed to wait for tool: {}", e),
    };

    // The runner may have given up on this phase already.
    let _ = tx.send(Err(RunError::Phase { kind, reason })).await;
}
