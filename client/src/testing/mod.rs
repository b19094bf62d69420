//! Speed test execution
//!
//! The measurement protocol is driven by an external tool behind the
//! [`MeasurementClient`] trait. The runner sequences the download and
//! upload phases under one deadline, forwards every intermediate
//! measurement to its event output and keeps the latest sample from each
//! side of the connection as the phase result.

mod ndt7;
mod summary;

pub use ndt7::Ndt7Process;
pub use summary::{Summary, ValueUnitPair};

use crate::config::SpeedTestConfig;
use crate::error::RunError;
use async_trait::async_trait;
use protocol::{LatestMeasurements, Measurement, TestKind};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Phases in the order they are run. Never run concurrently so the two
/// directions do not compete for the same link.
pub const PHASES: [TestKind; 2] = [TestKind::Download, TestKind::Upload];

/// Intermediate measurements of one phase. An `Err` item reports that the
/// phase failed; nothing useful follows it.
pub type PhaseStream = mpsc::Receiver<Result<Measurement, RunError>>;

/// Something able to run one bounded phase of a speed test
#[async_trait]
pub trait MeasurementClient: Send {
    /// Start a phase. The returned stream yields the intermediate
    /// measurements and closes when the phase is over.
    async fn start(&mut self, kind: TestKind) -> Result<PhaseStream, RunError>;

    /// FQDN of the server the last phase connected to
    fn fqdn(&self) -> Option<String>;
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub fqdn: String,
    pub results: HashMap<TestKind, LatestMeasurements>,
}

/// Single-use runner for one download + upload test
pub struct TestRunner<C> {
    client: C,
    deadline: Instant,
    events_tx: Option<mpsc::Sender<Measurement>>,
    events_rx: Option<mpsc::Receiver<Measurement>>,
}

impl TestRunner<Ndt7Process> {
    pub fn new(config: &SpeedTestConfig) -> Self {
        info!(
            "Speed test client {} (timeout: {:?})",
            config.user_agent(),
            config.default_timeout
        );
        Self::with_client(Ndt7Process::new(config), config.default_timeout)
    }
}

impl<C: MeasurementClient> TestRunner<C> {
    /// The timeout starts counting now and covers both phases.
    pub fn with_client(client: C, timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::channel(1);

        Self {
            client,
            deadline: Instant::now() + timeout,
            events_tx: Some(events_tx),
            events_rx: Some(events_rx),
        }
    }

    /// Take the event output. It must be drained concurrently with
    /// [`run`](Self::run), which otherwise stalls after one pending event.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<Measurement>> {
        self.events_rx.take()
    }

    /// Run the download phase, then the upload phase.
    ///
    /// The event output is closed when this returns, on every path.
    pub async fn run(&mut self) -> Result<RunOutcome, RunError> {
        let events = self.events_tx.take().ok_or(RunError::AlreadyRun)?;

        // Nobody took the output, so nobody would ever read it.
        self.events_rx = None;

        let mut results = HashMap::new();
        for kind in PHASES {
            self.run_phase(kind, &events, &mut results).await?;
            debug!("{} test finished", kind);
        }

        let fqdn = self.client.fqdn().unwrap_or_default();
        info!("Speed test against {} completed", fqdn);

        Ok(RunOutcome { fqdn, results })
    }

    async fn run_phase(
        &mut self,
        kind: TestKind,
        events: &mpsc::Sender<Measurement>,
        results: &mut HashMap<TestKind, LatestMeasurements>,
    ) -> Result<(), RunError> {
        let deadline = self.deadline;
        let client = &mut self.client;

        let phase = async {
            info!("Starting {} test", kind);
            let mut measurements = client.start(kind).await?;

            while let Some(item) = measurements.recv().await {
                let measurement = item?;
                results
                    .entry(kind)
                    .or_default()
                    .record(measurement.clone());

                if events.send(measurement).await.is_err() {
                    debug!("Event output closed, measurement not forwarded");
                }
            }

            Ok(())
        };

        match tokio::time::timeout_at(deadline, phase).await {
            Ok(result) => result,
            Err(_) => Err(RunError::Timeout { kind }),
        }
    }

    /// Release the runner and whatever the client still holds.
    pub fn dispose(self) {
        debug!("Speed test runner disposed");
    }
}
