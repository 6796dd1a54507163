//! Update flow state machine.
//!
//! [`UpdateFlow`] is a lightweight coordinator owned by the caller's thread.
//! Each [`start`](UpdateFlow::start) spawns one worker thread running an
//! [`UpdateJob`]; the worker reports back over a channel with a closed set of
//! [`WorkerMessage`]s and the coordinator turns them into [`FlowEvent`]s.
//!
//! ```text
//! PrePrompt ─start─▶ Checking ─▶ Downloading ─▶ Verifying ─▶ RestartNeeded
//!                        │                          │
//!                        │ (check only / no restart)└─▶ Applying ─▶ PrePrompt
//!                        └──────────────▶ PrePrompt
//! any ─failure─▶ Error        any ─cancel()─▶ Canceled
//! ```
//!
//! The caller drives delivery with [`pump`](UpdateFlow::pump) (e.g. from a UI
//! timer) or blocks with [`wait`](UpdateFlow::wait).

use crate::error::{Result, UpdateError};
use crate::update::installer::CancelToken;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Phase of one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Idle: nothing started yet, or the last check finished without installing.
    PrePrompt,
    /// Resolving the latest release.
    Checking,
    /// Fetching the release asset.
    Downloading,
    /// Validating and staging the download.
    Verifying,
    /// Replacing the artifact in place.
    Applying,
    /// Update staged; relaunch to apply.
    RestartNeeded,
    /// The run failed.
    Error,
    /// The caller canceled the run.
    Canceled,
}

impl FlowState {
    /// `RestartNeeded`, `Error` and `Canceled` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::RestartNeeded | Self::Error | Self::Canceled)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PrePrompt => "pre_prompt",
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Applying => "applying",
            Self::RestartNeeded => "restart_needed",
            Self::Error => "error",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// A newer version found by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableUpdate {
    /// Remote version as published.
    pub remote: String,
    /// Locally installed version (empty when not installed).
    pub local: String,
    /// Release notes, empty when the release has none.
    pub changelog: String,
}

/// How a run ended, when it did not end in a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Local and remote versions match.
    UpToDate {
        /// The matching version.
        version: String,
    },
    /// A newer version exists. Reported at most once per run.
    Available(AvailableUpdate),
    /// The latest version could not be determined.
    Failed(String),
    /// An in-place artifact was replaced; no restart needed.
    Installed {
        /// Installed version.
        version: String,
    },
}

/// Notification delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// The flow entered a new state.
    StateChanged(FlowState),
    /// Human-readable progress line.
    Status(String),
    /// Result of a run that returns to idle, or the one-shot availability notice.
    Outcome(CheckOutcome),
    /// The staged update needs a relaunch. Last event of a successful app install.
    RestartRequired,
}

/// Result a job hands back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Nothing to do.
    UpToDate {
        /// Matching version.
        version: String,
    },
    /// Newer version reported, not installed.
    Available(AvailableUpdate),
    /// Update staged for apply-on-restart.
    Staged {
        /// Staged version.
        version: String,
    },
    /// Artifact replaced in place.
    Installed {
        /// Installed version.
        version: String,
    },
    /// Resolution produced nothing.
    Unresolved(String),
}

/// Message from a worker thread to its coordinator.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Progress line.
    Status(String),
    /// Entered a non-terminal phase.
    Phase(FlowState),
    /// Newer version found.
    Available(AvailableUpdate),
    /// Worker is done; always the last message.
    Finished(Result<JobOutcome>),
}

/// Handle a job uses to report back and observe cancellation.
pub struct JobContext {
    tx: Sender<WorkerMessage>,
    cancel: CancelToken,
}

impl JobContext {
    /// Build a context around an existing channel.
    pub fn new(tx: Sender<WorkerMessage>, cancel: CancelToken) -> Self {
        Self { tx, cancel }
    }

    /// Emit a status line.
    pub fn status(&self, text: impl Into<String>) {
        let text = text.into();
        debug!("{text}");
        let _ = self.tx.send(WorkerMessage::Status(text));
    }

    /// Enter a non-terminal phase.
    pub fn phase(&self, state: FlowState) {
        let _ = self.tx.send(WorkerMessage::Phase(state));
    }

    /// Report that a newer version exists.
    pub fn available(&self, update: AvailableUpdate) {
        let _ = self.tx.send(WorkerMessage::Available(update));
    }

    /// Cancellation flag for chunked downloads and extraction.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Progress callback emitting `"<label> NN%"` lines in 10% steps.
    pub fn download_progress<'a>(&'a self, label: &'a str) -> impl FnMut(u64, Option<u64>) + 'a {
        let mut last_decile = 0u64;
        move |done, total| {
            let Some(total) = total.filter(|t| *t > 0) else {
                return;
            };
            let decile = done.saturating_mul(10) / total;
            if decile > last_decile {
                last_decile = decile;
                self.status(format!("{label} {}%", decile.min(10) * 10));
            }
        }
    }
}

/// One check+install run, executed on a worker thread.
pub trait UpdateJob: Send + Sync + 'static {
    /// Short name used for thread names and log lines (e.g. `"app"`).
    fn name(&self) -> &str;

    /// Check for a newer version and, when `do_install` is set, install it.
    ///
    /// # Errors
    ///
    /// Any error ends the run in [`FlowState::Error`] (or `Canceled`).
    fn run(&self, do_install: bool, ctx: &JobContext) -> Result<JobOutcome>;
}

struct Worker {
    handle: JoinHandle<()>,
    rx: Receiver<WorkerMessage>,
    cancel: CancelToken,
    do_install: bool,
    notified_available: bool,
    abandoned: bool,
}

/// Coordinator for one artifact's update runs.
pub struct UpdateFlow {
    job: Arc<dyn UpdateJob>,
    state: FlowState,
    worker: Option<Worker>,
    events_tx: Sender<FlowEvent>,
    events_rx: Receiver<FlowEvent>,
}

impl std::fmt::Debug for UpdateFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateFlow")
            .field("job", &self.job.name())
            .field("state", &self.state)
            .field("running", &self.is_running())
            .finish()
    }
}

impl UpdateFlow {
    /// Create an idle flow for `job`.
    pub fn new(job: Arc<dyn UpdateJob>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            job,
            state: FlowState::PrePrompt,
            worker: None,
            events_tx,
            events_rx,
        }
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Receiver for [`FlowEvent`]s, in the order the worker produced them.
    pub fn events(&self) -> Receiver<FlowEvent> {
        self.events_rx.clone()
    }

    /// Returns `true` while a worker thread is alive, including a canceled
    /// worker that has not yet reached its next cancellation point.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Begin a run. No-op while a worker is alive.
    pub fn start(&mut self, do_install: bool) {
        if self.is_running() {
            debug!("{} update already running; start ignored", self.job.name());
            return;
        }
        // Deliver anything a finished worker left behind before starting over.
        self.pump();
        self.reap();

        self.set_state(FlowState::Checking);

        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let job = Arc::clone(&self.job);
        let ctx = JobContext::new(tx.clone(), cancel.clone());

        let spawned = std::thread::Builder::new()
            .name(format!("update-{}", self.job.name()))
            .spawn(move || {
                let result = job.run(do_install, &ctx);
                let _ = tx.send(WorkerMessage::Finished(result));
            });

        match spawned {
            Ok(handle) => {
                info!("{} update started (install: {do_install})", self.job.name());
                self.worker = Some(Worker {
                    handle,
                    rx,
                    cancel,
                    do_install,
                    notified_available: false,
                    abandoned: false,
                });
            }
            Err(e) => {
                let err = UpdateError::Worker(e.to_string());
                self.fail(&err.to_string());
            }
        }
    }

    /// Check only; never downloads.
    pub fn check_only(&mut self) {
        self.start(false);
    }

    /// Check and install without asking.
    pub fn auto_update(&mut self) {
        self.start(true);
    }

    /// Cancel the current run (if any) and enter `Canceled`.
    ///
    /// The worker stops at its next chunk or archive entry; nothing it reports
    /// afterwards is delivered.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.as_mut()
            && !worker.abandoned
        {
            worker.cancel.cancel();
            worker.abandoned = true;
            info!("{} update canceled", self.job.name());
        }
        self.set_state(FlowState::Canceled);
    }

    /// Deliver all pending worker messages without blocking.
    ///
    /// Returns the number of messages handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(worker) = self.worker.as_ref() else {
                break;
            };
            match worker.rx.try_recv() {
                Ok(msg) => {
                    handled += 1;
                    self.handle(msg);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_vanished();
                    break;
                }
            }
        }
        handled
    }

    /// Block until the current worker finishes or `timeout` elapses.
    ///
    /// Returns the state afterwards.
    pub fn wait(&mut self, timeout: Duration) -> FlowState {
        let deadline = Instant::now() + timeout;
        loop {
            let Some(worker) = self.worker.as_ref() else {
                break;
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.rx.recv_timeout(remaining) {
                Ok(msg) => self.handle(msg),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => self.worker_vanished(),
            }
        }
        self.state
    }

    fn handle(&mut self, msg: WorkerMessage) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };
        if worker.abandoned {
            if matches!(msg, WorkerMessage::Finished(_)) {
                self.reap();
            }
            return;
        }
        match msg {
            WorkerMessage::Status(text) => self.emit(FlowEvent::Status(text)),
            WorkerMessage::Phase(state) => {
                if state.is_terminal() {
                    warn!("worker reported terminal phase {state}; ignored");
                } else {
                    self.set_state(state);
                }
            }
            WorkerMessage::Available(update) => self.notify_available(update),
            WorkerMessage::Finished(result) => {
                let do_install = worker.do_install;
                let announced = worker.notified_available;
                self.reap();
                self.finish(result, do_install, announced);
            }
        }
    }

    fn notify_available(&mut self, update: AvailableUpdate) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };
        if worker.notified_available {
            return;
        }
        worker.notified_available = true;
        self.emit(FlowEvent::Outcome(CheckOutcome::Available(update)));
    }

    fn finish(&mut self, result: Result<JobOutcome>, do_install: bool, announced: bool) {
        match result {
            Ok(JobOutcome::UpToDate { version }) => {
                self.emit(FlowEvent::Outcome(CheckOutcome::UpToDate { version }));
                self.set_state(FlowState::PrePrompt);
            }
            Ok(JobOutcome::Available(update)) => {
                if !announced {
                    self.emit(FlowEvent::Outcome(CheckOutcome::Available(update)));
                }
                self.set_state(FlowState::PrePrompt);
            }
            Ok(JobOutcome::Installed { version }) => {
                self.emit(FlowEvent::Outcome(CheckOutcome::Installed { version }));
                self.set_state(FlowState::PrePrompt);
            }
            Ok(JobOutcome::Staged { version }) => {
                info!("{} update {version} staged; restart required", self.job.name());
                self.set_state(FlowState::RestartNeeded);
                self.emit(FlowEvent::RestartRequired);
            }
            Ok(JobOutcome::Unresolved(reason)) => {
                if do_install {
                    self.fail(&format!("{} update failed: {reason}", self.job.name()));
                } else {
                    self.emit(FlowEvent::Outcome(CheckOutcome::Failed(reason)));
                    self.set_state(FlowState::PrePrompt);
                }
            }
            Err(UpdateError::Canceled) => self.set_state(FlowState::Canceled),
            Err(e) => self.fail(&format!("{} update failed: {e}", self.job.name())),
        }
    }

    fn worker_vanished(&mut self) {
        let abandoned = self.worker.as_ref().is_some_and(|w| w.abandoned);
        self.reap();
        if !abandoned {
            self.fail(&format!("{} update worker exited unexpectedly", self.job.name()));
        }
    }

    fn fail(&mut self, message: &str) {
        warn!("{message}");
        self.emit(FlowEvent::Status(message.to_owned()));
        self.set_state(FlowState::Error);
    }

    fn reap(&mut self) {
        // A still-running (abandoned) thread is detached, not joined.
        if let Some(worker) = self.worker.take()
            && worker.handle.is_finished()
        {
            let _ = worker.handle.join();
        }
    }

    fn set_state(&mut self, state: FlowState) {
        if state != self.state {
            debug!("{} flow: {} -> {state}", self.job.name(), self.state);
            self.state = state;
            self.emit(FlowEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: FlowEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Drop for UpdateFlow {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            worker.cancel.cancel();
        }
    }
}
