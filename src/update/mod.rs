//! Update orchestration for the application and its yt-dlp binary.
//!
//! - [`schedule`] decides when a check is due.
//! - [`release`] maps a channel to one GitHub release.
//! - [`installer`] downloads, verifies, stages and applies artifacts.
//! - [`flow`] drives one run per artifact on a worker thread.
//! - [`app`] and [`ytdlp`] are the two concrete jobs.

pub mod app;
pub mod flow;
pub mod http;
pub mod installer;
pub mod release;
pub mod schedule;
pub mod ytdlp;

pub use app::AppUpdateJob;
pub use flow::{AvailableUpdate, CheckOutcome, FlowEvent, FlowState, UpdateFlow, UpdateJob};
pub use http::{HttpClient, UreqClient};
pub use installer::{CancelToken, apply_staged_update, pending_version};
pub use release::{Channel, ReleaseDescriptor, ReleaseResolver};
pub use schedule::{PlannedRun, UpdateAction, UpdateCadence, UpdateSchedule};
pub use ytdlp::{YtDlpBranch, YtDlpUpdateJob};
