//! ytconv: update orchestration for YouTube Converter.
//!
//! Keeps two artifacts current:
//!
//! - **The application**, published as a `.zip` on GitHub releases. Updates
//!   are staged next to the install and applied by a helper after the app
//!   exits.
//! - **The yt-dlp binary**, a single executable replaced in place.
//!
//! # Architecture
//!
//! A caller-owned [`UpdateFlow`](update::UpdateFlow) per artifact spawns a
//! worker thread for each run and receives typed messages over a channel:
//! - **Schedule**: [`update::schedule`] decides whether a check is due
//! - **Resolve**: [`update::release`] picks one release for a channel
//! - **Install**: [`update::installer`] downloads, verifies and stages
//! - **Flow**: [`update::flow`] tracks state and emits [`update::FlowEvent`]s

pub mod config;
pub mod error;
pub mod paths;
pub mod update;

pub use config::UpdaterConfig;
pub use error::{HttpError, Result, UpdateError};
pub use paths::UpdatePaths;
