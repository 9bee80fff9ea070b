//! # filecap-core
//!
//! This crate bounds the number of files accumulating in watched
//! directories. Each watch counts the files matching its name pattern and,
//! once the count exceeds a configured `max`, deletes the oldest matching
//! files until `keep` remain.
//!
//! ## Features
//!
//! - **Event-driven Counting**: One continuously maintained index per
//!   watch, updated from filesystem events rather than rescans
//! - **Oldest-first Eviction**: Batched deletion down to the `keep` floor
//! - **Hot Reload**: Add, replace, and remove watches from a new
//!   configuration snapshot without restarting
//! - **Per-watch Isolation**: A failing watch never affects the others
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Supervisor                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchSpec ──► WatchManager ──► per-watch task                  │
//! │      │              │                │                          │
//! │      ▼              ▼                ▼                          │
//! │  NameFilter    event router    FileIndex ──► eviction           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod index;
pub mod manager;
pub mod policy;
pub mod scan;
pub mod supervisor;

pub use config::{NameFilter, Watch, WatchSpec};
pub use error::{Result, WatchError};
pub use event::WatchEvent;
pub use index::{FileIndex, TrackedFile};
pub use manager::{WatchManager, WatchState};
pub use supervisor::Supervisor;
