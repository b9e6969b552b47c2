//! Offline cache proxy: lifecycle handlers over a single named store.

mod message;
mod worker;

pub use message::ControlMessage;
pub use worker::{FetchOutcome, Lifecycle, OfflineCacheProxy, WorkerState};
