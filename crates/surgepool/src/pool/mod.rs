//! The worker pool and the types describing its lifecycle.
//!
//! ## Structure
//!
//! - `manager` - [`WorkerPool`]: queue ownership, start, submit, resize
//!   evaluation and shutdown.
//! - `worker` - the consume loop each worker execution runs.
//! - `state` - lifecycle state, diagnostics and the shutdown report.

mod manager;
mod state;
mod worker;


pub use manager::WorkerPool;
pub use state::{PoolState, PoolStats, ShutdownReport};
