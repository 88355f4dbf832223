//! Bridges from outside async sources into state containers.
//!
//! Adapters never fail past their boundary: every outcome, including
//! cancellation and panics, ends up as an envelope on the container.

pub mod call;
pub mod task;

pub use call::{call_live_data, Call, CallError, CallResponse};
pub use task::{from_task, from_task_with};
