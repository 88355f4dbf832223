//! Observable containers of Loading / Success / Error envelopes.
//!
//! Producers may publish from any thread; observers are always called on
//! the container's [`Dispatcher`], one at a time, in publication order.

mod dispatcher;
mod error;
mod execution_result;
mod execution_scope;
mod live_data;
mod observer_builder;
mod scope;
mod stateful;
mod stream_ext;
mod transformations;

pub mod adapters;

pub use dispatcher::*;
pub use error::{DispatchError, ObserveError, StateError};
pub use execution_result::*;
pub use execution_scope::*;
pub use live_data::*;
pub use observer_builder::*;
pub use scope::*;
pub use stateful::*;
pub use stream_ext::*;
pub use transformations::*;

#[cfg(test)]
mod unit_tests;
