//! Stream operators
//!
//! Each operator wraps another stream and is itself a [`Stream`](crate::Stream).

mod collect;
mod flat_map;
mod map;

pub use collect::Collect;
pub use flat_map::FlatMap;
pub use map::Map;
