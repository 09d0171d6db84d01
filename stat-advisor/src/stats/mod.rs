//! Numeric building blocks shared by the context builder and the executor.

pub mod moments;
pub mod special;

pub use moments::{average_ranks, describe, Moments};
