//! Transaction module: the value type relayed between wallet, coordinator and producers

pub mod types;

pub use types::*;
