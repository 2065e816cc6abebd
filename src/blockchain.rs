// Thin re-export module: implementation is in `blockchain/core.rs`, split into
// the chain store and block validation.

pub mod core;
pub use core::*;
