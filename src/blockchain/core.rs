// core.rs splits chain storage from block validation.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
