//! Data models

pub mod baseline;
pub mod isolation;
pub mod blocked;
pub mod clean;

pub use baseline::*;
pub use isolation::*;
pub use blocked::*;
pub use clean::*;
