//! Core data types and enums.

pub mod enums;
pub mod trading;

pub use enums::*;
pub use trading::*;
