//! Core types and traits of the learning engine

pub mod error;
pub mod traits;
pub mod types;
pub mod vector;

pub use self::error::*;
pub use self::traits::*;
pub use self::types::*;
