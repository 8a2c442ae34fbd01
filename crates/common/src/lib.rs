//! Wire types and errors shared by the robot web gateway crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
