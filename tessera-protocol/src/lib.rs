//! Protocol-level value types for the tessera driver.
//! Contains no I/O - only the token/partitioner math and the event kinds
//! the driver's metadata engine consumes.

pub mod error;
pub mod events;
pub mod token;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
