//! Common wire types, header names, and errors shared across `sealed-ajax` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
