//! Shared types for the IIJmio coupon checker workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
