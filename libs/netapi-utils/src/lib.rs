#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Small building blocks shared by the netapi crates.
//!
//! - [`SecretString`]: redacting, zeroizing wrapper for passwords and tokens
//! - [`duration_serde`]: lenient `Duration` deserialization for configuration

pub mod duration_serde;
mod secret_string;

pub use secret_string::SecretString;
