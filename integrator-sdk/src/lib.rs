//! Shared wire types for the integrator gateway.
//!
//! Everything that crosses the HTTP boundary lives in [`objects`]. The
//! optional `client` feature adds typed HTTP clients on top of `reqwest`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
