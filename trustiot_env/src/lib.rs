//! TrustIoT Environment Abstraction Layer
//!
//! This crate provides the pieces every other TrustIoT crate agrees on
//! before any simulation starts:
//!
//! - **Identifiers**: `DeviceId` / `ServerId` newtypes with a total order
//!   (used for deterministic tie-breaking)
//! - **Randomness**: the `RunContext` trait. All entropy is derived from a
//!   single 64-bit seed, split into independent named streams, so any run
//!   is reproducible via its seed number
//! - **Configuration errors**: `EnvError`, raised before a simulation begins
//!
//! # Example
//!
//! ```ignore
//! use trustiot_env::{RngStream, RunContext, SeededContext};
//!
//! let ctx = SeededContext::new(42);
//! let mut setup_rng = ctx.derive_rng(RngStream::Setup { run: 0 });
//! ```

mod context;
mod entropy_impl;
mod error;
mod types;

pub use context::{RngStream, RunContext, SeededContext};
pub use entropy_impl::EntropyContext;
pub use error::EnvError;
pub use types::{DeviceId, ServerId};
