//! # provider
//!
//! Find the first-boot config blob.
//!
//! A provider is an activation step plus an ordered list of candidate
//! paths. The first candidate that exists supplies the bytes; if none
//! exists the result is empty, meaning no config was supplied.
//!
//! ```no_run
//! let config = provider::qemu::default_sources()
//!     .resolve()
//!     .expect("couldn't read firmware config");
//! if config.is_empty() {
//!     println!("no config supplied");
//! }
//! ```

#![warn(clippy::all)]

pub mod activation;
pub mod error;
pub mod qemu;
pub mod source;

pub use activation::{Activator, ModprobeActivator, NoActivation};
pub use error::{Error, Result};
pub use source::{CandidateSources, Located};
