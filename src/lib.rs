//! `toolcheck`: cross-version acceptance testing for command-line build tools.
//!
//! A suite is a set of scenarios. Each scenario copies a fixture project into
//! a fresh workspace, drives the tool through a [`verifier::Verifier`], and
//! asserts on the files and logs it leaves behind. Scenarios are gated on
//! [`version::VersionRange`]s so one suite covers every supported release.

pub mod assertions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod invoker;
pub mod logging;
pub mod scenario;
pub mod template;
pub mod util;
pub mod verifier;
pub mod version;
pub mod workspace;

pub use error::{ErrorCode, HarnessError, Result, StructuredError};
pub use harness::Harness;
