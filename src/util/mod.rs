//! Shared utilities for `toolcheck`.

pub mod progress;
