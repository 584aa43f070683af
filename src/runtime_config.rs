//! # Runtime Configuration Module
//!
//! Environment-driven settings for the coroutine runtime and the dispatch
//! pipeline.
//!
//! ## Environment Variables
//!
//! ### `WREN_STACK_SIZE`
//!
//! Stack size for request coroutines. Accepts decimal (`32768`) or
//! hexadecimal (`0x8000`). Default: `0x8000` (32 KB).
//!
//! Memory use is roughly `stack_size × concurrent requests`; handlers with
//! deep call chains or large locals need more.
//!
//! ### `WREN_CONTAIN_HANDLER_FAULTS`
//!
//! `true` (default): a handler that returns `Err` or panics gets the same
//! generic 500 as a failing middleware. `false`: the fault is returned from
//! [`Router::handle`](crate::router::Router::handle) and the server answers
//! it instead.
//!
//! ## Usage
//!
//! ```rust
//! use wren::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;
use tracing::warn;

pub const DEFAULT_STACK_SIZE: usize = 0x8000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Convert handler faults into 500 responses inside the router
    pub contain_handler_faults: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            contain_handler_faults: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup (used by tests).
    pub fn from_vars<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let stack_size = match get("WREN_STACK_SIZE") {
            Some(raw) => parse_size(&raw).unwrap_or_else(|| {
                warn!(value = %raw, default = defaults.stack_size, "Invalid WREN_STACK_SIZE; using default");
                defaults.stack_size
            }),
            None => defaults.stack_size,
        };
        let contain_handler_faults = match get("WREN_CONTAIN_HANDLER_FAULTS") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Invalid WREN_CONTAIN_HANDLER_FAULTS; using default");
                defaults.contain_handler_faults
            }),
            None => defaults.contain_handler_faults,
        };
        Self {
            stack_size,
            contain_handler_faults,
        }
    }

    /// Push the stack size into the `may` runtime. Call before starting the
    /// server.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
    .filter(|size| *size > 0)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
