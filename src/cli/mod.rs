//! # CLI Module
//!
//! The `wren` binary runs a small demo application on top of the router.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! ```bash
//! wren serve --addr 0.0.0.0:3000 --log-format pretty
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Bind address (default: `0.0.0.0:3000`)
//! - `--log-format <json|pretty>` - Overrides `WREN_LOG_FORMAT`
//! - `--admin-token <VALUE>` - Required `Authorization` value under `/admin`
//!   (also read from `WREN_ADMIN_TOKEN`)
//!
//! ### `routes`
//!
//! Prints the demo route table without starting a server.

mod commands;
mod demo;


pub use commands::{run, run_cli, Cli, Commands};
pub use demo::{demo_router, ADMIN_PREFIX};
