//! # hub_native_host
//!
//! The native-messaging host behind the package hub browser extension.
//!
//! The extension asks for a package preview; this process runs one worker
//! program per request and answers with the worker's output or a description
//! of what went wrong.
//!
//! ---
//!
//! ## Wire protocol
//!
//! The browser and the host exchange frames over the host's stdin/stdout:
//!
//! 1. A **4-byte length prefix** (`u32`, **little-endian**).
//! 2. Exactly **that many bytes** of UTF-8 JSON.
//!
//! Requests look like:
//!
//! ```json
//! { "action": "preview", "packageName": "http" }
//! ```
//!
//! and every request gets exactly one response:
//!
//! ```json
//! { "success": true,  "packageName": "http", "message": "Package processed successfully", "output": "..." }
//! { "success": false, "packageName": "http", "error": "Process exited with code 3", "stderr": "..." }
//! { "success": false, "error": "Invalid message format" }
//! ```
//!
//! A response carrying `stderr` means the worker ran and failed. A failure with
//! a package name but no `stderr` means the worker could not be started.
//!
//! ### Things that will bite you
//!
//! - **stdout is the protocol.** Diagnostics go through `tracing` to stderr.
//!   A stray `println!` corrupts the stream.
//! - **Disconnect is normal.** The browser closes stdin when the extension
//!   disconnects; the host finishes in-flight work and exits with status 0.
//! - **Limits.** Responses are capped at 1 MiB ([`host::MAX_TO_BROWSER`]);
//!   requests at 64 MiB ([`host::MAX_FROM_BROWSER`]) unless configured lower.
//! - **Bad input is answered, not fatal.** Unparseable frames, unknown actions
//!   and missing fields each produce a failure response and the loop continues.
//!
//! ---
//!
//! ## Crate layout
//!
//! - [`host`] — framing, message shapes and the [`Bridge`] protocol loop.
//! - [`worker`] — the [`Supervisor`] seam and the process-backed implementation.
//! - [`config`] — `host.toml` loading.
//! - [`startup_log`] — the `Host started at ...` line.
//!
//! ---
//!
//! ## Framing in memory
//!
//! ```rust
//! use hub_native_host::host::{decode_message, encode_message, MAX_FROM_BROWSER};
//! use serde_json::json;
//! use std::io::Cursor;
//!
//! let msg = json!({"action": "preview", "packageName": "http"});
//! let frame = encode_message(&msg).unwrap();
//! assert_eq!(&frame[..4], &((frame.len() - 4) as u32).to_le_bytes());
//!
//! let mut cur = Cursor::new(frame);
//! let back: serde_json::Value = decode_message(&mut cur, MAX_FROM_BROWSER).unwrap();
//! assert_eq!(back, msg);
//! ```
//!
//! ## Running a host
//!
//! ```no_run
//! use std::sync::Arc;
//! use hub_native_host::{Bridge, HostConfig, ProcessSupervisor};
//!
//! # async fn run() -> Result<(), hub_native_host::HostError> {
//! let config = HostConfig::discover()?;
//! let supervisor = Arc::new(ProcessSupervisor::new(config.worker_command()));
//! Bridge::from_config(&config, supervisor).run_stdio().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod startup_log;
pub mod worker;

#[doc(inline)]
pub use config::{DispatchMode, HostConfig};
#[doc(inline)]
pub use error::{ConfigError, FrameError, HostError};
#[doc(inline)]
pub use host::{decode_message, encode_message, Bridge, Response};
#[doc(inline)]
pub use worker::{ProcessSupervisor, Supervisor, WorkerOutcome};
