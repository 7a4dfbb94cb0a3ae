//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming proxy request:
//!     → access_control.rs (device id from X-Device-Id / deviceId cookie)
//!     → keys.rs (bound, non-expired key lookup)
//!     → Pass to proxy handler, or 403 {"ok":false,"reason":...}
//! ```
//!
//! # Design Decisions
//! - Fail closed: no device id or no live key means no proxying
//! - Passthrough when disabled in config
//! - Key administration lives elsewhere; the store is read-only here

pub mod access_control;
pub mod keys;

pub use access_control::{access_control_middleware, AccessGate, DeviceContext};
pub use keys::{AccessKey, DeviceKeyStore};
