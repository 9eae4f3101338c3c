//! Error Module
//!
//! Two error channels: typed fatal errors that terminate the manager,
//! and steady-state protocol errors that are logged and survived.

use thiserror::Error;
use tracing::warn;
use x11rb::x11_utils::X11Error;

/// Errors that end the window manager
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to connect to X display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("X connection failed: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("another window manager is already running on this display")]
    AlreadyManaged,

    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Log an asynchronous protocol error without breaking the event loop
pub fn log_protocol_error(err: &X11Error) {
    warn!(
        "X protocol error: request={} (opcode {}) kind={:?} code={} resource=0x{:x}",
        err.request_name.unwrap_or("Unknown"),
        err.major_opcode,
        err.error_kind,
        err.error_code,
        err.bad_value,
    );
}
