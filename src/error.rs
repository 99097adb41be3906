//! Unified error type for nanohat-menu.
//!
//! Collaborator failures (display, renderer, telemetry, OS control) are
//! all expressed here. Only startup failures are allowed to escape to
//! `main`; everything else is logged and swallowed by the engine.

use thiserror::Error;

use crate::telemetry::Metric;

/// Top-level error type used across the application.
#[derive(Debug, Error)]
pub enum Error {
    // UI / Display
    /// A command or transfer to the OLED failed.
    #[error("display: {0}")]
    Display(#[from] DisplayError),

    /// The frame renderer could not produce a frame.
    #[error("render failed: {0}")]
    Render(String),

    // Telemetry
    /// A metric source returned nothing usable.
    #[error("{0} unavailable")]
    Telemetry(Metric),

    /// A metric probe did not finish within its timeout.
    #[error("{0} probe timed out")]
    Timeout(Metric),

    // System
    /// An environment override could not be used.
    #[error("config: {0}")]
    Config(String),

    /// Filesystem or process I/O failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Installing the button signal mask or waiting on it failed (errno).
    #[error("signal handling failed (errno {0})")]
    Signal(i32),

    /// A reboot/poweroff/network command failed or returned.
    #[error("os control: {0}")]
    OsControl(String),
}

/// Display driver failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    /// The panel rejected its init sequence.
    #[error("init sequence failed")]
    Init,

    /// A panel command (display on/off, mode) failed.
    #[error("command failed")]
    Command,

    /// Pushing the frame buffer failed.
    #[error("frame flush failed")]
    Flush,

    /// The bus itself could not be opened or driven.
    #[error("bus error: {0}")]
    Bus(String),
}
