//! Logging capability handed to every component.
//!
//! The core never logs through a global; callers pass a `&dyn Diagnostics`
//! configured once at process start.

/// Minimal logging sink used by the core.
pub trait Diagnostics {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn debug(&self, _message: &str) {}
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }
}

/// Discards everything. Used by report mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Diagnostics for Silent {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
}
