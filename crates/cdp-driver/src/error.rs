use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the driver.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DriverErrorKind {
    #[error("browser launch failed")]
    LaunchFailed,
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("script evaluation failed")]
    EvalFailed,
    #[error("browser session closed")]
    SessionClosed,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to the control loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    /// Whether the browser itself is gone. Per-element misses and script
    /// failures are skippable; a dead transport ends the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::LaunchFailed | DriverErrorKind::CdpIo | DriverErrorKind::SessionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_end_the_run() {
        assert!(DriverError::new(DriverErrorKind::CdpIo).is_fatal());
        assert!(DriverError::new(DriverErrorKind::SessionClosed).is_fatal());
        assert!(DriverError::new(DriverErrorKind::LaunchFailed).is_fatal());
        assert!(!DriverError::new(DriverErrorKind::NavTimeout).is_fatal());
        assert!(!DriverError::new(DriverErrorKind::EvalFailed).is_fatal());
        assert!(!DriverError::new(DriverErrorKind::Internal).is_fatal());
    }

    #[test]
    fn display_includes_hint() {
        let err = DriverError::new(DriverErrorKind::EvalFailed).with_hint("boom");
        assert_eq!(err.to_string(), "script evaluation failed: boom");
    }
}
