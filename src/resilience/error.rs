//! Call-path error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Why a call was turned away without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The breaker is open and still cooling down.
    Open,
    /// A probe was due but every probe ticket is taken.
    NoProbeTicket,
}

/// The breaker refused the call. Delivered only through the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("breaker `{breaker}` is open")]
pub struct RejectedError {
    pub breaker: String,
    pub reason: RejectReason,
}

/// What the fallback is told.
#[derive(Debug)]
pub enum FallbackCause<'a, E> {
    /// The call never ran.
    Rejected(&'a RejectedError),
    /// The call ran and failed.
    Failed(&'a E),
}

/// Caller-supplied side channel for rejected and failed calls.
pub type Fallback<'a, E> = dyn Fn(FallbackCause<'_, E>) + Send + Sync + 'a;

/// Errors returned by the call gateway.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Empty breaker name. The fallback is not invoked.
    #[error("breaker name is required")]
    NameRequired,

    /// No operation to run. The fallback is not invoked.
    #[error("operation is required")]
    OperationRequired,

    /// The breaker could not be built.
    #[error("breaker configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operation ran and failed; the fallback has already seen it.
    #[error("operation failed: {0}")]
    Operation(E),
}

impl<E> CallError<E> {
    /// The operation's own error, if the call ran and failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Invoke the fallback if there is one.
pub(crate) fn notify<E>(fallback: Option<&Fallback<'_, E>>, cause: FallbackCause<'_, E>) {
    if let Some(fallback) = fallback {
        fallback(cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RejectedError {
            breaker: "db".into(),
            reason: RejectReason::Open,
        };
        assert_eq!(err.to_string(), "breaker `db` is open");

        let err: CallError<std::io::Error> = CallError::NameRequired;
        assert_eq!(err.to_string(), "breaker name is required");

        let err: CallError<String> = CallError::Operation("timeout".into());
        assert_eq!(err.to_string(), "operation failed: timeout");
        assert_eq!(err.into_operation().as_deref(), Some("timeout"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: CallError<String> = ConfigError::NameRequired.into();
        assert!(matches!(err, CallError::Config(ConfigError::NameRequired)));
    }
}
