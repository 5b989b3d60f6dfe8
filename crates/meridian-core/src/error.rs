//! The closed set of error kinds every component surfaces.
//!
//! `ErrorKind` is never thrown across a component boundary as an
//! exception-equivalent panic; it rides inside [`crate::step::StepResult`].

use serde::{Deserialize, Serialize};

/// Closed set of error kinds surfaced in `StepResult::error_kind`.
///
/// Propagation policy is encoded in [`ErrorKind::is_transient`],
/// [`ErrorKind::is_degradable`] and [`ErrorKind::is_surfaced`] rather than
/// left to call sites to re-derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigInvalid,
    AuthExpired,
    RateLimited,
    TransientNetwork,
    Timeout,
    NotFound,
    ContentTooLarge,
    ContentTypeForbidden,
    PrivacyBlocked,
    PolicyDenied,
    BackendUnavailable,
    StorageConflict,
    ParseError,
    BudgetExceeded,
    BreakerOpen,
    SessionClosed,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Errors that are recovered locally within a retry budget and never
    /// need to surface to the caller.
    pub fn is_locally_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }

    /// Errors classified as transient for retry purposes.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }

    /// Errors that are fatal to the current mission but not the process.
    pub fn is_mission_fatal(self) -> bool {
        matches!(self, ErrorKind::Cancelled | ErrorKind::SessionClosed)
    }

    /// Errors that must always be surfaced to the caller, never silently
    /// swallowed.
    pub fn is_always_surfaced(self) -> bool {
        matches!(
            self,
            ErrorKind::BudgetExceeded
                | ErrorKind::PolicyDenied
                | ErrorKind::PrivacyBlocked
                | ErrorKind::AuthExpired
                | ErrorKind::ConfigInvalid
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ConfigInvalid => "config_invalid",
            ErrorKind::AuthExpired => "auth_expired",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ContentTooLarge => "content_too_large",
            ErrorKind::ContentTypeForbidden => "content_type_forbidden",
            ErrorKind::PrivacyBlocked => "privacy_blocked",
            ErrorKind::PolicyDenied => "policy_denied",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::StorageConflict => "storage_conflict",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::BreakerOpen => "breaker_open",
            ErrorKind::SessionClosed => "session_closed",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Programmer-error channel: the only thing allowed to cross a component
/// boundary as a real `Result::Err` rather than inside a `StepResult`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("tenant binding missing for {operation}")]
    MissingTenantBinding { operation: &'static str },

    #[error("breaker registry poisoned")]
    RegistryPoisoned,

    #[error("invalid configuration: {0}")]
    Config(String),
}
