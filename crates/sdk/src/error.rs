//! SDK-specific error types with recovery context.
//!
//! Two tiers of errors exist in this crate:
//! - [`SettingsError`](crate::SettingsError): raised synchronously while
//!   parsing or building [`ClientSettings`](crate::ClientSettings). Never
//!   retried.
//! - [`SdkError`] (this module): everything that can go wrong once the client
//!   is running — gossip probes, discovery, credential resolution, and RPC
//!   status passed through from the call layer.
//!
//! Errors carry a retryability classification so the discovery coordinator
//! and callers can branch without string matching.

use snafu::{Location, Snafu};
use tonic::Code;

use crate::config::{NodePreference, SettingsError};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SdkError {
    /// A single gossip probe failed. Skipped within a discovery round;
    /// surfaced only by [`GossipClient`](crate::GossipClient) implementations.
    #[snafu(display("gossip probe of {endpoint} failed at {location}: {message}"))]
    Gossip {
        /// The seed endpoint that was probed.
        endpoint: String,
        /// Failure description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// DNS resolution of a discovering-scheme host failed.
    #[snafu(display("DNS resolution failed for {host}: {source}"))]
    Dns {
        /// The hostname that failed to resolve.
        host: String,
        /// Underlying resolver error.
        source: hickory_resolver::ResolveError,
    },

    /// Every seed in a discovery round errored, timed out, or returned an
    /// empty member list.
    #[snafu(display("no gossip seed produced a usable cluster view"))]
    NoUsableSeed,

    /// The member list held no alive member in an acceptable state.
    #[snafu(display("no {preference} candidate among {alive} alive members"))]
    NoCandidateFound {
        /// The preference that could not be satisfied.
        preference: NodePreference,
        /// How many alive members were considered.
        alive: usize,
    },

    /// Discovery attempts exhausted without resolving a target.
    #[snafu(display("discovery failed after {attempts} attempts"))]
    DiscoveryFailed {
        /// Number of full rounds that were attempted.
        attempts: u32,
    },

    /// gRPC status passed through from the call layer.
    #[snafu(display("RPC error (code={code:?}): {message}"))]
    Rpc {
        /// gRPC status code.
        code: Code,
        /// Error message from the server.
        message: String,
    },

    /// Credential resolution failed or produced an unusable header value.
    #[snafu(display("credential resolution failed: {message}"))]
    Credentials {
        /// Failure description.
        message: String,
    },

    /// The caller's cancellation signal fired.
    #[snafu(display("operation cancelled"))]
    Cancelled,

    /// The client is shutting down.
    #[snafu(display("client shutting down"))]
    Shutdown,

    /// Invalid client settings.
    #[snafu(transparent)]
    Settings {
        /// The underlying parse/validation error.
        source: SettingsError,
    },
}

impl SdkError {
    /// Returns true if the error is transient and the operation should be
    /// retried.
    ///
    /// Retryable errors:
    /// - Per-seed gossip and DNS failures (another round may succeed)
    /// - `NoUsableSeed` / `NoCandidateFound` (cluster may converge)
    /// - `UNAVAILABLE`, `DEADLINE_EXCEEDED`, `RESOURCE_EXHAUSTED`, `ABORTED`
    ///
    /// Non-retryable errors:
    /// - `UNAUTHENTICATED` / `PERMISSION_DENIED`: passed through to the
    ///   caller unchanged, never retried here
    /// - `INVALID_ARGUMENT`: the request is malformed
    /// - Settings errors: fix the configuration
    /// - `DiscoveryFailed`: the retry budget is already spent
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gossip { .. } => true,
            Self::Dns { .. } => true,
            Self::NoUsableSeed => true,
            Self::NoCandidateFound { .. } => true,
            Self::Rpc { code, .. } => matches!(
                code,
                Code::Unavailable
                    | Code::DeadlineExceeded
                    | Code::ResourceExhausted
                    | Code::Aborted
            ),
            Self::DiscoveryFailed { .. } => false,
            Self::Credentials { .. } => false,
            Self::Cancelled => false,
            Self::Shutdown => false,
            Self::Settings { .. } => false,
        }
    }

    /// Returns the gRPC status code if this is an RPC error.
    #[must_use]
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<tonic::Status> for SdkError {
    fn from(status: tonic::Status) -> Self {
        Self::Rpc { code: status.code(), message: status.message().to_owned() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_unavailable_is_retryable() {
        let err = SdkError::Rpc { code: Code::Unavailable, message: "server down".to_owned() };
        assert!(err.is_retryable());
    }

    #[test]
    fn rpc_deadline_exceeded_is_retryable() {
        let err = SdkError::Rpc { code: Code::DeadlineExceeded, message: "timeout".to_owned() };
        assert!(err.is_retryable());
    }

    #[test]
    fn auth_errors_pass_through_unretried() {
        let unauthenticated =
            SdkError::Rpc { code: Code::Unauthenticated, message: "not authenticated".to_owned() };
        assert!(!unauthenticated.is_retryable());

        let denied =
            SdkError::Rpc { code: Code::PermissionDenied, message: "access denied".to_owned() };
        assert!(!denied.is_retryable());
    }

    #[test]
    fn selector_failure_is_recoverable() {
        let err = SdkError::NoCandidateFound { preference: NodePreference::Leader, alive: 3 };
        assert!(err.is_retryable());
    }

    #[test]
    fn exhausted_discovery_is_terminal() {
        let err = SdkError::DiscoveryFailed { attempts: 10 };
        assert!(!err.is_retryable());
    }

    #[test]
    fn settings_errors_are_terminal() {
        let err: SdkError = SettingsError::NoScheme { input: "localhost:2113".to_owned() }.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn from_tonic_status() {
        let status = tonic::Status::unavailable("leader resigned");
        let err: SdkError = status.into();
        assert!(matches!(err, SdkError::Rpc { code: Code::Unavailable, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn code_accessor() {
        let err = SdkError::Rpc { code: Code::NotFound, message: "missing".to_owned() };
        assert_eq!(err.code(), Some(Code::NotFound));
        assert_eq!(SdkError::Shutdown.code(), None);
    }
}
