//! Per-call option construction: deadlines, credentials, leader affinity.
//!
//! [`CallOptionsContext`] is built once from the client settings and used for
//! every outgoing call. Construction is pure given a clock reading: explicit
//! per-call values win over settings defaults, absent values fall back to
//! documented sentinels (no deadline = infinite, no credentials = anonymous).
//! An ordered list of middleware functions runs over every built
//! [`CallOptions`], replacing ad-hoc interceptor injection.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio_util::sync::CancellationToken;
use tonic::metadata::{MetadataMap, MetadataValue};

use crate::{
    config::{ClientSettings, NodePreference},
    credentials::{Credentials, CredentialsProvider},
    error::{CredentialsSnafu, Result},
};

/// Routing header telling the server to reject the call unless it is the
/// current leader.
pub const REQUIRES_LEADER_HEADER: &str = "requires-leader";

/// Standard authorization header.
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Per-call overrides supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOverrides {
    deadline: Option<Duration>,
    credentials: Option<Credentials>,
}

impl CallOverrides {
    /// Overrides the deadline for this call only.
    ///
    /// A zero duration produces an already-expired deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the credentials for this call only.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Options attached to one outgoing call. Never shared between calls.
#[derive(Debug, Clone)]
pub struct CallOptions {
    deadline: Option<Instant>,
    credentials: Option<Credentials>,
    requires_leader: bool,
    token: CancellationToken,
}

impl CallOptions {
    /// Returns the absolute deadline, `None` meaning the call never times
    /// out.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline, saturating at zero.
    /// `None` means infinite.
    #[must_use]
    pub fn time_remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= Instant::now())
    }

    /// Returns the credentials this call carries, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns whether the leader-required routing header is attached.
    #[must_use]
    pub fn requires_leader(&self) -> bool {
        self.requires_leader
    }

    /// Returns this call's cancellation signal.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves this call's credentials into an authorization header value.
    ///
    /// Returns `Ok(None)` for anonymous calls.
    ///
    /// # Errors
    ///
    /// Propagates provider failures and cancellation.
    pub async fn authorization_value(
        &self,
        provider: &dyn CredentialsProvider,
    ) -> Result<Option<String>> {
        match &self.credentials {
            Some(credentials) => {
                provider.authorization(credentials, &self.token).await.map(Some)
            },
            None => Ok(None),
        }
    }

    /// Writes the routing and authorization headers into request metadata.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Credentials`](crate::SdkError::Credentials) if the
    /// resolved authorization value is not a valid header value.
    pub fn apply_metadata(
        &self,
        metadata: &mut MetadataMap,
        authorization: Option<&str>,
    ) -> Result<()> {
        if self.requires_leader {
            metadata.insert(REQUIRES_LEADER_HEADER, MetadataValue::from_static("true"));
        }

        if let Some(value) = authorization {
            let value = MetadataValue::try_from(value).map_err(|_| {
                CredentialsSnafu {
                    message: "authorization value is not a valid header".to_owned(),
                }
                .build()
            })?;
            metadata.insert(AUTHORIZATION_HEADER, value);
        }

        Ok(())
    }
}

/// Middleware applied to every built [`CallOptions`], in registration order.
pub type CallMiddleware = Arc<dyn Fn(&mut CallOptions) + Send + Sync>;

/// Builds [`CallOptions`] for every call issued through one client.
#[derive(Clone)]
pub struct CallOptionsContext {
    settings: Arc<ClientSettings>,
    middleware: Vec<CallMiddleware>,
}

impl CallOptionsContext {
    /// Creates a context over the client settings.
    #[must_use]
    pub fn new(settings: Arc<ClientSettings>) -> Self {
        Self { settings, middleware: Vec::new() }
    }

    /// Appends a middleware function. Middleware runs in registration order
    /// after the base options are constructed.
    #[must_use]
    pub fn with_middleware(mut self, middleware: CallMiddleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Builds the options for one call.
    ///
    /// Deadline precedence: per-call override, else the settings default,
    /// else infinite. A finite deadline is anchored to the current time;
    /// values too large to represent (e.g. `Duration::MAX`) saturate to the
    /// infinite sentinel instead of overflowing. Credential precedence:
    /// per-call override, else settings default, else anonymous. The
    /// leader-required header is attached iff the client prefers the leader.
    #[must_use]
    pub fn options_for(&self, overrides: CallOverrides, token: CancellationToken) -> CallOptions {
        let deadline = overrides
            .deadline
            .or(self.settings.default_deadline())
            .and_then(|timeout| Instant::now().checked_add(timeout));

        let credentials =
            overrides.credentials.or_else(|| self.settings.credentials().cloned());

        let mut options = CallOptions {
            deadline,
            credentials,
            requires_leader: self.settings.node_preference() == NodePreference::Leader,
            token,
        };

        for middleware in &self.middleware {
            middleware(&mut options);
        }

        options
    }
}

impl fmt::Debug for CallOptionsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptionsContext")
            .field("settings", &self.settings)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
