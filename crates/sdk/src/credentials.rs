//! Call credentials and the credential-header resolution seam.
//!
//! The SDK never talks to an authentication backend itself. It carries
//! [`Credentials`] (from settings or per-call overrides) and hands them to a
//! [`CredentialsProvider`] when the call layer needs an `Authorization`
//! header value. [`BasicCredentialsProvider`] covers the common case; token
//! brokers or secret stores implement the trait to refresh material lazily.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelledSnafu, Result};

/// Username/password credentials attached to calls.
///
/// Equality is by value. The password is redacted from debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves credentials into an `Authorization` header value.
///
/// Resolution is async and cancellable so implementations may fetch or
/// refresh tokens on demand; the SDK calls it lazily, once per outgoing
/// call that carries credentials.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Produces the `Authorization` header value for the given credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Credentials`](crate::SdkError::Credentials) if the
    /// material cannot be resolved, or
    /// [`SdkError::Cancelled`](crate::SdkError::Cancelled) if `token` fires
    /// first.
    async fn authorization(
        &self,
        credentials: &Credentials,
        token: &CancellationToken,
    ) -> Result<String>;
}

/// RFC 7617 Basic authentication provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCredentialsProvider;

#[async_trait]
impl CredentialsProvider for BasicCredentialsProvider {
    async fn authorization(
        &self,
        credentials: &Credentials,
        token: &CancellationToken,
    ) -> Result<String> {
        if token.is_cancelled() {
            return CancelledSnafu.fail();
        }

        let raw = format!("{}:{}", credentials.username, credentials.password);
        Ok(format!("Basic {}", base64_encode(raw.as_bytes())))
    }
}

/// Minimal base64 encoding for the Basic authentication header.
fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);
    let mut i = 0;

    while i < data.len() {
        let b0 = data[i];
        let b1 = data.get(i + 1).copied().unwrap_or(0);
        let b2 = data.get(i + 2).copied().unwrap_or(0);

        let n = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);

        result.push(ALPHABET[(n >> 18) as usize & 0x3F] as char);
        result.push(ALPHABET[(n >> 12) as usize & 0x3F] as char);

        if i + 1 < data.len() {
            result.push(ALPHABET[(n >> 6) as usize & 0x3F] as char);
        } else {
            result.push('=');
        }

        if i + 2 < data.len() {
            result.push(ALPHABET[n as usize & 0x3F] as char);
        } else {
            result.push('=');
        }

        i += 3;
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::SdkError;

    #[tokio::test]
    async fn basic_provider_encodes_rfc7617() {
        let provider = BasicCredentialsProvider;
        let credentials = Credentials::new("Aladdin", "open sesame");

        let header = provider
            .authorization(&credentials, &CancellationToken::new())
            .await
            .expect("resolution should succeed");

        // Canonical example from RFC 7617 §2.
        assert_eq!(header, "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[tokio::test]
    async fn basic_provider_respects_cancellation() {
        let provider = BasicCredentialsProvider;
        let credentials = Credentials::new("admin", "changeit");
        let token = CancellationToken::new();
        token.cancel();

        let result = provider.authorization(&credentials, &token).await;
        assert!(matches!(result, Err(SdkError::Cancelled)));
    }

    #[test]
    fn debug_redacts_password() {
        let credentials = Credentials::new("admin", "changeit");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("changeit"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn base64_empty_input() {
        assert_eq!(base64_encode(b""), "");
    }

    #[test]
    fn base64_padding_variants() {
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
    }
}
