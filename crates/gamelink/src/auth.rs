//! Authentication hook for validating user identity.
//!
//! Gamelink does not implement authentication; the surrounding platform
//! owns accounts and credentials. The [`Authenticator`] trait is the
//! seam: one async method from an opaque token to a [`UserId`], called
//! during the handshake. Production implementations validate a session
//! cookie or JWT; tests and demos use something simpler.

use gamelink_protocol::UserId;

/// The token was missing, malformed, or did not check out.
#[derive(Debug, thiserror::Error)]
#[error("authentication failed: {0}")]
pub struct AuthError(pub String);

/// Validates a client's auth token and returns their identity.
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Returns
    /// - `Ok(UserId)`: authentication succeeded, here's who they are
    /// - `Err(AuthError)`: token is invalid or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<UserId, AuthError>> + Send;
}

/// Accepts any numeric token and uses it as the user id.
///
/// For development and tests only.
pub struct TokenIsUserId;

impl Authenticator for TokenIsUserId {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let id: i64 = token.parse().map_err(|_| {
            AuthError("token must be a numeric user id".into())
        })?;
        Ok(UserId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_is_user_id_parses_numeric_tokens() {
        let auth = TokenIsUserId;
        assert_eq!(auth.authenticate("42").await.unwrap(), UserId(42));
        assert!(auth.authenticate("not-a-number").await.is_err());
        assert!(auth.authenticate("").await.is_err());
    }
}
