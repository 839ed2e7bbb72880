//! Session resolution boundary.
//!
//! Authentication lives outside the dispatcher. The embedding application
//! supplies a [`SessionResolver`] that turns request headers into a
//! [`Session`]; access policies are then evaluated against the result.

use async_trait::async_trait;
use http::HeaderMap;
use relay_core::Session;

/// Resolves the session of an incoming request.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Returns the session for the request, or `None` when it is anonymous.
    async fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Resolver for deployments without sessions: every request is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

#[async_trait]
impl SessionResolver for NoSessions {
    async fn resolve(&self, _headers: &HeaderMap) -> Option<Session> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_sessions_is_always_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer acc-1".parse().unwrap());
        assert!(NoSessions.resolve(&headers).await.is_none());
    }
}
