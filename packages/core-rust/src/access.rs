//! Route access policies.

use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::RelayError;

/// Predicate evaluated against the request context. `false` denies access.
pub type AccessCheck = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Who may call a route. Evaluated after the session has been resolved.
#[derive(Clone)]
pub enum AccessPolicy {
    /// Anyone.
    Public,
    /// Any request with a session.
    Session,
    /// Every check must pass, evaluated in order.
    Checks(Vec<AccessCheck>),
}

impl AccessPolicy {
    /// Builds a [`AccessPolicy::Checks`] policy from a single predicate.
    pub fn check<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Self::Checks(vec![Arc::new(f)])
    }

    /// Appends a predicate. `Public` and `Session` start a fresh check list;
    /// predicates that need a session should call [`RequestContext::session`].
    #[must_use]
    pub fn and<F>(self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        let mut checks = match self {
            Self::Checks(checks) => checks,
            Self::Public | Self::Session => Vec::new(),
        };
        checks.push(Arc::new(f));
        Self::Checks(checks)
    }

    /// Evaluates the policy.
    ///
    /// # Errors
    ///
    /// `Unauthorized` when a session is required but missing; `Forbidden` on
    /// the first failing check.
    pub fn evaluate(&self, ctx: &RequestContext) -> Result<(), RelayError> {
        match self {
            Self::Public => Ok(()),
            Self::Session => {
                if ctx.is_authenticated() {
                    Ok(())
                } else {
                    Err(RelayError::unauthorized("Unauthorized"))
                }
            }
            Self::Checks(checks) => {
                if checks.iter().all(|check| check(ctx)) {
                    Ok(())
                } else {
                    Err(RelayError::forbidden("Forbidden"))
                }
            }
        }
    }
}

impl fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("Public"),
            Self::Session => f.write_str("Session"),
            Self::Checks(checks) => write!(f, "Checks({})", checks.len()),
        }
    }
}
