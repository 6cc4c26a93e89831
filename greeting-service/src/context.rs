//! Request-scoped principal storage.
//!
//! Every inbound request runs inside its own [`RequestContext::scope`], opened by
//! [`crate::middleware::request_context_middleware`]. The slot is a tokio task-local, so
//! two requests handled concurrently never observe each other's state, and nothing
//! survives once the request future completes.
//!
//! Code running outside a scope (batch jobs, startup) sees an empty context. Such code
//! must open one explicitly with [`RequestContext::scope_as`] before writing audited
//! entities.

use std::cell::RefCell;
use std::future::Future;

/// Principal used for writes that are not triggered by a user request.
pub const SYSTEM_USERNAME: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ContextState {
    username: Option<String>,
    request_id: Option<String>,
}

tokio::task_local! {
    static CURRENT: RefCell<ContextState>;
}

/// Accessors for the current request's context slot.
pub struct RequestContext;

impl RequestContext {
    /// Run `fut` with a fresh, empty context.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CURRENT
            .scope(RefCell::new(ContextState::default()), fut)
            .await
    }

    /// Run `fut` with a context whose principal is already `username`.
    pub async fn scope_as<F: Future>(username: impl Into<String>, fut: F) -> F::Output {
        let state = ContextState {
            username: Some(username.into()),
            request_id: None,
        };
        CURRENT.scope(RefCell::new(state), fut).await
    }

    /// Reset the current context to empty.
    pub fn init() {
        Self::update(|state| *state = ContextState::default());
    }

    pub fn set_username(username: impl Into<String>) {
        let username = username.into();
        Self::update(move |state| state.username = Some(username));
    }

    pub fn username() -> Option<String> {
        CURRENT
            .try_with(|cell| cell.borrow().username.clone())
            .ok()
            .flatten()
    }

    pub fn set_request_id(request_id: impl Into<String>) {
        let request_id = request_id.into();
        Self::update(move |state| state.request_id = Some(request_id));
    }

    pub fn request_id() -> Option<String> {
        CURRENT
            .try_with(|cell| cell.borrow().request_id.clone())
            .ok()
            .flatten()
    }

    /// Whether the caller is running inside a context scope.
    pub fn is_active() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }

    fn update(f: impl FnOnce(&mut ContextState)) {
        if CURRENT.try_with(|cell| f(&mut cell.borrow_mut())).is_err() {
            tracing::warn!("RequestContext write outside of a request scope was ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_outside_scope() {
        assert!(!RequestContext::is_active());
        assert_eq!(RequestContext::username(), None);

        // Writes without a scope are dropped rather than leaking into a later request.
        RequestContext::set_username("ghost");
        assert_eq!(RequestContext::username(), None);
    }

    #[tokio::test]
    async fn set_and_read_within_scope() {
        RequestContext::scope(async {
            assert!(RequestContext::is_active());
            assert_eq!(RequestContext::username(), None);

            RequestContext::set_username("alice");
            RequestContext::set_request_id("req-1");

            assert_eq!(RequestContext::username().as_deref(), Some("alice"));
            assert_eq!(RequestContext::request_id().as_deref(), Some("req-1"));
        })
        .await;

        assert_eq!(RequestContext::username(), None);
    }

    #[tokio::test]
    async fn init_clears_previous_state() {
        RequestContext::scope_as("alice", async {
            RequestContext::set_request_id("req-1");
            RequestContext::init();

            assert_eq!(RequestContext::username(), None);
            assert_eq!(RequestContext::request_id(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn scope_as_presets_principal() {
        let seen = RequestContext::scope_as(SYSTEM_USERNAME, async { RequestContext::username() })
            .await;
        assert_eq!(seen.as_deref(), Some(SYSTEM_USERNAME));
    }

    #[tokio::test]
    async fn concurrent_scopes_are_isolated() {
        let handles: Vec<_> = ["alice", "bob", "carol"]
            .into_iter()
            .map(|name| {
                tokio::spawn(RequestContext::scope(async move {
                    RequestContext::set_username(name);
                    tokio::task::yield_now().await;
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    (name, RequestContext::username())
                }))
            })
            .collect();

        for handle in handles {
            let (expected, seen) = handle.await.unwrap();
            assert_eq!(seen.as_deref(), Some(expected));
        }
    }
}
