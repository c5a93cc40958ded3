//! Request/response middleware applied to every API call.
//!
//! Outbound interceptors see the fully built request before it is sent.
//! Inbound interceptors see the outcome (response or error) after it
//! arrives. Both run in registration order.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response, Url};
use tracing::{debug, error, warn};

use super::ApiError;
use crate::auth::{CredentialStore, SessionEvent, SessionEvents, SharedStore};

/// Result of sending one request: a 2xx response or a failure.
pub type Outcome = Result<Response, ApiError>;

pub trait RequestInterceptor: Send + Sync {
    /// Returning an error aborts the request before anything is sent.
    fn intercept(&self, request: Request) -> Result<Request, ApiError>;
}

pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, url: &Url, outcome: Outcome) -> Outcome;
}

/// Attaches the stored token as `Authorization: Bearer <token>`.
///
/// With no token the request goes out unmodified. A store read failure
/// aborts the request.
pub struct BearerAuth {
    store: SharedStore,
}

impl BearerAuth {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

impl RequestInterceptor for BearerAuth {
    fn intercept(&self, mut request: Request) -> Result<Request, ApiError> {
        let Some(token) = self.store.token()? else {
            debug!(url = %request.url(), "No session token, sending anonymously");
            return Ok(request);
        };

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::InvalidToken)?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

/// Clears the session when the server answers 401.
///
/// The store is wiped, [`SessionEvent::Invalidated`] is published and the
/// original error is still returned to the caller. Every other outcome
/// passes through untouched.
pub struct SessionInvalidation {
    store: SharedStore,
    events: SessionEvents,
}

impl SessionInvalidation {
    pub fn new(store: SharedStore, events: SessionEvents) -> Self {
        Self { store, events }
    }
}

impl ResponseInterceptor for SessionInvalidation {
    fn intercept(&self, url: &Url, outcome: Outcome) -> Outcome {
        match outcome {
            Err(err) if err.is_unauthorized() => {
                warn!(path = url.path(), "Credential rejected, ending session");
                if let Err(e) = self.store.clear() {
                    error!(error = %e, "Failed to clear session store");
                }
                self.events.emit(SessionEvent::Invalidated {
                    status: 401,
                    path: url.path().to_string(),
                });
                Err(err)
            }
            other => other,
        }
    }
}

/// Ordered chain of interceptors.
/// Clone is cheap - interceptors are shared behind `Arc`.
#[derive(Clone, Default)]
pub struct Pipeline {
    outbound: Vec<Arc<dyn RequestInterceptor>>,
    inbound: Vec<Arc<dyn ResponseInterceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer injection outbound, session invalidation inbound
    pub fn standard(store: SharedStore, events: SessionEvents) -> Self {
        Self::new()
            .with_request_interceptor(BearerAuth::new(store.clone()))
            .with_response_interceptor(SessionInvalidation::new(store, events))
    }

    pub fn with_request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.outbound.push(Arc::new(interceptor));
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        self.inbound.push(Arc::new(interceptor));
        self
    }

    pub fn outbound(&self, request: Request) -> Result<Request, ApiError> {
        self.outbound
            .iter()
            .try_fold(request, |request, interceptor| interceptor.intercept(request))
    }

    pub fn inbound(&self, url: &Url, outcome: Outcome) -> Outcome {
        self.inbound
            .iter()
            .fold(outcome, |outcome, interceptor| interceptor.intercept(url, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, CredentialKey, MemoryStore, StoreError};
    use reqwest::{Method, StatusCode};

    struct BrokenStore;

    impl CredentialStore for BrokenStore {
        fn read(&self, _key: CredentialKey) -> Result<Option<String>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn write(&self, _key: CredentialKey, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }

        fn delete(&self, _key: CredentialKey) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    fn request(path: &str) -> Request {
        let url = Url::parse("http://localhost/api").unwrap().join(path).unwrap();
        Request::new(Method::GET, url)
    }

    fn logged_in() -> SharedStore {
        MemoryStore::with_credential(Credential::new("abc", "u", "admin")).shared()
    }

    #[test]
    fn test_bearer_attached_when_token_present() {
        let auth = BearerAuth::new(logged_in());
        let req = auth.intercept(request("/api/tasks")).unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer abc");
        assert!(req.headers()[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_no_header_when_anonymous() {
        let auth = BearerAuth::new(MemoryStore::new().shared());
        let req = auth.intercept(request("/api/tasks")).unwrap();
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_bearer_replaces_existing_header() {
        let auth = BearerAuth::new(logged_in());
        let mut req = request("/api/tasks");
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer stale"));
        let req = auth.intercept(req).unwrap();
        assert_eq!(req.headers()[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_store_failure_aborts_request() {
        let auth = BearerAuth::new(Arc::new(BrokenStore));
        let err = auth.intercept(request("/api/tasks")).unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::Poisoned)));
    }

    #[test]
    fn test_unprintable_token_rejected() {
        let store = MemoryStore::with_credential(Credential::new("bad\ntoken", "u", "user"));
        let auth = BearerAuth::new(store.shared());
        let err = auth.intercept(request("/api/tasks")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn test_unauthorized_clears_store_and_notifies_once() {
        let store = logged_in();
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let layer = SessionInvalidation::new(store.clone(), events);
        let url = Url::parse("http://localhost/api/tasks").unwrap();

        let outcome = layer.intercept(&url, Err(ApiError::Unauthorized));

        assert!(matches!(outcome, Err(ApiError::Unauthorized)));
        assert!(store.get().unwrap().is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Invalidated {
                status: 401,
                path: "/api/tasks".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_other_failures_leave_store_alone() {
        let store = logged_in();
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let layer = SessionInvalidation::new(store.clone(), events);
        let url = Url::parse("http://localhost/api/tasks").unwrap();

        let failures = vec![
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::Timeout,
        ];
        for failure in failures {
            let outcome = layer.intercept(&url, Err(failure));
            assert!(outcome.is_err());
        }

        assert_eq!(store.get().unwrap(), Credential::new("abc", "u", "admin"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unauthorized_still_reported_when_clear_fails() {
        let events = SessionEvents::new();
        let mut rx = events.subscribe();
        let layer = SessionInvalidation::new(Arc::new(BrokenStore), events);
        let url = Url::parse("http://localhost/api/tasks").unwrap();

        let outcome = layer.intercept(&url, Err(ApiError::Unauthorized));
        assert!(matches!(outcome, Err(ApiError::Unauthorized)));
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Invalidated { .. })));
    }

    #[test]
    fn test_pipeline_runs_interceptors_in_order() {
        struct Tag(&'static str);

        impl RequestInterceptor for Tag {
            fn intercept(&self, mut request: Request) -> Result<Request, ApiError> {
                request
                    .headers_mut()
                    .append("x-trace", HeaderValue::from_static(self.0));
                Ok(request)
            }
        }

        let pipeline = Pipeline::new()
            .with_request_interceptor(Tag("first"))
            .with_request_interceptor(Tag("second"));
        let req = pipeline.outbound(request("/api/tasks")).unwrap();
        let tags: Vec<_> = req.headers().get_all("x-trace").iter().collect();
        assert_eq!(tags, vec!["first", "second"]);
    }
}
