//! API client for the flowdesk backend.
//!
//! Every call goes through the same [`Pipeline`]: the stored token is
//! attached on the way out, and a 401 on the way back ends the session.
//! Call sites never deal with authentication themselves.

use anyhow::Context;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use super::models::{TokenResponse, UserProfile};
use super::pipeline::{Outcome, Pipeline};
use super::ApiError;
use crate::auth::{Credential, CredentialStore, SessionEvent, SessionEvents, SharedStore};
use crate::config::ClientConfig;

const TOKEN_PATH: &str = "/token";
const CURRENT_USER_PATH: &str = "/users/me";

/// API client.
/// Clone is cheap - reqwest::Client and the pipeline are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    pipeline: Pipeline,
    store: SharedStore,
    events: SessionEvents,
}

impl ApiClient {
    /// Create a client with the standard pipeline over `store`
    pub fn new(config: &ClientConfig, store: SharedStore, events: SessionEvents) -> anyhow::Result<Self> {
        let pipeline = Pipeline::standard(store.clone(), events.clone());
        Self::with_pipeline(config, pipeline, store, events)
    }

    pub fn with_pipeline(
        config: &ClientConfig,
        pipeline: Pipeline,
        store: SharedStore,
        events: SessionEvents,
    ) -> anyhow::Result<Self> {
        Url::parse(&config.base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.base_url))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pipeline,
            store,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Resolve a path against the base URL prefix
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        let full = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&full).map_err(|_| ApiError::InvalidUrl(full))
    }

    /// Start a request against `path`; finish it with [`ApiClient::send`]
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.client.request(method, self.url(path)?))
    }

    /// Send a request through the pipeline.
    ///
    /// Non-2xx responses come back as errors. Errors are never swallowed:
    /// a 401 clears the session and is still returned here.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build().map_err(ApiError::from_transport)?;
        let request = self.pipeline.outbound(request)?;
        let url = request.url().clone();
        debug!(method = %request.method(), path = url.path(), "Sending request");

        let outcome = match self.client.execute(request).await {
            Ok(response) => Self::check_response(response).await,
            Err(e) => Err(ApiError::from_transport(e)),
        };

        if let Err(ref e) = outcome {
            debug!(path = url.path(), error = %e, "Request failed");
        }
        self.pipeline.inbound(&url, outcome)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Outcome {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().clone();
        let text = response.text().await.map_err(ApiError::from_transport)?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url.path())))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Self::decode(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::POST, path)?.json(body)).await?;
        Self::decode(response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::PUT, path)?.json(body)).await?;
        Self::decode(response).await
    }

    /// DELETE, discarding any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, path)?).await?;
        Ok(())
    }

    // ===== Session =====

    /// Exchange a username and password for a token.
    ///
    /// On success the token, username and role are stored together and
    /// [`SessionEvent::LoggedIn`] is published.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, ApiError> {
        let builder = self
            .request(Method::POST, TOKEN_PATH)?
            .form(&[("username", username), ("password", password)]);
        let response = self.send(builder).await?;
        let token: TokenResponse = Self::decode(response).await?;

        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ApiError::InvalidResponse(format!(
                "Unsupported token type: {}",
                token.token_type
            )));
        }

        let credential = Credential::new(token.access_token, username, token.role);
        self.store.set(&credential)?;
        info!(username, role = ?credential.role, "Logged in");
        self.events.emit(SessionEvent::LoggedIn {
            identity: username.to_string(),
        });
        Ok(credential)
    }

    /// Forget the session locally. The server keeps no session to end.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.store.clear()?;
        info!("Logged out");
        self.events.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        self.get(CURRENT_USER_PATH).await
    }
}
