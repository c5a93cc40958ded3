//! Application shell for the flowdesk CLI.
//!
//! Wires the persisted credential store, the API client and the router
//! together, and reacts to session events the way the web front-end does:
//! an invalidated session sends the user back to the login view.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use flowdesk_core::api::{ApiError, Method};
use flowdesk_core::auth::{Credential, PasswordVault, SessionEvent};
use flowdesk_core::router::SessionState;
use flowdesk_core::{
    ApiClient, Config, CredentialStore, FileStore, Navigation, Route, Router, SessionEvents, SharedStore,
};

/// Environment variable consulted before prompting for a password
const ENV_PASSWORD: &str = "FLOWDESK_PASSWORD";

/// Backend endpoint that feeds each view
fn view_endpoint(route: Route) -> Option<&'static str> {
    match route {
        Route::Login => None,
        Route::Dashboard => Some("/dashboard/stats"),
        Route::Analytics => Some("/analytics/benchmarks"),
        Route::Templates => Some("/templates"),
        Route::Tasks => Some("/instances"),
        Route::Users => Some("/users"),
        Route::Logs => Some("/logs"),
    }
}

/// Turn an API failure into something a user can act on
pub fn describe_error(err: &ApiError) -> String {
    match err {
        ApiError::Unauthorized => "Session expired or credentials rejected".to_string(),
        ApiError::AccessDenied(_) => "You do not have permission to do that".to_string(),
        ApiError::Timeout => "Connection timed out. Please try again.".to_string(),
        ApiError::Network(_) => {
            "Unable to connect to server. Check that the backend is running.".to_string()
        }
        other => other.to_string(),
    }
}

/// Where the password for a login attempt came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordSource {
    Env,
    Keychain,
    Prompt,
}

/// A remembered password the server rejects is stale: drop it and ask again.
fn should_reprompt(source: PasswordSource, err: &ApiError) -> bool {
    source == PasswordSource::Keychain && err.is_unauthorized()
}

/// Whose remembered password `logout --forget` removes. The session may
/// already be gone (e.g. after a rejected login), so fall back to the last
/// username used.
fn forget_target(identity: Option<String>, last_username: Option<&str>) -> Option<String> {
    identity.or_else(|| last_username.map(str::to_string))
}

/// Follows session events and sends the router back to login when the
/// server ends the session.
pub struct SessionWatcher {
    events: broadcast::Receiver<SessionEvent>,
}

impl SessionWatcher {
    pub fn new(events: &SessionEvents) -> Self {
        Self {
            events: events.subscribe(),
        }
    }

    /// Handle everything queued so far. Returns true if the session was
    /// invalidated, in which case the router now shows the login view.
    pub fn drain(&mut self, router: &mut Router) -> bool {
        let mut invalidated = false;
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Invalidated { path, .. }) => {
                    warn!(path = %path, "Session invalidated by server");
                    invalidated = true;
                }
                Ok(event) => debug!(?event, "Session event"),
                Err(TryRecvError::Lagged(skipped)) => {
                    // An invalidation may be among the dropped events.
                    warn!(skipped, "Missed session events, rechecking session");
                    if matches!(router.guard().state(), Ok(SessionState::Anonymous)) {
                        invalidated = true;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if invalidated {
            router.reset_to_login();
        }
        invalidated
    }
}

pub struct App {
    pub config: Config,
    store: Arc<FileStore>,
    api: ApiClient,
    router: Router,
    watcher: SessionWatcher,
    vault: PasswordVault,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        debug!(api_base_url = %config.api_base_url, timeout_ms = config.timeout_ms, "Config loaded");

        let data_dir = config.data_dir()?;
        Self::with_data_dir(config, data_dir, PasswordVault::default())
    }

    fn with_data_dir(config: Config, data_dir: PathBuf, vault: PasswordVault) -> Result<Self> {
        debug!(?data_dir, "Data directory configured");

        let store = Arc::new(FileStore::new(data_dir));
        let shared: SharedStore = store.clone();
        let session_events = SessionEvents::new();
        let watcher = SessionWatcher::new(&session_events);
        let api = ApiClient::new(&config.client_config(), shared.clone(), session_events)?;
        let router = Router::new(shared);

        Ok(Self {
            config,
            store,
            api,
            router,
            watcher,
            vault,
        })
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.router.guard().state()? == SessionState::Authenticated)
    }

    /// Log in, prompting for whatever was not supplied
    pub async fn login(&mut self, username: Option<String>, remember: bool) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(u) => u,
            None => prompt_username()?,
        };
        let (mut password, source) = self.password_for(&username)?;

        let mut result = self.attempt_login(&username, &password).await;
        if let Err(ref e) = result {
            if should_reprompt(source, e) {
                warn!(username = %username, "Remembered password rejected, forgetting it");
                if let Err(e) = self.vault.forget(&username) {
                    warn!(error = %e, "Failed to forget stored password");
                }
                eprintln!("The remembered password was rejected.");
                password = prompt_password()?;
                result = self.attempt_login(&username, &password).await;
            }
        }

        match result {
            Ok(credential) => {
                if remember {
                    if let Err(e) = self.vault.remember(&username, &password) {
                        warn!(error = %e, "Failed to store credentials");
                    }
                }
                self.config.last_username = Some(username.clone());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                println!(
                    "Logged in as {} ({})",
                    username,
                    credential.role.as_deref().unwrap_or("no role")
                );
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(anyhow::anyhow!("Invalid username or password")),
            Err(e) => Err(anyhow::anyhow!("Login failed: {}", describe_error(&e))),
        }
    }

    async fn attempt_login(&mut self, username: &str, password: &str) -> Result<Credential, ApiError> {
        let result = self.api.login(username, password).await;
        self.drain_events();
        result
    }

    fn password_for(&self, username: &str) -> Result<(String, PasswordSource)> {
        if let Ok(password) = std::env::var(ENV_PASSWORD) {
            return Ok((password, PasswordSource::Env));
        }
        match self.vault.recall(username) {
            Ok(Some(password)) => {
                debug!(username, "Using remembered password");
                return Ok((password, PasswordSource::Keychain));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Keychain unavailable"),
        }
        Ok((prompt_password()?, PasswordSource::Prompt))
    }

    /// End the local session. Always clears the store, even when it cannot
    /// be read.
    pub fn logout(&mut self, forget: bool) -> Result<()> {
        let identity = match self.api.store().get() {
            Ok(credential) => credential.identity,
            Err(e) => {
                warn!(error = %e, "Session storage unreadable, clearing it");
                None
            }
        };
        self.api.logout()?;
        self.drain_events();

        if forget {
            match forget_target(identity, self.config.last_username.as_deref()) {
                Some(username) => match self.vault.forget(&username) {
                    Ok(true) => println!("Forgot remembered password for {}", username),
                    Ok(false) => debug!(username = %username, "No remembered password"),
                    Err(e) => warn!(error = %e, "Failed to forget stored password"),
                },
                None => debug!("No username to forget a password for"),
            }
        }
        println!("Logged out");
        Ok(())
    }

    /// Local session state, without asking the server
    pub fn status(&self) -> Result<()> {
        let credential = self.store.get()?;
        if !credential.is_authenticated() {
            println!("Not logged in");
            return Ok(());
        }
        println!("Logged in as {}", credential.identity.as_deref().unwrap_or("<unknown>"));
        println!("Role: {}", credential.role.as_deref().unwrap_or("<none>"));
        if let Some(saved_at) = self.store.saved_at()? {
            println!("Since: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        println!("API: {}", self.api.base_url());
        Ok(())
    }

    /// Ask the server who the stored token belongs to
    pub async fn whoami(&mut self) -> Result<()> {
        if !self.is_authenticated()? {
            println!("Not logged in");
            return Ok(());
        }
        let result = self.api.current_user().await;
        self.drain_events();
        let me = result.map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
        println!("{} (id {}, role {})", me.username, me.id, me.role);
        Ok(())
    }

    /// Navigate to a view and load its data
    pub async fn open(&mut self, path: &str) -> Result<()> {
        match self.router.navigate(path)? {
            Navigation::Redirected(route) => {
                println!("Login required, redirected to {}", route);
                Ok(())
            }
            Navigation::NotFound(path) => Err(anyhow::anyhow!("No view at {}", path)),
            Navigation::Arrived(route) => {
                info!(route = route.name(), "Opened view");
                let Some(endpoint) = view_endpoint(route) else {
                    println!("At {}. Run `flowdesk login` to sign in.", route);
                    return Ok(());
                };
                let result = self.api.get::<Value>(endpoint).await;
                self.drain_events();
                let data = result.map_err(|e| anyhow::anyhow!(describe_error(&e)))?;
                print_json(&data)
            }
        }
    }

    /// Issue a raw API call through the pipeline
    pub async fn call(&mut self, method: Method, path: &str, body: Option<&str>) -> Result<()> {
        let mut builder = self.api.request(method, path)?;
        if let Some(body) = body {
            let json: Value = serde_json::from_str(body).context("Request body is not valid JSON")?;
            builder = builder.json(&json);
        }

        let result = self.api.send(builder).await;
        self.drain_events();
        let response = result.map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        let text = response.text().await.context("Failed to read response body")?;
        match serde_json::from_str::<Value>(&text) {
            Ok(json) => print_json(&json),
            Err(_) => {
                println!("{}", text);
                Ok(())
            }
        }
    }

    /// React to session changes published by the client
    fn drain_events(&mut self) {
        if self.watcher.drain(&mut self.router) {
            eprintln!("Your session has ended. Run `flowdesk login` to sign in again.");
        }
    }
}

fn prompt_password() -> Result<String> {
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim().to_string();
    if username.is_empty() {
        return Err(anyhow::anyhow!("Username required"));
    }
    Ok(username)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
