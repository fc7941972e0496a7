use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::executor::RequestExecutor;
use crate::auth::notifier::AuthStateNotifier;
use crate::auth::request::{build_url, AuthenticatedRequest};
use crate::config::settings::{EndpointsConfig, SettingsConfig};
use crate::store::credential_store::CredentialStore;
use crate::store::session::{Session, SessionState};

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    #[serde(alias = "access")]
    access_token: String,
    #[serde(alias = "refresh")]
    refresh_token: String,
}

/// Login, registration, logout and the current user on top of the request pipeline
pub struct AuthApi {
    client: Client,
    base_url: String,
    endpoints: EndpointsConfig,
    store: Arc<CredentialStore>,
    notifier: Arc<dyn AuthStateNotifier>,
    executor: RequestExecutor,
}

impl AuthApi {
    pub fn from_settings(
        settings: &SettingsConfig,
        store: Arc<CredentialStore>,
        notifier: Arc<dyn AuthStateNotifier>,
    ) -> Result<Self, AuthError> {
        let executor = RequestExecutor::from_settings(settings, store.clone(), notifier.clone())?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(settings.api.timeout_ms()))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api.base_url.trim_end_matches('/').to_owned(),
            endpoints: settings.endpoints.clone(),
            store,
            notifier,
            executor,
        })
    }

    /// Pipeline for every other api call, sharing this api's session
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.state() == SessionState::Authenticated
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let url = build_url(&self.base_url, &self.endpoints.login, &[])?;
        let response = self
            .client
            .post(url)
            .json(&Credentials { username, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("login rejected for user '{}'", username);
            return Err(AuthError::InvalidCredentials);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::from_status(status, body));
        }

        let pair: TokenPair = serde_json::from_str(&body)?;
        self.store.write(Session::new(pair.access_token, pair.refresh_token)).await;
        info!("user '{}' logged in", username);
        self.notifier.on_session_established();
        Ok(())
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let url = build_url(&self.base_url, &self.endpoints.register, &[])?;
        let response = self
            .client
            .post(url)
            .json(&Credentials { username, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(AuthError::from_status(status, body));
        }
        info!("user '{}' registered", username);
        Ok(())
    }

    /// Profile of the logged in user.
    ///
    /// `None` once the session cannot be recovered: the refresh failed or the
    /// retried call was still rejected. Other failures are returned.
    pub async fn current_user(&self) -> Result<Option<Value>, AuthError> {
        match self
            .executor
            .execute_json::<Value>(AuthenticatedRequest::get(self.endpoints.user.as_str()))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(e @ (AuthError::AuthenticationExpired { .. } | AuthError::AuthorizationFailure { .. })) => {
                debug!("no current user: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The local session is cleared whatever the api answers
    pub async fn logout(&self) -> Result<(), AuthError> {
        let remote = self
            .executor
            .execute(AuthenticatedRequest::post(self.endpoints.logout.as_str()))
            .await;
        if let Err(e) = &remote {
            warn!("remote logout failed, clearing local session anyway: {}", e);
        }

        let was_authenticated = self.is_authenticated();
        self.store.clear().await;
        if was_authenticated {
            self.notifier.on_session_cleared();
        }
        info!("logged out");

        remote.map(|_| ())
    }
}
