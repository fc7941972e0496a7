use std::sync::Arc;
use std::time::Duration;

use http::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::error::AuthError;
use crate::auth::notifier::AuthStateNotifier;
use crate::auth::refresher::SessionRefresher;
use crate::auth::request::{ApiResponse, AuthenticatedRequest};
use crate::config::settings::SettingsConfig;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::resilience::single_flight::RefreshCoordinator;
use crate::store::credential_store::CredentialStore;
use crate::store::session::AccessToken;
use crate::utils::constants::BEARER_PREFIX;

static SUCCESS_MSG: &str = "success";
static ERROR_MSG: &str = "error";

/// Sends api calls with the current access token.
///
/// A 401 triggers one (shared) credential refresh and exactly one retry with
/// the new access token. Everything else is returned as received.
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    store: Arc<CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl RequestExecutor {
    pub fn new(
        client: Client,
        base_url: &str,
        refresh_path: &str,
        store: Arc<CredentialStore>,
        notifier: Arc<dyn AuthStateNotifier>,
    ) -> Result<Self, AuthError> {
        let refresher = SessionRefresher::new(client.clone(), base_url, refresh_path)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            coordinator: RefreshCoordinator::new(store.clone(), refresher, notifier),
            store,
        })
    }

    pub fn from_settings(
        settings: &SettingsConfig,
        store: Arc<CredentialStore>,
        notifier: Arc<dyn AuthStateNotifier>,
    ) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.api.timeout_ms()))
            .build()?;
        Self::new(client, &settings.api.base_url, &settings.endpoints.refresh, store, notifier)
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn execute(&self, request: AuthenticatedRequest) -> Result<ApiResponse, AuthError> {
        let metrics = get_metrics();
        let start = get_instant();
        let method = request.method.as_str().to_owned();

        let result = self.execute_with_refresh(&request).await;

        let label = if result.is_ok() { SUCCESS_MSG } else { ERROR_MSG };
        metrics.requests.with_label_values(&[method.as_str(), label]).inc();
        metrics.request_duration.with_label_values(&[method.as_str()]).observe(start.elapsed().as_secs_f64());
        result
    }

    /// Executes and decodes a successful JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: AuthenticatedRequest) -> Result<T, AuthError> {
        self.execute(request).await?.json()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.execute(AuthenticatedRequest::get(path)).await
    }

    pub async fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, AuthError> {
        self.execute(AuthenticatedRequest::post(path).with_json(body)?).await
    }

    pub async fn put<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, AuthError> {
        self.execute(AuthenticatedRequest::put(path).with_json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.execute(AuthenticatedRequest::delete(path)).await
    }

    async fn execute_with_refresh(&self, request: &AuthenticatedRequest) -> Result<ApiResponse, AuthError> {
        let access = self.store.read().access;
        let response = self.send(request, &access).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return into_api_response(response).await;
        }

        get_metrics().authorization_failures.inc();
        info!("{} {} unauthorized, refreshing credentials", request.method, request.path);

        let session = self
            .coordinator
            .refresh_after(&access)
            .await
            .map_err(|e| AuthError::AuthenticationExpired { reason: e.0 })?;

        // exactly one retry, its outcome is final
        let response = self.send(request, &session.access).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            get_metrics().authorization_failures.inc();
            warn!("{} {} still unauthorized after refresh", request.method, request.path);
        }
        into_api_response(response).await
    }

    async fn send(&self, request: &AuthenticatedRequest, access: &AccessToken) -> Result<reqwest::Response, AuthError> {
        let url = request.url(&self.base_url)?;
        debug!("{} {}", request.method, url.path());

        let mut builder = self.client.request(request.method.clone(), url);
        if !access.is_empty() {
            builder = builder.header(AUTHORIZATION, format!("{}{}", BEARER_PREFIX, access.as_str()));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }
}

async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, AuthError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    if status.is_success() {
        Ok(ApiResponse { status, headers, body })
    } else {
        Err(AuthError::from_status(status, String::from_utf8_lossy(&body).into_owned()))
    }
}
