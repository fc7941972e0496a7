use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::error::AuthError;
use crate::auth::request::build_url;
use crate::store::session::{RefreshToken, Session};

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    access: Option<String>,
    #[serde(alias = "refresh_token")]
    refresh: Option<String>,
}

/// Exchanges a refresh token for a new (access, refresh) pair.
///
/// One HTTP attempt per call and no storage side effects: persisting the
/// returned session is up to the caller.
#[derive(Debug, Clone)]
pub struct SessionRefresher {
    client: Client,
    url: Url,
}

impl SessionRefresher {
    pub fn new(client: Client, base_url: &str, refresh_path: &str) -> Result<Self, AuthError> {
        Ok(Self {
            client,
            url: build_url(base_url, refresh_path, &[])?,
        })
    }

    pub async fn refresh(&self, refresh_token: &RefreshToken) -> Result<Session, AuthError> {
        if refresh_token.is_empty() {
            debug!("refreshing without a refresh token");
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(&RefreshRequest { refresh: refresh_token.as_str() })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("refresh rejected, status: {}", status);
            return Err(AuthError::Unauthorized { status });
        }

        let body = response.text().await?;
        let pair: RefreshResponse = serde_json::from_str(&body)?;
        match (pair.access, pair.refresh) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                info!("session refreshed");
                Ok(Session::new(access, refresh))
            }
            // a partial pair is never persisted
            _ => {
                warn!("refresh response without a complete token pair, status: {}", status);
                Err(AuthError::Unauthorized { status })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn returns_rotated_pair() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh").json_body(json!({"refresh": "R1"}));
                then.status(200).json_body(json!({"access": "A2", "refresh": "R2"}));
            })
            .await;
        let refresher = SessionRefresher::new(Client::new(), &server.base_url(), "/auth/refresh").unwrap();

        let session = refresher.refresh(&RefreshToken::new("R1")).await.unwrap();

        assert_eq!(session, Session::new("A2", "R2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn accepts_token_pair_field_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh");
                then.status(200)
                    .json_body(json!({"access_token": "A2", "refresh_token": "R2"}));
            })
            .await;
        let refresher = SessionRefresher::new(Client::new(), &server.base_url(), "/auth/refresh").unwrap();

        let session = refresher.refresh(&RefreshToken::new("R1")).await.unwrap();

        assert_eq!(session, Session::new("A2", "R2"));
    }

    #[tokio::test]
    async fn non_success_is_unauthorized_and_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh");
                then.status(401).json_body(json!({"detail": "Token is expired"}));
            })
            .await;
        let refresher = SessionRefresher::new(Client::new(), &server.base_url(), "/auth/refresh").unwrap();

        let err = refresher.refresh(&RefreshToken::new("R1")).await.unwrap_err();

        assert!(matches!(err, AuthError::Unauthorized { status } if status == StatusCode::UNAUTHORIZED));
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn partial_pair_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/refresh");
                then.status(200).json_body(json!({"access": "A2"}));
            })
            .await;
        let refresher = SessionRefresher::new(Client::new(), &server.base_url(), "/auth/refresh").unwrap();

        let err = refresher.refresh(&RefreshToken::new("R1")).await.unwrap_err();

        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }
}
