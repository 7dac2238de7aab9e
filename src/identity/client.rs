//! Identity Providers
//!
//! Defines the provider trait and the reqwest-backed IdAM client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::types::{AccessToken, AuthError, IssuedToken, TokenRequest, TokenResponse, UserDetails};
use crate::config::IdentityConfig;

const DETAILS_PATH: &str = "/details";
const TOKEN_PATH: &str = "/o/token";

/// Identity provider trait
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange a grant for a token set
    async fn exchange_token(&self, request: &TokenRequest) -> Result<IssuedToken, AuthError>;

    /// Fetch the details of the user owning `token`
    async fn user_details(&self, token: &AccessToken) -> Result<UserDetails, AuthError>;

    /// Exchange an authorization code for a token set
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<IssuedToken, AuthError> {
        let request = TokenRequest::authorization_code(code, redirect_uri, client_id, client_secret);
        self.exchange_token(&request).await
    }
}

/// OAuth error body some providers attach to rejected grants
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// IdAM HTTP client
pub struct IdamClient {
    base_url: String,
    client: reqwest::Client,
}

impl IdamClient {
    pub fn new(config: &IdentityConfig) -> Result<Self, AuthError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::Unavailable(format!("{} timed out", operation))
    } else {
        AuthError::Unavailable(format!("{} failed: {}", operation, err))
    }
}

#[async_trait]
impl IdentityProvider for IdamClient {
    async fn exchange_token(&self, request: &TokenRequest) -> Result<IssuedToken, AuthError> {
        tracing::debug!(
            grant_type = request.grant_type(),
            client_id = request.client_id(),
            "Requesting token from identity provider"
        );

        let response = self
            .client
            .post(self.url(TOKEN_PATH))
            .form(&request.form_fields())
            .send()
            .await
            .map_err(|e| transport_error("Token exchange", e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let reason = response
                .json::<OAuthErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error_description.or(body.error))
                .unwrap_or_else(|| "no reason given".to_string());
            tracing::warn!(
                status = status.as_u16(),
                grant_type = request.grant_type(),
                "Identity provider rejected token exchange: {}",
                reason
            );
            return Err(AuthError::InvalidGrant {
                status: status.as_u16(),
                reason,
            });
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            AuthError::MalformedResponse(format!("token response is not valid JSON: {}", e))
        })?;

        IssuedToken::new(body, Utc::now())
    }

    async fn user_details(&self, token: &AccessToken) -> Result<UserDetails, AuthError> {
        let response = self
            .client
            .get(self.url(DETAILS_PATH))
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .send()
            .await
            .map_err(|e| transport_error("User details lookup", e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "Identity provider rejected access token");
            return Err(AuthError::Unauthorized(status.as_u16()));
        }

        let user: UserDetails = response.json().await.map_err(|e| {
            AuthError::MalformedResponse(format!("user details are not valid JSON: {}", e))
        })?;

        user.validate()
    }
}

/// Mock provider for testing
#[cfg(test)]
pub struct MockIdentityProvider {
    pub user: Result<UserDetails, fn() -> AuthError>,
    pub token: Option<TokenResponse>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockIdentityProvider {
    pub fn with_user(user: UserDetails) -> Self {
        Self {
            user: Ok(user),
            token: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(err: fn() -> AuthError) -> Self {
        Self {
            user: Err(err),
            token: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn exchange_token(&self, request: &TokenRequest) -> Result<IssuedToken, AuthError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match (&self.token, request) {
            (Some(token), TokenRequest::AuthorizationCode { code, .. }) if code == "some-code" => {
                IssuedToken::new(token.clone(), Utc::now())
            }
            (Some(token), TokenRequest::Password { .. }) => IssuedToken::new(token.clone(), Utc::now()),
            _ => Err(AuthError::InvalidGrant {
                status: 400,
                reason: "invalid_grant".to_string(),
            }),
        }
    }

    async fn user_details(&self, _token: &AccessToken) -> Result<UserDetails, AuthError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.user {
            Ok(user) => Ok(user.clone()),
            Err(make_err) => Err(make_err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> IdentityConfig {
        IdentityConfig {
            base_url: base_url.to_string(),
            client_id: "ia".to_string(),
            client_secret: "some-client-secret".to_string(),
            redirect_uri: "/oauth2redirect".to_string(),
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = IdamClient::new(&config("http://idam.local/")).unwrap();
        assert_eq!(client.url(DETAILS_PATH), "http://idam.local/details");
        assert_eq!(client.url(TOKEN_PATH), "http://idam.local/o/token");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_unavailable() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let client = IdamClient::new(&config("http://127.0.0.1:9")).unwrap();
        let token = AccessToken::parse("111").unwrap();

        let result = client.user_details(&token).await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }
}
