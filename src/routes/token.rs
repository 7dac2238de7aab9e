//! Token exchange endpoint
//!
//! Forwards `authorization_code` and `password` grants to the identity
//! provider. Client credentials default to the configured client.

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use crate::config::IdentityConfig;
use crate::error::{AppError, Result};
use crate::identity::TokenRequest;
use crate::state::AppState;

/// Scope requested for password grants when the caller names none
const DEFAULT_SCOPE: &str = "openid roles profile";

/// Form body of `POST /o/token`
#[derive(Deserialize)]
pub struct TokenForm {
    grant_type: String,
    code: Option<String>,
    redirect_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing form field '{}'", name)))
}

impl TokenForm {
    /// Resolve the grant, filling client credentials from configuration
    fn into_request(self, client: &IdentityConfig) -> Result<TokenRequest> {
        let client_id = self
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| client.client_id.clone());

        // Only the configured client may borrow the configured secret
        let client_secret = match self.client_secret.clone().filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None if client_id == client.client_id => client.client_secret.clone(),
            None => {
                return Err(AppError::BadRequest(
                    "missing form field 'client_secret'".to_string(),
                ))
            }
        };

        let redirect_uri = self
            .redirect_uri
            .clone()
            .filter(|uri| !uri.trim().is_empty())
            .unwrap_or_else(|| client.redirect_uri.clone());

        match self.grant_type.as_str() {
            "authorization_code" => Ok(TokenRequest::authorization_code(
                required(&self.code, "code")?,
                &redirect_uri,
                &client_id,
                &client_secret,
            )),
            "password" => Ok(TokenRequest::password(
                &client_id,
                &client_secret,
                &redirect_uri,
                self.scope.as_deref().unwrap_or(DEFAULT_SCOPE),
                required(&self.username, "username")?,
                required(&self.password, "password")?,
            )),
            other => Err(AppError::BadRequest(format!(
                "unsupported grant_type '{}'",
                other
            ))),
        }
    }
}

/// Exchange a grant for tokens
pub async fn exchange_token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Response> {
    let request = form.into_request(&state.config().identity)?;
    let issued = state.identity().exchange_token(&request).await?;

    tracing::info!(
        grant_type = request.grant_type(),
        client_id = request.client_id(),
        expires_at = %issued.expires_at(),
        "Issued tokens"
    );

    let mut response = Json(issued.response).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode, routing::post, Router};
    use tower::ServiceExt; // for `oneshot`

    use crate::config::Config;
    use crate::identity::{MockIdentityProvider, TokenResponse, UserDetails};
    use crate::pdf::LopdfAnnotator;

    fn client() -> IdentityConfig {
        IdentityConfig {
            base_url: "http://idam.local".to_string(),
            client_id: "ia".to_string(),
            client_secret: "some-client-secret".to_string(),
            redirect_uri: "/oauth2redirect".to_string(),
            timeout_secs: 5,
        }
    }

    fn form(grant_type: &str) -> TokenForm {
        TokenForm {
            grant_type: grant_type.to_string(),
            code: None,
            redirect_uri: None,
            client_id: None,
            client_secret: None,
            scope: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn test_code_grant_uses_configured_client() {
        let request = TokenForm {
            code: Some("some-code".to_string()),
            ..form("authorization_code")
        }
        .into_request(&client())
        .unwrap();

        assert_eq!(
            request,
            TokenRequest::authorization_code(
                "some-code",
                "/oauth2redirect",
                "ia",
                "some-client-secret"
            )
        );
    }

    #[test]
    fn test_foreign_client_must_bring_secret() {
        let result = TokenForm {
            code: Some("some-code".to_string()),
            client_id: Some("stitching-api".to_string()),
            ..form("authorization_code")
        }
        .into_request(&client());
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let request = TokenForm {
            username: Some("stitchingusername".to_string()),
            password: Some("stitchingpwd".to_string()),
            client_id: Some("stitching-api".to_string()),
            client_secret: Some("some-secret".to_string()),
            ..form("password")
        }
        .into_request(&client())
        .unwrap();
        assert_eq!(
            request,
            TokenRequest::password(
                "stitching-api",
                "some-secret",
                "/oauth2redirect",
                "openid roles profile",
                "stitchingusername",
                "stitchingpwd",
            )
        );
    }

    #[test]
    fn test_missing_fields_and_unknown_grant() {
        assert!(matches!(
            form("authorization_code").into_request(&client()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            form("password").into_request(&client()),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            form("client_credentials").into_request(&client()),
            Err(AppError::BadRequest(_))
        ));
    }

    fn token_app() -> (Router, Arc<MockIdentityProvider>) {
        token_app_expiring("12345")
    }

    fn token_app_expiring(expires_in: &str) -> (Router, Arc<MockIdentityProvider>) {
        let mut provider = MockIdentityProvider::with_user(UserDetails {
            id: "123".to_string(),
            email: None,
            forename: "Case".to_string(),
            surname: "Officer".to_string(),
            roles: vec!["caseofficer-ia".to_string()],
        });
        provider.token = Some(TokenResponse {
            access_token: "some-long-value".to_string(),
            refresh_token: "another-long-value".to_string(),
            scope: "openid roles profile".to_string(),
            id_token: "saome-value".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: expires_in.to_string(),
        });
        let provider = Arc::new(provider);

        let state = AppState::with_components(
            Config::default(),
            provider.clone(),
            Arc::new(LopdfAnnotator::default()),
        );
        let app = Router::new()
            .route("/o/token", post(exchange_token))
            .with_state(state);
        (app, provider)
    }

    fn form_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/o/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_token_endpoint_returns_provider_tokens() {
        let (app, provider) = token_app();

        let response = app
            .oneshot(form_request("grant_type=authorization_code&code=some-code"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let tokens: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(tokens["access_token"], "some-long-value");
        assert_eq!(tokens["expires_in"], "12345");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_token_endpoint_rejections() {
        let (app, provider) = token_app();
        let response = app
            .oneshot(form_request("grant_type=authorization_code&code=other-code"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.call_count(), 1);

        // Resolved locally, the provider is never asked
        let (app, provider) = token_app();
        let response = app
            .oneshot(form_request("grant_type=implicit"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_is_bad_gateway() {
        let (app, _) = token_app_expiring("9223372036854775807");

        let response = app
            .oneshot(form_request("grant_type=authorization_code&code=some-code"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
