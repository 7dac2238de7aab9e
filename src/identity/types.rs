//! Identity types
//!
//! Wire and domain types for the IdAM `/details` and `/o/token` endpoints.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identity provider error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or malformed bearer token: {0}")]
    MissingToken(String),

    #[error("Access token rejected by identity provider (status {0})")]
    Unauthorized(u16),

    #[error("User lacks required role '{0}'")]
    Forbidden(String),

    #[error("Token exchange rejected by identity provider (status {status}): {reason}")]
    InvalidGrant { status: u16, reason: String },

    #[error("Malformed identity provider response: {0}")]
    MalformedResponse(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

impl AuthError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::MissingToken(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidGrant { .. } => StatusCode::BAD_REQUEST,
            Self::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Access token as presented by a caller
///
/// Keeps the original `Authorization` header value so it can be forwarded
/// to the provider unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    header: String,
    token_start: usize,
}

impl AccessToken {
    /// Parse an `Authorization` header value (`Bearer <token>` or a bare token)
    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(AuthError::MissingToken("empty Authorization header".to_string()));
        }

        let token_start = match header.split_once(char::is_whitespace) {
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("bearer") => {
                header.len() - header[scheme.len()..].trim_start().len()
            }
            Some((scheme, _)) => {
                return Err(AuthError::MissingToken(format!(
                    "unsupported authorization scheme '{}'",
                    scheme
                )))
            }
            None if header.eq_ignore_ascii_case("bearer") => {
                return Err(AuthError::MissingToken("token is empty".to_string()))
            }
            None => 0,
        };

        let token = &header[token_start..];
        if token.is_empty() {
            return Err(AuthError::MissingToken("token is empty".to_string()));
        }
        if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AuthError::MissingToken(
                "token contains whitespace or control characters".to_string(),
            ));
        }

        Ok(Self {
            header: header.to_string(),
            token_start,
        })
    }

    /// Bare token without any scheme prefix
    pub fn token(&self) -> &str {
        &self.header[self.token_start..]
    }

    /// Header value to forward to the identity provider
    pub fn header_value(&self) -> &str {
        &self.header
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("len", &self.token().len())
            .finish()
    }
}

/// Details of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub forename: String,
    pub surname: String,
    #[serde(deserialize_with = "deserialize_roles")]
    pub roles: Vec<String>,
}

impl UserDetails {
    /// Reject records that break the provider contract
    pub fn validate(self) -> Result<Self, AuthError> {
        for (field, value) in [
            ("id", &self.id),
            ("forename", &self.forename),
            ("surname", &self.surname),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::MalformedResponse(format!(
                    "user details field '{}' is blank",
                    field
                )));
            }
        }
        if self.roles.is_empty() {
            return Err(AuthError::MalformedResponse(
                "user details carry no roles".to_string(),
            ));
        }
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(AuthError::MalformedResponse(
                "user details carry a blank role".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// IdAM sends `roles` as a string holding a JSON array; plain arrays are
/// accepted too.
fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Roles {
        List(Vec<String>),
        Encoded(String),
    }

    match Roles::deserialize(deserializer)? {
        Roles::List(roles) => Ok(roles),
        Roles::Encoded(raw) => serde_json::from_str(&raw).map_err(|e| {
            serde::de::Error::custom(format!("roles is not a JSON-encoded array: {}", e))
        }),
    }
}

/// Token endpoint response
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub id_token: String,
    pub token_type: String,
    #[serde(deserialize_with = "deserialize_expires_in")]
    pub expires_in: String,
}

impl TokenResponse {
    /// Reject responses with blank fields, a non-bearer type or a
    /// non-numeric lifetime
    pub fn validate(self) -> Result<Self, AuthError> {
        for (field, value) in [
            ("access_token", &self.access_token),
            ("refresh_token", &self.refresh_token),
            ("scope", &self.scope),
            ("id_token", &self.id_token),
            ("token_type", &self.token_type),
            ("expires_in", &self.expires_in),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::MalformedResponse(format!(
                    "token response field '{}' is blank",
                    field
                )));
            }
        }
        if self.token_type != "Bearer" {
            return Err(AuthError::MalformedResponse(format!(
                "unexpected token_type '{}'",
                self.token_type
            )));
        }
        self.expires_in_secs()?;
        Ok(self)
    }

    pub fn expires_in_secs(&self) -> Result<i64, AuthError> {
        self.expires_in
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs >= 0)
            .ok_or_else(|| {
                AuthError::MalformedResponse(format!(
                    "expires_in '{}' is not a non-negative integer",
                    self.expires_in
                ))
            })
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// `expires_in` arrives as a string in the contract, as a number from some
/// providers
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ExpiresIn {
        Number(i64),
        Text(String),
    }

    Ok(match ExpiresIn::deserialize(deserializer)? {
        ExpiresIn::Number(n) => n.to_string(),
        ExpiresIn::Text(s) => s,
    })
}

/// A token response together with the instant it was received
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub response: TokenResponse,
    pub issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Validate `response` and fix its expiry relative to `issued_at`
    ///
    /// A lifetime that overflows the calendar is a contract violation.
    pub fn new(response: TokenResponse, issued_at: DateTime<Utc>) -> Result<Self, AuthError> {
        let response = response.validate()?;
        let secs = response.expires_in_secs()?;
        let expires_at = Duration::try_seconds(secs)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::MalformedResponse(format!("expires_in '{}' is out of range", secs))
            })?;

        Ok(Self {
            response,
            issued_at,
            expires_at,
        })
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// The access token, as long as it is still inside its lifetime
    pub fn access_token(&self, now: DateTime<Utc>) -> Option<AccessToken> {
        if self.is_expired(now) {
            return None;
        }
        AccessToken::parse(&self.response.access_token).ok()
    }
}

/// Grant sent to the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum TokenRequest {
    AuthorizationCode {
        code: String,
        redirect_uri: String,
        client_id: String,
        client_secret: String,
    },
    Password {
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        scope: String,
        username: String,
        password: String,
    },
}

impl TokenRequest {
    pub fn authorization_code(
        code: &str,
        redirect_uri: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self::AuthorizationCode {
            code: code.to_string(),
            redirect_uri: redirect_uri.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    pub fn password(
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        scope: &str,
        username: &str,
        password: &str,
    ) -> Self {
        Self::Password {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::Password { .. } => "password",
        }
    }

    pub fn client_id(&self) -> &str {
        match self {
            Self::AuthorizationCode { client_id, .. } | Self::Password { client_id, .. } => {
                client_id
            }
        }
    }

    /// Form fields in the order the provider contract lists them
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::AuthorizationCode {
                code,
                redirect_uri,
                client_id,
                client_secret,
            } => vec![
                ("code", code.as_str()),
                ("grant_type", self.grant_type()),
                ("redirect_uri", redirect_uri.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ],
            Self::Password {
                client_id,
                client_secret,
                redirect_uri,
                scope,
                username,
                password,
            } => vec![
                ("grant_type", self.grant_type()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
        }
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type())
            .field("client_id", &self.client_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_response() -> TokenResponse {
        TokenResponse {
            access_token: "some-long-value".to_string(),
            refresh_token: "another-long-value".to_string(),
            scope: "openid roles profile".to_string(),
            id_token: "saome-value".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: "12345".to_string(),
        }
    }

    #[test]
    fn test_parse_bare_token() {
        let token = AccessToken::parse("111").unwrap();
        assert_eq!(token.token(), "111");
        assert_eq!(token.header_value(), "111");
    }

    #[test]
    fn test_parse_bearer_token_keeps_header() {
        let token = AccessToken::parse("Bearer  abc.def").unwrap();
        assert_eq!(token.token(), "abc.def");
        assert_eq!(token.header_value(), "Bearer  abc.def");

        let token = AccessToken::parse("bearer xyz").unwrap();
        assert_eq!(token.token(), "xyz");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(matches!(AccessToken::parse(""), Err(AuthError::MissingToken(_))));
        assert!(matches!(AccessToken::parse("   "), Err(AuthError::MissingToken(_))));
        assert!(matches!(AccessToken::parse("Bearer "), Err(AuthError::MissingToken(_))));
        assert!(matches!(
            AccessToken::parse("Basic dXNlcjpwYXNz"),
            Err(AuthError::MissingToken(_))
        ));
        assert!(matches!(
            AccessToken::parse("Bearer a b"),
            Err(AuthError::MissingToken(_))
        ));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::parse("Bearer secret-value").unwrap();
        assert!(!format!("{:?}", token).contains("secret-value"));
    }

    #[test]
    fn test_user_details_roles_as_encoded_string() {
        let json = r#"{
            "id": "123",
            "email": "ia-caseofficer@fake.hmcts.net",
            "forename": "Case",
            "surname": "Officer",
            "roles": "[\"caseofficer-ia\"]"
        }"#;
        let user: UserDetails = serde_json::from_str(json).unwrap();
        assert_eq!(user.roles, vec!["caseofficer-ia".to_string()]);
        assert_eq!(user.email.as_deref(), Some("ia-caseofficer@fake.hmcts.net"));
        assert!(user.has_role("caseofficer-ia"));
    }

    #[test]
    fn test_user_details_roles_as_array() {
        let json = r#"{"id":"1","forename":"A","surname":"B","roles":["x","y"]}"#;
        let user: UserDetails = serde_json::from_str(json).unwrap();
        assert_eq!(user.roles.len(), 2);
        assert!(user.email.is_none());
    }

    #[test]
    fn test_user_details_roles_garbage_string_fails() {
        let json = r#"{"id":"1","forename":"A","surname":"B","roles":"caseofficer"}"#;
        assert!(serde_json::from_str::<UserDetails>(json).is_err());
    }

    #[test]
    fn test_user_details_validation() {
        let user = UserDetails {
            id: "123".to_string(),
            email: None,
            forename: "Case".to_string(),
            surname: "Officer".to_string(),
            roles: vec!["caseofficer-ia".to_string()],
        };
        assert!(user.clone().validate().is_ok());

        let no_roles = UserDetails { roles: vec![], ..user.clone() };
        assert!(matches!(no_roles.validate(), Err(AuthError::MalformedResponse(_))));

        let blank_role = UserDetails { roles: vec![" ".to_string()], ..user.clone() };
        assert!(matches!(blank_role.validate(), Err(AuthError::MalformedResponse(_))));

        let blank_name = UserDetails { surname: "".to_string(), ..user };
        assert!(matches!(blank_name.validate(), Err(AuthError::MalformedResponse(_))));
    }

    #[test]
    fn test_token_response_validation() {
        assert!(token_response().validate().is_ok());

        let blank = TokenResponse { id_token: " ".to_string(), ..token_response() };
        assert!(matches!(blank.validate(), Err(AuthError::MalformedResponse(_))));

        let mac = TokenResponse { token_type: "mac".to_string(), ..token_response() };
        assert!(matches!(mac.validate(), Err(AuthError::MalformedResponse(_))));

        let forever = TokenResponse { expires_in: "soon".to_string(), ..token_response() };
        assert!(matches!(forever.validate(), Err(AuthError::MalformedResponse(_))));
    }

    #[test]
    fn test_expires_in_accepts_number() {
        let json = r#"{"access_token":"a","refresh_token":"r","scope":"s","id_token":"i","token_type":"Bearer","expires_in":3600}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.expires_in, "3600");
    }

    #[test]
    fn test_token_response_debug_is_redacted() {
        let rendered = format!("{:?}", token_response());
        assert!(!rendered.contains("some-long-value"));
        assert!(!rendered.contains("another-long-value"));
        assert!(rendered.contains("openid roles profile"));
    }

    #[test]
    fn test_issued_token_expiry() {
        let issued_at = Utc::now();
        let issued = IssuedToken::new(token_response(), issued_at).unwrap();

        assert_eq!(issued.expires_at(), issued_at + Duration::seconds(12345));
        assert!(!issued.is_expired(issued_at));
        assert!(issued.access_token(issued_at + Duration::seconds(12344)).is_some());
        assert!(issued.is_expired(issued_at + Duration::seconds(12345)));
        assert!(issued.access_token(issued_at + Duration::seconds(12345)).is_none());
    }

    #[test]
    fn test_issued_token_rejects_unrepresentable_lifetime() {
        for expires_in in ["9223372036854775807", "100000000000000"] {
            let response = TokenResponse {
                expires_in: expires_in.to_string(),
                ..token_response()
            };
            let result = IssuedToken::new(response, Utc::now());
            assert!(
                matches!(result, Err(AuthError::MalformedResponse(_))),
                "expires_in {} gave {:?}",
                expires_in,
                result
            );
        }

        // Long but representable lifetimes are still accepted
        let decade = TokenResponse {
            expires_in: (10 * 365 * 24 * 3600).to_string(),
            ..token_response()
        };
        let issued = IssuedToken::new(decade, Utc::now()).unwrap();
        assert!(issued.access_token(Utc::now()).is_some());
    }

    #[test]
    fn test_form_fields_authorization_code() {
        let request = TokenRequest::authorization_code(
            "some-code",
            "/oauth2redirect",
            "ia",
            "some-client-secret",
        );
        assert_eq!(
            request.form_fields(),
            vec![
                ("code", "some-code"),
                ("grant_type", "authorization_code"),
                ("redirect_uri", "/oauth2redirect"),
                ("client_id", "ia"),
                ("client_secret", "some-client-secret"),
            ]
        );
    }

    #[test]
    fn test_form_fields_password() {
        let request = TokenRequest::password(
            "stitching-api",
            "some-secret",
            "/oauth2redirect",
            "openid roles profile",
            "stitchingusername",
            "stitchingpwd",
        );
        let fields = request.form_fields();
        assert_eq!(fields[0], ("grant_type", "password"));
        assert_eq!(fields.len(), 7);
        assert!(!format!("{:?}", request).contains("stitchingpwd"));
    }
}
