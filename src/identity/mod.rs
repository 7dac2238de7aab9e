//! Identity Module
//!
//! Client side of the IdAM identity provider contract:
//!
//! - `POST /o/token` exchanges an authorization code (or password grant) for
//!   an access/refresh/id token set
//! - `GET /details` resolves an access token to the user's details
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdf_annotator_server::identity::{AccessToken, IdamClient, IdentityProvider};
//!
//! let client = IdamClient::new(&config.identity)?;
//!
//! let issued = client
//!     .exchange_code("some-code", "/oauth2redirect", "ia", "some-client-secret")
//!     .await?;
//!
//! let token = issued.access_token(chrono::Utc::now()).expect("fresh token");
//! let user = client.user_details(&token).await?;
//! ```

mod client;
mod types;

pub use client::{IdamClient, IdentityProvider};
pub use types::{AccessToken, AuthError, IssuedToken, TokenRequest, TokenResponse, UserDetails};

#[cfg(test)]
pub use client::MockIdentityProvider;
