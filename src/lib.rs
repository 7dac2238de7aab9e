//! PDF Annotator Server
//!
//! Applies annotation sets to PDF documents on behalf of callers verified
//! against an IdAM identity provider.

pub mod annotations;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod pdf;
pub mod routes;
pub mod state;
