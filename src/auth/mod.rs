//! Authorization guard
//!
//! Request-scoped authentication against the identity provider. Nothing is
//! cached between requests: every guarded request re-validates its token.

mod guard;

pub use guard::{authenticate, require_annotator, require_user};
