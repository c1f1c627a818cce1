//! Identification of the requesting user.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in the `X-User-Id` header.

mod extractor;

pub use extractor::CurrentUser;
