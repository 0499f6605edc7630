//! Session credentials, redacted secrets, token grants, and identity claims.

pub mod claims;
pub mod credentials;
pub mod secret;

pub use claims::*;
pub use credentials::*;
pub use secret::*;
