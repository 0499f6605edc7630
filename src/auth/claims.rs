//! Unverified JWT payload decoding used to describe the signed-in user.
//!
//! Signatures are not checked here: the backend is the authority on token validity, and the
//! claims only feed display data (email, name, expiry).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Errors produced while decoding a JWT payload.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimsError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("Token is not a JWT.")]
	Malformed,
	/// The payload segment is not valid base64url.
	#[error("Token payload is not valid base64url.")]
	Encoding,
	/// The payload is not a JSON claims object.
	#[error("Token payload is not a JSON claims object: {message}.")]
	Payload {
		/// Parser diagnostic.
		message: String,
	},
}

/// Subset of JWT claims issued by the tracker backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtClaims {
	/// Subject; the backend puts the user's email here.
	pub sub: Option<String>,
	/// Full display name.
	pub full_name: Option<String>,
	/// Alternate display name claim.
	pub name: Option<String>,
	/// Expiry as seconds since the Unix epoch.
	pub exp: Option<i64>,
}
impl JwtClaims {
	/// Decodes the payload segment of `token` without verifying its signature.
	pub fn decode(token: &TokenSecret) -> Result<Self, ClaimsError> {
		let mut segments = token.expose().split('.');
		let payload = match (segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
			_ => return Err(ClaimsError::Malformed),
		};
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.map_err(|_| ClaimsError::Encoding)?;

		serde_json::from_slice(&bytes)
			.map_err(|e| ClaimsError::Payload { message: e.to_string() })
	}

	/// Returns the expiry instant, if the token carries a valid `exp` claim.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.exp.and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
	}
}

/// Signed-in user as presented to the rest of the application.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
	/// Email taken from the `sub` claim; empty when the token cannot be decoded.
	pub email: String,
	/// Display name: `fullName`, then `name`, then the local part of the email.
	pub name: String,
	/// Roles recorded alongside the tokens.
	pub roles: Vec<String>,
	/// Access-token expiry, when known.
	pub expires_at: Option<OffsetDateTime>,
}
impl UserIdentity {
	/// Builds the identity for `token`, falling back to empty fields for undecodable tokens.
	pub fn from_token(token: &TokenSecret, roles: Vec<String>) -> Self {
		let claims = JwtClaims::decode(token).unwrap_or_default();
		let email = claims.sub.clone().unwrap_or_default();
		let name = claims
			.full_name
			.clone()
			.filter(|name| !name.trim().is_empty())
			.or_else(|| claims.name.clone().filter(|name| !name.trim().is_empty()))
			.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());

		Self { email, name, roles, expires_at: claims.expires_at() }
	}

	/// Returns `true` when the user holds `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|candidate| candidate == role)
	}
}
