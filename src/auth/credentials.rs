//! Stored session credentials and the token payloads exchanged with the auth endpoints.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Credentials held by a [`CredentialStore`](crate::store::CredentialStore).
///
/// Created at login, replaced at refresh, cleared at logout.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Credentials {
	/// Bearer token attached to API calls.
	pub access_token: Option<TokenSecret>,
	/// Token exchanged for a new pair when the access token is rejected.
	pub refresh_token: Option<TokenSecret>,
	/// Roles reported by the login response.
	pub roles: Vec<String>,
}
impl Credentials {
	/// Returns `true` when neither token is present.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("roles", &self.roles)
			.finish()
	}
}

/// Token pair issued by the login and refresh endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
	/// New bearer token.
	pub access_token: TokenSecret,
	/// New (rotated) refresh token.
	pub refresh_token: TokenSecret,
	/// Access-token lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Refresh-token lifetime in seconds.
	#[serde(default)]
	pub refresh_expires_in: Option<i64>,
}
impl TokenGrant {
	/// Computes the access-token expiry relative to `issued_at`, when the server reported one.
	pub fn access_expires_at(&self, issued_at: OffsetDateTime) -> Option<OffsetDateTime> {
		self.expires_in.and_then(|secs| expiry(issued_at, secs))
	}

	/// Computes the refresh-token expiry relative to `issued_at`, when the server reported one.
	pub fn refresh_expires_at(&self, issued_at: OffsetDateTime) -> Option<OffsetDateTime> {
		self.refresh_expires_in.and_then(|secs| expiry(issued_at, secs))
	}
}

/// Body sent to the refresh and logout endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody<'a> {
	/// Refresh token being exchanged or revoked.
	pub refresh_token: &'a str,
}

/// Response of the login endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
	/// Issued token pair.
	pub jwt_response: TokenGrant,
	/// Roles granted to the user.
	#[serde(default, rename = "role")]
	pub roles: Vec<String>,
}

fn expiry(issued_at: OffsetDateTime, secs: i64) -> Option<OffsetDateTime> {
	if secs <= 0 {
		return None;
	}

	issued_at.checked_add(Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn login_response_reads_nested_grant_and_roles() {
		let body = r#"{
			"jwtResponse": {
				"accessToken": "access-1",
				"refreshToken": "refresh-1",
				"expiresIn": 900,
				"refreshExpiresIn": 86400
			},
			"role": ["ROLE_USER"]
		}"#;
		let response: LoginResponse =
			serde_json::from_str(body).expect("Login response fixture should decode.");

		assert_eq!(response.jwt_response.access_token.expose(), "access-1");
		assert_eq!(response.jwt_response.refresh_token.expose(), "refresh-1");
		assert_eq!(response.roles, vec!["ROLE_USER".to_string()]);

		let issued = macros::datetime!(2025-03-01 10:00 UTC);

		assert_eq!(
			response.jwt_response.access_expires_at(issued),
			Some(macros::datetime!(2025-03-01 10:15 UTC))
		);
		assert_eq!(
			response.jwt_response.refresh_expires_at(issued),
			Some(macros::datetime!(2025-03-02 10:00 UTC))
		);
	}

	#[test]
	fn non_positive_lifetimes_have_no_expiry() {
		let grant = TokenGrant {
			access_token: TokenSecret::new("a"),
			refresh_token: TokenSecret::new("r"),
			expires_in: Some(0),
			refresh_expires_in: None,
		};

		assert_eq!(grant.access_expires_at(OffsetDateTime::now_utc()), None);
		assert_eq!(grant.refresh_expires_at(OffsetDateTime::now_utc()), None);
	}

	#[test]
	fn credentials_debug_redacts_tokens() {
		let credentials = Credentials {
			access_token: Some(TokenSecret::new("access-secret")),
			refresh_token: None,
			roles: vec!["ROLE_ADMIN".into()],
		};
		let rendered = format!("{credentials:?}");

		assert!(!rendered.contains("access-secret"));
		assert!(rendered.contains("ROLE_ADMIN"));
		assert!(!credentials.is_empty());
		assert!(Credentials::default().is_empty());
	}
}
