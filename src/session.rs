//! Session lifecycle: login, registration, logout, and the signed-in identity.
//!
//! Login and registration talk to public endpoints directly (no bearer, no refresh); logout is
//! best-effort on the server and always clears the local session.

// self
use crate::{
	_prelude::*,
	auth::{LoginResponse, RefreshTokenBody, UserIdentity},
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const EMAIL_HINT: char = '@';
const PASSWORD_CHARS: (usize, usize) = (6, 100);
const FULL_NAME_CHARS: (usize, usize) = (5, 100);

/// Client-side input validation failures; raised before any network traffic.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// The email address is empty or lacks an `@`.
	#[error("Enter a valid email address.")]
	InvalidEmail,
	/// The password length is outside the accepted range.
	#[error("Password must be between {min} and {max} characters.")]
	PasswordLength {
		/// Minimum length in characters.
		min: usize,
		/// Maximum length in characters.
		max: usize,
	},
	/// The full name length is outside the accepted range.
	#[error("Full name must be between {min} and {max} characters.")]
	FullNameLength {
		/// Minimum length in characters.
		min: usize,
		/// Maximum length in characters.
		max: usize,
	},
	/// A required field is empty.
	#[error("The `{field}` field is required.")]
	MissingField {
		/// Wire name of the field.
		field: &'static str,
	},
}

/// Credentials submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Account details submitted to the registration endpoint.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
	/// Display name.
	pub full_name: String,
}
impl RegisterRequest {
	/// Creates a registration request.
	pub fn new(
		email: impl Into<String>,
		password: impl Into<String>,
		full_name: impl Into<String>,
	) -> Self {
		Self { email: email.into(), password: password.into(), full_name: full_name.into() }
	}

	/// Checks the request against the backend's constraints.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if !self.email.contains(EMAIL_HINT) {
			return Err(ValidationError::InvalidEmail);
		}

		check_length(&self.password, PASSWORD_CHARS)
			.map_err(|(min, max)| ValidationError::PasswordLength { min, max })?;
		check_length(&self.full_name, FULL_NAME_CHARS)
			.map_err(|(min, max)| ValidationError::FullNameLength { min, max })
	}

	fn login(&self) -> LoginRequest {
		LoginRequest { email: self.email.clone(), password: self.password.clone() }
	}
}
impl Debug for RegisterRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RegisterRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.field("full_name", &self.full_name)
			.finish()
	}
}

/// Acknowledgement returned by the registration endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RegisterResponse {
	/// Server message, or a generic confirmation when the server sent none.
	pub message: String,
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Exchanges email + password for a session and stores it.
	pub async fn login(
		&self,
		email: impl Into<String>,
		password: impl Into<String>,
	) -> Result<UserIdentity> {
		let request = LoginRequest { email: email.into(), password: password.into() };

		self.login_with(&request).await
	}

	/// Registers a new account. The request is validated locally first.
	pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
		const KIND: FlowKind = FlowKind::Register;

		let span = FlowSpan::new(KIND, "register");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				request.validate()?;

				let response = self
					.send(ApiRequest::post(self.descriptor.auth.register.clone()).json(request)?)
					.await?
					.error_for_status("Registration failed")?;

				if response.is_json() {
					#[derive(Deserialize)]
					struct Ack {
						message: Option<String>,
					}

					let ack = response.json::<Ack>()?;

					if let Some(message) = ack.message.filter(|m| !m.is_empty()) {
						return Ok(RegisterResponse { message });
					}
				}

				Ok(RegisterResponse { message: "Registration successful".into() })
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Registers a new account and immediately logs into it.
	pub async fn register_and_login(&self, request: &RegisterRequest) -> Result<UserIdentity> {
		self.register(request).await?;
		self.login_with(&request.login()).await
	}

	/// Ends the session.
	///
	/// The refresh token is revoked on the server when one is stored; that call may fail (it is
	/// only logged), but the local tokens are always cleared and any in-flight refresh episode
	/// is cancelled.
	pub async fn logout(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Err(_e) = self.revoke_refresh_token().await {
					crate::trace_event!(
						warn,
						error = %_e,
						"Logout request failed, clearing the local session anyway."
					);
				}

				self.reset().await;
				self.store.clear_tokens().await?;

				Ok(())
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Describes the signed-in user from the stored access token, if any.
	pub async fn current_identity(&self) -> Result<Option<UserIdentity>> {
		let credentials = self.store.credentials().await?;

		Ok(credentials
			.access_token
			.filter(|token| !token.is_blank())
			.map(|token| UserIdentity::from_token(&token, credentials.roles)))
	}

	async fn login_with(&self, request: &LoginRequest) -> Result<UserIdentity> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let response = self
					.send(ApiRequest::post(self.descriptor.auth.login.clone()).json(request)?)
					.await?
					.error_for_status("Login failed")?;
				let LoginResponse { jwt_response: grant, roles } = response.json()?;
				let identity = UserIdentity::from_token(&grant.access_token, roles.clone());

				self.store.set_tokens(grant.access_token, grant.refresh_token, roles).await?;

				crate::trace_event!(info, email = identity.email.as_str(), "User logged in.");

				Ok(identity)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	async fn revoke_refresh_token(&self) -> Result<()> {
		let Some(token) = self.store.refresh_token().await?.filter(|token| !token.is_blank())
		else {
			return Ok(());
		};
		let request = ApiRequest::post(self.descriptor.auth.logout.clone())
			.json(&RefreshTokenBody { refresh_token: token.expose() })?;

		self.send(request).await?.error_for_status("Logout failed")?;

		Ok(())
	}
}

fn check_length(value: &str, (min, max): (usize, usize)) -> Result<(), (usize, usize)> {
	let len = value.chars().count();

	if (min..=max).contains(&len) { Ok(()) } else { Err((min, max)) }
}
