// self
use crate::{
	_prelude::*,
	endpoint::{ApiDescriptor, AuthEndpoints, append_segments},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ApiDescriptorError {
	/// Endpoints must be plain HTTP(S) URLs.
	#[error("The {endpoint} endpoint must use http or https: {url}.")]
	UnsupportedScheme {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoints must accept path segments (rules out `mailto:`-style URLs).
	#[error("The {endpoint} endpoint cannot be used as a base URL: {url}.")]
	CannotBeABase {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ApiDescriptor`] values.
///
/// Every endpoint defaults to the backend's layout under the base URL; overrides are only
/// needed for deployments that move the auth routes.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	/// Base URL for every resource path.
	pub base: Url,
	/// Login endpoint override; defaults to `<base>/auth/login`.
	pub login_endpoint: Option<Url>,
	/// Registration endpoint override; defaults to `<base>/auth/register`.
	pub register_endpoint: Option<Url>,
	/// Logout endpoint override; defaults to `<base>/auth/logout`.
	pub logout_endpoint: Option<Url>,
	/// Refresh endpoint override; defaults to `<base>/auth/refresh`.
	pub refresh_endpoint: Option<Url>,
	/// Health endpoint override; defaults to `/health` beside the base path.
	pub health_endpoint: Option<Url>,
	/// Extra endpoints callable without a bearer token.
	pub extra_public: Vec<Url>,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder rooted at `base`.
	pub fn new(base: Url) -> Self {
		Self {
			base,
			login_endpoint: None,
			register_endpoint: None,
			logout_endpoint: None,
			refresh_endpoint: None,
			health_endpoint: None,
			extra_public: Vec::new(),
		}
	}

	/// Sets the login endpoint.
	pub fn login_endpoint(mut self, url: Url) -> Self {
		self.login_endpoint = Some(url);

		self
	}

	/// Sets the registration endpoint.
	pub fn register_endpoint(mut self, url: Url) -> Self {
		self.register_endpoint = Some(url);

		self
	}

	/// Sets the logout endpoint.
	pub fn logout_endpoint(mut self, url: Url) -> Self {
		self.logout_endpoint = Some(url);

		self
	}

	/// Sets the refresh endpoint.
	pub fn refresh_endpoint(mut self, url: Url) -> Self {
		self.refresh_endpoint = Some(url);

		self
	}

	/// Sets the health endpoint.
	pub fn health_endpoint(mut self, url: Url) -> Self {
		self.health_endpoint = Some(url);

		self
	}

	/// Marks an additional endpoint as callable without an access token.
	pub fn public_endpoint(mut self, url: Url) -> Self {
		self.extra_public.push(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, ApiDescriptorError> {
		validate_endpoint("base", &self.base)?;

		let base = self.base;
		let auth = AuthEndpoints {
			login: self
				.login_endpoint
				.unwrap_or_else(|| append_segments(&base, ["auth", "login"])),
			register: self
				.register_endpoint
				.unwrap_or_else(|| append_segments(&base, ["auth", "register"])),
			logout: self
				.logout_endpoint
				.unwrap_or_else(|| append_segments(&base, ["auth", "logout"])),
			refresh: self
				.refresh_endpoint
				.unwrap_or_else(|| append_segments(&base, ["auth", "refresh"])),
		};
		let health = self.health_endpoint.unwrap_or_else(|| sibling_health(&base));
		let mut public = vec![auth.login.clone(), auth.register.clone(), auth.refresh.clone()];

		public.extend(self.extra_public);

		let descriptor = ApiDescriptor { base, auth, health, public };

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ApiDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ApiDescriptorError> {
		validate_endpoint("login", &self.auth.login)?;
		validate_endpoint("register", &self.auth.register)?;
		validate_endpoint("logout", &self.auth.logout)?;
		validate_endpoint("refresh", &self.auth.refresh)?;
		validate_endpoint("health", &self.health)?;

		for url in &self.public {
			validate_endpoint("public", url)?;
		}

		Ok(())
	}
}

fn sibling_health(base: &Url) -> Url {
	let mut url = base.clone();

	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().pop().push("health");
	}

	url.set_query(None);
	url.set_fragment(None);

	url
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiDescriptorError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ApiDescriptorError::UnsupportedScheme { endpoint: name, url: url.to_string() });
	}
	if url.cannot_be_a_base() {
		return Err(ApiDescriptorError::CannotBeABase { endpoint: name, url: url.to_string() });
	}

	Ok(())
}
