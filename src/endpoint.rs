//! API endpoint layout consumed by the gateway, the session flows, and the tracker clients.
//!
//! An [`ApiDescriptor`] is rooted at the API base URL (for example
//! `http://localhost:8080/api`) and records which endpoints may be called without a bearer
//! token. Resource URLs are always built by appending path segments so ids are percent-encoded
//! and the base path is never replaced.

/// Builder API for assembling API descriptors.
pub mod builder;

pub use builder::*;

// crates.io
use url::Position;
// self
use crate::_prelude::*;

/// Authentication endpoints exposed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEndpoints {
	/// Credential login endpoint.
	pub login: Url,
	/// Account registration endpoint.
	pub register: Url,
	/// Refresh-token revocation endpoint.
	pub logout: Url,
	/// Refresh-token exchange endpoint.
	pub refresh: Url,
}

/// Immutable API layout consumed by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL every resource path is appended to.
	pub base: Url,
	/// Authentication endpoints.
	pub auth: AuthEndpoints,
	/// Liveness endpoint, served outside the API base path.
	pub health: Url,
	/// Endpoints callable without an access token.
	pub public: Vec<Url>,
}
impl ApiDescriptor {
	/// Creates a new builder rooted at `base`.
	pub fn builder(base: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(base)
	}

	/// Returns `true` when `url` targets a bootstrap endpoint that needs no bearer token.
	///
	/// Query strings and fragments are ignored, as is a trailing slash.
	pub fn is_public(&self, url: &Url) -> bool {
		self.public.iter().any(|candidate| same_endpoint(candidate, url))
	}

	/// Builds `<base>/<segments...>`.
	pub fn url<I>(&self, segments: I) -> Url
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		append_segments(&self.base, segments)
	}

	/// `<base>/projects`.
	pub fn projects(&self) -> Url {
		self.url(["projects"])
	}

	/// `<base>/projects/{project_id}`.
	pub fn project(&self, project_id: &str) -> Url {
		self.url(["projects", project_id])
	}

	/// `<base>/projects/{project_id}/member?memberEmail={email}`.
	pub fn project_member(&self, project_id: &str, email: &str) -> Url {
		let mut url = self.url(["projects", project_id, "member"]);

		url.query_pairs_mut().append_pair("memberEmail", email);

		url
	}

	/// `<base>/projects/{project_id}/issues`.
	pub fn project_issues(&self, project_id: &str) -> Url {
		self.url(["projects", project_id, "issues"])
	}

	/// `<base>/projects/{project_id}/issues/{issue_id}`.
	pub fn issue(&self, project_id: &str, issue_id: &str) -> Url {
		self.url(["projects", project_id, "issues", issue_id])
	}

	/// `<base>/projects/{project_id}/issues/search`.
	pub fn issue_search(&self, project_id: &str) -> Url {
		self.url(["projects", project_id, "issues", "search"])
	}

	/// `<base>/projects/{project_id}/issues/sprint/{sprint_id}`.
	pub fn sprint_issues(&self, project_id: &str, sprint_id: &str) -> Url {
		self.url(["projects", project_id, "issues", "sprint", sprint_id])
	}

	/// `<base>/projects/{project_id}/issues/{issue_id}/history`.
	pub fn issue_history(&self, project_id: &str, issue_id: &str) -> Url {
		self.url(["projects", project_id, "issues", issue_id, "history"])
	}

	/// `<base>/projects/{project_id}/issues/{issue_id}/{action}`.
	pub fn issue_transition(&self, project_id: &str, issue_id: &str, action: &str) -> Url {
		self.url(["projects", project_id, "issues", issue_id, action])
	}

	/// `<base>/projects/{project_id}/sprints`.
	pub fn project_sprints(&self, project_id: &str) -> Url {
		self.url(["projects", project_id, "sprints"])
	}

	/// `<base>/projects/{project_id}/sprints/{sprint_id}`.
	pub fn sprint(&self, project_id: &str, sprint_id: &str) -> Url {
		self.url(["projects", project_id, "sprints", sprint_id])
	}
}

pub(crate) fn append_segments<I>(base: &Url, segments: I) -> Url
where
	I: IntoIterator,
	I::Item: AsRef<str>,
{
	let mut url = base.clone();

	// Descriptors reject cannot-be-a-base URLs, so the segment list is always available.
	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().extend(segments);
	}

	url
}

fn same_endpoint(a: &Url, b: &Url) -> bool {
	a[..Position::AfterPath].trim_end_matches('/') == b[..Position::AfterPath].trim_end_matches('/')
}
