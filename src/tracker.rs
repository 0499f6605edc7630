//! Typed clients for the tracker's projects, issues, and sprints.
//!
//! Every call goes through [`Gateway::request`], so it carries the bearer token and survives a
//! token expiry transparently. Non-success statuses become [`Error::Api`] with the message the
//! backend supplied (see [`ApiResponse::failure_message`]). Inbound payloads are normalized once
//! at the boundary: issues may reference their sprint by id or by nested object, and sprints may
//! be keyed `id` or `sprintId`.

pub mod issues;
pub mod projects;
pub mod sprints;

pub use issues::*;
pub use projects::*;
pub use sprints::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest, ApiResponse},
};

/// Tracker identifiers are numeric on the wire.
pub type Id = i64;

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	async fn call(&self, request: ApiRequest, fallback: &str) -> Result<ApiResponse> {
		self.request(request).await?.error_for_status(fallback)
	}

	async fn call_json<T>(&self, request: ApiRequest, fallback: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.call(request, fallback).await?.json()
	}
}

/// Trims `value` and drops it when nothing is left.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn non_blank_trims_and_drops_empty_values() {
		assert_eq!(non_blank(Some("  dev@example.com ")), Some("dev@example.com".into()));
		assert_eq!(non_blank(Some("   ")), None);
		assert_eq!(non_blank(None), None);
	}
}
