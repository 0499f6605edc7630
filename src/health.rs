//! Reachability probes for the tracker backend.
//!
//! Both probes bypass the credential store entirely, so they can run before login and never
//! start a refresh episode.

// self
use crate::{
	_prelude::*,
	gateway::Gateway,
	http::{ApiHttpClient, ApiRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Result of [`Gateway::check_connection`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
	/// Whether the API answered in a way that proves it is serving requests.
	pub available: bool,
	/// Why the API is considered unavailable.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl Connectivity {
	fn up() -> Self {
		Self { available: true, error: None }
	}

	fn down(error: impl Into<String>) -> Self {
		Self { available: false, error: Some(error.into()) }
	}
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Returns `true` when the liveness endpoint answers with a 2xx status.
	pub async fn check_health(&self) -> bool {
		let span = FlowSpan::new(FlowKind::Health, "check_health");
		let healthy = span
			.instrument(async {
				match self.send(ApiRequest::get(self.descriptor.health.clone())).await {
					Ok(response) => response.is_success(),
					Err(_e) => {
						crate::trace_event!(warn, error = %_e, "Health check failed.");

						false
					},
				}
			})
			.await;

		obs::record_flow_outcome(
			FlowKind::Health,
			if healthy { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		healthy
	}

	/// Probes the project listing without credentials.
	///
	/// A 401 proves the API is up and merely wants a token, so it counts as available just like
	/// a 2xx. Any other status, or a transport failure, is reported in
	/// [`Connectivity::error`].
	pub async fn check_connection(&self) -> Connectivity {
		let span = FlowSpan::new(FlowKind::Health, "check_connection");
		let connectivity = span
			.instrument(async {
				match self.send(ApiRequest::get(self.descriptor.projects())).await {
					Ok(response) if response.is_success() || response.is_unauthorized() =>
						Connectivity::up(),
					Ok(response) =>
						Connectivity::down(format!("HTTP {}", response.status.as_u16())),
					Err(e) => Connectivity::down(e.to_string()),
				}
			})
			.await;

		obs::record_flow_outcome(
			FlowKind::Health,
			if connectivity.available { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		connectivity
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unavailable_connectivity_serializes_its_error() {
		assert_eq!(
			serde_json::to_value(Connectivity::down("HTTP 503")).expect("Should serialize."),
			serde_json::json!({ "available": false, "error": "HTTP 503" })
		);
		assert_eq!(
			serde_json::to_value(Connectivity::up()).expect("Should serialize."),
			serde_json::json!({ "available": true })
		);
	}
}
