//! User-facing failure messages extracted from non-success API responses.

// crates.io
use ::http::StatusCode;
// self
use crate::{_prelude::*, http::ApiResponse};

const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action";
const FORBIDDEN_HINTS: [&str; 3] = ["permission", "access", "forbidden"];

/// Error payload shape shared by the tracker API's failure responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
	/// Human-readable message.
	pub message: Option<String>,
	/// Short error code or reason phrase.
	pub error: Option<String>,
	/// Per-field validation failures.
	pub errors: Option<BTreeMap<String, String>>,
}
impl ApiErrorBody {
	fn summary(self) -> Option<String> {
		if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
			let details = errors
				.iter()
				.map(|(field, message)| format!("{field}: {message}"))
				.collect::<Vec<_>>()
				.join(", ");

			return Some(format!("Validation failed: {details}"));
		}

		self.message.filter(|m| !m.is_empty()).or(self.error.filter(|e| !e.is_empty()))
	}
}

impl ApiResponse {
	/// Derives the message a caller should show for this (non-success) response.
	///
	/// A 403 always yields a permission message, preferring the server's own wording when it
	/// talks about permissions. Other statuses use the JSON `errors`, `message`, or `error`
	/// fields, then `fallback`; bodies that are not JSON are returned verbatim, and an empty body
	/// becomes `HTTP <status>`.
	pub fn failure_message(&self, fallback: &str) -> String {
		let parsed = serde_json::from_slice::<ApiErrorBody>(&self.body).ok();

		if self.status == StatusCode::FORBIDDEN {
			return parsed
				.and_then(|body| body.message)
				.filter(|message| {
					let lowered = message.to_lowercase();

					FORBIDDEN_HINTS.iter().any(|hint| lowered.contains(hint))
				})
				.unwrap_or_else(|| FORBIDDEN_MESSAGE.into());
		}

		match parsed {
			Some(body) => body.summary().unwrap_or_else(|| fallback.into()),
			None => {
				let text = self.text();
				let text = text.trim();

				if text.is_empty() { format!("HTTP {}", self.status.as_u16()) } else { text.into() }
			},
		}
	}
}
