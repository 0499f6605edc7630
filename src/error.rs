//! Gateway-level error types shared across transports, stores, and session flows.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential-store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request-construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout); never retried by the gateway.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The session could not be renewed; every request of the episode observes the same cause.
	#[error("Authentication failed: {0}")]
	Refresh(#[from] RefreshError),
	/// Client-side input validation rejected the call before any network traffic.
	#[error(transparent)]
	Validation(#[from] crate::session::ValidationError),

	/// No access token is stored and the endpoint requires one.
	#[error("No access token is stored; log in again before calling {url}.")]
	Unauthenticated {
		/// Target URL of the rejected call.
		url: String,
	},
	/// A replay with a freshly issued token was still rejected with 401.
	#[error("Request to {url} was rejected with 401 after the session was refreshed.")]
	PostRefreshUnauthorized {
		/// Target URL of the rejected replay.
		url: String,
	},
	/// The API answered with a non-success status.
	#[error("API responded with status {status}: {message}")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Server- or client-derived failure message.
		message: String,
	},
	/// A response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
}
impl Error {
	/// Returns `true` when the only sensible reaction is to drop the local session and log in
	/// again.
	pub fn is_session_expired(&self) -> bool {
		matches!(
			self,
			Self::Refresh(_) | Self::Unauthenticated { .. } | Self::PostRefreshUnauthorized { .. }
		)
	}
}

impl From<crate::endpoint::ApiDescriptorError> for Error {
	fn from(e: crate::endpoint::ApiDescriptorError) -> Self {
		Self::Config(e.into())
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed.
	#[error("URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains bytes that HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: String,
	},
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// Descriptor validation failed.
	#[error(transparent)]
	Descriptor(#[from] crate::endpoint::ApiDescriptorError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport gave up waiting for the API.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

/// Outcome of a failed refresh episode.
///
/// The value is shared by the initiating request and every request queued behind it, so it
/// only carries owned, cloneable context.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// No refresh token is stored; no call was made to the refresh endpoint.
	#[error("no refresh token is stored, log in again.")]
	Unavailable,
	/// The refresh endpoint answered with a non-success status.
	#[error("refresh endpoint rejected the session with status {status}: {message}")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Server-supplied failure message.
		message: String,
	},
	/// The refresh endpoint answered 2xx with a body that is not a token pair.
	#[error("refresh endpoint returned a malformed response: {message}")]
	Malformed {
		/// Parser diagnostic including the JSON path.
		message: String,
	},
	/// The refresh endpoint could not be reached.
	#[error("refresh endpoint could not be reached: {message}")]
	Transport {
		/// Transport diagnostic.
		message: String,
	},
	/// The renewed tokens could not be written to the credential store.
	#[error("renewed tokens could not be stored: {message}")]
	Storage {
		/// Store diagnostic.
		message: String,
	},
	/// The episode was cancelled by [`Gateway::reset`](crate::gateway::Gateway::reset).
	#[error("session refresh was cancelled.")]
	Cancelled,
	/// The initiating request was dropped before the episode concluded.
	#[error("session refresh was abandoned by its initiator.")]
	Abandoned,
}
