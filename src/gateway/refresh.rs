//! Token refresh collaborator and the episode logic that drives it.
//!
//! [`Gateway::refresh_session`] is the only place that calls a [`TokenRefresher`]. A request
//! that observes a 401 enters the coordinator: the first one becomes the initiator and performs
//! the refresh, every later one waits for the same outcome. A request whose token was already
//! replaced by a finished episode skips the refresh and replays with the stored token. The
//! initiator reads the stored refresh token (failing with [`RefreshError::Unavailable`] before
//! any network call when it is missing), exchanges it, and commits the new pair under the
//! coordinator lock.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{RefreshTokenBody, TokenGrant, TokenSecret},
	error::RefreshError,
	gateway::{
		Gateway,
		coordinator::{EpisodeOutcome, Role},
	},
	http::{ApiHttpClient, ApiRequest},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenGrant, RefreshError>> + 'a + Send>>;

/// Exchanges a refresh token for a new token pair.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Performs one exchange. Implementations must not retry on their own.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Default [`TokenRefresher`] that POSTs `{"refreshToken": ...}` to the refresh endpoint.
pub struct HttpTokenRefresher<C>
where
	C: ?Sized + ApiHttpClient,
{
	http_client: Arc<C>,
	endpoint: Url,
}
impl<C> HttpTokenRefresher<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a refresher that calls `endpoint` through `http_client`.
	pub fn new(http_client: impl Into<Arc<C>>, endpoint: Url) -> Self {
		Self { http_client: http_client.into(), endpoint }
	}

	async fn exchange(&self, refresh_token: &TokenSecret) -> Result<TokenGrant, RefreshError> {
		let request = ApiRequest::post(self.endpoint.clone())
			.json(&RefreshTokenBody { refresh_token: refresh_token.expose() })
			.map_err(|e| RefreshError::Malformed { message: e.to_string() })?;
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|e| RefreshError::Transport { message: e.to_string() })?;

		if !response.is_success() {
			return Err(RefreshError::Rejected {
				status: response.status.as_u16(),
				message: response.failure_message("Session refresh was rejected"),
			});
		}

		let grant = response
			.json::<TokenGrant>()
			.map_err(|e| RefreshError::Malformed { message: decode_message(e) })?;

		if grant.access_token.is_blank() || grant.refresh_token.is_blank() {
			return Err(RefreshError::Malformed {
				message: "token pair contains an empty token".into(),
			});
		}

		Ok(grant)
	}
}
impl<C> TokenRefresher for HttpTokenRefresher<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(self.exchange(refresh_token))
	}
}
impl<C> Debug for HttpTokenRefresher<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenRefresher").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Runs (or waits for) the refresh episode triggered by a 401 to `rejected` on `url`.
	///
	/// Every request of one episode receives the same outcome: the new access token, or the
	/// same [`RefreshError`]. When an earlier episode already replaced `rejected`, the stored
	/// token is returned without another refresh.
	pub(crate) async fn refresh_session(
		&self,
		url: &Url,
		rejected: &TokenSecret,
	) -> EpisodeOutcome {
		match self.coordinator.enter(self.store.as_ref(), rejected).await? {
			Role::Renewed(token) => {
				crate::trace_event!(
					debug,
					url = url.as_str(),
					"Access token was already renewed, replaying without a refresh."
				);

				Ok(token)
			},
			Role::Follower(episode) => {
				self.refresh_metrics.record_join();
				crate::trace_event!(
					debug,
					episode = episode.id(),
					url = url.as_str(),
					"Request queued behind in-flight refresh."
				);

				episode.outcome().await
			},
			Role::Initiator(lease) => {
				const KIND: FlowKind = FlowKind::Refresh;

				let span = FlowSpan::new(KIND, "refresh_session");

				crate::trace_event!(
					info,
					episode = lease.episode().id(),
					url = url.as_str(),
					"Access token rejected, refreshing session."
				);
				obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

				let outcome = span
					.instrument(async move {
						let grant = self.exchange_refresh_token().await;

						lease.conclude(self.store.as_ref(), grant).await
					})
					.await;

				match &outcome {
					Ok(_) => {
						self.refresh_metrics.record_success();
						obs::record_flow_outcome(KIND, FlowOutcome::Success);
					},
					Err(_e) => {
						self.refresh_metrics.record_failure();
						obs::record_flow_outcome(KIND, FlowOutcome::Failure);
						crate::trace_event!(warn, error = %_e, "Session refresh failed.");
					},
				}

				outcome
			},
		}
	}

	async fn exchange_refresh_token(&self) -> Result<TokenGrant, RefreshError> {
		let refresh_token = self
			.store
			.refresh_token()
			.await
			.map_err(|e| RefreshError::Storage { message: e.to_string() })?
			.filter(|token| !token.is_blank())
			.ok_or(RefreshError::Unavailable)?;

		self.refresh_metrics.record_attempt();

		self.refresher.refresh(&refresh_token).await
	}
}

fn decode_message(e: Error) -> String {
	match e {
		Error::Decode { source, .. } => {
			let path = source.path().to_string();

			format!("{} at `{path}`", source.into_inner())
		},
		other => other.to_string(),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::Mutex;
	// crates.io
	use ::http::{HeaderMap, StatusCode};
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{ApiResponse, HttpFuture},
	};

	#[derive(Default)]
	struct CannedTransport {
		responses: Mutex<Vec<Result<ApiResponse, TransportError>>>,
		seen: Mutex<Vec<ApiRequest>>,
	}
	impl CannedTransport {
		fn replying(response: Result<ApiResponse, TransportError>) -> Arc<Self> {
			Arc::new(Self { responses: Mutex::new(vec![response]), seen: Mutex::default() })
		}
	}
	impl ApiHttpClient for CannedTransport {
		fn execute(&self, request: ApiRequest) -> HttpFuture<'_> {
			self.seen.lock().expect("Transport log lock poisoned.").push(request);

			let next = self
				.responses
				.lock()
				.expect("Transport script lock poisoned.")
				.pop()
				.expect("Transport script exhausted.");

			Box::pin(async move { next })
		}
	}

	fn endpoint() -> Url {
		Url::parse("http://localhost:8080/api/auth/refresh").expect("Refresh URL should parse.")
	}

	fn respond(status: u16, body: &str) -> Result<ApiResponse, TransportError> {
		Ok(ApiResponse::new(
			StatusCode::from_u16(status).expect("Test status should be valid."),
			HeaderMap::new(),
			body.as_bytes().to_vec(),
		))
	}

	#[tokio::test]
	async fn posts_refresh_token_as_json() {
		let transport = CannedTransport::replying(respond(
			200,
			r#"{"accessToken":"a2","refreshToken":"r2","expiresIn":900,"refreshExpiresIn":86400}"#,
		));
		let refresher = HttpTokenRefresher::<CannedTransport>::new(transport.clone(), endpoint());
		let grant = refresher
			.refresh(&TokenSecret::new("r1"))
			.await
			.expect("Refresh with a valid body should succeed.");

		assert_eq!(grant.access_token.expose(), "a2");
		assert_eq!(grant.refresh_token.expose(), "r2");

		let seen = transport.seen.lock().expect("Transport log lock poisoned.");

		assert_eq!(seen[0].url, endpoint());
		assert_eq!(seen[0].body.as_deref(), Some(br#"{"refreshToken":"r1"}"#.as_slice()));
		assert!(!seen[0].has_authorization());
	}

	#[tokio::test]
	async fn rejected_and_malformed_responses_map_to_refresh_errors() {
		let rejected = HttpTokenRefresher::<CannedTransport>::new(
			CannedTransport::replying(respond(401, r#"{"message":"Refresh token expired"}"#)),
			endpoint(),
		)
		.refresh(&TokenSecret::new("r1"))
		.await;

		assert_eq!(
			rejected,
			Err(RefreshError::Rejected { status: 401, message: "Refresh token expired".into() })
		);

		let malformed = HttpTokenRefresher::<CannedTransport>::new(
			CannedTransport::replying(respond(200, r#"{"accessToken":"a2"}"#)),
			endpoint(),
		)
		.refresh(&TokenSecret::new("r1"))
		.await;

		assert!(matches!(malformed, Err(RefreshError::Malformed { .. })));

		let blank = HttpTokenRefresher::<CannedTransport>::new(
			CannedTransport::replying(respond(200, r#"{"accessToken":"","refreshToken":"r2"}"#)),
			endpoint(),
		)
		.refresh(&TokenSecret::new("r1"))
		.await;

		assert!(matches!(blank, Err(RefreshError::Malformed { .. })));
	}

	#[tokio::test]
	async fn transport_failures_are_reported_as_unreachable() {
		let result = HttpTokenRefresher::<CannedTransport>::new(
			CannedTransport::replying(Err(TransportError::Io(std::io::Error::other("reset")))),
			endpoint(),
		)
		.refresh(&TokenSecret::new("r1"))
		.await;

		assert!(matches!(result, Err(RefreshError::Transport { .. })));
	}
}
