//! Authenticated request gateway.
//!
//! [`Gateway::request`] attaches the stored access token to an outbound call and, when the API
//! rejects that token with 401, renews the session exactly once per episode no matter how many
//! requests hit the 401 concurrently. Each affected request is then replayed once with the new
//! token; a replay that is still rejected fails with [`Error::PostRefreshUnauthorized`] instead
//! of looping.
//!
//! Every other response, success or not, is returned verbatim, and transport errors propagate
//! untouched: interpreting business errors is left to the typed clients in
//! [`tracker`](crate::tracker).

pub mod refresh;

mod coordinator;

pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	endpoint::ApiDescriptor,
	gateway::coordinator::RefreshCoordinator,
	http::{ApiHttpClient, ApiRequest, ApiResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestHttpClient>;

/// Authenticated entry point for every call against the tracker API.
///
/// The gateway owns the transport, the credential store, the refresh collaborator, and the
/// single-flight refresh state. Clones share all of them, including the refresh state, so a
/// clone handed to another task takes part in the same episodes; build a second gateway for an
/// independent session.
pub struct Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Credential store read on every request and updated after a refresh.
	pub store: Arc<dyn CredentialStore>,
	/// Collaborator that exchanges the refresh token for a new pair.
	pub refresher: Arc<dyn TokenRefresher>,
	/// API layout.
	pub descriptor: ApiDescriptor,
	/// Counters for refresh episodes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<C> Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a gateway that reuses the caller-provided transport.
	///
	/// The default [`HttpTokenRefresher`] calls the descriptor's refresh endpoint through the
	/// same transport.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		descriptor: ApiDescriptor,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		let http_client: Arc<C> = http_client.into();
		let refresher = Arc::new(HttpTokenRefresher::<C>::new(
			http_client.clone(),
			descriptor.auth.refresh.clone(),
		));

		Self {
			http_client,
			store,
			refresher,
			descriptor,
			refresh_metrics: Default::default(),
			coordinator: Default::default(),
		}
	}

	/// Replaces the refresh collaborator.
	pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
		self.refresher = refresher;

		self
	}

	/// Returns the shared refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Returns `true` while a refresh episode is in flight.
	pub async fn is_refreshing(&self) -> bool {
		self.coordinator.is_refreshing().await
	}

	/// Cancels an in-flight refresh episode and returns to the idle state.
	///
	/// Requests waiting on the episode fail with
	/// [`RefreshError::Cancelled`](crate::error::RefreshError::Cancelled); the cancelled
	/// initiator does not store the tokens it may still receive.
	pub async fn reset(&self) {
		self.coordinator.reset().await;
	}

	/// Sends `request` with the stored bearer token, recovering from an expired token.
	///
	/// - Without a stored access token, calls to non-public endpoints fail with
	///   [`Error::Unauthenticated`] before any network traffic; public endpoints (login,
	///   register, refresh) are sent without a bearer.
	/// - A caller-supplied `Authorization` header is left untouched, and a 401 answered to such
	///   a request, or to a public endpoint, is returned as-is.
	/// - A 401 answered to a request the gateway signed triggers (or joins) a refresh episode
	///   and the request is replayed once with the new token. When a finished episode already
	///   replaced the token the request was signed with, it is replayed with the stored token
	///   and no further refresh is made.
	pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "request");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		if request.has_authorization() {
			return self.send(request).await;
		}

		let public = self.descriptor.is_public(&request.url);
		let token = self.store.access_token().await?.filter(|token| !token.is_blank());
		let Some(token) = token else {
			if public {
				return self.send(request).await;
			}

			crate::trace_event!(
				warn,
				url = request.url.as_str(),
				"No access token stored, rejecting request."
			);

			return Err(Error::Unauthenticated { url: request.url.to_string() });
		};
		let response = self.send(request.with_bearer(&token)?).await?;

		if !response.is_unauthorized() || public {
			return Ok(response);
		}

		let token = self.refresh_session(&request.url, &token).await?;

		self.replay(request, &token).await
	}

	async fn replay(&self, request: ApiRequest, token: &TokenSecret) -> Result<ApiResponse> {
		let url = request.url.to_string();
		let response = self.send(request.with_bearer(token)?).await?;

		if response.is_unauthorized() {
			crate::trace_event!(warn, url = url.as_str(), "Replay rejected after refresh.");

			return Err(Error::PostRefreshUnauthorized { url });
		}

		Ok(response)
	}

	pub(crate) async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		Ok(self.http_client.execute(request).await?)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates a gateway with its own reqwest-backed transport.
	pub fn new(store: Arc<dyn CredentialStore>, descriptor: ApiDescriptor) -> Self {
		Self::with_http_client(store, descriptor, ReqwestHttpClient::default())
	}
}
impl<C> Clone for Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			refresher: self.refresher.clone(),
			descriptor: self.descriptor.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("descriptor", &self.descriptor)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		io::{Error as IoError, ErrorKind},
		sync::{
			Mutex,
			atomic::{AtomicUsize, Ordering},
		},
	};
	// crates.io
	use ::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
	use tokio::sync::Semaphore;
	// self
	use super::*;
	use crate::{
		auth::TokenGrant,
		error::{RefreshError, TransportError},
		http::HttpFuture,
		store::MemoryStore,
	};

	/// Answers 200 to the bearer tokens it accepts and 401 to everything else.
	///
	/// Requests carrying an unreachable bearer fail at the network level, and the first response
	/// can be held back until its gate opens.
	#[derive(Default)]
	struct FakeApi {
		accepted: Vec<&'static str>,
		unreachable: Vec<&'static str>,
		first_response_gate: Option<Arc<Semaphore>>,
		seen: Mutex<Vec<ApiRequest>>,
	}
	impl FakeApi {
		fn new(accepted: &[&'static str]) -> Self {
			Self { accepted: accepted.to_vec(), ..Default::default() }
		}

		fn accepting(tokens: &[&'static str]) -> Arc<Self> {
			Arc::new(Self::new(tokens))
		}

		fn unreachable_with(mut self, tokens: &[&'static str]) -> Self {
			self.unreachable = tokens.to_vec();

			self
		}

		fn holding_first_response(mut self, gate: Arc<Semaphore>) -> Self {
			self.first_response_gate = Some(gate);

			self
		}

		fn bearers(&self) -> Vec<Option<String>> {
			self.seen
				.lock()
				.expect("Request log lock poisoned.")
				.iter()
				.map(|request| {
					request
						.headers
						.get(AUTHORIZATION)
						.and_then(|value| value.to_str().ok())
						.map(ToOwned::to_owned)
				})
				.collect()
		}
	}
	impl ApiHttpClient for FakeApi {
		fn execute(&self, request: ApiRequest) -> HttpFuture<'_> {
			let bearer = request
				.headers
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.strip_prefix("Bearer "))
				.map(ToOwned::to_owned);
			let unreachable =
				bearer.as_deref().is_some_and(|token| self.unreachable.contains(&token));
			let authorized = bearer.as_deref().is_some_and(|token| self.accepted.contains(&token));
			let status = if authorized { StatusCode::OK } else { StatusCode::UNAUTHORIZED };
			let gate = {
				let mut seen = self.seen.lock().expect("Request log lock poisoned.");
				let first = seen.is_empty();

				seen.push(request);

				self.first_response_gate.clone().filter(|_| first)
			};

			Box::pin(async move {
				if let Some(gate) = gate {
					let _permit = gate.acquire().await.expect("Response gate should stay open.");
				}
				if unreachable {
					return Err(TransportError::network(IoError::new(
						ErrorKind::ConnectionRefused,
						"connection refused",
					)));
				}

				Ok(ApiResponse::new(status, HeaderMap::new(), b"[]".to_vec()))
			})
		}
	}

	/// Refresher that blocks until released and then returns a fixed outcome.
	struct GatedRefresher {
		gate: Semaphore,
		calls: AtomicUsize,
		outcome: Result<(&'static str, &'static str), RefreshError>,
	}
	impl GatedRefresher {
		fn closed(outcome: Result<(&'static str, &'static str), RefreshError>) -> Arc<Self> {
			Arc::new(Self { gate: Semaphore::new(0), calls: AtomicUsize::new(0), outcome })
		}

		fn open(outcome: Result<(&'static str, &'static str), RefreshError>) -> Arc<Self> {
			let refresher = Self::closed(outcome);

			refresher.release();

			refresher
		}

		fn release(&self) {
			self.gate.add_permits(16);
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl TokenRefresher for GatedRefresher {
		fn refresh<'a>(&'a self, _: &'a TokenSecret) -> RefreshFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				let _permit = self.gate.acquire().await.expect("Refresh gate should stay open.");

				self.outcome.clone().map(|(access, refresh)| TokenGrant {
					access_token: TokenSecret::new(access),
					refresh_token: TokenSecret::new(refresh),
					expires_in: None,
					refresh_expires_in: None,
				})
			})
		}
	}

	async fn gateway(
		api: Arc<FakeApi>,
		refresher: Arc<GatedRefresher>,
		seeded: bool,
	) -> (Arc<Gateway<FakeApi>>, MemoryStore) {
		let store = MemoryStore::default();

		if seeded {
			store
				.set_tokens(TokenSecret::new("a1"), TokenSecret::new("r1"), vec!["USER".into()])
				.await
				.expect("Seeding the memory store should succeed.");
		}

		let descriptor = ApiDescriptor::builder(
			Url::parse("http://tracker.test/api").expect("Base fixture should parse."),
		)
		.build()
		.expect("Descriptor fixture should build.");
		let gateway =
			Gateway::<FakeApi>::with_http_client(Arc::new(store.clone()), descriptor, api)
				.with_refresher(refresher);

		(Arc::new(gateway), store)
	}

	fn stored_access(store: &MemoryStore) -> Option<String> {
		store.snapshot().credentials.access_token.map(|token| token.expose().to_owned())
	}

	async fn wait_for_joins(gateway: &Gateway<FakeApi>, joins: u64) {
		while gateway.refresh_metrics().joins() < joins {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn concurrent_rejections_share_one_refresh() {
		let api = FakeApi::accepting(&["a2"]);
		let refresher = GatedRefresher::closed(Ok(("a2", "r2")));
		let (gateway, store) = gateway(api.clone(), refresher.clone(), true).await;
		let tasks = (0..3)
			.map(|_| {
				let gateway = gateway.clone();

				tokio::spawn(async move {
					gateway.request(ApiRequest::get(gateway.descriptor.projects())).await
				})
			})
			.collect::<Vec<_>>();

		wait_for_joins(&gateway, 2).await;

		assert!(gateway.is_refreshing().await);

		refresher.release();

		for task in tasks {
			let response = task
				.await
				.expect("Request task should not panic.")
				.expect("Replayed request should succeed.");

			assert_eq!(response.status, StatusCode::OK);
		}

		assert_eq!(refresher.calls(), 1);
		assert_eq!(gateway.refresh_metrics().attempts(), 1);
		assert_eq!(gateway.refresh_metrics().successes(), 1);
		assert_eq!(stored_access(&store).as_deref(), Some("a2"));
		assert_eq!(
			store.snapshot().credentials.refresh_token.as_ref().map(TokenSecret::expose),
			Some("r2")
		);
		assert_eq!(store.snapshot().credentials.roles, vec!["USER".to_string()]);
		assert!(!gateway.is_refreshing().await);

		let bearers = api.bearers();

		assert_eq!(bearers.len(), 6);
		assert_eq!(bearers.iter().filter(|b| b.as_deref() == Some("Bearer a2")).count(), 3);
	}

	#[tokio::test]
	async fn refresh_failure_is_shared_and_keeps_the_session() {
		let api = FakeApi::accepting(&[]);
		let rejected =
			RefreshError::Rejected { status: 401, message: "Refresh token expired".into() };
		let refresher = GatedRefresher::closed(Err(rejected.clone()));
		let (gateway, store) = gateway(api.clone(), refresher.clone(), true).await;
		let tasks = (0..2)
			.map(|_| {
				let gateway = gateway.clone();

				tokio::spawn(async move {
					gateway.request(ApiRequest::get(gateway.descriptor.projects())).await
				})
			})
			.collect::<Vec<_>>();

		wait_for_joins(&gateway, 1).await;
		refresher.release();

		for task in tasks {
			let err = task
				.await
				.expect("Request task should not panic.")
				.expect_err("Refresh failure should reach every waiter.");

			assert!(matches!(&err, Error::Refresh(e) if *e == rejected));
			assert!(err.is_session_expired());
		}

		assert_eq!(refresher.calls(), 1);
		assert_eq!(gateway.refresh_metrics().failures(), 1);
		assert_eq!(stored_access(&store).as_deref(), Some("a1"));
		assert_eq!(api.bearers().len(), 2);
	}

	#[tokio::test]
	async fn a_concluded_episode_is_never_joined() {
		let api = FakeApi::accepting(&[]);
		let refresher = GatedRefresher::open(Err(RefreshError::Unavailable));
		let (gateway, _store) = gateway(api, refresher.clone(), true).await;

		for _ in 0..2 {
			let err = gateway
				.request(ApiRequest::get(gateway.descriptor.projects()))
				.await
				.expect_err("Refresh should fail.");

			assert!(matches!(err, Error::Refresh(RefreshError::Unavailable)));
		}

		assert_eq!(refresher.calls(), 2);
		assert_eq!(gateway.refresh_metrics().joins(), 0);
	}

	#[tokio::test]
	async fn replay_rejection_is_terminal() {
		let api = FakeApi::accepting(&[]);
		let refresher = GatedRefresher::open(Ok(("a2", "r2")));
		let (gateway, _store) = gateway(api.clone(), refresher.clone(), true).await;
		let err = gateway
			.request(ApiRequest::get(gateway.descriptor.projects()))
			.await
			.expect_err("Second 401 should not be retried.");

		assert!(matches!(err, Error::PostRefreshUnauthorized { .. }));
		assert_eq!(refresher.calls(), 1);
		assert_eq!(
			api.bearers(),
			vec![Some("Bearer a1".to_string()), Some("Bearer a2".to_string())]
		);
	}

	#[tokio::test]
	async fn missing_token_fails_before_the_network() {
		let api = FakeApi::accepting(&["a1"]);
		let refresher = GatedRefresher::open(Ok(("a2", "r2")));
		let (gateway, _store) = gateway(api.clone(), refresher.clone(), false).await;
		let err = gateway
			.request(ApiRequest::get(gateway.descriptor.projects()))
			.await
			.expect_err("Unauthenticated call should fail.");

		assert!(matches!(err, Error::Unauthenticated { .. }));
		assert!(api.bearers().is_empty());
		assert_eq!(refresher.calls(), 0);

		let response = gateway
			.request(ApiRequest::post(gateway.descriptor.auth.login.clone()))
			.await
			.expect("Public endpoints should be reachable without a token.");

		assert_eq!(response.status, StatusCode::UNAUTHORIZED);
		assert_eq!(api.bearers(), vec![None]);
		assert_eq!(refresher.calls(), 0);
	}

	#[tokio::test]
	async fn caller_authorization_is_passed_through() {
		let api = FakeApi::accepting(&[]);
		let refresher = GatedRefresher::open(Ok(("a2", "r2")));
		let (gateway, _store) = gateway(api.clone(), refresher.clone(), true).await;
		let request = ApiRequest::get(gateway.descriptor.projects())
			.header(AUTHORIZATION, "Bearer caller")
			.expect("Header fixture should be valid.");
		let response = gateway.request(request).await.expect("401 should be returned verbatim.");

		assert_eq!(response.status, StatusCode::UNAUTHORIZED);
		assert_eq!(api.bearers(), vec![Some("Bearer caller".to_string())]);
		assert_eq!(refresher.calls(), 0);
	}

	#[tokio::test]
	async fn reset_cancels_waiters_and_discards_the_grant() {
		let api = FakeApi::accepting(&["a2"]);
		let refresher = GatedRefresher::closed(Ok(("a2", "r2")));
		let (gateway, store) = gateway(api, refresher.clone(), true).await;
		let tasks = (0..2)
			.map(|_| {
				let gateway = gateway.clone();

				tokio::spawn(async move {
					gateway.request(ApiRequest::get(gateway.descriptor.projects())).await
				})
			})
			.collect::<Vec<_>>();

		wait_for_joins(&gateway, 1).await;
		gateway.reset().await;

		assert!(!gateway.is_refreshing().await);

		refresher.release();

		for task in tasks {
			let err = task
				.await
				.expect("Request task should not panic.")
				.expect_err("Cancelled episode should fail its requests.");

			assert!(matches!(err, Error::Refresh(RefreshError::Cancelled)));
		}

		assert_eq!(stored_access(&store).as_deref(), Some("a1"));
	}

	#[tokio::test]
	async fn late_rejection_of_a_replaced_token_reuses_the_renewed_one() {
		let response_gate = Arc::new(Semaphore::new(0));
		let api = Arc::new(FakeApi::new(&["a2"]).holding_first_response(response_gate.clone()));
		let refresher = GatedRefresher::open(Ok(("a2", "r2")));
		let (gateway, store) = gateway(api.clone(), refresher.clone(), true).await;
		let late = {
			let gateway = gateway.clone();

			tokio::spawn(async move {
				gateway.request(ApiRequest::get(gateway.descriptor.projects())).await
			})
		};

		while api.bearers().is_empty() {
			tokio::task::yield_now().await;
		}

		let response = gateway
			.request(ApiRequest::get(gateway.descriptor.projects()))
			.await
			.expect("The first rejected request should be refreshed and replayed.");

		assert_eq!(response.status, StatusCode::OK);
		assert!(!gateway.is_refreshing().await);

		response_gate.add_permits(1);

		let response = late
			.await
			.expect("Request task should not panic.")
			.expect("The late rejection should be replayed with the renewed token.");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(refresher.calls(), 1);
		assert_eq!(gateway.refresh_metrics().attempts(), 1);
		assert_eq!(stored_access(&store).as_deref(), Some("a2"));
		assert_eq!(
			api.bearers(),
			["a1", "a1", "a2", "a2"].map(|token| Some(format!("Bearer {token}"))).to_vec()
		);
	}

	#[tokio::test]
	async fn transport_errors_skip_the_refresh() {
		let api = Arc::new(FakeApi::new(&["a1"]).unreachable_with(&["a1"]));
		let refresher = GatedRefresher::open(Ok(("a2", "r2")));
		let (gateway, store) = gateway(api.clone(), refresher.clone(), true).await;
		let err = gateway
			.request(ApiRequest::get(gateway.descriptor.projects()))
			.await
			.expect_err("Unreachable API should fail the request.");

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		assert!(!err.is_session_expired());
		assert_eq!(refresher.calls(), 0);
		assert_eq!(api.bearers().len(), 1);
		assert_eq!(stored_access(&store).as_deref(), Some("a1"));
	}

	#[tokio::test]
	async fn replay_transport_errors_reach_every_waiter() {
		let api = Arc::new(FakeApi::new(&[]).unreachable_with(&["a2"]));
		let refresher = GatedRefresher::closed(Ok(("a2", "r2")));
		let (gateway, store) = gateway(api.clone(), refresher.clone(), true).await;
		let tasks = (0..2)
			.map(|_| {
				let gateway = gateway.clone();

				tokio::spawn(async move {
					gateway.request(ApiRequest::get(gateway.descriptor.projects())).await
				})
			})
			.collect::<Vec<_>>();

		wait_for_joins(&gateway, 1).await;
		refresher.release();

		for task in tasks {
			let err = task
				.await
				.expect("Request task should not panic.")
				.expect_err("Replay over an unreachable API should fail.");

			assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		}

		assert_eq!(refresher.calls(), 1);
		assert_eq!(stored_access(&store).as_deref(), Some("a2"));
		assert_eq!(api.bearers().len(), 4);
	}
}
