//! Single-flight bookkeeping for refresh episodes.
//!
//! The coordinator is a two-state machine, `Idle` or `Refreshing(episode)`, guarded by one
//! async mutex. Joining or starting an episode is a single check-and-set under that mutex, and
//! so is concluding it: the store update, the outcome publication, and the return to `Idle` all
//! happen before the mutex is released, so a 401 observed afterwards never joins a finished
//! episode. Such a request is replayed with the stored token when a finished episode already
//! replaced the token it was rejected with, and starts a new episode otherwise.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	auth::{TokenGrant, TokenSecret},
	error::RefreshError,
	store::{CredentialStore, StoreError},
};

/// Outcome shared by every request of one episode.
pub(crate) type EpisodeOutcome = Result<TokenSecret, RefreshError>;

#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
	phase: AsyncMutex<Phase>,
	next_id: AtomicU64,
}
impl RefreshCoordinator {
	/// Joins the live episode, reuses a token renewed since `rejected` was sent, or starts a new
	/// episode.
	pub(crate) async fn enter(
		self: &Arc<Self>,
		store: &dyn CredentialStore,
		rejected: &TokenSecret,
	) -> Result<Role, RefreshError> {
		let mut phase = self.phase.lock().await;

		if let Phase::Refreshing(episode) = &*phase {
			if !episode.is_concluded() {
				return Ok(Role::Follower(episode.clone()));
			}
		}

		match store.access_token().await.map_err(storage_error)? {
			Some(current) if !current.is_blank() && current != *rejected =>
				return Ok(Role::Renewed(current)),
			_ => {},
		}

		let episode = Arc::new(Episode::new(self.next_id.fetch_add(1, Ordering::Relaxed)));

		*phase = Phase::Refreshing(episode.clone());

		Ok(Role::Initiator(EpisodeLease { coordinator: self.clone(), episode, concluded: false }))
	}

	/// Cancels the live episode, if any, and returns to `Idle`.
	pub(crate) async fn reset(&self) {
		let mut phase = self.phase.lock().await;

		if let Phase::Refreshing(episode) = &*phase {
			episode.publish(Err(RefreshError::Cancelled));
		}

		*phase = Phase::Idle;
	}

	pub(crate) async fn is_refreshing(&self) -> bool {
		matches!(&*self.phase.lock().await, Phase::Refreshing(episode) if !episode.is_concluded())
	}
}

#[derive(Debug, Default)]
enum Phase {
	#[default]
	Idle,
	Refreshing(Arc<Episode>),
}

/// One refresh episode: a single call to the refresh collaborator and its shared outcome.
#[derive(Debug)]
pub(crate) struct Episode {
	id: u64,
	outcome: OnceCell<EpisodeOutcome>,
	publishing: parking_lot::Mutex<()>,
}
impl Episode {
	fn new(id: u64) -> Self {
		Self { id, outcome: OnceCell::new(), publishing: Default::default() }
	}

	pub(crate) fn id(&self) -> u64 {
		self.id
	}

	fn is_concluded(&self) -> bool {
		self.outcome.is_initialized()
	}

	/// Waits for the initiator (or a reset) to publish the outcome.
	pub(crate) async fn outcome(&self) -> EpisodeOutcome {
		self.outcome.wait().await.clone()
	}

	/// Publishes `outcome` unless another one won, and returns the published value.
	fn publish(&self, outcome: EpisodeOutcome) -> EpisodeOutcome {
		// Every initialization of the cell happens under this guard with a ready value, so
		// `set_blocking` never waits on a concurrent initializer.
		let _guard = self.publishing.lock();

		if let Some(published) = self.outcome.get() {
			return published.clone();
		}

		let _ = self.outcome.set_blocking(outcome.clone());

		outcome
	}
}

/// How a request takes part in an episode.
#[derive(Debug)]
pub(crate) enum Role {
	/// The request performs the refresh.
	Initiator(EpisodeLease),
	/// The request waits for someone else's refresh.
	Follower(Arc<Episode>),
	/// A finished episode already replaced the rejected token.
	Renewed(TokenSecret),
}

/// Exclusive right to conclude an episode.
///
/// Dropping the lease without calling [`EpisodeLease::conclude`] publishes
/// [`RefreshError::Abandoned`] so followers never wait on a vanished initiator.
#[derive(Debug)]
pub(crate) struct EpisodeLease {
	coordinator: Arc<RefreshCoordinator>,
	episode: Arc<Episode>,
	concluded: bool,
}
impl EpisodeLease {
	pub(crate) fn episode(&self) -> &Episode {
		&self.episode
	}

	/// Commits `grant` to `store`, publishes the outcome, and returns the coordinator to `Idle`.
	///
	/// When the episode was cancelled while the refresh call was in flight, nothing is written
	/// and the cancellation is returned instead.
	pub(crate) async fn conclude(
		mut self,
		store: &dyn CredentialStore,
		grant: Result<TokenGrant, RefreshError>,
	) -> EpisodeOutcome {
		let mut phase = self.coordinator.phase.lock().await;

		if let Some(published) = self.episode.outcome.get() {
			self.concluded = true;

			return published.clone();
		}

		let outcome = match grant {
			Ok(grant) => commit(store, grant).await,
			Err(e) => Err(e),
		};
		let published = self.episode.publish(outcome);

		self.concluded = true;

		if matches!(&*phase, Phase::Refreshing(current) if Arc::ptr_eq(current, &self.episode)) {
			*phase = Phase::Idle;
		}

		published
	}
}
impl Drop for EpisodeLease {
	fn drop(&mut self) {
		if !self.concluded {
			self.episode.publish(Err(RefreshError::Abandoned));
		}
	}
}

async fn commit(store: &dyn CredentialStore, grant: TokenGrant) -> EpisodeOutcome {
	// Roles come from login only; a refresh keeps whatever was granted then.
	let roles = store.roles().await.map_err(storage_error)?;

	store
		.set_tokens(grant.access_token.clone(), grant.refresh_token, roles)
		.await
		.map_err(storage_error)?;

	Ok(grant.access_token)
}

fn storage_error(e: StoreError) -> RefreshError {
	RefreshError::Storage { message: e.to_string() }
}
