//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	store::{CredentialStore, StoreError, StoreFuture, StoreSnapshot},
	tracker::Project,
};

type SharedSnapshot = Arc<RwLock<StoreSnapshot>>;

/// Thread-safe storage backend that keeps the session in-process for tests and demos.
///
/// Clones share the same underlying session.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedSnapshot);
impl MemoryStore {
	/// Creates a store pre-populated with `credentials`.
	pub fn with_credentials(credentials: Credentials) -> Self {
		Self(Arc::new(RwLock::new(StoreSnapshot { credentials, selected_project: None })))
	}

	/// Returns a copy of everything currently held.
	pub fn snapshot(&self) -> StoreSnapshot {
		self.0.read().clone()
	}

	fn mutate<F>(&self, f: F) -> StoreFuture<'_, ()>
	where
		F: 'static + Send + FnOnce(&mut StoreSnapshot),
	{
		let state = self.0.clone();

		Box::pin(async move {
			f(&mut *state.write());

			Ok::<_, StoreError>(())
		})
	}
}
impl CredentialStore for MemoryStore {
	fn credentials(&self) -> StoreFuture<'_, Credentials> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().credentials.clone()) })
	}

	fn set_tokens(
		&self,
		access: TokenSecret,
		refresh: TokenSecret,
		roles: Vec<String>,
	) -> StoreFuture<'_, ()> {
		self.mutate(move |snapshot| snapshot.set_tokens(access, refresh, roles))
	}

	fn clear_tokens(&self) -> StoreFuture<'_, ()> {
		self.mutate(StoreSnapshot::clear_tokens)
	}

	fn selected_project(&self) -> StoreFuture<'_, Option<Project>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().selected_project.clone()) })
	}

	fn set_selected_project(&self, project: Project) -> StoreFuture<'_, ()> {
		self.mutate(move |snapshot| snapshot.selected_project = Some(project))
	}

	fn clear_selected_project(&self) -> StoreFuture<'_, ()> {
		self.mutate(|snapshot| snapshot.selected_project = None)
	}

	fn clear_all(&self) -> StoreFuture<'_, ()> {
		self.mutate(|snapshot| *snapshot = StoreSnapshot::default())
	}
}
