//! Storage contracts and built-in store implementations for session credentials.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	tracker::Project,
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the signed-in session.
///
/// The gateway reads the tokens on every request and replaces them after a refresh; session
/// flows write them at login and clear them at logout. Implementations must make each
/// `set_tokens` call visible atomically: readers observe either the old pair or the new one.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns a snapshot of the stored credentials.
	fn credentials(&self) -> StoreFuture<'_, Credentials>;

	/// Replaces both tokens and the role list.
	fn set_tokens(
		&self,
		access: TokenSecret,
		refresh: TokenSecret,
		roles: Vec<String>,
	) -> StoreFuture<'_, ()>;

	/// Removes both tokens and the role list.
	fn clear_tokens(&self) -> StoreFuture<'_, ()>;

	/// Returns the project the user last selected.
	fn selected_project(&self) -> StoreFuture<'_, Option<Project>>;

	/// Remembers the project the user selected.
	fn set_selected_project(&self, project: Project) -> StoreFuture<'_, ()>;

	/// Forgets the selected project.
	fn clear_selected_project(&self) -> StoreFuture<'_, ()>;

	/// Returns the stored access token.
	fn access_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.credentials().await?.access_token) })
	}

	/// Returns the stored refresh token.
	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.credentials().await?.refresh_token) })
	}

	/// Returns the stored roles.
	fn roles(&self) -> StoreFuture<'_, Vec<String>> {
		Box::pin(async move { Ok(self.credentials().await?.roles) })
	}

	/// Clears the tokens and the selected project.
	fn clear_all(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.clear_tokens().await?;
			self.clear_selected_project().await
		})
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Everything a store persists, in one serializable value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSnapshot {
	/// Session credentials.
	#[serde(flatten)]
	pub credentials: Credentials,
	/// Project the user last selected.
	pub selected_project: Option<Project>,
}
impl StoreSnapshot {
	pub(crate) fn set_tokens(
		&mut self,
		access: TokenSecret,
		refresh: TokenSecret,
		roles: Vec<String>,
	) {
		self.credentials =
			Credentials { access_token: Some(access), refresh_token: Some(refresh), roles };
	}

	pub(crate) fn clear_tokens(&mut self) {
		self.credentials = Credentials::default();
	}
}
