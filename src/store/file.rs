//! File-backed [`CredentialStore`] that keeps a session across process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	store::{CredentialStore, StoreError, StoreFuture, StoreSnapshot},
	tracker::Project,
};

/// Persists the session to a JSON file after each mutation.
///
/// Writes go to a sibling `*.tmp` file that is synced and then renamed over the target, so a
/// crash never leaves a half-written snapshot behind.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<StoreSnapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<StoreSnapshot, StoreError> {
		if !path.exists() {
			return Ok(StoreSnapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(StoreSnapshot::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &StoreSnapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	/// Applies `f` to a copy of the snapshot and only publishes it once it is on disk.
	fn mutate<F>(&self, f: F) -> StoreFuture<'_, ()>
	where
		F: 'static + Send + FnOnce(&mut StoreSnapshot),
	{
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			f(&mut next);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}
}
impl CredentialStore for FileStore {
	fn credentials(&self) -> StoreFuture<'_, Credentials> {
		Box::pin(async move { Ok(self.inner.read().credentials.clone()) })
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
		Box::pin(async move { Ok(self.inner.read().selected_project.clone()) })
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
