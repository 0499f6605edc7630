//! Authenticated API gateway for the issue tracker: bearer injection, single-flight token
//! refresh with request replay, and typed project/issue/sprint clients in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod health;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;
pub mod tracker;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::TokenSecret,
		endpoint::ApiDescriptor,
		gateway::Gateway,
		http::ReqwestHttpClient,
		store::{CredentialStore, MemoryStore},
	};

	/// Gateway type alias used by reqwest-backed integration tests.
	pub type ReqwestTestGateway = Gateway<ReqwestHttpClient>;

	/// Builds a descriptor rooted at `<server>/api`, mirroring the backend's layout.
	pub fn test_descriptor(server_base_url: &str) -> ApiDescriptor {
		let base = Url::parse(&format!("{}/api", server_base_url.trim_end_matches('/')))
			.expect("Failed to parse mock API base URL.");

		ApiDescriptor::builder(base).build().expect("Failed to build mock API descriptor.")
	}

	/// Constructs a [`Gateway`] backed by an in-memory store and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_gateway(
		server_base_url: &str,
	) -> (ReqwestTestGateway, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let gateway = ReqwestTestGateway::with_http_client(
			store,
			test_descriptor(server_base_url),
			ReqwestHttpClient::default(),
		);

		(gateway, store_backend)
	}

	/// Seeds `store` with an access/refresh pair and roles.
	pub async fn seed_tokens(store: &MemoryStore, access: &str, refresh: &str, roles: &[&str]) {
		store
			.set_tokens(
				TokenSecret::new(access),
				TokenSecret::new(refresh),
				roles.iter().map(|role| role.to_string()).collect(),
			)
			.await
			.expect("Failed to seed credentials into the memory store.");
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub(crate) use obs::trace_event;

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
