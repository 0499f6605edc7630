// self
use tracker_gateway::{
	auth::{Credentials, TokenSecret},
	store::{CredentialStore, MemoryStore},
	tracker::Project,
};

fn project() -> Project {
	Project {
		id: 3,
		name: "Kanban".into(),
		admin_email: "ada@example.com".into(),
		is_admin: true,
		members: vec!["dev@example.com".into()],
	}
}

#[tokio::test]
async fn token_pair_is_replaced_as_a_unit() {
	let store = MemoryStore::default();

	assert_eq!(store.access_token().await.expect("Read should succeed."), None);

	store
		.set_tokens(TokenSecret::new("a1"), TokenSecret::new("r1"), vec!["ROLE_USER".into()])
		.await
		.expect("Saving tokens should succeed.");
	store
		.set_tokens(TokenSecret::new("a2"), TokenSecret::new("r2"), Vec::new())
		.await
		.expect("Replacing tokens should succeed.");

	let credentials = store.credentials().await.expect("Read should succeed.");

	assert_eq!(credentials.access_token.as_ref().map(TokenSecret::expose), Some("a2"));
	assert_eq!(credentials.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
	assert!(credentials.roles.is_empty());
}

#[tokio::test]
async fn clones_share_the_session() {
	let store = MemoryStore::with_credentials(Credentials {
		access_token: Some(TokenSecret::new("a1")),
		refresh_token: Some(TokenSecret::new("r1")),
		roles: vec!["ROLE_ADMIN".into()],
	});
	let clone = store.clone();

	clone.clear_tokens().await.expect("Clearing tokens should succeed.");

	assert!(store.snapshot().credentials.is_empty());
	assert_eq!(store.roles().await.expect("Read should succeed."), Vec::<String>::new());
}

#[tokio::test]
async fn logout_keeps_the_selected_project_but_clear_all_does_not() {
	let store = MemoryStore::default();

	store
		.set_tokens(TokenSecret::new("a1"), TokenSecret::new("r1"), Vec::new())
		.await
		.expect("Saving tokens should succeed.");
	store.set_selected_project(project()).await.expect("Selecting a project should succeed.");
	store.clear_tokens().await.expect("Clearing tokens should succeed.");

	assert_eq!(store.selected_project().await.expect("Read should succeed."), Some(project()));

	store.clear_all().await.expect("Clearing everything should succeed.");

	assert_eq!(store.selected_project().await.expect("Read should succeed."), None);
	assert_eq!(store.refresh_token().await.expect("Read should succeed."), None);
}
