//! Walks through a tracker session against a mock backend: log in, load the board, survive an
//! access-token expiry through the gateway's refresh, then log out.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use tracker_gateway::{
	endpoint::ApiDescriptor,
	gateway::ReqwestGateway,
	store::{CredentialStore, MemoryStore},
	tracker::IssueTransition,
};

// Payload: {"sub":"ada@example.com","fullName":"Ada Lovelace","exp":4102444800}
const ACCESS_JWT: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJhZGFAZXhhbXBsZS5jb20iLCJmdWxsTmFtZSI6IkFkYSBMb3ZlbGFjZSIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login_body = format!(
		r#"{{"jwtResponse":{{"accessToken":"{ACCESS_JWT}","refreshToken":"demo-refresh"}},"role":["ROLE_USER"]}}"#
	);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200).header("content-type", "application/json").body(&login_body);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/projects")
				.header("authorization", format!("Bearer {ACCESS_JWT}"));
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"id":1,"name":"Kanban","adminEmail":"ada@example.com","isAdmin":true}]"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/projects/1/issues")
				.header("authorization", "Bearer rotated");
			then.status(200).header("content-type", "application/json").body(
				r#"[{"id":7,"title":"Wire the board","description":"","type":"FEATURE","status":"OPEN","sprintId":2}]"#,
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/projects/1/issues");
			then.status(401).body(r#"{"message":"Token expired"}"#);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT).path("/api/projects/1/issues/7/progress");
			then.status(200);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"accessToken":"rotated","refreshToken":"rotated-refresh"}"#);
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/logout");
			then.status(200);
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let descriptor = ApiDescriptor::builder(Url::parse(&server.url("/api"))?).build()?;
	let gateway = ReqwestGateway::new(store.clone(), descriptor);
	let identity = gateway.login("ada@example.com", "secret1").await?;

	println!("Signed in as {} <{}>.", identity.name, identity.email);

	let projects = gateway.list_projects().await?;

	for project in &projects {
		println!("Project #{}: {} (admin: {}).", project.id, project.name, project.is_admin);
	}

	// The issue endpoint only accepts the rotated token, so this call goes through a refresh.
	let issues = gateway.list_issues(projects[0].id).await?;

	for issue in &issues {
		println!("Issue #{}: {} [{:?}].", issue.id, issue.title, issue.status);

		gateway.transition_issue(projects[0].id, issue.id, IssueTransition::Progress).await?;
	}

	refresh.assert_async().await;

	println!(
		"Refresh attempts: {}; stored access token rotated: {}.",
		gateway.refresh_metrics().attempts(),
		store.access_token().await?.is_some_and(|token| token.expose() == "rotated")
	);

	gateway.logout().await?;
	logout.assert_async().await;

	println!("Signed out; session present: {}.", !store.snapshot().credentials.is_empty());

	Ok(())
}
