#![cfg(all(feature = "reqwest", feature = "test"))]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use tracker_gateway::{
	_preludet::*,
	auth::TokenSecret,
	session::{RegisterRequest, ValidationError},
};

// Payload: {"sub":"ada@example.com","fullName":"Ada Lovelace","exp":4102444800}
const ACCESS_JWT: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJhZGFAZXhhbXBsZS5jb20iLCJmdWxsTmFtZSI6IkFkYSBMb3ZlbGFjZSIsImV4cCI6NDEwMjQ0NDgwMH0.c2ln";

#[tokio::test]
async fn login_stores_the_session_and_describes_the_user() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/login")
				.json_body(json!({ "email": "ada@example.com", "password": "secret1" }));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"jwtResponse": { "accessToken": ACCESS_JWT, "refreshToken": "refresh-1" },
				"role": ["ROLE_USER"]
			}));
		})
		.await;
	let identity =
		gateway.login("ada@example.com", "secret1").await.expect("Login should succeed.");

	login.assert_async().await;

	assert_eq!(identity.email, "ada@example.com");
	assert_eq!(identity.name, "Ada Lovelace");
	assert!(identity.has_role("ROLE_USER"));

	let credentials = store.snapshot().credentials;

	assert_eq!(credentials.access_token.as_ref().map(TokenSecret::expose), Some(ACCESS_JWT));
	assert_eq!(credentials.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
	assert_eq!(
		gateway.current_identity().await.expect("Identity lookup should succeed."),
		Some(identity)
	);
}

#[tokio::test]
async fn failed_login_reports_the_server_message_and_stores_nothing() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"message":"Bad credentials"}"#);
		})
		.await;
	let err = gateway
		.login("ada@example.com", "wrong-password")
		.await
		.expect_err("Rejected credentials should fail the login.");

	login.assert_async().await;

	assert!(matches!(err, Error::Api { status: 401, ref message } if message == "Bad credentials"));
	assert!(store.snapshot().credentials.is_empty());
	assert_eq!(gateway.refresh_metrics().attempts(), 0);
}

#[tokio::test]
async fn invalid_registration_never_reaches_the_server() {
	let server = MockServer::start_async().await;
	let (gateway, _store) = build_reqwest_test_gateway(&server.base_url());
	let register = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/register");
			then.status(200);
		})
		.await;
	let err = gateway
		.register(&RegisterRequest::new("ada@example.com", "123", "Ada Lovelace"))
		.await
		.expect_err("Short passwords should be rejected locally.");

	assert!(matches!(
		err,
		Error::Validation(ValidationError::PasswordLength { min: 6, max: 100 })
	));

	register.assert_calls_async(0).await;
}

#[tokio::test]
async fn register_and_login_chains_both_calls() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());
	let register = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/register").json_body(json!({
				"email": "ada@example.com",
				"password": "secret1",
				"fullName": "Ada Lovelace"
			}));
			then.status(201)
				.header("content-type", "application/json")
				.body(r#"{"message":"User registered"}"#);
		})
		.await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"jwtResponse": { "accessToken": ACCESS_JWT, "refreshToken": "refresh-1" },
				"role": []
			}));
		})
		.await;
	let request = RegisterRequest::new("ada@example.com", "secret1", "Ada Lovelace");

	assert_eq!(
		gateway.register(&request).await.expect("Registration should succeed.").message,
		"User registered"
	);

	let identity =
		gateway.register_and_login(&request).await.expect("Register and login should succeed.");

	register.assert_calls_async(2).await;
	login.assert_async().await;

	assert_eq!(identity.name, "Ada Lovelace");
	assert!(!store.snapshot().credentials.is_empty());
}

#[tokio::test]
async fn logout_clears_the_session_even_when_the_server_fails() {
	let server = MockServer::start_async().await;
	let (gateway, store) = build_reqwest_test_gateway(&server.base_url());

	seed_tokens(&store, ACCESS_JWT, "refresh-1", &["ROLE_USER"]).await;

	let logout = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/auth/logout")
				.json_body(json!({ "refreshToken": "refresh-1" }));
			then.status(500).body("boom");
		})
		.await;

	gateway.logout().await.expect("Logout should always clear the local session.");

	logout.assert_async().await;

	assert!(store.snapshot().credentials.is_empty());
	assert_eq!(gateway.current_identity().await.expect("Identity lookup should succeed."), None);

	let err = gateway.list_projects().await.expect_err("Logged-out calls should be rejected.");

	assert!(matches!(err, Error::Unauthenticated { .. }));
}
