#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::prelude::*;
use parking_lot::Mutex;
use time::Duration;
use url::Url;
// self
use credential_broker::{
	TokenBroker,
	auth::{Identity, Resource, TenantId, TokenRecord},
	config::BrokerConfig,
	error::{AuthenticationError, Error, TransientError},
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	provider::{
		AadProvider, AuthorityDescriptor, IdentityProvider, InteractiveRequest, LoginPrompt,
		LoginSurface, PromptMode, ProviderFuture, ReqwestAadProvider,
	},
	reqwest::Client,
};

/// Completes every login by echoing the session state back with a fixed code.
#[derive(Default)]
struct AutoApproveSurface {
	prompts: Mutex<Vec<LoginPrompt>>,
}
impl LoginSurface for AutoApproveSurface {
	fn open<'a>(&'a self, prompt: &'a LoginPrompt) -> ProviderFuture<'a, Url> {
		self.prompts.lock().push(prompt.clone());

		Box::pin(async move {
			let state = prompt
				.authorize_url
				.query_pairs()
				.find(|(key, _)| key == "state")
				.map(|(_, value)| value.into_owned())
				.expect("Authorize URL should carry a state.");

			Ok(Url::parse(&format!("{}?code=auth-code&state={state}", prompt.redirect_uri))
				.expect("Redirect should parse."))
		})
	}
}

fn descriptor(server: &MockServer) -> AuthorityDescriptor {
	AuthorityDescriptor::builder(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
		.client_id("demo-client")
		.redirect_uri(Url::parse("http://localhost/callback").expect("Redirect should parse."))
		.build()
		.expect("Loopback descriptor should build.")
}

// httpmock serves https with a self-signed certificate.
fn insecure_client() -> Client {
	Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Insecure reqwest client should build.")
}

fn provider(server: &MockServer, surface: Arc<AutoApproveSurface>) -> ReqwestAadProvider {
	AadProvider::with_http_client(
		descriptor(server),
		surface,
		ReqwestHttpClient::with_client(insecure_client()),
		ReqwestTransportErrorMapper,
	)
}

fn id_token(tid: &str, unique_name: &str) -> String {
	format!(
		"{}.{}.",
		URL_SAFE_NO_PAD.encode("{\"alg\":\"none\"}"),
		URL_SAFE_NO_PAD.encode(format!("{{\"tid\":\"{tid}\",\"unique_name\":\"{unique_name}\"}}"))
	)
}

fn alice() -> Identity {
	Identity::parse("contoso", "alice@contoso.com").expect("Identity fixture should be valid.")
}

fn graph() -> Resource {
	Resource::new("https://graph.windows.net/").expect("Resource fixture should be valid.")
}

fn refresh_source(resource: &Resource) -> TokenRecord {
	TokenRecord::builder(alice(), resource.clone())
		.access_token("old-at")
		.refresh_token("rt-old")
		.expires_in(Duration::minutes(5))
		.build()
		.expect("Refresh source should build.")
}

#[tokio::test]
async fn refresh_sends_resource_and_keeps_unrotated_refresh_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/contoso/oauth2/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "rt-old")
				.form_urlencoded_tuple("resource", "https://graph.windows.net/")
				.form_urlencoded_tuple("client_id", "demo-client");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"graph-at\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let provider = provider(&server, Arc::new(AutoApproveSurface::default()));
	let management =
		Resource::new("https://management.core.windows.net/").expect("Resource should be valid.");
	let record = provider
		.acquire_by_refresh_token(&refresh_source(&management), &alice().tenant, &graph())
		.await
		.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(record.owner, alice());
	assert_eq!(record.resource, graph());
	assert_eq!(record.access_token.expose(), "graph-at");
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-old"));
}

#[tokio::test]
async fn invalid_grant_is_classified_as_grant_rejection() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/contoso/oauth2/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"AADSTS70008: The refresh token has expired.\"}",
			);
		})
		.await;
	let provider = provider(&server, Arc::new(AutoApproveSurface::default()));
	let err = provider
		.acquire_by_refresh_token(&refresh_source(&graph()), &alice().tenant, &graph())
		.await
		.expect_err("Expired refresh tokens must fail.");

	mock.assert_async().await;

	assert!(err.is_grant_rejected(), "Unexpected error: {err:?}.");
}

#[tokio::test]
async fn unavailable_token_endpoint_is_transient() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/contoso/oauth2/token");
			then.status(503).header("retry-after", "30").body("Service Unavailable");
		})
		.await;
	let provider = provider(&server, Arc::new(AutoApproveSurface::default()));
	let err = provider
		.acquire_by_refresh_token(&refresh_source(&graph()), &alice().tenant, &graph())
		.await
		.expect_err("Outages must fail.");

	mock.assert_async().await;

	assert!(
		matches!(
			err,
			Error::AuthenticationFailed(AuthenticationError::Transient(
				TransientError::TokenEndpoint { status: Some(503), .. }
			))
		),
		"Unexpected error: {err:?}."
	);
}

#[tokio::test]
async fn interactive_login_redeems_code_with_pkce() {
	let server = MockServer::start_async().await;
	let body = format!(
		"{{\"access_token\":\"login-at\",\"token_type\":\"bearer\",\"expires_in\":3600,\"refresh_token\":\"rt-new\",\"id_token\":\"{}\"}}",
		id_token("contoso", "alice@contoso.com")
	);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/contoso/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "auth-code")
				.form_urlencoded_tuple("redirect_uri", "http://localhost/callback")
				.form_urlencoded_tuple("resource", "https://graph.windows.net/")
				.form_urlencoded_tuple_exists("code_verifier");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await;
	let surface = Arc::new(AutoApproveSurface::default());
	let provider = provider(&server, surface.clone());
	let request = InteractiveRequest::new(
		TenantId::new("contoso").expect("Tenant should be valid."),
		graph(),
		"Sign in to Azure",
		PromptMode::AttemptNone,
	);
	let record = provider.acquire_interactive(&request).await.expect("Login should succeed.");

	mock.assert_async().await;

	assert_eq!(record.owner, alice());
	assert_eq!(record.refresh_token.as_ref().map(|secret| secret.expose()), Some("rt-new"));

	let prompts = surface.prompts.lock().clone();

	assert_eq!(prompts.len(), 1);
	assert_eq!(prompts[0].title, "Sign in to Azure");
	assert!(prompts[0].authorize_url.path().ends_with("/contoso/oauth2/authorize"));
	assert!(
		prompts[0]
			.authorize_url
			.query_pairs()
			.any(|(key, value)| key == "prompt" && value == "attempt_none")
	);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broker_refreshes_a_new_resource_over_http_once() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/contoso/oauth2/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("resource", "https://graph.windows.net/");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(50))
				.body(
					"{\"access_token\":\"graph-at\",\"token_type\":\"bearer\",\"expires_in\":3600,\"refresh_token\":\"rt-rotated\"}",
				);
		})
		.await;
	let provider: Arc<dyn IdentityProvider> =
		Arc::new(provider(&server, Arc::new(AutoApproveSurface::default())));
	let broker = Arc::new(TokenBroker::new(provider, BrokerConfig::default()));
	let management =
		Resource::new("https://management.core.windows.net/").expect("Resource should be valid.");

	broker.cache().put(&alice(), &management, refresh_source(&management));

	let tasks = (0..5)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move {
				broker
					.request(&alice(), &graph(), "Sign in", |token| async move { Ok::<_, Error>(token) })
					.await
			})
		})
		.collect::<Vec<_>>();

	for task in tasks {
		assert_eq!(
			task.await.expect("Task should not panic.").expect("Request should succeed."),
			"graph-at"
		);
	}

	mock.assert_calls_async(1).await;

	assert_eq!(
		broker
			.cache()
			.refresh_record(&alice())
			.and_then(|record| record.refresh_token)
			.map(|secret| secret.expose().to_owned())
			.as_deref(),
		Some("rt-rotated")
	);
}
