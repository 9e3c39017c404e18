//! Demonstrates the full broker stack against a mocked Azure AD authority and resource API.
//!
//! 1. `authenticate` drives an interactive login through a [`LoginSurface`] that approves
//!    immediately and echoes the session state back.
//! 2. The resource API rejects the first token with HTTP 401, so [`RequestExecutor`] runs one
//!    fallback cycle; the cached refresh token is redeemed and the call is retried once.
//! 3. The cache is written through to a [`MemorySettingsStore`] and hydrated into a second broker.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use credential_broker::{
	RequestExecutor, TokenBroker,
	auth::{Resource, TenantId},
	config::BrokerConfig,
	error::Error,
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	provider::{
		AadProvider, AuthorityDescriptor, DefaultProviderStrategy, IdentityProvider, LoginPrompt,
		LoginSurface, ProviderFuture, ReqwestAadProvider, ResourceErrorContext,
	},
	reqwest::{Client, StatusCode},
	store::MemorySettingsStore,
};

struct AutoApprove;
impl LoginSurface for AutoApprove {
	fn open<'a>(&'a self, prompt: &'a LoginPrompt) -> ProviderFuture<'a, Url> {
		Box::pin(async move {
			let state = prompt
				.authorize_url
				.query_pairs()
				.find(|(key, _)| key == "state")
				.map(|(_, value)| value.into_owned())
				.ok_or_else(|| Error::invalid_credentials("authorize URL carries no state"))?;
			let mut redirect = prompt.redirect_uri.clone();

			redirect.query_pairs_mut().append_pair("code", "demo-code").append_pair("state", &state);

			println!("{}: approved {}.", prompt.title, prompt.authorize_url.path());

			Ok(redirect)
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let id_token = format!(
		"{}.{}.",
		URL_SAFE_NO_PAD.encode("{\"alg\":\"none\"}"),
		URL_SAFE_NO_PAD.encode("{\"tid\":\"contoso\",\"unique_name\":\"alice@contoso.com\"}")
	);
	let login_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/contoso/oauth2/token")
				.form_urlencoded_tuple("grant_type", "authorization_code");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"access_token\":\"stale-at\",\"token_type\":\"bearer\",\"expires_in\":3600,\"refresh_token\":\"demo-rt\",\"id_token\":\"{id_token}\"}}"
			));
		})
		.await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/contoso/oauth2/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "demo-rt");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"fresh-at\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let rejected_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/subscriptions").header("authorization", "Bearer stale-at");
			then.status(401).body("{\"error\":{\"code\":\"ExpiredAuthenticationToken\"}}");
		})
		.await;
	let accepted_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/subscriptions").header("authorization", "Bearer fresh-at");
			then.status(200).body("[\"demo-subscription\"]");
		})
		.await;
	let descriptor = AuthorityDescriptor::builder(Url::parse(&server.base_url())?)
		.client_id("demo-client")
		.redirect_uri(Url::parse("http://localhost/callback")?)
		.build()?;
	// httpmock serves https with a self-signed certificate.
	let http = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;
	let aad: ReqwestAadProvider = AadProvider::with_http_client(
		descriptor,
		Arc::new(AutoApprove),
		ReqwestHttpClient::with_client(http.clone()),
		ReqwestTransportErrorMapper,
	);
	let provider: Arc<dyn IdentityProvider> = Arc::new(aad);
	let store = MemorySettingsStore::default();
	let config = BrokerConfig::default().with_default_tenant(TenantId::new("contoso")?);
	let broker = Arc::new(
		TokenBroker::new(provider.clone(), config.clone())
			.with_settings_store(Arc::new(store.clone())),
	);
	let resource = Resource::new("https://management.core.windows.net/")?;
	let identity = broker.authenticate(&resource, "Sign in to the demo").await?;

	println!("Authenticated {identity}.");

	let executor = RequestExecutor::new(broker.clone());
	let url = server.url("/subscriptions");
	let body = executor
		.execute_async(&identity, &resource, "Sign in to the demo", |token| {
			let request = http.get(&url).bearer_auth(token);

			async move {
				let response = request.send().await.map_err(Error::operation)?;

				if response.status() == StatusCode::UNAUTHORIZED {
					return Err(Error::from_resource_failure(
						&DefaultProviderStrategy,
						ResourceErrorContext::new().with_http_status(401),
					));
				}

				response.text().await.map_err(Error::operation)
			}
		})
		.await?;

	println!("Resource API answered: {body}.");
	println!(
		"Fallback cycles: {}, refresh exchanges: {}.",
		broker.metrics().fallback_cycles(),
		broker.metrics().refresh_exchanges()
	);

	let hydrated = TokenBroker::new(provider, config).with_settings_store(Arc::new(store));

	println!("Hydrated broker holds {} cached token(s).", hydrated.cache().len());

	login_mock.assert_async().await;
	refresh_mock.assert_async().await;
	rejected_mock.assert_async().await;
	accepted_mock.assert_async().await;

	Ok(())
}
