//! Azure AD v1 identity provider built on the `oauth2` client.
//!
//! Interactive logins run the authorization-code + PKCE handshake through a [`LoginSurface`];
//! refreshes redeem the refresh token carried by a record. Both exchanges send the AAD
//! `resource` parameter and derive the token owner from the returned `id_token`.

pub mod claims;
pub mod session;

pub use claims::*;
pub use session::*;

// std
use std::collections::BTreeMap;
// crates.io
use oauth2::{
	AuthorizationCode, Client, ClientId, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};
use crate::{
	_prelude::*,
	auth::{Identity, Resource, TenantId, TokenRecord, TokenSecret},
	error::{AuthenticationError, ConfigError, TransientError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient, TransportErrorMapper},
	obs::flow_event,
	provider::{
		AuthorityDescriptor, DefaultProviderStrategy, IdentityProvider, InteractiveRequest,
		LoginPrompt, LoginSurface, PromptMode, ProviderErrorContext, ProviderErrorKind,
		ProviderFuture, ProviderStrategy, TokenGrant,
	},
};

/// Extra token-response fields returned by Azure AD.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AadTokenFields {
	/// OpenID Connect `id_token` describing the authenticated principal.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for AadTokenFields {}

/// Token response shape used for every Azure AD exchange.
pub type AadTokenResponse = StandardTokenResponse<AadTokenFields, BasicTokenType>;

type AadClient = Client<
	BasicErrorResponse,
	AadTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// [`AadProvider`] wired to the reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestAadProvider = AadProvider<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Azure AD public-client provider.
///
/// The provider is stateless across calls: every exchange builds its own `oauth2` client for
/// the tenant at hand, so one instance serves any number of tenants and identities.
pub struct AadProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	descriptor: AuthorityDescriptor,
	strategy: Arc<dyn ProviderStrategy>,
	surface: Arc<dyn LoginSurface>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
#[cfg(feature = "reqwest")]
impl AadProvider<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a provider backed by a fresh reqwest client and the default strategy.
	pub fn new(descriptor: AuthorityDescriptor, surface: Arc<dyn LoginSurface>) -> Result<Self> {
		Ok(Self::with_http_client(
			descriptor,
			surface,
			ReqwestHttpClient::new()?,
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> AadProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a provider that uses a caller-supplied transport and error mapper.
	pub fn with_http_client(
		descriptor: AuthorityDescriptor,
		surface: Arc<dyn LoginSurface>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			surface,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		}
	}

	/// Replaces the error-classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Returns the authority descriptor.
	pub fn descriptor(&self) -> &AuthorityDescriptor {
		&self.descriptor
	}

	/// Prepares the authorize URL, state, and PKCE material for one login attempt.
	pub fn start_session(
		&self,
		tenant: &TenantId,
		resource: &Resource,
		prompt: PromptMode,
	) -> Result<AuthorizationSession> {
		let authorize_endpoint = self.descriptor.authorize_endpoint(tenant)?;

		Ok(AuthorizationSession::start(
			authorize_endpoint,
			&self.descriptor.client_id,
			self.descriptor.redirect_uri.clone(),
			tenant.clone(),
			resource.clone(),
			prompt,
		))
	}

	/// Redeems an authorization code obtained through `session`.
	pub async fn exchange_code(
		&self,
		session: &AuthorizationSession,
		code: &str,
	) -> Result<TokenRecord> {
		let grant = TokenGrant::AuthorizationCode;
		let client = self.client_for(&session.tenant)?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let mut request = client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(session.pkce_verifier().to_owned()));

		for (key, value) in self.extra_params(grant, &session.resource) {
			request = request.add_extra_param(key, value);
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|e| self.map_request_error(grant, meta.take(), e))?;

		map_token_response(&session.resource, None, None, response)
	}

	/// Redeems the refresh token in `refresh_record` for a token scoped to `resource`.
	///
	/// When the response omits an `id_token` the owner of `refresh_record` is kept, and when it
	/// omits a refresh token the previous one stays valid.
	pub async fn refresh(
		&self,
		refresh_record: &TokenRecord,
		tenant: &TenantId,
		resource: &Resource,
	) -> Result<TokenRecord> {
		let grant = TokenGrant::RefreshToken;
		let previous = refresh_record
			.refresh_token
			.as_ref()
			.filter(|secret| !secret.is_blank())
			.ok_or_else(|| Error::invalid_credentials("record carries no refresh token"))?;
		let client = self.client_for(tenant)?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_token = RefreshToken::new(previous.expose().to_owned());
		let mut request = client.exchange_refresh_token(&refresh_token);

		for (key, value) in self.extra_params(grant, resource) {
			request = request.add_extra_param(key, value);
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|e| self.map_request_error(grant, meta.take(), e))?;

		map_token_response(resource, Some(&refresh_record.owner), Some(previous), response)
	}

	async fn interactive(&self, request: &InteractiveRequest) -> Result<TokenRecord> {
		let session = self.start_session(&request.tenant, &request.resource, request.prompt)?;
		let prompt = LoginPrompt {
			title: request.title.clone(),
			authorize_url: session.authorize_url.clone(),
			redirect_uri: session.redirect_uri.clone(),
		};

		flow_event!(
			debug,
			tenant = %request.tenant,
			resource = %request.resource,
			prompt = %request.prompt,
			"Opening login surface."
		);

		let redirect = self.surface.open(&prompt).await?;
		let code = session.authorization_code(&redirect)?;

		self.exchange_code(&session, &code).await
	}

	fn client_for(&self, tenant: &TenantId) -> Result<AadClient> {
		let token_url = TokenUrl::new(self.descriptor.token_endpoint(tenant)?.to_string())
			.map_err(|source| ConfigError::InvalidAuthority { source })?;
		let redirect_url = RedirectUrl::new(self.descriptor.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;

		Ok(Client::new(ClientId::new(self.descriptor.client_id.clone()))
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url))
	}

	fn extra_params(&self, grant: TokenGrant, resource: &Resource) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(grant, &mut form);
		form.insert("resource".into(), resource.to_string());

		form
	}

	fn map_request_error(
		&self,
		grant: TokenGrant,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Error {
		let meta_ref = meta.as_ref();
		let status = meta_ref.and_then(|m| m.status);
		let error = match err {
			RequestTokenError::ServerResponse(response) => {
				let mut ctx = ProviderErrorContext::new(grant)
					.with_oauth_error(response.error().as_ref().to_owned());

				if let Some(description) = response.error_description() {
					ctx = ctx.with_error_description(description.clone());
				}
				if let Some(status) = status {
					ctx = ctx.with_http_status(status);
				}

				let message = response
					.error_description()
					.cloned()
					.unwrap_or_else(|| response.error().as_ref().to_owned());

				classified(self.strategy.classify_token_error(&ctx), message, meta_ref)
			},
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error(grant, meta_ref, error),
			RequestTokenError::Parse(source, body) => match status {
				Some(code) if code >= 400 => {
					let ctx = ProviderErrorContext::new(grant)
						.with_http_status(code)
						.with_body_preview(String::from_utf8_lossy(&body));
					let message = format!("{grant} failed with HTTP {code}");

					classified(self.strategy.classify_token_error(&ctx), message, meta_ref)
				},
				_ => AuthenticationError::from(TransientError::TokenResponseParse { source, status })
					.into(),
			},
			RequestTokenError::Other(message) => transient(message, meta_ref),
		};

		flow_event!(warn, grant = %grant, status = ?status, error = %error, "Token exchange failed.");

		error
	}
}
impl<C, M> IdentityProvider for AadProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn acquire_interactive<'a>(
		&'a self,
		request: &'a InteractiveRequest,
	) -> ProviderFuture<'a, TokenRecord> {
		Box::pin(self.interactive(request))
	}

	fn acquire_by_refresh_token<'a>(
		&'a self,
		refresh_record: &'a TokenRecord,
		tenant: &'a TenantId,
		resource: &'a Resource,
	) -> ProviderFuture<'a, TokenRecord> {
		Box::pin(self.refresh(refresh_record, tenant, resource))
	}
}
impl<C, M> Debug for AadProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AadProvider").field("descriptor", &self.descriptor).finish_non_exhaustive()
	}
}

fn classified(kind: ProviderErrorKind, reason: String, meta: Option<&ResponseMetadata>) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => AuthenticationError::GrantRejected { reason }.into(),
		ProviderErrorKind::InteractionRequired =>
			AuthenticationError::InteractionRequired { reason }.into(),
		ProviderErrorKind::Rejected =>
			AuthenticationError::Rejected { reason, status: meta.and_then(|m| m.status) }.into(),
		ProviderErrorKind::Transient => transient(reason, meta),
	}
}

fn transient(message: String, meta: Option<&ResponseMetadata>) -> Error {
	AuthenticationError::from(TransientError::TokenEndpoint {
		message,
		status: meta.and_then(|m| m.status),
		retry_after: meta.and_then(|m| m.retry_after),
	})
	.into()
}

fn map_token_response(
	resource: &Resource,
	fallback_owner: Option<&Identity>,
	previous_refresh: Option<&TokenSecret>,
	response: AadTokenResponse,
) -> Result<TokenRecord> {
	let expires_in = response
		.expires_in()
		.map(|d| d.as_secs())
		.filter(|secs| *secs > 0)
		.ok_or_else(|| Error::invalid_credentials("token response has no positive expires_in"))?;
	let expires_in = i64::try_from(expires_in)
		.map_err(|_| Error::invalid_credentials("token response expires_in is out of range"))?;
	let owner = match (&response.extra_fields().id_token, fallback_owner) {
		(Some(id_token), _) => IdTokenClaims::decode(id_token)?.identity()?,
		(None, Some(owner)) => owner.clone(),
		(None, None) => return Err(Error::invalid_credentials("token response has no id_token")),
	};
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or_else(|| Error::invalid_credentials("token response expires_in is out of range"))?;
	let mut builder = TokenRecord::builder(owner, resource.clone())
		.access_token(response.access_token().secret().to_owned())
		.issued_at(issued_at)
		.expires_at(expires_at);
	let refresh = response
		.refresh_token()
		.map(|token| token.secret().to_owned())
		.or_else(|| previous_refresh.map(|secret| secret.expose().to_owned()));

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().map_err(|e| ConfigError::from(e).into())
}
