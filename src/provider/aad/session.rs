//! Authorization-code session state: PKCE verifier, CSRF `state` and the authorize URL, plus
//! validation of the redirect that completes the login.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Resource, TenantId},
	error::AuthenticationError,
	provider::PromptMode,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Authorization code + PKCE handshake for one interactive login attempt.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Tenant the login targets.
	pub tenant: TenantId,
	/// Resource the code will be redeemed for.
	pub resource: Resource,
	/// Prompt behavior encoded into the authorize URL.
	pub prompt: PromptMode,
	/// Opaque state value that must round-trip via the redirect.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Fully formed authorize URL the login surface must open.
	pub authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// Generates state + PKCE material and builds the authorize URL.
	pub fn start(
		authorize_endpoint: Url,
		client_id: &str,
		redirect_uri: Url,
		tenant: TenantId,
		resource: Resource,
		prompt: PromptMode,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let authorize_url = build_authorize_url(
			authorize_endpoint,
			client_id,
			&redirect_uri,
			&resource,
			prompt,
			&state,
			&pkce,
		);

		Self { tenant, resource, prompt, state, redirect_uri, authorize_url, pkce }
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// Validates the redirect produced by the login surface and extracts the authorization code.
	pub fn authorization_code(&self, redirect: &Url) -> Result<String> {
		let pairs = redirect.query_pairs().into_owned().collect::<HashMap<_, _>>();

		if let Some(error) = pairs.get("error") {
			let description = pairs.get("error_description").map(String::as_str).unwrap_or(error.as_str());

			return Err(classify_redirect_error(error, description).into());
		}
		if pairs.get("state").map(String::as_str) != Some(self.state.as_str()) {
			return Err(AuthenticationError::Rejected {
				reason: "Authorization state mismatch".into(),
				status: None,
			}
			.into());
		}

		pairs
			.get("code")
			.filter(|code| !code.is_empty())
			.cloned()
			.ok_or_else(|| Error::invalid_credentials("redirect carried no authorization code"))
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("tenant", &self.tenant)
			.field("resource", &self.resource)
			.field("prompt", &self.prompt)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

fn build_authorize_url(
	mut url: Url,
	client_id: &str,
	redirect_uri: &Url,
	resource: &Resource,
	prompt: PromptMode,
	state: &str,
	pkce: &PkcePair,
) -> Url {
	url.query_pairs_mut()
		.append_pair("response_type", "code")
		.append_pair("client_id", client_id)
		.append_pair("redirect_uri", redirect_uri.as_str())
		.append_pair("resource", resource)
		.append_pair("prompt", prompt.as_str())
		.append_pair("state", state)
		.append_pair("code_challenge", &pkce.challenge)
		.append_pair("code_challenge_method", pkce.method.as_str());

	url
}

fn classify_redirect_error(error: &str, description: &str) -> AuthenticationError {
	let reason = format!("{error}: {description}");

	match error {
		"interaction_required" | "login_required" | "consent_required" | "account_selection_required" =>
			AuthenticationError::InteractionRequired { reason },
		_ => AuthenticationError::Rejected { reason, status: None },
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}
