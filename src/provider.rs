//! Identity-provider contracts (data, behavior, and the login surface) plus the Azure AD
//! implementation.
//!
//! `descriptor` exposes the validated authority metadata (`AuthorityDescriptor`), `strategy`
//! defines [`ProviderStrategy`] which classifies token-endpoint and downstream failures into the
//! broker taxonomy, and `aad` implements [`IdentityProvider`] against an Azure AD v1 authority.

pub mod aad;
pub mod descriptor;
pub mod strategy;

pub use aad::*;
pub use descriptor::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	auth::{Resource, TenantId, TokenRecord},
};

/// Boxed future returned by provider and login-surface calls.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Prompt behavior requested from the identity provider during interactive login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
	/// Reuse an existing provider session without showing UI when possible.
	AttemptNone,
	/// Force the account picker / credential prompt.
	Login,
	/// Re-establish an expired provider session.
	RefreshSession,
}
impl PromptMode {
	/// Returns the provider's `prompt` parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			PromptMode::AttemptNone => "attempt_none",
			PromptMode::Login => "login",
			PromptMode::RefreshSession => "refresh_session",
		}
	}
}
impl Display for PromptMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parameters of one interactive login attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractiveRequest {
	/// Tenant to authenticate against.
	pub tenant: TenantId,
	/// Resource the token should be issued for.
	pub resource: Resource,
	/// Caption shown by the login surface.
	pub title: String,
	/// Prompt behavior for this attempt.
	pub prompt: PromptMode,
}
impl InteractiveRequest {
	/// Creates a request for the provided tenant, resource, title, and prompt.
	pub fn new(
		tenant: TenantId,
		resource: Resource,
		title: impl Into<String>,
		prompt: PromptMode,
	) -> Self {
		Self { tenant, resource, title: title.into(), prompt }
	}

	/// Returns a copy with a different prompt mode.
	pub fn with_prompt(&self, prompt: PromptMode) -> Self {
		Self { prompt, ..self.clone() }
	}
}

/// Identity-provider client consumed by the broker.
///
/// Implementations classify failures before returning them: `invalid_grant` style rejections
/// become [`crate::error::AuthenticationError::GrantRejected`], missing provider sessions
/// become [`crate::error::AuthenticationError::InteractionRequired`], and so on. The owner
/// recorded in each returned [`TokenRecord`] must be the principal the provider authenticated.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Performs an interactive login (UI + token exchange).
	fn acquire_interactive<'a>(
		&'a self,
		request: &'a InteractiveRequest,
	) -> ProviderFuture<'a, TokenRecord>;

	/// Redeems the refresh token carried by `refresh_record` for a token scoped to `resource`.
	fn acquire_by_refresh_token<'a>(
		&'a self,
		refresh_record: &'a TokenRecord,
		tenant: &'a TenantId,
		resource: &'a Resource,
	) -> ProviderFuture<'a, TokenRecord>;
}

/// Login prompt handed to a [`LoginSurface`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginPrompt {
	/// Caption for the window or browser tab.
	pub title: String,
	/// Authorize URL the user must visit.
	pub authorize_url: Url,
	/// Redirect URI the provider will send the user back to.
	pub redirect_uri: Url,
}

/// UI surface (browser, webview, device prompt) that drives the interactive login.
///
/// The call resolves once the provider redirected back; the returned URL is the full redirect
/// including its query string.
pub trait LoginSurface
where
	Self: Send + Sync,
{
	/// Shows the login prompt and resolves with the redirect URL.
	fn open<'a>(&'a self, prompt: &'a LoginPrompt) -> ProviderFuture<'a, Url>;
}
