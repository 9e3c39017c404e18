//! Provider strategy hooks that customize token exchanges and classify failures.
//!
//! Implementations decorate outgoing token requests and normalize error mapping without tying
//! the provider to any particular HTTP client.

// std
use std::collections::BTreeMap;
// self
use crate::_prelude::*;

/// Downstream error codes that signal a stale or invalid access token.
pub const AUTHORIZATION_EXPIRED_CODES: &[&str] = &[
	"Authentication_ExpiredToken",
	"AuthenticationFailed",
	"InvalidAuthenticationToken",
	"ExpiredAuthenticationToken",
];

/// Grants issued against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenGrant {
	/// Authorization code redeemed after an interactive login.
	AuthorizationCode,
	/// Refresh token redemption.
	RefreshToken,
}
impl TokenGrant {
	/// Returns the OAuth `grant_type` value.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenGrant::AuthorizationCode => "authorization_code",
			TokenGrant::RefreshToken => "refresh_token",
		}
	}
}
impl Display for TokenGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy hook that allows providers to decorate requests and classify errors.
///
/// Implementors must be `Send + Sync`. The hooks use crate-owned data types so downstream
/// crates never depend on reqwest-specific structures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps token-endpoint failures into provider error categories.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Maps a downstream resource failure into an authorization-class signal or not.
	///
	/// The default treats HTTP 401 and the [`AUTHORIZATION_EXPIRED_CODES`] as stale tokens.
	fn classify_resource_error(&self, ctx: &ResourceErrorContext) -> ResourceErrorKind {
		if ctx.http_status == Some(401) {
			return ResourceErrorKind::AuthorizationExpired;
		}

		match ctx.error_code.as_deref() {
			Some(code) if AUTHORIZATION_EXPIRED_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)) =>
				ResourceErrorKind::AuthorizationExpired,
			_ => ResourceErrorKind::Other,
		}
	}

	/// Gives providers a chance to add custom form parameters before dispatching.
	///
	/// The default does nothing; the provider already sends `resource` itself.
	fn augment_token_request(&self, _grant: TokenGrant, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the authorization grant (bad code/refresh token).
	InvalidGrant,
	/// Provider needs the user to interact (no session, MFA, consent).
	InteractionRequired,
	/// Client or user was refused for another reason.
	Rejected,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Classification of a downstream resource failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceErrorKind {
	/// The access token is no longer accepted.
	AuthorizationExpired,
	/// Any other failure; surfaced unchanged.
	Other,
}

/// Context passed to provider strategies when classifying token errors.
///
/// Only primitive data (status codes, OAuth fields, body preview) is kept so strategies stay
/// decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant associated with the failing request.
	pub grant: TokenGrant,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided grant.
	pub fn new(grant: TokenGrant) -> Self {
		Self {
			grant,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(grant: TokenGrant) -> Self {
		let mut ctx = Self::new(grant);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Downstream failure details supplied by domain clients.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceErrorContext {
	/// HTTP status code returned by the resource API.
	pub http_status: Option<u16>,
	/// Service-specific error code (for example `InvalidAuthenticationToken`).
	pub error_code: Option<String>,
	/// Human-readable message returned by the service.
	pub message: Option<String>,
}
impl ResourceErrorContext {
	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds the HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the service-specific error code.
	pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
		self.error_code = Some(code.into());

		self
	}

	/// Adds the service message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// One-line description combining status, code, and message.
	pub fn summary(&self) -> String {
		let mut parts = Vec::with_capacity(3);

		if let Some(status) = self.http_status {
			parts.push(format!("HTTP {status}"));
		}
		if let Some(code) = &self.error_code {
			parts.push(code.clone());
		}
		if let Some(message) = &self.message {
			parts.push(message.clone());
		}

		if parts.is_empty() { "unspecified resource failure".into() } else { parts.join(": ") }
	}
}

/// Default strategy tuned for Azure AD v1 authorities.
///
/// It prioritizes structured OAuth fields (`error`, `error_description`), then falls back to
/// body text hints (including `AADSTS` codes), and finally the HTTP status code. Network
/// failures are always treated as transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(ProviderErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	// AADSTS codes in the description are more specific than the generic `error` field.
	classify_body(error_description)
		.or_else(|| oauth_error.and_then(match_exact_value))
		.or_else(|| error_description.and_then(match_exact_value))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	const GRANT: &[&str] = &["invalid_grant"];
	const INTERACTION: &[&str] = &["interaction_required", "login_required", "consent_required"];
	const REJECTED: &[&str] =
		&["invalid_client", "unauthorized_client", "access_denied", "invalid_resource"];
	const TRANSIENT: &[&str] = &["temporarily_unavailable", "server_error"];

	let matches = |set: &[&str]| set.iter().any(|v| value.eq_ignore_ascii_case(v));

	if matches(GRANT) {
		Some(ProviderErrorKind::InvalidGrant)
	} else if matches(INTERACTION) {
		Some(ProviderErrorKind::InteractionRequired)
	} else if matches(REJECTED) {
		Some(ProviderErrorKind::Rejected)
	} else if matches(TRANSIENT) {
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let lowered = body?.to_ascii_lowercase();

	match lowered.as_str() {
		// AADSTS50076/50079: MFA required. AADSTS65001: consent required.
		text if text.contains("aadsts50076")
			|| text.contains("aadsts50079")
			|| text.contains("aadsts65001") =>
			Some(ProviderErrorKind::InteractionRequired),
		// AADSTS70008/700082: refresh token expired. AADSTS50173: grant revoked.
		text if text.contains("aadsts70008") || text.contains("aadsts50173") =>
			Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("interaction_required") =>
			Some(ProviderErrorKind::InteractionRequired),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::Rejected),
		text if text.contains("temporarily_unavailable") => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401 | 403) => ProviderErrorKind::Rejected,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_fields_drive_classification() {
		let strategy = DefaultProviderStrategy;
		let cases = [
			("invalid_grant", ProviderErrorKind::InvalidGrant),
			("login_required", ProviderErrorKind::InteractionRequired),
			("consent_required", ProviderErrorKind::InteractionRequired),
			("unauthorized_client", ProviderErrorKind::Rejected),
			("temporarily_unavailable", ProviderErrorKind::Transient),
		];

		for (error, expected) in cases {
			let ctx = ProviderErrorContext::new(TokenGrant::RefreshToken).with_oauth_error(error);

			assert_eq!(strategy.classify_token_error(&ctx), expected, "{error}");
		}
	}

	#[test]
	fn aadsts_codes_override_generic_errors() {
		let ctx = ProviderErrorContext::new(TokenGrant::RefreshToken)
			.with_oauth_error("invalid_grant")
			.with_error_description("AADSTS50076: you must use multi-factor authentication");

		assert_eq!(
			DefaultProviderStrategy.classify_token_error(&ctx),
			ProviderErrorKind::InteractionRequired
		);
	}

	#[test]
	fn status_and_network_fallbacks() {
		let strategy = DefaultProviderStrategy;

		assert_eq!(
			strategy.classify_token_error(
				&ProviderErrorContext::new(TokenGrant::AuthorizationCode).with_http_status(400)
			),
			ProviderErrorKind::InvalidGrant
		);
		assert_eq!(
			strategy.classify_token_error(
				&ProviderErrorContext::new(TokenGrant::AuthorizationCode).with_http_status(503)
			),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			strategy
				.classify_token_error(&ProviderErrorContext::network_failure(TokenGrant::RefreshToken)),
			ProviderErrorKind::Transient
		);
	}

	#[test]
	fn body_preview_is_truncated() {
		let ctx = ProviderErrorContext::new(TokenGrant::RefreshToken).with_body_preview("x".repeat(300));
		let preview = ctx.body_preview.expect("Preview should be recorded.");

		assert_eq!(preview.chars().count(), ProviderErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}

	#[test]
	fn resource_errors_use_status_and_codes() {
		let strategy = DefaultProviderStrategy;

		assert_eq!(
			strategy.classify_resource_error(&ResourceErrorContext::new().with_http_status(401)),
			ResourceErrorKind::AuthorizationExpired
		);
		assert_eq!(
			strategy.classify_resource_error(
				&ResourceErrorContext::new()
					.with_http_status(403)
					.with_error_code("ExpiredAuthenticationToken")
			),
			ResourceErrorKind::AuthorizationExpired
		);
		assert_eq!(
			strategy.classify_resource_error(
				&ResourceErrorContext::new().with_http_status(404).with_error_code("NotFound")
			),
			ResourceErrorKind::Other
		);
	}

	#[test]
	fn summaries_join_available_parts() {
		let ctx = ResourceErrorContext::new()
			.with_http_status(401)
			.with_error_code("InvalidAuthenticationToken")
			.with_message("Access token has expired.");

		assert_eq!(
			ctx.summary(),
			"HTTP 401: InvalidAuthenticationToken: Access token has expired."
		);
		assert_eq!(ResourceErrorContext::new().summary(), "unspecified resource failure");
	}
}
