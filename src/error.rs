//! Broker-level error taxonomy shared by the caches, tiers, providers, and executor.

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource, TokenRecordBuilderError},
	provider::{
		AuthorityDescriptorError, ProviderStrategy, ResourceErrorContext, ResourceErrorKind,
	},
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for opaque sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Settings-store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Interactive or refresh exchange failed for a reason other than a mismatched identity.
	#[error(transparent)]
	AuthenticationFailed(#[from] AuthenticationError),

	/// Provider returned no usable token or a malformed result.
	#[error("Provider returned unusable credentials: {reason}.")]
	InvalidCredentials {
		/// Broker-supplied description of what was missing.
		reason: String,
	},
	/// Provider returned credentials for a different principal than requested.
	#[error("Provider returned credentials for {actual} while {expected} was requested.")]
	InvalidUserInfo {
		/// Identity the caller asked for.
		expected: Identity,
		/// Identity the provider actually authenticated.
		actual: Identity,
	},
	/// Downstream service rejected the access token as stale or invalid.
	#[error("Access token is no longer accepted: {reason}.")]
	AuthorizationExpired {
		/// Downstream-supplied reason string.
		reason: String,
	},
	/// No cached token exists for the identity/resource pair.
	///
	/// Used internally to select the refresh or interactive tier.
	#[error("No cached credentials for {identity} and {resource}.")]
	NoCachedCredentials {
		/// Identity that was looked up.
		identity: Identity,
		/// Resource that was looked up.
		resource: Resource,
	},
	/// Caller-supplied operation failed for a non-authorization reason.
	#[error("Operation failed: {source}")]
	Operation {
		/// Original failure raised by the operation.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps an arbitrary operation failure that must not trigger re-authentication.
	pub fn operation(src: impl Into<BoxError>) -> Self {
		Self::Operation { source: src.into() }
	}

	/// Marks a downstream failure as an authorization-class rejection.
	pub fn authorization_expired(reason: impl Into<String>) -> Self {
		Self::AuthorizationExpired { reason: reason.into() }
	}

	/// Reports an unusable or malformed provider result.
	pub fn invalid_credentials(reason: impl Into<String>) -> Self {
		Self::InvalidCredentials { reason: reason.into() }
	}

	/// Classifies a downstream resource failure once, using the provider strategy.
	///
	/// Domain clients call this at their adapter boundary so the executor only ever
	/// branches on the resulting variant.
	pub fn from_resource_failure(
		strategy: &dyn ProviderStrategy,
		ctx: ResourceErrorContext,
	) -> Self {
		match strategy.classify_resource_error(&ctx) {
			ResourceErrorKind::AuthorizationExpired =>
				Self::AuthorizationExpired { reason: ctx.summary() },
			ResourceErrorKind::Other => Self::operation(ResourceFailure::from(ctx)),
		}
	}

	/// Returns `true` for failures that should drive the retry-once policy.
	pub fn is_authorization_expired(&self) -> bool {
		matches!(self, Self::AuthorizationExpired { .. })
	}

	/// Returns `true` when the provider rejected the refresh token itself.
	pub fn is_grant_rejected(&self) -> bool {
		matches!(self, Self::AuthenticationFailed(AuthenticationError::GrantRejected { .. }))
	}

	/// Returns `true` for exchange failures that are not identity-validation errors.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(self, Self::AuthenticationFailed(_))
	}

	/// Returns `true` when the refresh tier cannot help and an interactive login is required.
	pub(crate) fn requires_interactive(&self) -> bool {
		self.is_grant_rejected() || matches!(self, Self::NoCachedCredentials { .. })
	}
}

/// Failures raised while exchanging credentials with the identity provider.
#[derive(Debug, ThisError)]
pub enum AuthenticationError {
	/// Provider rejected the refresh token or authorization code (`invalid_grant`).
	#[error("Provider rejected the grant: {reason}.")]
	GrantRejected {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// A silent prompt found no reusable provider session.
	#[error("Provider requires user interaction: {reason}.")]
	InteractionRequired {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Provider refused the request for another reason (client, consent, cancelled login).
	#[error("Provider rejected the authentication request: {reason}.")]
	Rejected {
		/// Provider- or broker-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Authority descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] AuthorityDescriptorError),
	/// Authority or derived endpoint URL cannot be parsed.
	#[error("Authority descriptor contains an invalid URL.")]
	InvalidAuthority {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-authorization failure reported by a downstream resource API.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Resource request failed: {summary}.")]
pub struct ResourceFailure {
	/// HTTP status code, when available.
	pub status: Option<u16>,
	/// Service-specific error code, when available.
	pub code: Option<String>,
	/// Combined human-readable description.
	pub summary: String,
}
impl From<ResourceErrorContext> for ResourceFailure {
	fn from(ctx: ResourceErrorContext) -> Self {
		let summary = ctx.summary();

		Self { status: ctx.http_status, code: ctx.error_code, summary }
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::{provider::DefaultProviderStrategy, store::StoreError};

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "settings file locked".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("settings file locked"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn predicates_follow_variants() {
		let expired = Error::authorization_expired("401");
		let grant: Error = AuthenticationError::GrantRejected { reason: "invalid_grant".into() }.into();
		let op = Error::operation(std::io::Error::other("disk full"));

		assert!(expired.is_authorization_expired());
		assert!(!expired.is_authentication_failure());
		assert!(grant.is_grant_rejected());
		assert!(grant.is_authentication_failure());
		assert!(grant.requires_interactive());
		assert!(!op.is_authorization_expired());
		assert!(op.to_string().contains("disk full"));
	}

	#[test]
	fn resource_failures_are_classified_once() {
		let strategy = DefaultProviderStrategy;
		let expired = Error::from_resource_failure(
			&strategy,
			ResourceErrorContext::new().with_http_status(401),
		);
		let other = Error::from_resource_failure(
			&strategy,
			ResourceErrorContext::new().with_http_status(409).with_error_code("Conflict"),
		);

		assert!(expired.is_authorization_expired());
		assert!(matches!(other, Error::Operation { .. }));
	}
}
