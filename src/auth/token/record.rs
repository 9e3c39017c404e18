//! Immutable token record structs and builders.

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource, token::secret::TokenSecret},
};

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry pushes the record past the representable range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
}

/// Immutable record describing a token issued to an [`Identity`] for one [`Resource`].
///
/// Records are replaced wholesale on every successful exchange, so equality doubles as
/// the "has anyone changed the cache since I looked" check used by the broker.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Principal the provider issued the token to.
	pub owner: Identity,
	/// Audience the access token is scoped to.
	pub resource: Resource,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Issued-at instant recorded when the response was mapped.
	pub issued_at: OffsetDateTime,
	/// Expiry instant reported by the provider.
	pub expires_at: OffsetDateTime,
}
impl TokenRecord {
	/// Returns a builder for the provided owner + resource pair.
	pub fn builder(owner: Identity, resource: Resource) -> TokenRecordBuilder {
		TokenRecordBuilder::new(owner, resource)
	}

	/// Returns `true` when the record carries a non-empty access token.
	pub fn is_usable(&self) -> bool {
		!self.access_token.is_blank()
	}

	/// Returns `true` when the record can seed a refresh-token exchange.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_blank())
	}

	/// Returns `true` if the record has expired at the provided instant.
	///
	/// The broker never expires records proactively; this is informational for callers.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("owner", &self.owner)
			.field("resource", &self.resource)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	owner: Identity,
	resource: Resource,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl TokenRecordBuilder {
	fn new(owner: Identity, resource: Resource) -> Self {
		Self {
			owner,
			resource,
			access_token: None,
			refresh_token: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) =>
				issued_at.checked_add(delta).ok_or(TokenRecordBuilderError::ExpiryOutOfRange)?,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			owner: self.owner,
			resource: self.resource,
			access_token,
			refresh_token: self.refresh_token,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn owner() -> Identity {
		Identity::parse("contoso", "alice@contoso.com").expect("Identity fixture should be valid.")
	}

	fn resource() -> Resource {
		Resource::new("https://graph.windows.net/").expect("Resource fixture should be valid.")
	}

	#[test]
	fn builder_handles_relative_expiry() {
		let record = TokenRecord::builder(owner(), resource())
			.access_token("secret")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Token record builder should support relative expiry calculations.");

		assert_eq!(record.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert!(record.is_expired_at(macros::datetime!(2025-01-01 00:30 UTC)));
		assert!(!record.is_expired_at(macros::datetime!(2025-01-01 00:29 UTC)));
	}

	#[test]
	fn builder_requires_access_token_and_expiry() {
		let err = TokenRecord::builder(owner(), resource())
			.expires_in(Duration::minutes(5))
			.build()
			.expect_err("Missing access token should be rejected.");

		assert_eq!(err, TokenRecordBuilderError::MissingAccessToken);

		let err = TokenRecord::builder(owner(), resource())
			.access_token("access")
			.build()
			.expect_err("Missing expiry should be rejected.");

		assert_eq!(err, TokenRecordBuilderError::MissingExpiry);
	}

	#[test]
	fn builder_rejects_expiry_past_representable_range() {
		let err = TokenRecord::builder(owner(), resource())
			.access_token("access")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(i64::MAX))
			.build()
			.expect_err("Overflowing relative expiry should be rejected.");

		assert_eq!(err, TokenRecordBuilderError::ExpiryOutOfRange);
	}

	#[test]
	fn usability_checks_reject_blank_secrets() {
		let blank = TokenRecord::builder(owner(), resource())
			.access_token("  ")
			.refresh_token("")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Blank secrets still build; validation happens in the broker.");

		assert!(!blank.is_usable());
		assert!(!blank.can_refresh());

		let full = TokenRecord::builder(owner(), resource())
			.access_token("access")
			.refresh_token("refresh")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Complete record should build.");

		assert!(full.is_usable());
		assert!(full.can_refresh());
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let record = TokenRecord::builder(owner(), resource())
			.access_token("very-secret-access")
			.refresh_token("very-secret-refresh")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Record fixture should build.");
		let rendered = format!("{record:?}");

		assert!(!rendered.contains("very-secret"));
		assert!(rendered.contains("<redacted>"));
	}
}
