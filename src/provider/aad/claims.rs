//! Unverified `id_token` claim decoding used to label token owners.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::Identity};

/// Subset of Azure AD `id_token` claims used to identify the token owner.
///
/// The signature is not verified: the token arrives over TLS straight from the token
/// endpoint and is only used to label the cache entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
	/// Tenant identifier.
	pub tid: Option<String>,
	/// Unique principal name (v1 tokens).
	pub unique_name: Option<String>,
	/// User principal name.
	pub upn: Option<String>,
	/// E-mail address, used for guest and personal accounts.
	pub email: Option<String>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWS.
	pub fn decode(id_token: &str) -> Result<Self> {
		let payload = id_token
			.split('.')
			.nth(1)
			.filter(|segment| !segment.is_empty())
			.ok_or_else(|| Error::invalid_credentials("id_token is not a compact JWT"))?;
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).map_err(|e| {
			Error::invalid_credentials(format!("id_token payload is not base64url: {e}"))
		})?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|e| {
			Error::invalid_credentials(format!("id_token claims are malformed at {}", e.path()))
		})
	}

	/// Resolves the owning identity (`tid` plus `unique_name`, then `upn`, then `email`).
	pub fn identity(&self) -> Result<Identity> {
		let tenant =
			self.tid.as_deref().ok_or_else(|| Error::invalid_credentials("id_token has no tid"))?;
		let name = self
			.unique_name
			.as_deref()
			.or(self.upn.as_deref())
			.or(self.email.as_deref())
			.ok_or_else(|| Error::invalid_credentials("id_token has no principal name"))?;

		Identity::parse(tenant, name)
			.map_err(|e| Error::invalid_credentials(format!("id_token identity is invalid: {e}")))
	}
}
