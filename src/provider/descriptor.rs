//! Authority descriptor shared by the Azure AD provider.
//!
//! The descriptor carries validated, transport-agnostic metadata; per-tenant endpoints are
//! derived on demand because the tenant is only known once an identity is.

/// Builder API for assembling authority descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::TenantId, error::ConfigError};

/// Public Azure AD authority.
pub const AZURE_PUBLIC_AUTHORITY: &str = "https://login.microsoftonline.com/";

/// Immutable authority descriptor consumed by [`crate::provider::AadProvider`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityDescriptor {
	/// Authority base URL (always ends with `/`).
	pub authority: Url,
	/// Public client identifier registered with the authority.
	pub client_id: String,
	/// Redirect URI registered for the client.
	pub redirect_uri: Url,
}
impl AuthorityDescriptor {
	/// Creates a new builder for the provided authority URL.
	pub fn builder(authority: Url) -> AuthorityDescriptorBuilder {
		AuthorityDescriptorBuilder::new(authority)
	}

	/// `{authority}/{tenant}/oauth2/authorize`.
	pub fn authorize_endpoint(&self, tenant: &TenantId) -> Result<Url, ConfigError> {
		self.tenant_endpoint(tenant, "authorize")
	}

	/// `{authority}/{tenant}/oauth2/token`.
	pub fn token_endpoint(&self, tenant: &TenantId) -> Result<Url, ConfigError> {
		self.tenant_endpoint(tenant, "token")
	}

	fn tenant_endpoint(&self, tenant: &TenantId, leaf: &str) -> Result<Url, ConfigError> {
		self.authority
			.join(&format!("{tenant}/oauth2/{leaf}"))
			.map_err(|source| ConfigError::InvalidAuthority { source })
	}
}
