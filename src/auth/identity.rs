//! Principal identity used as the key for every cache and lock table.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, TenantId, UniqueName},
};

/// Logical user (tenant + unique name) that tokens are issued to.
///
/// Equality covers both fields, so the same unique name in two tenants yields two
/// independent identities with separate caches and locks.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
	/// Tenant the principal belongs to.
	pub tenant: TenantId,
	/// Principal name reported by the identity provider.
	pub unique_name: UniqueName,
}
impl Identity {
	/// Creates an identity from already validated parts.
	pub fn new(tenant: TenantId, unique_name: UniqueName) -> Self {
		Self { tenant, unique_name }
	}

	/// Validates and wraps raw tenant + unique name strings.
	pub fn parse(
		tenant: impl AsRef<str>,
		unique_name: impl AsRef<str>,
	) -> Result<Self, IdentifierError> {
		Ok(Self::new(TenantId::new(tenant)?, UniqueName::new(unique_name)?))
	}
}
impl Display for Identity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.tenant, self.unique_name)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn equality_covers_tenant_and_name() {
		let a = Identity::parse("contoso", "alice@contoso.com").expect("Identity should parse.");
		let b = Identity::parse("contoso", "alice@contoso.com").expect("Identity should parse.");
		let c = Identity::parse("fabrikam", "alice@contoso.com").expect("Identity should parse.");

		assert_eq!(a, b);
		assert_ne!(a, c);
		assert_eq!(a.to_string(), "contoso/alice@contoso.com");
	}

	#[test]
	fn parse_rejects_invalid_parts() {
		assert!(Identity::parse("", "alice").is_err());
		assert!(Identity::parse("contoso", "alice smith").is_err());
	}
}
