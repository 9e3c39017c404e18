//! Broker-level configuration.

// self
use crate::{_prelude::*, auth::TenantId};

/// Default settings key the serialized cache is stored under.
pub const DEFAULT_SETTINGS_KEY: &str = "credential_broker.authentication_results";

/// Tunables shared by every [`crate::TokenBroker`] instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Tenant used by first-time authentication.
	pub default_tenant: TenantId,
	/// Settings-store key for the persisted cache.
	pub settings_key: String,
}
impl BrokerConfig {
	/// Overrides the tenant used by first-time authentication.
	pub fn with_default_tenant(mut self, tenant: TenantId) -> Self {
		self.default_tenant = tenant;

		self
	}

	/// Overrides the settings key used for persistence.
	pub fn with_settings_key(mut self, key: impl Into<String>) -> Self {
		self.settings_key = key.into();

		self
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			default_tenant: TenantId::common(),
			settings_key: DEFAULT_SETTINGS_KEY.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let config = BrokerConfig::default();

		assert_eq!(config.default_tenant.as_ref(), "common");
		assert_eq!(config.settings_key, "credential_broker.authentication_results");
	}

	#[test]
	fn partial_documents_fill_in_defaults() {
		let config: BrokerConfig = serde_json::from_str("{\"default_tenant\":\"contoso\"}")
			.expect("Partial config should deserialize.");

		assert_eq!(config.default_tenant.as_ref(), "contoso");
		assert_eq!(config.settings_key, DEFAULT_SETTINGS_KEY);

		let overridden = config.with_settings_key("custom.key");

		assert_eq!(overridden.settings_key, "custom.key");
		assert!(serde_json::from_str::<BrokerConfig>("{\"default_tenant\":\"\"}").is_err());
	}
}
