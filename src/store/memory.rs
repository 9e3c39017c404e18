//! Thread-safe in-memory [`SettingsStore`] for tests, demos, and ephemeral processes.

// self
use crate::{
	_prelude::*,
	store::{SettingsStore, StoreError},
};

/// In-process property map; cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemorySettingsStore(Arc<RwLock<HashMap<String, String>>>);
impl MemorySettingsStore {
	/// Creates a store pre-populated with the provided properties.
	pub fn with_properties<I, K, V>(properties: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = properties.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns `true` when a value is stored under `key`.
	pub fn contains(&self, key: &str) -> bool {
		self.0.read().contains_key(key)
	}
}
impl SettingsStore for MemorySettingsStore {
	fn get_property(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set_property(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn unset_property(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn set_get_unset_cycle() {
		let store = MemorySettingsStore::default();

		assert_eq!(store.get_property("cache").expect("Read should succeed."), None);

		store.set_property("cache", "[]").expect("Write should succeed.");

		assert!(store.contains("cache"));

		let shared = store.clone();

		shared.unset_property("cache").expect("Unset should succeed.");
		shared.unset_property("cache").expect("Unsetting a missing key should succeed.");

		assert!(!store.contains("cache"));
	}

	#[test]
	fn with_properties_seeds_values() {
		let store = MemorySettingsStore::with_properties([("a", "1"), ("b", "2")]);

		assert_eq!(store.get_property("b").expect("Read should succeed."), Some("2".into()));
	}
}
