//! Serializes the whole [`TokenCache`] into a [`SettingsStore`] property.

// self
use crate::{
	_prelude::*,
	cache::{CacheEntry, TokenCache},
	obs::flow_event,
	store::{SettingsStore, StoreError},
};

/// Loads and saves the cache under a fixed settings key.
#[derive(Clone)]
pub struct CachePersistence {
	store: Arc<dyn SettingsStore>,
	key: String,
}
impl CachePersistence {
	/// Binds persistence to `store` under `key`.
	pub fn new(store: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
		Self { store, key: key.into() }
	}

	/// Settings key the cache is stored under.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Restores the cache; unreadable or malformed data yields an empty cache.
	///
	/// Malformed payloads are also unset so the next save starts from a clean slate.
	pub fn load(&self) -> TokenCache {
		let raw = match self.store.get_property(&self.key) {
			Ok(Some(raw)) => raw,
			Ok(None) => return TokenCache::new(),
			Err(e) => {
				flow_event!(
					warn,
					key = %self.key,
					error = %e,
					"Cache property could not be read."
				);

				return TokenCache::new();
			},
		};

		match decode(&raw) {
			Ok(entries) => TokenCache::from_entries(entries),
			Err(e) => {
				flow_event!(
					warn,
					key = %self.key,
					error = %e,
					"Discarding malformed cache property."
				);

				if let Err(e) = self.store.unset_property(&self.key) {
					flow_event!(
						warn,
						key = %self.key,
						error = %e,
						"Malformed cache property could not be unset."
					);
				}

				TokenCache::new()
			},
		}
	}

	/// Writes every cached entry to the store.
	pub fn save(&self, cache: &TokenCache) -> Result<(), StoreError> {
		let payload = serde_json::to_string(&cache.entries())
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.store.set_property(&self.key, &payload)
	}
}
impl Debug for CachePersistence {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachePersistence").field("key", &self.key).finish()
	}
}

fn decode(raw: &str) -> Result<Vec<CacheEntry>, StoreError> {
	let de = &mut serde_json::Deserializer::from_str(raw);

	serde_path_to_error::deserialize(de)
		.map_err(|e| StoreError::Serialization { message: format!("{} at {}", e.inner(), e.path()) })
}
