//! Settings-store contract used to persist the serialized token cache.

pub mod file;
pub mod memory;

pub use file::FileSettingsStore;
pub use memory::MemorySettingsStore;

// self
use crate::_prelude::*;

/// Key/value property store backing cache persistence.
///
/// Calls are synchronous and short; the broker only invokes them after releasing every
/// identity lock.
pub trait SettingsStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if any.
	fn get_property(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores or replaces the value under `key`.
	fn set_property(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes the value under `key`; removing a missing key is not an error.
	fn unset_property(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by [`SettingsStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
