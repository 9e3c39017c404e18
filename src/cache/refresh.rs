//! Per-identity refresh source, independent of the resource a token was issued for.

// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenRecord},
};

/// Holds the best refresh-capable [`TokenRecord`] per [`Identity`].
///
/// A candidate replaces the stored record only when it carries a refresh token and its
/// `expires_at` is not earlier than the stored one.
#[derive(Debug, Default)]
pub struct RefreshCache(RwLock<HashMap<Identity, TokenRecord>>);
impl RefreshCache {
	/// Returns the refresh source for `identity`, if any.
	pub fn get(&self, identity: &Identity) -> Option<TokenRecord> {
		self.0.read().get(identity).cloned()
	}

	/// Offers `record` as the refresh source for `identity`; returns `true` when it was kept.
	pub fn offer(&self, identity: &Identity, record: &TokenRecord) -> bool {
		if !record.can_refresh() {
			return false;
		}

		let mut guard = self.0.write();

		match guard.get(identity) {
			Some(current) if current.expires_at > record.expires_at => false,
			_ => {
				guard.insert(identity.clone(), record.clone());

				true
			},
		}
	}

	/// Number of identities with a refresh source.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no identity has a refresh source.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
