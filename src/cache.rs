//! In-memory token caches keyed by identity and resource.
//!
//! [`TokenCache`] owns the per-resource records and the [`RefreshCache`]; neither performs
//! I/O. Callers serialize mutations per identity through [`crate::lock::LockTable`] and
//! persist snapshots through [`CachePersistence`] after releasing their locks.

pub mod persist;
pub mod refresh;

pub use persist::*;
pub use refresh::*;

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource, TokenRecord},
};

type ResourceMap = HashMap<Resource, TokenRecord>;

/// Point-in-time view of the cache used by snapshot-compare-then-act.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
	/// Record cached for the requested resource.
	pub record: Option<TokenRecord>,
	/// Refresh source cached for the identity.
	pub refresh: Option<TokenRecord>,
}
impl CacheSnapshot {
	/// Returns `true` when the resource-specific record differs from `other`'s.
	pub fn record_changed(&self, other: &Self) -> bool {
		self.record != other.record
	}

	/// Returns `true` when the refresh source differs from `other`'s.
	pub fn refresh_changed(&self, other: &Self) -> bool {
		self.refresh != other.refresh
	}
}

/// One persisted `(identity, resource) -> record` triple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// Identity the record is cached under.
	pub identity: Identity,
	/// Resource the record is cached under.
	pub resource: Resource,
	/// Cached record.
	pub record: TokenRecord,
}

/// Per-identity, per-resource token store plus its refresh source cache.
#[derive(Debug, Default)]
pub struct TokenCache {
	records: RwLock<HashMap<Identity, ResourceMap>>,
	refresh: RefreshCache,
}
impl TokenCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds a cache (refresh sources included) from persisted entries.
	pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
		let cache = Self::new();

		for CacheEntry { identity, resource, record } in entries {
			cache.put(&identity, &resource, record);
		}

		cache
	}

	/// Returns the record cached for `(identity, resource)`.
	pub fn get(&self, identity: &Identity, resource: &Resource) -> Option<TokenRecord> {
		self.records.read().get(identity).and_then(|resources| resources.get(resource)).cloned()
	}

	/// Stores `record`, overwriting any entry, and offers it to the refresh cache.
	pub fn put(&self, identity: &Identity, resource: &Resource, record: TokenRecord) {
		let mut guard = self.records.write();

		self.refresh.offer(identity, &record);
		guard.entry(identity.clone()).or_default().insert(resource.clone(), record);
	}

	/// Returns the identity's refresh source, regardless of resource.
	pub fn refresh_record(&self, identity: &Identity) -> Option<TokenRecord> {
		self.refresh.get(identity)
	}

	/// Captures both the resource record and the refresh source in one consistent read.
	pub fn peek(&self, identity: &Identity, resource: &Resource) -> CacheSnapshot {
		let guard = self.records.read();
		let record = guard.get(identity).and_then(|resources| resources.get(resource)).cloned();
		let refresh = self.refresh.get(identity);

		CacheSnapshot { record, refresh }
	}

	/// Borrow of the refresh source cache.
	pub fn refresh_cache(&self) -> &RefreshCache {
		&self.refresh
	}

	/// Identities with at least one cached record, sorted.
	pub fn identities(&self) -> Vec<Identity> {
		let mut identities = self.records.read().keys().cloned().collect::<Vec<_>>();

		identities.sort();

		identities
	}

	/// Sorted copy of every cached entry.
	pub fn entries(&self) -> Vec<CacheEntry> {
		let guard = self.records.read();
		let mut entries = guard
			.iter()
			.flat_map(|(identity, resources)| {
				resources.iter().map(move |(resource, record)| CacheEntry {
					identity: identity.clone(),
					resource: resource.clone(),
					record: record.clone(),
				})
			})
			.collect::<Vec<_>>();

		entries.sort_by(|a, b| (&a.identity, &a.resource).cmp(&(&b.identity, &b.resource)));

		entries
	}

	/// Total number of cached `(identity, resource)` entries.
	pub fn len(&self) -> usize {
		self.records.read().values().map(HashMap::len).sum()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn identity(name: &str) -> Identity {
		Identity::parse("contoso", name).expect("Identity fixture should be valid.")
	}

	fn resource(value: &str) -> Resource {
		Resource::new(value).expect("Resource fixture should be valid.")
	}

	fn record(owner: &Identity, res: &str, access: &str, refresh: Option<&str>) -> TokenRecord {
		let mut builder = TokenRecord::builder(owner.clone(), resource(res))
			.access_token(access)
			.expires_in(Duration::hours(1));

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Record fixture should build.")
	}

	#[test]
	fn put_overwrites_and_get_reads_back() {
		let cache = TokenCache::new();
		let alice = identity("alice@contoso.com");
		let graph = resource("https://graph.windows.net/");

		assert!(cache.get(&alice, &graph).is_none());

		cache.put(&alice, &graph, record(&alice, "https://graph.windows.net/", "a1", None));
		cache.put(&alice, &graph, record(&alice, "https://graph.windows.net/", "a2", None));

		let stored = cache.get(&alice, &graph).expect("Record should be cached.");

		assert_eq!(stored.access_token.expose(), "a2");
		assert_eq!(cache.len(), 1);
		assert!(cache.refresh_record(&alice).is_none());
	}

	#[test]
	fn refresh_source_spans_resources() {
		let cache = TokenCache::new();
		let alice = identity("alice@contoso.com");

		cache.put(
			&alice,
			&resource("r1"),
			record(&alice, "r1", "access-r1", Some("refresh-r1")),
		);

		let refresh = cache.refresh_record(&alice).expect("Refresh source should exist.");

		assert_eq!(refresh.resource.as_ref(), "r1");
		assert!(cache.get(&alice, &resource("r2")).is_none());
	}

	#[test]
	fn identities_are_isolated() {
		let cache = TokenCache::new();
		let alice = identity("alice@contoso.com");
		let bob = identity("bob@contoso.com");

		cache.put(&alice, &resource("r"), record(&alice, "r", "alice-token", Some("rt")));

		assert!(cache.get(&bob, &resource("r")).is_none());
		assert!(cache.refresh_record(&bob).is_none());
		assert_eq!(cache.identities(), vec![alice]);
	}

	#[test]
	fn snapshots_detect_changes() {
		let cache = TokenCache::new();
		let alice = identity("alice@contoso.com");
		let r1 = resource("r1");
		let r2 = resource("r2");
		let before = cache.peek(&alice, &r1);

		cache.put(&alice, &r2, record(&alice, "r2", "other", Some("rt")));

		let after = cache.peek(&alice, &r1);

		assert!(!before.record_changed(&after));
		assert!(before.refresh_changed(&after));

		cache.put(&alice, &r1, record(&alice, "r1", "mine", None));

		assert!(after.record_changed(&cache.peek(&alice, &r1)));
	}

	#[test]
	fn entries_rebuild_an_equivalent_cache() {
		let cache = TokenCache::new();
		let alice = identity("alice@contoso.com");
		let bob = identity("bob@contoso.com");

		cache.put(&alice, &resource("r1"), record(&alice, "r1", "a-r1", Some("a-rt")));
		cache.put(&alice, &resource("r2"), record(&alice, "r2", "a-r2", None));
		cache.put(&bob, &resource("r1"), record(&bob, "r1", "b-r1", Some("b-rt")));

		let rebuilt = TokenCache::from_entries(cache.entries());

		assert_eq!(rebuilt.entries(), cache.entries());
		assert_eq!(rebuilt.refresh_record(&alice), cache.refresh_record(&alice));
		assert_eq!(rebuilt.refresh_cache().len(), 2);
	}
}
