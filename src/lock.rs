//! Lazily populated per-identity read/write locks.
//!
//! Two disjoint tables exist: the primary table guards cache mutation for an identity, the
//! interactive table only serializes interactive logins. Lock objects are created once per
//! identity (checked under the coarse read lock, created under the coarse write lock) and
//! live for the lifetime of the table.

// crates.io
use async_lock::{RwLockReadGuardArc, RwLockWriteGuardArc};
// self
use crate::{_prelude::*, auth::Identity};

/// Shared guard on an identity's primary lock.
pub type IdentityReadGuard = RwLockReadGuardArc<()>;
/// Exclusive guard on an identity's primary or interactive lock.
pub type IdentityWriteGuard = RwLockWriteGuardArc<()>;

type IdentityLock = Arc<AsyncRwLock<()>>;

#[derive(Debug, Default)]
struct LockMap(RwLock<HashMap<Identity, IdentityLock>>);
impl LockMap {
	fn lock_for(&self, identity: &Identity) -> IdentityLock {
		if let Some(lock) = self.0.read().get(identity) {
			return lock.clone();
		}

		// Entry API re-checks under the write lock, so racing creators share one lock.
		self.0
			.write()
			.entry(identity.clone())
			.or_insert_with(|| Arc::new(AsyncRwLock::new(())))
			.clone()
	}

	fn contains(&self, identity: &Identity) -> bool {
		self.0.read().contains_key(identity)
	}

	fn len(&self) -> usize {
		self.0.read().len()
	}
}

/// Primary + interactive lock registry keyed by [`Identity`].
///
/// Both blocking (`acquire_*`) and async flavors hand out owned guards, so a guard can be held
/// across `.await` points and released by dropping it.
#[derive(Debug, Default)]
pub struct LockTable {
	primary: LockMap,
	interactive: LockMap,
}
impl LockTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Blocks until a shared guard on the identity's primary lock is acquired.
	pub fn acquire_read(&self, identity: &Identity) -> IdentityReadGuard {
		self.primary.lock_for(identity).read_arc_blocking()
	}

	/// Blocks until an exclusive guard on the identity's primary lock is acquired.
	pub fn acquire_write(&self, identity: &Identity) -> IdentityWriteGuard {
		self.primary.lock_for(identity).write_arc_blocking()
	}

	/// Blocks until an exclusive guard on the identity's interactive lock is acquired.
	pub fn acquire_interactive_write(&self, identity: &Identity) -> IdentityWriteGuard {
		self.interactive.lock_for(identity).write_arc_blocking()
	}

	/// Acquires a shared guard on the identity's primary lock.
	pub async fn read(&self, identity: &Identity) -> IdentityReadGuard {
		let lock = self.primary.lock_for(identity);

		lock.read_arc().await
	}

	/// Acquires an exclusive guard on the identity's primary lock.
	pub async fn write(&self, identity: &Identity) -> IdentityWriteGuard {
		let lock = self.primary.lock_for(identity);

		lock.write_arc().await
	}

	/// Acquires an exclusive guard on the identity's interactive lock.
	pub async fn interactive_write(&self, identity: &Identity) -> IdentityWriteGuard {
		let lock = self.interactive.lock_for(identity);

		lock.write_arc().await
	}

	/// Returns `true` once the identity has a primary lock.
	pub fn is_tracked(&self, identity: &Identity) -> bool {
		self.primary.contains(identity)
	}

	/// Number of identities with a primary lock.
	pub fn len(&self) -> usize {
		self.primary.len()
	}

	/// Returns `true` when no primary lock exists yet.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of identities with an interactive lock.
	pub fn interactive_len(&self) -> usize {
		self.interactive.len()
	}
}
