// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing the tiers a broker has run.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
	cache_hits: AtomicU64,
	refresh_exchanges: AtomicU64,
	interactive_logins: AtomicU64,
	fallback_cycles: AtomicU64,
	failures: AtomicU64,
}
impl BrokerMetrics {
	/// Requests answered straight from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Refresh-token exchanges sent to the provider.
	pub fn refresh_exchanges(&self) -> u64 {
		self.refresh_exchanges.load(Ordering::Relaxed)
	}

	/// Interactive logins started, counting every prompt-mode attempt.
	pub fn interactive_logins(&self) -> u64 {
		self.interactive_logins.load(Ordering::Relaxed)
	}

	/// Stale-token retries triggered by downstream authorization failures.
	pub fn fallback_cycles(&self) -> u64 {
		self.fallback_cycles.load(Ordering::Relaxed)
	}

	/// Token acquisitions that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_exchange(&self) {
		self.refresh_exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_interactive_login(&self) {
		self.interactive_logins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fallback_cycle(&self) {
		self.fallback_cycles.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
