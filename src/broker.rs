//! Per-identity token broker: cached, refresh, and interactive tiers.
//!
//! [`TokenBroker`] owns the process-wide [`TokenCache`], both lock tables, and the optional
//! persistence binding. The cached path is a plain map read; the refresh tier runs under the
//! identity's primary write lock and the interactive tier under its interactive lock. Both
//! tiers use snapshot-compare-then-act: a caller snapshots the cache before locking and only
//! talks to the provider if the snapshot still holds once the lock is acquired, so N callers
//! racing on one identity produce a single exchange.

mod interactive;
mod metrics;
mod refresh;

pub use metrics::BrokerMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource, TokenRecord, TokenSecret},
	cache::{CachePersistence, CacheSnapshot, TokenCache},
	config::BrokerConfig,
	error::AuthenticationError,
	executor,
	lock::LockTable,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
	provider::IdentityProvider,
	store::SettingsStore,
};

/// Token broker shared by every caller in the process.
///
/// Construct one per process (or per test) and share it behind an [`Arc`]; all state is
/// internally synchronized.
pub struct TokenBroker {
	provider: Arc<dyn IdentityProvider>,
	cache: TokenCache,
	locks: LockTable,
	persistence: Option<CachePersistence>,
	config: BrokerConfig,
	metrics: BrokerMetrics,
}
impl TokenBroker {
	/// Creates a broker with an empty, non-persisted cache.
	pub fn new(provider: Arc<dyn IdentityProvider>, config: BrokerConfig) -> Self {
		Self {
			provider,
			cache: TokenCache::new(),
			locks: LockTable::new(),
			persistence: None,
			config,
			metrics: BrokerMetrics::default(),
		}
	}

	/// Binds the broker to `store` and hydrates the cache from it.
	///
	/// The cache is stored under [`BrokerConfig::settings_key`]; malformed payloads are
	/// discarded and the broker starts empty.
	pub fn with_settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
		let persistence = CachePersistence::new(store, self.config.settings_key.clone());

		self.cache = persistence.load();

		flow_event!(
			debug,
			key = persistence.key(),
			entries = self.cache.len(),
			"Hydrated token cache from settings."
		);

		self.persistence = Some(persistence);

		self
	}

	/// Broker configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// In-memory token cache.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Per-identity lock tables.
	pub fn locks(&self) -> &LockTable {
		&self.locks
	}

	/// Counters describing the tiers this broker has run.
	pub fn metrics(&self) -> &BrokerMetrics {
		&self.metrics
	}

	/// Returns the cached access token for `(identity, resource)` without any network call.
	pub fn cached_token(&self, identity: &Identity, resource: &Resource) -> Option<TokenSecret> {
		self.cache
			.get(identity, resource)
			.filter(TokenRecord::is_usable)
			.map(|record| record.access_token)
	}

	/// Guarantees a usable token for `(identity, resource)` exists afterward.
	pub async fn ensure_authenticated(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
	) -> Result<()> {
		self.acquire_token(identity, resource, title).await.map(|_| ())
	}

	/// Blocking flavor of [`TokenBroker::ensure_authenticated`].
	///
	/// Must not be called from inside an async runtime worker.
	pub fn ensure_authenticated_blocking(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
	) -> Result<()> {
		futures::executor::block_on(self.ensure_authenticated(identity, resource, title))
	}

	/// Returns a usable access token, running the refresh and interactive tiers when nothing is
	/// cached.
	pub async fn acquire_token(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
	) -> Result<TokenSecret> {
		const KIND: FlowKind = FlowKind::Cached;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		if let Some(token) = self.cached_token(identity, resource) {
			self.metrics.record_cache_hit();
			obs::record_flow_outcome(KIND, FlowOutcome::Success);
			flow_event!(trace, identity = %identity, resource = %resource, "Token cache hit.");

			return Ok(token);
		}

		obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		flow_event!(debug, identity = %identity, resource = %resource, "Token cache miss.");

		self.fallback(identity, resource, title).await
	}

	/// Replaces `stale` after a downstream authorization failure.
	///
	/// When another caller already replaced the stale token the replacement is returned
	/// without any network exchange.
	pub async fn reacquire_token(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
		stale: &TokenSecret,
	) -> Result<TokenSecret> {
		self.metrics.record_fallback_cycle();

		if let Some(token) = self.cached_token(identity, resource).filter(|token| token != stale) {
			flow_event!(
				debug,
				identity = %identity,
				resource = %resource,
				"Stale token already replaced by another caller."
			);

			return Ok(token);
		}

		self.fallback(identity, resource, title).await
	}

	/// Runs `op` with a token for `(identity, resource)`, retrying once after a stale-token
	/// failure.
	pub async fn request<T, F, Fut>(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
		op: F,
	) -> Result<T>
	where
		F: FnMut(String) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		executor::dispatch(self, identity, resource, title, op).await
	}

	/// Blocking flavor of [`TokenBroker::request`].
	///
	/// Must not be called from inside an async runtime worker.
	pub fn request_blocking<T, F>(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
		mut op: F,
	) -> Result<T>
	where
		F: FnMut(&str) -> Result<T>,
	{
		futures::executor::block_on(self.request(identity, resource, title, |token: String| {
			futures::future::ready(op(&token))
		}))
	}

	/// Refresh tier, then interactive tier, then a guarded re-read of the cache.
	async fn fallback(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
	) -> Result<TokenSecret> {
		let before = self.cache.peek(identity, resource);
		let outcome = match self.refresh_tier(identity, resource, &before).await {
			Err(e) if e.requires_interactive() => {
				flow_event!(
					debug,
					identity = %identity,
					resource = %resource,
					reason = %e,
					"Falling back to interactive login."
				);

				self.interactive_tier(identity, resource, title, &before).await
			},
			outcome => outcome,
		};

		if let Err(e) = outcome {
			self.metrics.record_failure();

			return Err(e);
		}

		let _guard = self.locks.read(identity).await;

		self.cached_token(identity, resource).ok_or_else(|| {
			self.metrics.record_failure();

			Error::invalid_credentials(format!("no usable token cached for {identity} at {resource}"))
		})
	}

	/// Enforces a non-empty access token issued to `expected`.
	fn validate(&self, expected: &Identity, record: &TokenRecord) -> Result<()> {
		if !record.is_usable() {
			return Err(Error::invalid_credentials("provider returned an empty access token"));
		}
		if record.owner != *expected {
			flow_event!(
				warn,
				expected = %expected,
				actual = %record.owner,
				"Provider returned credentials for another principal."
			);

			return Err(Error::InvalidUserInfo {
				expected: expected.clone(),
				actual: record.owner.clone(),
			});
		}

		Ok(())
	}

	/// Writes the cache to the settings store; failures are logged only.
	fn persist(&self) {
		let Some(persistence) = &self.persistence else {
			return;
		};

		if let Err(e) = persistence.save(&self.cache) {
			flow_event!(warn, key = persistence.key(), error = %e, "Failed to persist token cache.");
		}
	}
}
impl Debug for TokenBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("config", &self.config)
			.field("cached_entries", &self.cache.len())
			.field("persistence", &self.persistence)
			.field("metrics", &self.metrics)
			.finish()
	}
}

/// Maps provider failures onto the broker taxonomy before they leave the broker.
///
/// A provider reporting an expired authorization means its grant is no longer accepted, and
/// opaque operation failures become rejections.
fn reclassify(err: Error) -> Error {
	match err {
		Error::AuthorizationExpired { reason } =>
			AuthenticationError::GrantRejected { reason }.into(),
		Error::Operation { source } =>
			AuthenticationError::Rejected { reason: source.to_string(), status: None }.into(),
		other => other,
	}
}

/// Runs `fut` inside `span` and records the tier outcome.
async fn in_tier<T, Fut>(span: &FlowSpan, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let kind = span.kind();

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}

/// `true` when the resource record moved since `before` was taken.
fn superseded(before: &CacheSnapshot, after: &CacheSnapshot) -> bool {
	after.record_changed(before) && after.record.as_ref().is_some_and(TokenRecord::is_usable)
}
