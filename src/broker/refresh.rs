//! Refresh tier: redeem the identity's best refresh token under the primary write lock.

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource},
	broker::{TokenBroker, in_tier, reclassify, superseded},
	cache::CacheSnapshot,
	obs::{FlowKind, FlowSpan, flow_event},
};

impl TokenBroker {
	/// Refreshes `(identity, resource)` unless another caller already replaced the record
	/// captured in `before`.
	///
	/// Returns [`Error::NoCachedCredentials`] when the identity has no refresh source; the
	/// caller falls through to the interactive tier on that signal and on grant rejections.
	pub(crate) async fn refresh_tier(
		&self,
		identity: &Identity,
		resource: &Resource,
		before: &CacheSnapshot,
	) -> Result<()> {
		let span = FlowSpan::new(FlowKind::Refresh, "refresh_tier").with_target(identity, resource);

		in_tier(&span, async {
			let guard = self.locks.write(identity).await;
			let after = self.cache.peek(identity, resource);

			if superseded(before, &after) {
				flow_event!(
					debug,
					identity = %identity,
					resource = %resource,
					"Record replaced while waiting for the lock; skipping refresh."
				);

				return Ok(());
			}

			let source = after.refresh.ok_or_else(|| Error::NoCachedCredentials {
				identity: identity.clone(),
				resource: resource.clone(),
			})?;

			self.metrics.record_refresh_exchange();
			flow_event!(
				debug,
				identity = %identity,
				resource = %resource,
				source = %source.resource,
				"Redeeming refresh token."
			);

			let record = self
				.provider
				.acquire_by_refresh_token(&source, &identity.tenant, resource)
				.await
				.map_err(reclassify)?;

			self.validate(identity, &record)?;
			self.cache.put(identity, resource, record);
			drop(guard);
			self.persist();

			Ok(())
		})
		.await
	}
}
