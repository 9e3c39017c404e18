//! Interactive tier and first-time authentication.
//!
//! Logins are serialized per identity through the interactive lock table, which is disjoint
//! from the primary table so a slow login never blocks cached reads. Cache writes take the
//! primary write lock briefly while the interactive lock is still held.

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource, TokenRecord},
	broker::{TokenBroker, in_tier, reclassify, superseded},
	cache::CacheSnapshot,
	obs::{FlowKind, FlowSpan, flow_event},
	provider::{InteractiveRequest, PromptMode},
};

impl TokenBroker {
	/// Logs a new principal in against the default tenant and caches the result.
	///
	/// Returns the identity reported by the provider.
	pub async fn authenticate(&self, resource: &Resource, title: &str) -> Result<Identity> {
		let span = FlowSpan::new(FlowKind::Interactive, "authenticate");

		in_tier(&span, async {
			let request = InteractiveRequest::new(
				self.config.default_tenant.clone(),
				resource.clone(),
				title,
				PromptMode::Login,
			);

			self.metrics.record_interactive_login();

			let record = self.provider.acquire_interactive(&request).await.map_err(reclassify)?;
			let identity = record.owner.clone();

			span.record_identity(&identity);
			self.validate(&identity, &record)?;

			let interactive = self.locks.interactive_write(&identity).await;

			{
				let _primary = self.locks.write(&identity).await;

				self.cache.put(&identity, resource, record);
			}

			drop(interactive);
			self.persist();
			flow_event!(info, identity = %identity, resource = %resource, "Authenticated new identity.");

			Ok(identity)
		})
		.await
		.inspect_err(|_| self.metrics.record_failure())
	}

	/// Blocking flavor of [`TokenBroker::authenticate`].
	///
	/// Must not be called from inside an async runtime worker.
	pub fn authenticate_blocking(&self, resource: &Resource, title: &str) -> Result<Identity> {
		futures::executor::block_on(self.authenticate(resource, title))
	}

	/// Logs `identity` in unless another caller already did since `before` was taken.
	///
	/// When only the refresh source moved, the lock is released and the refresh tier runs with
	/// the new source; if that source is rejected, one more login runs without the hand-off.
	pub(crate) async fn interactive_tier(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
		before: &CacheSnapshot,
	) -> Result<()> {
		let span =
			FlowSpan::new(FlowKind::Interactive, "interactive_tier").with_target(identity, resource);

		in_tier(&span, async {
			let mut snapshot = before.clone();
			let mut hand_off = true;

			loop {
				let guard = self.locks.interactive_write(identity).await;
				let after = self.cache.peek(identity, resource);

				if superseded(&snapshot, &after) {
					flow_event!(
						debug,
						identity = %identity,
						resource = %resource,
						"Another caller logged in while waiting; skipping login."
					);

					return Ok(());
				}
				if hand_off && after.refresh.is_some() && after.refresh_changed(&snapshot) {
					drop(guard);
					flow_event!(
						debug,
						identity = %identity,
						resource = %resource,
						"Refresh source changed while waiting; retrying refresh."
					);

					let outcome = self.refresh_tier(identity, resource, &after).await;

					match outcome {
						Err(e) if e.is_grant_rejected() => {
							snapshot = after;
							hand_off = false;

							continue;
						},
						outcome => return outcome,
					}
				}

				let record = self.login(identity, resource, title).await?;

				{
					let _primary = self.locks.write(identity).await;

					self.cache.put(identity, resource, record);
				}

				drop(guard);
				self.persist();

				return Ok(());
			}
		})
		.await
	}

	/// Silent attempt first, then a forced account picker on a principal mismatch.
	///
	/// A silent attempt that fails outright is retried once with
	/// [`PromptMode::RefreshSession`]; that retry is final and never escalates to the picker.
	async fn login(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
	) -> Result<TokenRecord> {
		let silent = InteractiveRequest::new(
			identity.tenant.clone(),
			resource.clone(),
			title,
			PromptMode::AttemptNone,
		);
		let record = match self.prompt(&silent).await {
			Err(e) if e.is_authentication_failure() => {
				flow_event!(
					debug,
					identity = %identity,
					reason = %e,
					"Silent login failed; retrying with a session refresh prompt."
				);

				let record = self.prompt(&silent.with_prompt(PromptMode::RefreshSession)).await?;

				self.validate(identity, &record)?;

				return Ok(record);
			},
			outcome => outcome?,
		};

		if !record.is_usable() || record.owner == *identity {
			self.validate(identity, &record)?;

			return Ok(record);
		}

		flow_event!(
			info,
			expected = %identity,
			actual = %record.owner,
			"Silent login returned another principal; forcing the account picker."
		);

		let record = self.prompt(&silent.with_prompt(PromptMode::Login)).await?;

		self.validate(identity, &record)?;

		Ok(record)
	}

	async fn prompt(&self, request: &InteractiveRequest) -> Result<TokenRecord> {
		self.metrics.record_interactive_login();

		self.provider.acquire_interactive(request).await.map_err(reclassify)
	}
}
