//! Retry-once request execution on top of [`TokenBroker`].
//!
//! Domain clients hand an operation closure that receives an access token. An operation
//! failing with [`Error::AuthorizationExpired`] triggers exactly one fallback cycle followed by
//! exactly one retry; every other error is returned untouched.

// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource},
	broker::TokenBroker,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, flow_event},
};

/// Cloneable handle that runs token-consuming operations through a shared broker.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
	broker: Arc<TokenBroker>,
}
impl RequestExecutor {
	/// Wraps a shared broker.
	pub fn new(broker: Arc<TokenBroker>) -> Self {
		Self { broker }
	}

	/// Broker backing this executor.
	pub fn broker(&self) -> &Arc<TokenBroker> {
		&self.broker
	}

	/// Runs `op` on the calling thread, blocking while the fallback tiers run.
	///
	/// Must not be called from inside an async runtime worker.
	pub fn execute<T, F>(
		&self,
		identity: &Identity,
		resource: &Resource,
		title: &str,
		op: F,
	) -> Result<T>
	where
		F: FnMut(&str) -> Result<T>,
	{
		self.broker.request_blocking(identity, resource, title, op)
	}

	/// Runs the async `op` without blocking the calling thread.
	pub async fn execute_async<T, F, Fut>(
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
		dispatch(&self.broker, identity, resource, title, op).await
	}
}

/// Cached attempt, then at most one fallback cycle and one retry.
pub(crate) async fn dispatch<T, F, Fut>(
	broker: &TokenBroker,
	identity: &Identity,
	resource: &Resource,
	title: &str,
	mut op: F,
) -> Result<T>
where
	F: FnMut(String) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	const KIND: FlowKind = FlowKind::Request;

	let span = FlowSpan::new(KIND, "dispatch").with_target(identity, resource);

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			let token = broker.acquire_token(identity, resource, title).await?;
			let stale = match op(token.expose().to_owned()).await {
				Err(e) if e.is_authorization_expired() => e,
				outcome => return outcome,
			};

			flow_event!(
				debug,
				identity = %identity,
				resource = %resource,
				reason = %stale,
				"Operation reported a stale token; reacquiring once."
			);

			let token = broker.reacquire_token(identity, resource, title, &token).await?;

			op(token.expose().to_owned()).await
		})
		.await;

	match &result {
		Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
	}

	result
}
