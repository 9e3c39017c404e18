// self
use crate::{
	_prelude::*,
	auth::{Identity, Resource},
	obs::FlowKind,
};

/// Future returned by [`FlowSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `credential_broker.flow` span opened around one broker tier.
///
/// The `identity` and `resource` fields start empty so tiers that learn the principal late
/// (first-time authentication) can fill them in once known.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	kind: FlowKind,
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at the named call site.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"credential_broker.flow",
				flow = kind.as_str(),
				stage,
				identity = tracing::field::Empty,
				resource = tracing::field::Empty,
			);

			Self { kind, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { kind }
		}
	}

	/// Tags the span with the `(identity, resource)` pair the tier works on.
	pub fn with_target(self, identity: &Identity, resource: &Resource) -> Self {
		self.record_identity(identity);
		#[cfg(feature = "tracing")]
		self.span.record("resource", tracing::field::display(resource));
		#[cfg(not(feature = "tracing"))]
		let _ = resource;

		self
	}

	/// Records the identity once it becomes known.
	pub fn record_identity(&self, identity: &Identity) {
		#[cfg(feature = "tracing")]
		self.span.record("identity", tracing::field::display(identity));
		#[cfg(not(feature = "tracing"))]
		let _ = identity;
	}

	/// Tier this span belongs to.
	pub fn kind(&self) -> FlowKind {
		self.kind
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn targeted_span_passes_output_through() {
		let identity =
			Identity::parse("contoso", "alice@contoso.com").expect("Identity fixture should be valid.");
		let resource =
			Resource::new("https://graph.windows.net/").expect("Resource fixture should be valid.");
		let span = FlowSpan::new(FlowKind::Refresh, "targeted_span").with_target(&identity, &resource);

		assert_eq!(span.kind(), FlowKind::Refresh);
		assert_eq!(span.instrument(async { 42 }).await, 42);
	}

	#[test]
	fn identity_can_be_recorded_late() {
		let span = FlowSpan::new(FlowKind::Interactive, "authenticate");

		span.record_identity(
			&Identity::parse("common", "bob@fabrikam.com").expect("Identity fixture should be valid."),
		);

		assert_eq!(span.kind(), FlowKind::Interactive);
	}
}
