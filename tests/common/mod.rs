//! Scripted identity provider shared by the broker integration tests.

#![allow(dead_code)]

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::Duration;
// self
use credential_broker::{
	auth::{Identity, Resource, TenantId, TokenRecord},
	error::{Error, Result},
	provider::{IdentityProvider, InteractiveRequest, PromptMode, ProviderFuture},
};

type InteractiveScript = dyn Fn(&InteractiveRequest, usize) -> Result<TokenRecord> + Send + Sync;
type RefreshScript = dyn Fn(&TokenRecord, &Resource, usize) -> Result<TokenRecord> + Send + Sync;

/// Provider whose answers come from closures, counting every call.
pub struct ScriptedProvider {
	interactive: Box<InteractiveScript>,
	refresh: Box<RefreshScript>,
	delay: StdDuration,
	interactive_calls: AtomicUsize,
	refresh_calls: AtomicUsize,
	prompts: Mutex<Vec<PromptMode>>,
}
impl ScriptedProvider {
	/// Interactive logins return `owner`; refreshes keep the source's owner.
	pub fn issuing(owner: Identity) -> Self {
		Self {
			interactive: Box::new(move |request, n| {
				Ok(record(&owner, &request.resource, &format!("login-{n}"), Some("rt-login")))
			}),
			refresh: Box::new(|source, resource, n| {
				Ok(record(&source.owner, resource, &format!("refresh-{n}"), Some("rt-refresh")))
			}),
			delay: StdDuration::ZERO,
			interactive_calls: AtomicUsize::new(0),
			refresh_calls: AtomicUsize::new(0),
			prompts: Mutex::new(Vec::new()),
		}
	}

	pub fn with_interactive(
		mut self,
		script: impl Fn(&InteractiveRequest, usize) -> Result<TokenRecord> + Send + Sync + 'static,
	) -> Self {
		self.interactive = Box::new(script);

		self
	}

	pub fn with_refresh(
		mut self,
		script: impl Fn(&TokenRecord, &Resource, usize) -> Result<TokenRecord> + Send + Sync + 'static,
	) -> Self {
		self.refresh = Box::new(script);

		self
	}

	/// Every call sleeps this long before answering, widening race windows.
	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = delay;

		self
	}

	pub fn interactive_calls(&self) -> usize {
		self.interactive_calls.load(Ordering::SeqCst)
	}

	pub fn refresh_calls(&self) -> usize {
		self.refresh_calls.load(Ordering::SeqCst)
	}

	pub fn prompts(&self) -> Vec<PromptMode> {
		self.prompts.lock().clone()
	}
}
impl IdentityProvider for ScriptedProvider {
	fn acquire_interactive<'a>(
		&'a self,
		request: &'a InteractiveRequest,
	) -> ProviderFuture<'a, TokenRecord> {
		Box::pin(async move {
			let n = self.interactive_calls.fetch_add(1, Ordering::SeqCst);

			self.prompts.lock().push(request.prompt);

			if !self.delay.is_zero() {
				thread::sleep(self.delay);
			}

			(self.interactive)(request, n)
		})
	}

	fn acquire_by_refresh_token<'a>(
		&'a self,
		refresh_record: &'a TokenRecord,
		_tenant: &'a TenantId,
		resource: &'a Resource,
	) -> ProviderFuture<'a, TokenRecord> {
		Box::pin(async move {
			let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				thread::sleep(self.delay);
			}

			(self.refresh)(refresh_record, resource, n)
		})
	}
}

pub fn identity(tenant: &str, name: &str) -> Identity {
	Identity::parse(tenant, name).expect("Identity fixture should be valid.")
}

pub fn resource(value: &str) -> Resource {
	Resource::new(value).expect("Resource fixture should be valid.")
}

pub fn record(
	owner: &Identity,
	resource: &Resource,
	access: &str,
	refresh: Option<&str>,
) -> TokenRecord {
	let mut builder = TokenRecord::builder(owner.clone(), resource.clone())
		.access_token(access)
		.expires_in(Duration::hours(1));

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().expect("Record fixture should build.")
}

pub fn shared(provider: ScriptedProvider) -> Arc<ScriptedProvider> {
	Arc::new(provider)
}

/// Operation that returns the token it was handed.
pub fn echo(token: &str) -> Result<String> {
	Ok(token.to_owned())
}

pub fn stale() -> Error {
	Error::authorization_expired("InvalidAuthenticationToken")
}
