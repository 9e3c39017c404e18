//! Per-identity credential broker: cached, refresh, and interactive token acquisition with
//! deduplicated logins, disjoint per-identity lock tables, and retry-once request execution.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod lock;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Test helpers for wiring the broker against `httpmock`; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
		provider::{AadProvider, AuthorityDescriptor, LoginSurface, ReqwestAadProvider},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates served by
	/// `httpmock`.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds an [`AadProvider`] that talks to a mock authority over the insecure test client.
	pub fn test_aad_provider(
		descriptor: AuthorityDescriptor,
		surface: Arc<dyn LoginSurface>,
	) -> ReqwestAadProvider {
		AadProvider::with_http_client(
			descriptor,
			surface,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::RwLock as AsyncRwLock;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use broker::TokenBroker;
pub use executor::RequestExecutor;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
