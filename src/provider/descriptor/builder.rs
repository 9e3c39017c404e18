// self
use crate::{_prelude::*, provider::AuthorityDescriptor};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AuthorityDescriptorError {
	/// Client identifier is mandatory.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Redirect URI is mandatory for interactive logins.
	#[error("Missing redirect URI.")]
	MissingRedirectUri,
	/// Authority must use HTTPS (loopback hosts excepted).
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Authority cannot carry a query or fragment because endpoints are derived from it.
	#[error("The authority URL must not carry a query or fragment: {url}.")]
	AuthorityNotBase {
		/// Authority URL that failed validation.
		url: String,
	},
}

/// Builder for [`AuthorityDescriptor`] values.
#[derive(Debug)]
pub struct AuthorityDescriptorBuilder {
	/// Authority base URL.
	pub authority: Url,
	/// Public client identifier.
	pub client_id: Option<String>,
	/// Redirect URI registered for the client.
	pub redirect_uri: Option<Url>,
}
impl AuthorityDescriptorBuilder {
	/// Creates a new builder seeded with the provided authority.
	pub fn new(authority: Url) -> Self {
		Self { authority, client_id: None, redirect_uri: None }
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the redirect URI.
	pub fn redirect_uri(mut self, url: Url) -> Self {
		self.redirect_uri = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<AuthorityDescriptor, AuthorityDescriptorError> {
		let client_id = self
			.client_id
			.filter(|id| !id.trim().is_empty())
			.ok_or(AuthorityDescriptorError::MissingClientId)?;
		let redirect_uri = self.redirect_uri.ok_or(AuthorityDescriptorError::MissingRedirectUri)?;
		let mut authority = self.authority;

		if authority.query().is_some() || authority.fragment().is_some() {
			return Err(AuthorityDescriptorError::AuthorityNotBase { url: authority.to_string() });
		}
		if !authority.path().ends_with('/') {
			let path = format!("{}/", authority.path());

			authority.set_path(&path);
		}

		validate_endpoint("authority", &authority)?;

		Ok(AuthorityDescriptor { authority, client_id, redirect_uri })
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), AuthorityDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(AuthorityDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn redirect() -> Url {
		Url::parse("http://localhost/callback").expect("Redirect fixture should parse.")
	}

	#[test]
	fn rejects_plain_http_authorities() {
		let err = AuthorityDescriptor::builder(
			Url::parse("http://login.example.com/").expect("Authority should parse."),
		)
		.client_id("client")
		.redirect_uri(redirect())
		.build()
		.expect_err("Plain HTTP authority must be rejected.");

		assert!(matches!(err, AuthorityDescriptorError::InsecureEndpoint { endpoint: "authority", .. }));
	}

	#[test]
	fn loopback_authorities_are_allowed_and_normalized() {
		let descriptor = AuthorityDescriptor::builder(
			Url::parse("http://127.0.0.1:8080/aad").expect("Authority should parse."),
		)
		.client_id("client")
		.redirect_uri(redirect())
		.build()
		.expect("Loopback authority should be accepted.");

		assert_eq!(descriptor.authority.as_str(), "http://127.0.0.1:8080/aad/");
	}

	#[test]
	fn required_fields_are_enforced() {
		let authority =
			Url::parse("https://login.microsoftonline.com/").expect("Authority should parse.");

		assert_eq!(
			AuthorityDescriptor::builder(authority.clone()).redirect_uri(redirect()).build(),
			Err(AuthorityDescriptorError::MissingClientId)
		);
		assert_eq!(
			AuthorityDescriptor::builder(authority.clone()).client_id("client").build(),
			Err(AuthorityDescriptorError::MissingRedirectUri)
		);
		assert!(matches!(
			AuthorityDescriptor::builder(
				Url::parse("https://login.microsoftonline.com/?x=1").expect("Authority should parse.")
			)
			.client_id("client")
			.redirect_uri(redirect())
			.build(),
			Err(AuthorityDescriptorError::AuthorityNotBase { .. })
		));
	}
}
