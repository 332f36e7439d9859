//! Authenticated HTTP transport for the QuantaStor management API.
//!
//! Every call is a GET against `<base_url><endpoint>` with the payload in the
//! query string. Non-success statuses become [`Error::Transport`] and bodies
//! carrying a `RestError` key become [`Error::Api`]. The transport never
//! retries on its own.

use crate::Result;
use async_trait::async_trait;
use quantastor_core::client::ClientConfig;
use quantastor_core::config::QuantastorConfig;
use quantastor_core::{Error, QueryParams};
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = concat!("quantastor-api/", env!("CARGO_PKG_VERSION"));

/// Key the array uses to report a logical failure.
pub const REST_ERROR_KEY: &str = "RestError";

/// A way of issuing management API calls.
///
/// [`HttpTransport`] talks to a real array; tests and embedders can supply
/// their own implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Call `endpoint` with `params` and return the decoded JSON body.
    async fn call(&self, endpoint: &str, params: &QueryParams) -> Result<Value>;
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportBuilder {
    base_url: Url,
    username: String,
    password: SecretString,
    http_config: ClientConfig,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
}

impl HttpTransportBuilder {
    /// Create a builder for the given API base URL and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `base_url` cannot be parsed.
    pub fn new(
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let mut raw = base_url.as_ref().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw)?;

        Ok(Self {
            base_url,
            username: username.into(),
            password: SecretString::from(password.into()),
            http_config: ClientConfig::new(),
            tls_verify: true,
            tls_ca_cert: None,
        })
    }

    /// Create a builder from a validated array configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured hostname does not form a valid URL.
    pub fn from_config(config: &QuantastorConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url()?,
            username: config.username.clone(),
            password: config.password.clone(),
            http_config: ClientConfig::new().with_timeout(config.timeout()),
            tls_verify: config.tls_verify,
            tls_ca_cert: config.tls_ca_cert.clone(),
        })
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Set whether to verify the array's TLS certificate.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Trust an additional PEM CA certificate.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the CA certificate cannot be loaded
    /// or the HTTP client cannot be created.
    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http_config.timeout)
            .connect_timeout(self.http_config.connect_timeout)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .gzip(self.http_config.enable_compression);

        if !self.tls_verify {
            warn!(
                base_url = %self.base_url,
                "TLS verification disabled for QuantaStor transport"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.tls_ca_cert {
            debug!("loading QuantaStor CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read QuantaStor CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes).map_err(|err| {
                Error::ConfigError(format!("Invalid QuantaStor CA certificate: {err}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!("Failed to build QuantaStor HTTP client: {err}"))
        })?;

        Ok(HttpTransport {
            http,
            base_url: self.base_url,
            username: self.username,
            password: self.password,
        })
    }
}

/// reqwest-backed [`Transport`] authenticating with HTTP basic auth.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl HttpTransport {
    /// Start a builder for the given API base URL and credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `base_url` cannot be parsed.
    pub fn builder(
        base_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<HttpTransportBuilder> {
        HttpTransportBuilder::new(base_url, username, password)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, endpoint: &str) -> Result<Url> {
        self.base_url.join(endpoint).map_err(|err| {
            Error::InvalidEndpoint(format!("Invalid QuantaStor endpoint `{endpoint}`: {err}"))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, endpoint: &str, params: &QueryParams) -> Result<Value> {
        let url = self.build_url(endpoint)?;
        info!(endpoint, payload = %params.summary(), "Sending QuantaStor request");

        let response = self
            .http
            .get(url)
            .query(params.as_pairs())
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport {
                endpoint: endpoint.to_string(),
                payload: params.summary(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|err| {
                Error::MalformedResponse(format!(
                    "Failed to parse QuantaStor response for `{endpoint}`: {err}"
                ))
            })?
        };

        check_rest_error(endpoint, params, body)
    }
}

/// Turn a body carrying a `RestError` key into [`Error::Api`].
///
/// # Errors
///
/// Returns [`Error::Api`] when `body` is an object with a `RestError` field.
pub fn check_rest_error(endpoint: &str, params: &QueryParams, body: Value) -> Result<Value> {
    if let Some(rest_error) = body.as_object().and_then(|obj| obj.get(REST_ERROR_KEY)) {
        let message = match rest_error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        debug!(endpoint, %message, "QuantaStor reported RestError");
        return Err(Error::Api {
            endpoint: endpoint.to_string(),
            payload: params.summary(),
            message,
        });
    }
    Ok(body)
}
