// # HTTP Validator
//
// This crate provides the HTTP reachability probe for netwatch.
//
// ## Behavior
//
// One pass sends a HEAD request to each configured URL in order and stops
// at the first one answering with a 2xx or 3xx status. Redirects are not
// followed: a 3xx already proves the server is reachable.
//
// A failed URL (connect error, timeout, 4xx/5xx) only makes that URL fail.
// Passes are retried with exponential backoff until one succeeds or the
// retry budget runs out.
//
// ## Cancellation
//
// The in-flight request is dropped as soon as the cancellation token fires,
// and the validator answers `false`.

use netwatch_core::config::ValidatorConfig;
use netwatch_core::retry::retry_with_backoff;
use netwatch_core::traits::AccessValidator;
use netwatch_core::{CancellationToken, Error, ProbeKind, Result, ValidatorRegistry};

use std::sync::Arc;

use reqwest::redirect::Policy;
use tracing::debug;

/// User agent sent with every probe
const USER_AGENT: &str = concat!("netwatch/", env!("CARGO_PKG_VERSION"));

/// HTTP reachability validator
pub struct HttpValidator {
    /// URLs tried in order
    urls: Vec<String>,

    config: Arc<ValidatorConfig>,

    /// HTTP client with the per-request timeout applied
    client: reqwest::Client,
}

impl HttpValidator {
    /// Create a validator probing `config.http_urls`
    ///
    /// # Returns
    ///
    /// - `Ok(HttpValidator)`: Ready to probe
    /// - `Err(Error::Config)`: If the configuration is invalid
    /// - `Err(Error::Http)`: If the HTTP client cannot be built (e.g. TLS backend failure)
    pub fn new(config: Arc<ValidatorConfig>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .redirect(Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            urls: config.http_urls.clone(),
            config,
            client,
        })
    }

    /// Probe `urls` instead of the configured list
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    /// One pass over the URLs
    ///
    /// `Err(Error::Cancelled)` ends the retry loop; every other failure is
    /// local to its URL.
    async fn sweep(&self, cancel: &CancellationToken) -> Result<bool> {
        for url in &self.urls {
            match self.head(url, cancel).await {
                Ok(()) => {
                    if self.config.verbose_logging {
                        debug!(%url, "HTTP probe succeeded");
                    }
                    return Ok(true);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    if self.config.verbose_logging {
                        debug!(%url, error = %e, "HTTP probe failed");
                    }
                }
            }
        }
        Ok(false)
    }

    async fn head(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let request = self.client.head(url).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request => response.map_err(|e| Error::http(format!("Request failed: {}", e)))?,
        };

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(Error::http(format!("HTTP error: {}", status)))
        }
    }
}

#[async_trait::async_trait]
impl AccessValidator for HttpValidator {
    async fn validate_access(&self, cancel: &CancellationToken) -> bool {
        if self.urls.is_empty() {
            return false;
        }

        retry_with_backoff(
            move |token| async move { self.sweep(&token).await },
            self.config.http_retry_budget(),
            &self.config,
            cancel,
        )
        .await
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Http
    }
}

/// Register the HTTP validator with a registry
pub fn register(registry: &ValidatorRegistry, config: &Arc<ValidatorConfig>) -> Result<()> {
    registry.register(Arc::new(HttpValidator::new(Arc::clone(config))?));
    Ok(())
}
