//! The recognized configuration options.

use std::time::Duration;

use dike_telemetry::{LogLevel, LogOutput};
use dike_types::{InternalError, PepResult};

use crate::environment::{Endpoints, Environment};

/// Default decision-cache capacity in MiB.
pub const DEFAULT_CACHE_SIZE_MIB: usize = 32;

/// Default per-call PDP timeout.
pub const DEFAULT_PDP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`Pep`](https://docs.rs/dike) instance.
///
/// Plain data; runtime collaborators (transport, cache plugin, claims
/// decoder, stats sink) are injected on the orchestrator builder.
#[derive(Debug, Clone)]
pub struct PepConfig {
    /// Service API key. Either this or the client credential pair is
    /// required.
    pub api_key: Option<String>,
    /// OAuth client id (paired with `client_secret`).
    pub client_id: Option<String>,
    /// OAuth client secret (paired with `client_id`).
    pub client_secret: Option<String>,
    /// Deployment target.
    pub environment: Environment,
    /// Explicit endpoints; required with `Environment::Custom`, ignored
    /// otherwise.
    pub endpoints: Option<Endpoints>,
    /// Decision cache capacity in MiB.
    pub cache_size_mib: usize,
    /// TTL for cached permits; zero defers to the obligation's
    /// `maxCacheAgeSeconds`, then the library default.
    pub permit_ttl: Duration,
    /// TTL for cached denies; zero means the library default.
    pub denied_ttl: Duration,
    /// Disable the decision cache entirely.
    pub disable_cache: bool,
    /// Never cache denied decisions.
    pub disable_denied_cache: bool,
    /// Serve expired cache entries when the PDP is unreachable.
    pub enable_expired_cache: bool,
    /// Retry failed PDP calls.
    pub authz_retry: bool,
    /// Per-call PDP timeout.
    pub pdp_timeout: Duration,
    /// Log verbosity.
    pub log_level: LogLevel,
    /// Log destination.
    pub log_output: LogOutput,
}

impl Default for PepConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            client_id: None,
            client_secret: None,
            environment: Environment::default(),
            endpoints: None,
            cache_size_mib: DEFAULT_CACHE_SIZE_MIB,
            permit_ttl: Duration::ZERO,
            denied_ttl: Duration::ZERO,
            disable_cache: false,
            disable_denied_cache: false,
            enable_expired_cache: false,
            authz_retry: false,
            pdp_timeout: DEFAULT_PDP_TIMEOUT,
            log_level: LogLevel::default(),
            log_output: LogOutput::default(),
        }
    }
}

impl PepConfig {
    /// A default configuration authenticated by API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// A default configuration authenticated by client credentials.
    pub fn with_client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            ..Default::default()
        }
    }

    /// Set the deployment target.
    #[must_use]
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Provide explicit endpoints (required for `Environment::Custom`).
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Set the cache capacity in MiB.
    #[must_use]
    pub fn cache_size_mib(mut self, mib: usize) -> Self {
        self.cache_size_mib = mib;
        self
    }

    /// Set the permit TTL.
    #[must_use]
    pub fn permit_ttl(mut self, ttl: Duration) -> Self {
        self.permit_ttl = ttl;
        self
    }

    /// Set the deny TTL.
    #[must_use]
    pub fn denied_ttl(mut self, ttl: Duration) -> Self {
        self.denied_ttl = ttl;
        self
    }

    /// Disable the decision cache.
    #[must_use]
    pub fn disable_cache(mut self, disabled: bool) -> Self {
        self.disable_cache = disabled;
        self
    }

    /// Never cache denies.
    #[must_use]
    pub fn disable_denied_cache(mut self, disabled: bool) -> Self {
        self.disable_denied_cache = disabled;
        self
    }

    /// Serve expired entries when the PDP is down.
    #[must_use]
    pub fn enable_expired_cache(mut self, enabled: bool) -> Self {
        self.enable_expired_cache = enabled;
        self
    }

    /// Retry failed PDP calls.
    #[must_use]
    pub fn authz_retry(mut self, enabled: bool) -> Self {
        self.authz_retry = enabled;
        self
    }

    /// Set the per-call PDP timeout.
    #[must_use]
    pub fn pdp_timeout(mut self, timeout: Duration) -> Self {
        self.pdp_timeout = timeout;
        self
    }

    /// Set the log verbosity.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set the log destination.
    #[must_use]
    pub fn log_output(mut self, output: LogOutput) -> Self {
        self.log_output = output;
        self
    }

    /// Whether any credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            || (self.client_id.as_deref().is_some_and(|c| !c.is_empty())
                && self.client_secret.as_deref().is_some_and(|s| !s.is_empty()))
    }

    /// Validate the configuration and resolve the endpoint set.
    ///
    /// # Errors
    ///
    /// `InternalError` when credentials are missing, or when
    /// `Environment::Custom` is selected without a complete endpoint set.
    pub fn resolve_endpoints(&self) -> PepResult<Endpoints> {
        if !self.has_credentials() {
            return Err(InternalError::new(
                "",
                "configuration requires an api key or a client id/secret pair",
            )
            .into());
        }

        match self.environment.endpoints() {
            Some(endpoints) => Ok(endpoints),
            None => match &self.endpoints {
                Some(endpoints) if endpoints.is_complete() => Ok(endpoints.clone()),
                Some(_) => Err(InternalError::new(
                    "",
                    "custom environment requires authz, bulk, roles, token, and jwks endpoints",
                )
                .into()),
                None => Err(InternalError::new(
                    "",
                    "custom environment requires explicit endpoints",
                )
                .into()),
            },
        }
    }
}
