//! The orchestrator: cache-check → PDP call → cache-write across a batch.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use dike_cache::{
    forward_keys, reverse_lookup, DecisionStore, MemoryCache, ObligationKeys, PatternStore,
    TtlPolicy,
};
use dike_config::PepConfig;
use dike_pdp::{self as pdp, classify, PdpClient, ReqwestTransport, Route, Transport};
use dike_telemetry::{Counter, PepStats, StatsSink, StatsSnapshot};
use dike_types::{
    CacheKeyPattern, Decision, PepError, PepResult, Reason, Request, Response, RoleActions,
    RolesRequest, ACCESS_TOKEN_BODY, MAX_AUTHZ_CALL, MAX_BATCH, MAX_ROLES_BATCH,
};

use crate::claims::ClaimsDecoder;

/// The policy enforcement point.
///
/// One instance per process is typical; every method is safe to call from
/// many tasks concurrently with no external locking.
pub struct Pep {
    config: PepConfig,
    client: PdpClient,
    cache: Arc<dyn DecisionStore>,
    patterns: PatternStore,
    counters: Arc<PepStats>,
    sink: Option<Arc<dyn StatsSink>>,
    claims: Option<Arc<dyn ClaimsDecoder>>,
    ttl: TtlPolicy,
}

impl std::fmt::Debug for Pep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pep")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

/// Builder wiring runtime collaborators into a [`Pep`].
pub struct PepBuilder {
    config: PepConfig,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn DecisionStore>>,
    claims: Option<Arc<dyn ClaimsDecoder>>,
    sink: Option<Arc<dyn StatsSink>>,
}

impl PepBuilder {
    /// Inject an HTTP transport (the default builds a `reqwest` client with
    /// the configured timeout).
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Inject a cache implementation (the default is the in-process
    /// byte-bounded [`MemoryCache`]).
    #[must_use]
    pub fn cache_plugin(mut self, cache: Arc<dyn DecisionStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Inject the claims decoder used to expand `accessTokenBody` subjects.
    #[must_use]
    pub fn claims_decoder(mut self, decoder: Arc<dyn ClaimsDecoder>) -> Self {
        self.claims = Some(decoder);
        self
    }

    /// Forward counter increments to an additional sink.
    #[must_use]
    pub fn stats_sink(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// `InternalError` for missing credentials or an incomplete custom
    /// endpoint set.
    pub fn build(self) -> PepResult<Pep> {
        let endpoints = self.config.resolve_endpoints()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(self.config.pdp_timeout)
                    .map_err(|e| PepError::internal("", e.to_string()))?,
            ),
        };

        let cache: Arc<dyn DecisionStore> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MemoryCache::new(self.config.cache_size_mib)),
        };

        let client = PdpClient::new(transport, endpoints, self.config.authz_retry);
        let ttl = TtlPolicy {
            permit_ttl: self.config.permit_ttl,
            denied_ttl: self.config.denied_ttl,
            cache_denied: !self.config.disable_denied_cache,
        };

        info!(
            environment = ?self.config.environment,
            cache_mib = self.config.cache_size_mib,
            retry = self.config.authz_retry,
            "pep initialized"
        );

        Ok(Pep {
            config: self.config,
            client,
            cache,
            patterns: PatternStore::new(),
            counters: Arc::new(PepStats::new()),
            sink: self.sink,
            claims: self.claims,
            ttl,
        })
    }
}

impl Pep {
    /// Start building a PEP from a configuration.
    pub fn builder(config: PepConfig) -> PepBuilder {
        PepBuilder {
            config,
            transport: None,
            cache: None,
            claims: None,
            sink: None,
        }
    }

    /// Build a PEP with default collaborators.
    pub fn new(config: PepConfig) -> PepResult<Self> {
        Self::builder(config).build()
    }

    /// Answer a batch of authorization questions.
    ///
    /// Decisions come back in batch order: `decisions[i]` answers
    /// `batch[i]`. Cached answers are served locally; the rest go to the
    /// PDP in one bulk call when the miss set is uniform enough, or to the
    /// per-item endpoint otherwise.
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub async fn authorize(
        &self,
        batch: &[Request],
        trace: &str,
        token: &str,
    ) -> PepResult<Response> {
        let trace = resolve_trace(trace);

        if batch.is_empty() || batch.len() > MAX_BATCH {
            return Err(PepError::internal(
                &trace,
                format!("batch size must be between 1 and {MAX_BATCH}, got {}", batch.len()),
            ));
        }
        if token.is_empty() {
            return Err(PepError::internal(&trace, "missing bearer token"));
        }

        self.record_many(Counter::Requests, batch.len() as u64);

        // Expand accessTokenBody subjects before any cache traffic.
        let expanded = batch
            .iter()
            .map(|request| self.expand(request, &trace))
            .collect::<PepResult<Vec<_>>>()?;

        let use_cache = !self.config.disable_cache;
        let mut slots: Vec<Option<Decision>> = vec![None; expanded.len()];
        let mut miss_indices: Vec<usize> = Vec::new();

        if use_cache {
            let pattern = self.patterns.snapshot();
            let now = Instant::now();
            for (index, request) in expanded.iter().enumerate() {
                match reverse_lookup(request, pattern.as_ref(), self.cache.as_ref()) {
                    Some((_, cached)) if !cached.expired(now) => {
                        self.record(Counter::CacheHits);
                        slots[index] =
                            Some(Decision::from_cache(cached.permitted, cached.reason, false));
                    }
                    _ => {
                        self.record(Counter::CacheMisses);
                        miss_indices.push(index);
                    }
                }
            }
        } else {
            miss_indices.extend(0..expanded.len());
        }

        debug!(
            hits = expanded.len() - miss_indices.len(),
            misses = miss_indices.len(),
            "partitioned batch"
        );

        let mut error_for_expired_results = None;

        if !miss_indices.is_empty() {
            let misses: Vec<Request> = miss_indices
                .iter()
                .map(|&index| expanded[index].clone())
                .collect();

            match self.dispatch(&misses, &trace, token).await {
                Ok(fresh) => {
                    for (&index, decision) in miss_indices.iter().zip(fresh) {
                        slots[index] = Some(decision);
                    }
                }
                Err(PepError::Api(api))
                    if use_cache
                        && self.config.enable_expired_cache
                        && api.is_stale_eligible() =>
                {
                    let stale = self.stale_decisions(&misses);
                    match stale {
                        Some(decisions) => {
                            warn!(
                                status = api.status_code,
                                served = decisions.len(),
                                "pdp unavailable, serving expired cache entries"
                            );
                            self.record_many(Counter::ExpiredServed, decisions.len() as u64);
                            for (&index, decision) in miss_indices.iter().zip(decisions) {
                                slots[index] = Some(decision);
                            }
                            error_for_expired_results = Some(api.to_string());
                        }
                        None => return Err(api.into()),
                    }
                }
                Err(error) => return Err(error),
            }
        }

        let decisions = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PepError::internal(&trace, "batch slot left unanswered"))?;

        for decision in &decisions {
            self.record(if decision.permitted {
                Counter::Permits
            } else {
                Counter::Denies
            });
        }

        Ok(Response {
            trace,
            decisions,
            error_for_expired_results,
        })
    }

    /// List the roles a subject holds on each resource.
    ///
    /// Bypasses the decision cache entirely. The batch must share one
    /// `accountId` and carry no actions (the request type has none).
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub async fn authorized_roles(
        &self,
        batch: &[RolesRequest],
        trace: &str,
        token: &str,
    ) -> PepResult<Vec<RoleActions>> {
        let trace = resolve_trace(trace);

        if batch.is_empty() || batch.len() > MAX_ROLES_BATCH {
            return Err(PepError::internal(
                &trace,
                format!(
                    "roles batch size must be between 1 and {MAX_ROLES_BATCH}, got {}",
                    batch.len()
                ),
            ));
        }
        if token.is_empty() {
            return Err(PepError::internal(&trace, "missing bearer token"));
        }

        let account = batch[0].resource.get_str("accountId");
        if account.is_none()
            || batch
                .iter()
                .any(|request| request.resource.get_str("accountId") != account)
        {
            return Err(PepError::internal(
                &trace,
                "roles batch requires one accountId shared by every request",
            ));
        }

        let items = pdp::to_roles_items(batch);
        let outcome = self.client.roles(&items, &trace, token).await?;
        self.record_many(Counter::PdpCalls, u64::from(outcome.retry_count) + 1);
        self.record_many(Counter::Retries, u64::from(outcome.retry_count));
        Ok(outcome.envelope)
    }

    /// Drop every cached decision and reset cache counters.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    /// Number of live cache entries.
    pub fn cache_entries(&self) -> usize {
        self.cache.entries()
    }

    /// Decision-cache statistics.
    pub fn cache_stats(&self) -> dike_cache::CacheStats {
        self.cache.stats()
    }

    /// Orchestrator counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.counters.snapshot()
    }

    /// Route the miss set, call the PDP, convert and cache the outcome.
    async fn dispatch(
        &self,
        misses: &[Request],
        trace: &str,
        token: &str,
    ) -> PepResult<Vec<Decision>> {
        match classify(misses) {
            Route::Bulk(bulk) => {
                debug!(resources = misses.len(), "routing miss set to bulk endpoint");
                let outcome = self.client.bulk(&bulk, trace, token).await?;
                self.record_many(Counter::PdpCalls, u64::from(outcome.retry_count) + 1);
                self.record_many(Counter::Retries, u64::from(outcome.retry_count));

                if let Some(pattern) = outcome.envelope.cache_key_pattern {
                    self.patterns.store(pattern);
                }
                let pattern = self.patterns.snapshot();

                let decisions = outcome
                    .envelope
                    .decisions
                    .iter()
                    .zip(misses)
                    .map(|(item, request)| {
                        let permitted = item.permitted();
                        let reason = deny_reason(permitted, item.reason.as_deref());
                        self.write_cache(
                            request,
                            permitted,
                            reason,
                            item.obligation.as_ref(),
                            pattern.as_ref(),
                        );
                        Decision::fresh(permitted, reason, outcome.retry_count)
                    })
                    .collect();
                Ok(decisions)
            }
            Route::Authz(items) => {
                debug!(items = items.len(), "routing miss set to authz endpoint");
                let mut decisions = Vec::with_capacity(misses.len());

                for (chunk_items, chunk_requests) in
                    items.chunks(MAX_AUTHZ_CALL).zip(misses.chunks(MAX_AUTHZ_CALL))
                {
                    let outcome = self.client.authz(chunk_items, trace, token).await?;
                    self.record_many(Counter::PdpCalls, u64::from(outcome.retry_count) + 1);
                    self.record_many(Counter::Retries, u64::from(outcome.retry_count));

                    if let Some(pattern) = outcome.envelope.cache_key_pattern {
                        self.patterns.store(pattern);
                    }
                    let pattern = self.patterns.snapshot();

                    for (item, request) in
                        outcome.envelope.responses.iter().zip(chunk_requests)
                    {
                        let Some(authz) = item.authorization_decision.as_ref() else {
                            return Err(dike_types::ApiError::new(
                                200,
                                self.client.endpoints().authz.as_str(),
                                trace,
                                "sub-response is missing authorizationDecision",
                            )
                            .into());
                        };
                        let reason = deny_reason(authz.permitted, authz.reason.as_deref());
                        self.write_cache(
                            request,
                            authz.permitted,
                            reason,
                            authz.obligation.as_ref(),
                            pattern.as_ref(),
                        );
                        decisions.push(Decision::fresh(
                            authz.permitted,
                            reason,
                            outcome.retry_count,
                        ));
                    }
                }
                Ok(decisions)
            }
        }
    }

    /// Re-read the misses from cache for stale fallback. `None` when any
    /// request has no entry at all.
    fn stale_decisions(&self, misses: &[Request]) -> Option<Vec<Decision>> {
        let pattern = self.patterns.snapshot();
        misses
            .iter()
            .map(|request| {
                reverse_lookup(request, pattern.as_ref(), self.cache.as_ref())
                    .map(|(_, cached)| Decision::from_cache(cached.permitted, cached.reason, true))
            })
            .collect()
    }

    /// Run forward synthesis and write a fresh decision into the cache.
    fn write_cache(
        &self,
        original: &Request,
        permitted: bool,
        reason: Reason,
        obligation: Option<&pdp::Obligation>,
        pattern: Option<&CacheKeyPattern>,
    ) {
        if self.config.disable_cache {
            return;
        }

        let ttl = if permitted {
            self.ttl
                .permit(obligation.map_or(0, |o| o.max_cache_age_seconds))
        } else {
            match self.ttl.deny() {
                Some(ttl) => ttl,
                None => return,
            }
        };

        let obligation_keys = ObligationKeys {
            subject: obligation
                .and_then(|o| o.subject.as_ref())
                .map(|wire| &wire.attributes),
            resource: obligation
                .and_then(|o| o.resource.as_ref())
                .map(|wire| &wire.attributes),
            actions: obligation.map_or(&[], |o| o.actions.as_slice()),
        };

        for key in forward_keys(original, &obligation_keys, pattern, permitted) {
            self.cache.set(key, permitted, ttl, reason);
        }
    }

    /// Expand an `accessTokenBody` subject through the claims decoder.
    ///
    /// A decoded claim that disagrees with an explicit subject attribute
    /// aborts the call; silently preferring either side would let cache
    /// keys diverge from what the PDP evaluates.
    fn expand(&self, request: &Request, trace: &str) -> PepResult<Request> {
        let Some(blob) = request.subject.get_str(ACCESS_TOKEN_BODY) else {
            return Ok(request.clone());
        };
        let Some(decoder) = &self.claims else {
            return Ok(request.clone());
        };

        let claims = decoder
            .decode(blob)
            .map_err(|e| PepError::internal(trace, e.to_string()))?;

        let mut subject = request.subject.clone();
        for (name, value) in claims.iter() {
            match subject.get(name) {
                Some(existing) if existing != value => {
                    return Err(PepError::internal(
                        trace,
                        format!("claim '{name}' conflicts with an explicit subject attribute"),
                    ));
                }
                Some(_) => {}
                None => subject.insert(name, value.clone()),
            }
        }

        let mut expanded = request.clone();
        expanded.subject = subject;
        Ok(expanded)
    }

    fn record(&self, counter: Counter) {
        self.record_many(counter, 1);
    }

    fn record_many(&self, counter: Counter, n: u64) {
        if n == 0 {
            return;
        }
        self.counters.add(counter, n);
        if let Some(sink) = &self.sink {
            sink.add(counter, n);
        }
    }
}

fn deny_reason(permitted: bool, reason: Option<&str>) -> Reason {
    if permitted {
        Reason::None
    } else {
        Reason::from_pdp(reason.unwrap_or(""))
    }
}

fn resolve_trace(trace: &str) -> String {
    if trace.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        trace.to_string()
    }
}
