//! Worker context: everything one worker process coordinates through
//!
//! Built once per worker and shared by all of its virtual users
//! (`Arc<WorkerContext>`). Separate contexts share nothing but the pointer
//! directory, so tests can build as many as they like side by side.

use crate::auth::{CredentialCache, TokenClient, TokenPolicy};
use crate::config::CoordinatorConfig;
use crate::correlate::{CorrelationEngine, CorrelationOutcome, CorrelationRule};
use crate::failure_log::FailureLog;
use crate::pool::{Claim, ColumnMapping, DataPoolDistributor, PointerStore};
use crate::run::{RunControl, RunReport};
use loadkit_common::{LoadkitError, Result, VariableStore};
use serde_json::Value as Json;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};

pub struct WorkerContext {
    config: CoordinatorConfig,
    credentials: CredentialCache,
    distributor: DataPoolDistributor,
    engine: CorrelationEngine,
    run: Arc<RunControl>,
    failure_log: Option<FailureLog>,
}

impl WorkerContext {
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let run = Arc::new(RunControl::new(
            config.run_id.clone(),
            config.stop_delay,
            config.max_failures,
        ));
        let credentials = CredentialCache::new(TokenClient::new(config.http_timeout)?);
        let distributor = DataPoolDistributor::new(
            PointerStore::new(&config.pointer_dir),
            config.delimiter,
            Arc::clone(&run),
        );
        let failure_log = config
            .failure_log
            .as_ref()
            .map(|path| FailureLog::new(path, config.run_id.clone(), std::process::id().to_string()));

        Ok(Self {
            config,
            credentials,
            distributor,
            engine: CorrelationEngine::new(),
            run,
            failure_log,
        })
    }

    /// Replace the token validity window
    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Result<Self> {
        self.credentials =
            CredentialCache::with_policy(TokenClient::new(self.config.http_timeout)?, policy);
        Ok(self)
    }

    /// Seed `RANDOM` correlation for reproducible runs
    pub fn with_correlation_seed(mut self, seed: u64) -> Self {
        self.engine = CorrelationEngine::with_seed(seed);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn run(&self) -> &Arc<RunControl> {
        &self.run
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    pub fn distributor(&self) -> &DataPoolDistributor {
        &self.distributor
    }

    pub async fn token(
        &self,
        client_identity: &str,
        client_secret: &str,
        token_endpoint: &str,
    ) -> Result<String> {
        self.credentials
            .get_token(client_identity, client_secret, token_endpoint)
            .await
    }

    pub fn claim_next(
        &self,
        source: &Path,
        mapping: &ColumnMapping,
        reset_requested: bool,
    ) -> Result<Claim> {
        self.distributor.claim_next(source, mapping, reset_requested)
    }

    /// Start an iteration: claim a row and seed a fresh variable store with it.
    ///
    /// `None` means no iteration should run, either because a stop was
    /// requested or because the pool is exhausted. Blocking, like
    /// [`DataPoolDistributor::claim_next`].
    pub fn begin_iteration(
        &self,
        source: &Path,
        mapping: &ColumnMapping,
        reset_requested: bool,
    ) -> Result<Option<VariableStore>> {
        if self.run.is_stopping() {
            return Ok(None);
        }

        let claim = self.claim_next(source, mapping, reset_requested)?;
        if claim.exhausted {
            return Ok(None);
        }

        let mut vars = VariableStore::new();
        claim.apply_to(&mut vars);
        Ok(Some(vars))
    }

    pub fn correlate(
        &self,
        captured: &Json,
        array_path: &str,
        rules: &[CorrelationRule],
        vars: &mut VariableStore,
    ) -> CorrelationOutcome {
        self.engine.correlate(captured, array_path, rules, vars)
    }

    /// Record a failed iteration. Counts toward the failure cap and is
    /// appended to the failure log when one is configured. Returns the
    /// cumulative number of failures.
    pub fn record_failure(&self, failure: &LoadkitError) -> u64 {
        warn!(run_id = %self.run.run_id(), kind = failure.kind(), error = %failure, "Iteration failed");

        if let Some(log) = &self.failure_log {
            if let Err(e) = log.append(failure) {
                error!(path = %log.path().display(), error = %e, "Failed to append to failure log");
            }
        }

        self.run.record_failure()
    }

    pub fn report(&self) -> RunReport {
        self.run.report()
    }
}
