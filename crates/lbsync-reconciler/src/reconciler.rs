//! Reconciler state and the poll cycle

use lbsync_core::{
    CommittedConfig, FrontendDeclaration, LbsyncError, LbsyncResult, ResolvedConfig,
};
use lbsync_discovery::{resolve, DiscoveryClient};
use tracing::{debug, info, warn};

use crate::builder::build;
use crate::notifier::ChangeNotifier;

/// Counters kept across poll cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Poll cycles that ran against loaded declarations
    pub cycles: u64,
    /// Poll cycles skipped because no declarations were loaded
    pub skipped: u64,
    /// Configurations handed to subscribers
    pub commits: u64,
    /// Poll cycles that failed
    pub failures: u64,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No declarations loaded yet
    Skipped,
    /// The candidate matched the committed configuration
    Unchanged,
    /// A changed configuration was committed
    Committed,
    /// The cycle failed; the committed configuration is untouched
    Failed,
}

/// Owner of the active declarations and the last committed configuration
///
/// State only changes on commit, which stores the complete new configuration before any
/// subscriber sees it. A poll that detects a change commits the candidate it verified, so each
/// cycle performs exactly one discovery fetch.
pub struct Reconciler<C> {
    client: C,
    notifier: ChangeNotifier,
    declarations: Option<Vec<FrontendDeclaration>>,
    committed: Option<CommittedConfig>,
    stats: CycleStats,
}

impl<C: DiscoveryClient> Reconciler<C> {
    /// Create a reconciler with no declarations loaded
    pub fn new(client: C) -> Self {
        Self::with_notifier(client, ChangeNotifier::new())
    }

    pub fn with_notifier(client: C, notifier: ChangeNotifier) -> Self {
        Self {
            client,
            notifier,
            declarations: None,
            committed: None,
            stats: CycleStats::default(),
        }
    }

    pub fn notifier_mut(&mut self) -> &mut ChangeNotifier {
        &mut self.notifier
    }

    /// Active declarations, `None` until the first commit
    pub fn declarations(&self) -> Option<&[FrontendDeclaration]> {
        self.declarations.as_deref()
    }

    pub fn committed(&self) -> Option<&CommittedConfig> {
        self.committed.as_ref()
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    /// Run the initial commit with the declarations loaded at startup
    ///
    /// Failure here means there is no configuration to run with and is reported as
    /// [`LbsyncError::InitialConfiguration`].
    pub async fn start(
        &mut self,
        declarations: Vec<FrontendDeclaration>,
    ) -> LbsyncResult<ResolvedConfig> {
        self.configure(declarations, false)
            .await
            .map_err(|e| LbsyncError::InitialConfiguration(Box::new(e)))
    }

    /// Fetch, resolve and build the configuration for `declarations`
    ///
    /// Unless `verify_only` is set the result is committed: it becomes the committed
    /// configuration, `declarations` become the active set and subscribers are notified.
    pub async fn configure(
        &mut self,
        declarations: Vec<FrontendDeclaration>,
        verify_only: bool,
    ) -> LbsyncResult<ResolvedConfig> {
        let config = self.candidate(&declarations).await?;

        if !verify_only {
            self.commit(declarations, config.clone());
        }

        Ok(config)
    }

    /// Run one poll cycle
    ///
    /// Errors are logged and counted, never returned.
    pub async fn poll(&mut self) -> PollOutcome {
        let Some(declarations) = self.declarations.clone() else {
            debug!("No frontend declarations loaded, skipping poll");
            self.stats.skipped += 1;
            return PollOutcome::Skipped;
        };

        self.stats.cycles += 1;

        match self.poll_cycle(declarations).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.failures += 1;
                let e = LbsyncError::configuration_failure(e);
                warn!(error = %e, failures = self.stats.failures, "Poll cycle failed");
                PollOutcome::Failed
            }
        }
    }

    async fn poll_cycle(
        &mut self,
        declarations: Vec<FrontendDeclaration>,
    ) -> LbsyncResult<PollOutcome> {
        let candidate = self.configure(declarations.clone(), true).await?;

        let unchanged = self
            .committed
            .as_ref()
            .is_some_and(|committed| *committed.fingerprint() == candidate.fingerprint);
        if unchanged {
            debug!(fingerprint = %candidate.fingerprint, "Backend services unchanged");
            return Ok(PollOutcome::Unchanged);
        }

        info!("Backend services changed, regenerating the configuration");
        self.commit(declarations, candidate);
        Ok(PollOutcome::Committed)
    }

    async fn candidate(
        &self,
        declarations: &[FrontendDeclaration],
    ) -> LbsyncResult<ResolvedConfig> {
        let raw = self.client.fetch_raw().await?;
        let services = resolve(&raw);
        let entries = build(declarations, &services)?;
        ResolvedConfig::new(entries)
    }

    fn commit(&mut self, declarations: Vec<FrontendDeclaration>, config: ResolvedConfig) {
        info!(
            frontends = config.entries.len(),
            resolved = config.resolved_count(),
            fingerprint = %config.fingerprint,
            "Committing configuration"
        );

        self.declarations = Some(declarations);
        self.stats.commits += 1;
        let committed = self.committed.insert(CommittedConfig::new(config));

        let failed = self.notifier.notify(committed.entries());
        if failed > 0 {
            warn!(
                failed,
                subscribers = self.notifier.len(),
                "Some subscribers failed to apply the configuration"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{web_metadata, MockDiscovery};
    use lbsync_core::{FrontendEntry, RawMetadata};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<Vec<FrontendEntry>>>>;

    fn reconciler_with_log(
        mock: &Arc<MockDiscovery>,
    ) -> (Reconciler<Arc<MockDiscovery>>, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let mut reconciler = Reconciler::new(Arc::clone(mock));
        let log = Arc::clone(&received);
        reconciler
            .notifier_mut()
            .subscribe("recorder", move |entries: &[FrontendEntry]| {
                log.lock().unwrap().push(entries.to_vec());
                Ok(())
            });
        (reconciler, received)
    }

    fn web_declarations() -> Vec<FrontendDeclaration> {
        vec![FrontendDeclaration::new("web", "80", "x.com")]
    }

    #[tokio::test]
    async fn test_poll_skipped_without_declarations() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);

        assert_eq!(reconciler.poll().await, PollOutcome::Skipped);
        assert_eq!(mock.fetches(), 0);
        assert_eq!(reconciler.stats().skipped, 1);
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_does_not_mutate_state() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);

        let config = reconciler.configure(web_declarations(), true).await.unwrap();

        assert_eq!(config.resolved_count(), 1);
        assert!(reconciler.committed().is_none());
        assert!(reconciler.declarations().is_none());
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_stores_and_notifies() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);

        let config = reconciler.start(web_declarations()).await.unwrap();

        assert_eq!(reconciler.declarations(), Some(web_declarations().as_slice()));
        assert_eq!(reconciler.committed().unwrap().fingerprint(), &config.fingerprint);
        assert_eq!(reconciler.stats().commits, 1);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], config.entries);
    }

    #[tokio::test]
    async fn test_unchanged_topology_is_not_recommitted() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);
        reconciler.start(web_declarations()).await.unwrap();

        let a = reconciler.configure(web_declarations(), true).await.unwrap();
        let b = reconciler.configure(web_declarations(), true).await.unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);

        assert_eq!(reconciler.poll().await, PollOutcome::Unchanged);
        assert_eq!(reconciler.poll().await, PollOutcome::Unchanged);

        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(reconciler.stats().commits, 1);
        assert_eq!(reconciler.stats().cycles, 2);
    }

    #[tokio::test]
    async fn test_new_instance_is_committed() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);
        reconciler.start(web_declarations()).await.unwrap();

        mock.set(web_metadata(&[("1", "10.0.0.1"), ("2", "10.0.0.2")]));
        assert_eq!(reconciler.poll().await, PollOutcome::Committed);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        let frontend = received[1][0].as_resolved().unwrap();
        assert_eq!(frontend.servers.len(), 2);
        assert!(frontend
            .servers
            .iter()
            .any(|s| s.id == "2" && s.host == "10.0.0.2" && s.port == 8080));
        // one fetch for the start, one for the poll
        assert_eq!(mock.fetches(), 2);
    }

    #[tokio::test]
    async fn test_service_appearing_resolves_entry() {
        let mock = MockDiscovery::new(RawMetadata::default());
        let (mut reconciler, received) = reconciler_with_log(&mock);
        reconciler.start(web_declarations()).await.unwrap();
        assert_eq!(received.lock().unwrap()[0], vec![FrontendEntry::Unresolved]);

        mock.set(web_metadata(&[("1", "10.0.0.1")]));
        assert_eq!(reconciler.poll().await, PollOutcome::Committed);
        assert!(received.lock().unwrap()[1][0].is_resolved());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_committed_config() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);
        let config = reconciler.start(web_declarations()).await.unwrap();

        mock.fail();
        assert_eq!(reconciler.poll().await, PollOutcome::Failed);
        assert_eq!(reconciler.stats().failures, 1);
        assert_eq!(reconciler.committed().unwrap().fingerprint(), &config.fingerprint);

        mock.set(web_metadata(&[("1", "10.0.0.1")]));
        assert_eq!(reconciler.poll().await, PollOutcome::Unchanged);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_is_distinct() {
        let mock = MockDiscovery::new(RawMetadata::default());
        mock.fail();
        let (mut reconciler, received) = reconciler_with_log(&mock);

        let err = reconciler.start(web_declarations()).await.unwrap_err();

        assert!(matches!(err, LbsyncError::InitialConfiguration(_)));
        assert!(err.is_discovery());
        assert!(reconciler.committed().is_none());
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replacing_declarations_commits_new_set() {
        let mock = MockDiscovery::new(web_metadata(&[("1", "10.0.0.1")]));
        let (mut reconciler, received) = reconciler_with_log(&mock);
        reconciler.start(web_declarations()).await.unwrap();

        let replacement = vec![
            FrontendDeclaration::new("web", "80", "x.com"),
            FrontendDeclaration::new("web", "80", "www.x.com"),
        ];
        let config = reconciler.configure(replacement.clone(), false).await.unwrap();

        assert_eq!(config.entries.len(), 2);
        assert_eq!(reconciler.declarations(), Some(replacement.as_slice()));
        assert_eq!(received.lock().unwrap().len(), 2);
        assert_eq!(reconciler.poll().await, PollOutcome::Unchanged);
    }
}
