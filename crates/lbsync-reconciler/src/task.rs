//! Poll loop task and its handle
//!
//! The reconciler runs inside a single task. The next poll is armed only once the previous
//! cycle has settled, so cycles never overlap, and commands from the handle are handled
//! between cycles. Stopping disarms the loop: a cycle already in flight finishes, but no
//! further cycle starts.

use lbsync_core::{
    CommittedConfig, FrontendDeclaration, LbsyncError, LbsyncResult, ResolvedConfig,
};
use lbsync_discovery::DiscoveryClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::reconciler::{CycleStats, Reconciler};

enum Command {
    Replace {
        declarations: Vec<FrontendDeclaration>,
        reply: oneshot::Sender<LbsyncResult<ResolvedConfig>>,
    },
    Committed {
        reply: oneshot::Sender<Option<CommittedConfig>>,
    },
    Stats {
        reply: oneshot::Sender<CycleStats>,
    },
}

/// Handle to a running reconciler task
///
/// Dropping every handle stops the loop.
#[derive(Clone)]
pub struct ReconcilerHandle {
    commands: mpsc::Sender<Command>,
    armed: Arc<watch::Sender<bool>>,
    finished: watch::Receiver<bool>,
}

impl ReconcilerHandle {
    /// Replace the active declarations and commit the resulting configuration
    pub async fn replace(
        &self,
        declarations: Vec<FrontendDeclaration>,
    ) -> LbsyncResult<ResolvedConfig> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Replace {
            declarations,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LbsyncError::ReconcilerStopped)?
    }

    /// Last committed configuration
    pub async fn committed(&self) -> LbsyncResult<Option<CommittedConfig>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Committed { reply }).await?;
        rx.await.map_err(|_| LbsyncError::ReconcilerStopped)
    }

    pub async fn stats(&self) -> LbsyncResult<CycleStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply }).await?;
        rx.await.map_err(|_| LbsyncError::ReconcilerStopped)
    }

    /// Cancel the pending poll and disarm the loop
    pub fn stop(&self) {
        self.armed.send_replace(false);
    }

    pub fn is_armed(&self) -> bool {
        *self.armed.borrow()
    }

    /// Wait until the loop has exited
    pub async fn stopped(&self) {
        let mut finished = self.finished.clone();
        // an error means the task is gone, which is just as final
        let _ = finished.wait_for(|done| *done).await;
    }

    async fn send(&self, command: Command) -> LbsyncResult<()> {
        if !self.is_armed() {
            return Err(LbsyncError::ReconcilerStopped);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| LbsyncError::ReconcilerStopped)
    }
}

impl<C: DiscoveryClient + 'static> Reconciler<C> {
    /// Move the reconciler into its own task, polling every `interval`
    pub fn spawn(self, interval: Duration) -> ReconcilerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (armed_tx, armed_rx) = watch::channel(true);
        let (finished_tx, finished_rx) = watch::channel(false);

        tokio::spawn(run(self, interval, commands_rx, armed_rx, finished_tx));

        ReconcilerHandle {
            commands: commands_tx,
            armed: Arc::new(armed_tx),
            finished: finished_rx,
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Replace {
                declarations,
                reply,
            } => {
                info!(frontends = declarations.len(), "Replacing frontend declarations");
                let result = self.configure(declarations, false).await;
                let _ = reply.send(result);
            }
            Command::Committed { reply } => {
                let _ = reply.send(self.committed().cloned());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }
}

async fn run<C: DiscoveryClient + 'static>(
    mut reconciler: Reconciler<C>,
    interval: Duration,
    mut commands: mpsc::Receiver<Command>,
    mut armed: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
) {
    info!(interval_secs = interval.as_secs(), "Reconciler started");

    let next_poll = tokio::time::sleep(interval);
    tokio::pin!(next_poll);

    loop {
        tokio::select! {
            _ = &mut next_poll => {
                let outcome = reconciler.poll().await;
                debug!(?outcome, "Poll cycle settled");

                if !*armed.borrow() {
                    break;
                }
                next_poll.as_mut().reset(Instant::now() + interval);
            }
            changed = armed.changed() => {
                if changed.is_err() || !*armed.borrow() {
                    break;
                }
            }
            command = commands.recv() => match command {
                Some(command) => reconciler.handle(command).await,
                None => break,
            },
        }
    }

    let stats = reconciler.stats();
    info!(
        cycles = stats.cycles,
        commits = stats.commits,
        failures = stats.failures,
        "Reconciler stopped"
    );
    finished.send_replace(true);
}
