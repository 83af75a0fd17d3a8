//! Committed configuration subscribers

use lbsync_core::{FrontendEntry, LbsyncResult};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// Handler invoked with every committed configuration
pub type Subscriber = Box<dyn Fn(&[FrontendEntry]) -> LbsyncResult<()> + Send + Sync>;

/// Ordered list of subscribers
///
/// Handlers run synchronously in registration order. A handler that returns an error or
/// panics is logged and skipped; the remaining handlers still run.
#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: Vec<(String, Subscriber)>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name used in logs
    pub fn subscribe<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[FrontendEntry]) -> LbsyncResult<()> + Send + Sync + 'static,
    {
        self.subscribers.push((name.into(), Box::new(handler)));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver a committed configuration, returning how many handlers failed
    pub fn notify(&self, entries: &[FrontendEntry]) -> usize {
        let mut failed = 0;

        for (name, handler) in &self.subscribers {
            match catch_unwind(AssertUnwindSafe(|| handler(entries))) {
                Ok(Ok(())) => debug!(subscriber = %name, "Subscriber notified"),
                Ok(Err(e)) => {
                    failed += 1;
                    error!(subscriber = %name, error = %e, "Subscriber failed");
                }
                Err(panic) => {
                    failed += 1;
                    error!(
                        subscriber = %name,
                        panic = panic_message(panic.as_ref()),
                        "Subscriber panicked"
                    );
                }
            }
        }

        failed
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field(
                "subscribers",
                &self.subscribers.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
