//! Best-effort follow-up work that runs after a transaction has committed
//!
//! Each action is independent: a failure is logged and reported, never
//! propagated, and never stops the remaining actions.

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

pub type ActionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PostCommitReport {
    pub succeeded: usize,
    pub failed: Vec<(&'static str, String)>,
}

impl PostCommitReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
pub struct PostCommitActions<'a> {
    actions: Vec<(&'static str, BoxFuture<'a, ActionResult>)>,
}

impl<'a> PostCommitActions<'a> {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    pub fn push(&mut self, name: &'static str, action: BoxFuture<'a, ActionResult>) {
        self.actions.push((name, action));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub async fn run(self) -> PostCommitReport {
        let mut report = PostCommitReport::default();

        for (name, action) in self.actions {
            match action.await {
                Ok(()) => {
                    debug!(action = name, "Post-commit action complete");
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!(action = name, error = %e, "Post-commit action failed");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report
    }
}
