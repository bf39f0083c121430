//! Best-effort closing of every channel a module opened.

use crate::api::channel::Channel;
use crate::observability::events;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "teardown";

/// Outcome of a teardown pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    pub closed: usize,
    pub failed: usize,
}

impl TeardownReport {
    pub(crate) fn merge(&mut self, other: TeardownReport) {
        self.closed += other.closed;
        self.failed += other.failed;
    }
}

/// Closes `channels` concurrently. A failed close is logged and counted; it
/// never stops the remaining closes.
pub(crate) async fn close_all(
    module_id: &str,
    channels: Vec<(String, Arc<dyn Channel>)>,
) -> TeardownReport {
    let closes = channels.into_iter().map(|(identifier, channel)| async move {
        match channel.close().await {
            Ok(()) => {
                debug!(
                    event = events::TEARDOWN_CLOSE_OK,
                    component = COMPONENT,
                    module_id,
                    destination = identifier.as_str(),
                    "closed channel"
                );
                true
            }
            Err(err) => {
                warn!(
                    event = events::TEARDOWN_CLOSE_FAILED,
                    component = COMPONENT,
                    module_id,
                    destination = identifier.as_str(),
                    err = %err,
                    "unable to close channel"
                );
                false
            }
        }
    });

    let results = join_all(closes).await;
    let closed = results.iter().filter(|closed| **closed).count();
    TeardownReport {
        closed,
        failed: results.len() - closed,
    }
}

pub(crate) fn log_done(module_id: &str, report: TeardownReport) {
    info!(
        event = events::TEARDOWN_DONE,
        component = COMPONENT,
        module_id,
        closed = report.closed,
        failed = report.failed,
        "teardown complete"
    );
}
