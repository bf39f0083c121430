//! Lazily created fallback channel used when no routing expression is configured.

use crate::api::channel::{Channel, ChannelNode, Persistence};
use crate::api::status::{ChannelError, ChannelErrorCode};
use crate::observability::events;
use crate::routing::destination_identifier::DestinationIdentifier;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

const COMPONENT: &str = "default_destination";

#[derive(Default)]
struct Handout {
    opened: Option<Arc<dyn Channel>>,
    closed: bool,
}

/// Holds at most one default channel per engine instance.
pub(crate) struct DefaultDestination {
    identifier: DestinationIdentifier,
    persistence: Persistence,
    channel: OnceCell<Arc<dyn Channel>>,
    handout: Mutex<Handout>,
}

impl DefaultDestination {
    pub(crate) fn new(identifier: DestinationIdentifier, persistence: Persistence) -> Self {
        Self {
            identifier,
            persistence,
            channel: OnceCell::new(),
            handout: Mutex::new(Handout::default()),
        }
    }

    pub(crate) fn identifier(&self) -> &DestinationIdentifier {
        &self.identifier
    }

    /// Returns the default channel, opening it on first use. Concurrent callers
    /// share a single `open` call; a failed open is retried by the next caller.
    pub(crate) async fn get_or_open(
        &self,
        node: &dyn ChannelNode,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        if let Some(channel) = self.channel.get() {
            return Ok(channel.clone());
        }
        if self.handout.lock().await.closed {
            return Err(default_closed());
        }
        let channel = self
            .channel
            .get_or_try_init(|| async {
                match node
                    .open_channel(self.identifier.as_str(), self.persistence)
                    .await
                {
                    Ok(channel) => self.record_opened(channel).await,
                    Err(err) => {
                        warn!(
                            event = events::DEFAULT_DESTINATION_CREATE_FAILED,
                            component = COMPONENT,
                            destination = self.identifier.as_str(),
                            err = %err,
                            "unable to open default destination channel"
                        );
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(channel.clone())
    }

    async fn record_opened(
        &self,
        channel: Arc<dyn Channel>,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        let mut handout = self.handout.lock().await;
        if handout.closed {
            drop(handout);
            warn!(
                event = events::DESTINATION_OPENED_AFTER_CLOSE,
                component = COMPONENT,
                destination = self.identifier.as_str(),
                "default destination opened during teardown, closing it"
            );
            if let Err(err) = channel.close().await {
                warn!(
                    event = events::TEARDOWN_CLOSE_FAILED,
                    component = COMPONENT,
                    destination = self.identifier.as_str(),
                    err = %err,
                    "unable to close late default destination channel"
                );
            }
            return Err(default_closed());
        }
        handout.opened = Some(channel.clone());
        info!(
            event = events::DEFAULT_DESTINATION_CREATE,
            component = COMPONENT,
            destination = self.identifier.as_str(),
            "opened default destination channel"
        );
        Ok(channel)
    }

    /// Refuses further opens and returns the default channel if it was created.
    pub(crate) async fn close(&self) -> Option<Arc<dyn Channel>> {
        let mut handout = self.handout.lock().await;
        handout.closed = true;
        handout.opened.clone()
    }
}

fn default_closed() -> ChannelError {
    ChannelError::fail_with_code(ChannelErrorCode::Closed, "default destination is closed")
}

#[cfg(test)]
mod tests {
    use super::DefaultDestination;
    use crate::api::channel::{Channel, ChannelListener, ChannelNode, Persistence};
    use crate::api::message::BytesMessage;
    use crate::api::status::{ChannelError, ChannelErrorCode};
    use crate::routing::destination_identifier::DestinationIdentifier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FlagChannel {
        closed: AtomicBool,
    }

    #[async_trait]
    impl Channel for FlagChannel {
        fn name(&self) -> &str {
            "ndn:/node/DEFAULT-DATA"
        }

        fn is_open(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        async fn publish(&self, _message: BytesMessage) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn subscribe(&self, _listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ChannelError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Blocks every open until `release` is notified.
    #[derive(Default)]
    struct GatedNode {
        opens: AtomicUsize,
        started: Notify,
        release: Notify,
        channel: Arc<FlagChannel>,
    }

    #[async_trait]
    impl ChannelNode for GatedNode {
        fn default_identity(&self) -> &str {
            "ndn:/node"
        }

        async fn open_channel(
            &self,
            _identifier: &str,
            _persistence: Persistence,
        ) -> Result<Arc<dyn Channel>, ChannelError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(self.channel.clone())
        }
    }

    fn holder() -> DefaultDestination {
        DefaultDestination::new(
            DestinationIdentifier::default_for_node("ndn:/node"),
            Persistence::Persistent,
        )
    }

    #[tokio::test]
    async fn open_once_then_reuse() {
        let node = GatedNode::default();
        node.release.notify_one();
        let holder = holder();

        let first = holder.get_or_open(&node).await.unwrap();
        let second = holder.get_or_open(&node).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(node.opens.load(Ordering::SeqCst), 1);
        let closed = holder.close().await.unwrap();
        assert!(Arc::ptr_eq(&closed, &first));
    }

    #[tokio::test]
    async fn close_before_first_use_refuses_open() {
        let node = GatedNode::default();
        let holder = holder();

        assert!(holder.close().await.is_none());
        let err = holder.get_or_open(&node).await.err().unwrap();

        assert_eq!(err.code(), ChannelErrorCode::Closed);
        assert_eq!(node.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_finishing_after_close_is_closed_again() {
        let node = Arc::new(GatedNode::default());
        let holder = Arc::new(holder());

        let pending = {
            let node = node.clone();
            let holder = holder.clone();
            tokio::spawn(async move { holder.get_or_open(node.as_ref()).await.map(|_| ()) })
        };
        node.started.notified().await;

        assert!(holder.close().await.is_none());
        node.release.notify_one();

        let err = pending.await.unwrap().err().unwrap();
        assert_eq!(err.code(), ChannelErrorCode::Closed);
        assert!(!node.channel.is_open());
    }
}
