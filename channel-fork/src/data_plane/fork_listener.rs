//! Inbound-channel listener adapter that hands each message to the router.

use crate::api::channel::ChannelListener;
use crate::api::message::BytesMessage;
use crate::routing::fork_router::ForkRouter;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct ForkListener {
    router: Arc<ForkRouter>,
}

impl ForkListener {
    pub(crate) fn new(router: Arc<ForkRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl ChannelListener for ForkListener {
    async fn on_receive(&self, message: BytesMessage) {
        // outcomes are already logged by the router
        let _ = self.router.dispatch(message).await;
    }
}
