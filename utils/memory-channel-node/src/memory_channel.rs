//! Shared in-memory channel with synchronous fan-out to subscribers.

use async_trait::async_trait;
use channel_fork::{
    BytesMessage, Channel, ChannelError, ChannelErrorCode, ChannelListener, Persistence,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::debug;

pub struct MemoryChannel {
    name: String,
    persistence: Persistence,
    reject_publish: bool,
    reject_close: bool,
    open: AtomicBool,
    published: AtomicUsize,
    close_calls: AtomicUsize,
    latest: StdMutex<Option<BytesMessage>>,
    listeners: Mutex<Vec<Arc<dyn ChannelListener>>>,
}

impl MemoryChannel {
    pub(crate) fn new(
        name: &str,
        persistence: Persistence,
        reject_publish: bool,
        reject_close: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            persistence,
            reject_publish,
            reject_close,
            open: AtomicBool::new(true),
            published: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            latest: StdMutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    /// Number of accepted publishes.
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Last accepted message.
    pub fn latest_message(&self) -> Option<BytesMessage> {
        match self.latest.lock() {
            Ok(latest) => latest.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.listeners.lock().await.len()
    }

    fn closed_error(&self) -> ChannelError {
        ChannelError::fail_with_code(
            ChannelErrorCode::Closed,
            format!("channel '{}' is closed", self.name),
        )
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn publish(&self, message: BytesMessage) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        if self.reject_publish {
            return Err(ChannelError::fail_with_code(
                ChannelErrorCode::Unavailable,
                format!("publish to '{}' refused", self.name),
            ));
        }

        self.published.fetch_add(1, Ordering::SeqCst);
        match self.latest.lock() {
            Ok(mut latest) => *latest = Some(message.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(message.clone()),
        }

        // snapshot so listeners may publish to this channel without deadlocking
        let listeners = self.listeners.lock().await.clone();
        for listener in listeners {
            listener.on_receive(message.clone()).await;
        }
        Ok(())
    }

    async fn subscribe(&self, listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(self.closed_error());
        }
        self.listeners.lock().await.push(listener);
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_close {
            return Err(ChannelError::fail_with_code(
                ChannelErrorCode::Internal,
                format!("close of '{}' failed", self.name),
            ));
        }
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("MemoryChannel: closed {}", self.name);
            self.listeners.lock().await.clear();
        }
        Ok(())
    }
}
