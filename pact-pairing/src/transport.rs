#![forbid(unsafe_code)]

//! Transport collaborator contracts (the pub/sub system itself is an
//! external collaborator) and an in-memory topic bus used by the demo
//! binary and the integration suite.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::trace;

use crate::{Error, Result};

/// Messages per topic the in-memory bus keeps for slow subscribers.
const BUS_DEPTH: usize = 256;

/// Publish half of the transport.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, content_topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Subscribe half of the transport.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    async fn subscribe(&self, content_topic: &str) -> Result<Subscription>;
}

/// A live subscription; dropping it (or calling [`Subscription::stop`])
/// unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<Vec<u8>>,
}

impl Subscription {
    /// Next raw message on the topic, in arrival order. Messages missed
    /// while lagging are skipped silently.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Ok(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    trace!(missed = n, "subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Error::transport("subscription closed"))
                }
            }
        }
    }

    pub fn stop(self) {}
}

/// Topic-keyed broadcast bus: every subscriber of a topic sees every
/// message published to it, including the publisher's own.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn channel(&self, content_topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(content_topic.to_string())
            .or_insert_with(|| broadcast::channel(BUS_DEPTH).0)
            .clone()
    }
}

#[async_trait]
impl MessageSender for MemoryTransport {
    async fn send(&self, content_topic: &str, payload: Vec<u8>) -> Result<()> {
        let tx = self.channel(content_topic).await;
        // A send with no live subscriber is not an error on a pub/sub bus.
        let _ = tx.send(payload);
        Ok(())
    }
}

#[async_trait]
impl MessageReceiver for MemoryTransport {
    async fn subscribe(&self, content_topic: &str) -> Result<Subscription> {
        let tx = self.channel(content_topic).await;
        Ok(Subscription { rx: tx.subscribe() })
    }
}
