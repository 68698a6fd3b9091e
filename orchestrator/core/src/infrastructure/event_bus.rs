// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Module Entitlement Events
//
// In-process event streaming over a tokio broadcast channel. Implements the
// `EventPublisher` port used by the change notifier stage; observers (the CLI,
// tests) subscribe per topic.
//
// Events are lost on restart and slow receivers drop the oldest messages.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::config::EventBusConfig;
use crate::domain::errors::IntegrationError;
use crate::domain::events::{EventPublisher, ModuleEntitlementEvent};

/// One published message: topic, partition key, payload
#[derive(Debug, Clone, Serialize)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub event: ModuleEntitlementEvent,
}

/// Event bus for publishing and subscribing to entitlement events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<BusMessage>>,
    send_timeout: Duration,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before dropping old ones.
    pub fn new(capacity: usize, send_timeout: Duration) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
            send_timeout,
        }
    }

    pub fn from_config(config: &EventBusConfig) -> Self {
        Self::new(config.capacity, config.send_timeout)
    }

    /// Create event bus with default capacity (1000) and a 10s send timeout
    pub fn with_default_capacity() -> Self {
        Self::new(1000, Duration::from_secs(10))
    }

    /// Subscribe to every topic
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            topic: None,
        }
    }

    /// Subscribe to a single topic
    pub fn subscribe_topic(&self, topic: impl Into<String>) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            topic: Some(topic.into()),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, topic: &str, key: &str, event: &ModuleEntitlementEvent) -> Result<(), IntegrationError> {
        let message = BusMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            event: event.clone(),
        };
        let sender = self.sender.clone();

        // Same contract as a remote producer: fail after `send_timeout`
        let sent = tokio::time::timeout(self.send_timeout, async move { sender.send(message) })
            .await
            .map_err(|_| {
                IntegrationError::new(format!(
                    "Publishing to {} timed out after {:?}",
                    topic, self.send_timeout
                ))
            })?;

        match sent {
            Ok(receivers) => debug!(topic, key, module = %event.module_id, receivers, "Published event"),
            Err(_) => debug!(topic, key, module = %event.module_id, "No subscribers listening to event"),
        }
        Ok(())
    }
}

/// Receiver for bus messages, optionally filtered by topic
pub struct EventReceiver {
    receiver: broadcast::Receiver<BusMessage>,
    topic: Option<String>,
}

impl EventReceiver {
    /// Receive the next matching message (waits until one is available)
    pub async fn recv(&mut self) -> Result<BusMessage, EventBusError> {
        loop {
            let message = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&message) {
                return Ok(message);
            }
        }
    }

    /// Try to receive a matching message without waiting
    pub fn try_recv(&mut self) -> Result<BusMessage, EventBusError> {
        loop {
            let message = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if self.matches(&message) {
                return Ok(message);
            }
        }
    }

    fn matches(&self, message: &BusMessage) -> bool {
        self.topic.as_deref().is_none_or(|topic| topic == message.topic)
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
