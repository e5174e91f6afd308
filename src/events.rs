//! Growth events and the listener registry they are published through.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthEventKind {
    Sprout,
    Evolve,
    Bloom,
    Fruit,
    Wither,
    Boost,
}

impl GrowthEventKind {
    pub fn name(self) -> &'static str {
        match self {
            GrowthEventKind::Sprout => "sprout",
            GrowthEventKind::Evolve => "evolve",
            GrowthEventKind::Bloom => "bloom",
            GrowthEventKind::Fruit => "fruit",
            GrowthEventKind::Wither => "wither",
            GrowthEventKind::Boost => "boost",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthEvent {
    pub kind: GrowthEventKind,
    pub node_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl GrowthEvent {
    pub fn new(kind: GrowthEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

impl fmt::Display for GrowthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.timestamp.format("%H:%M:%S"), self.kind.name(), self.message)?;
        if let Some(id) = &self.node_id {
            write!(f, " (node {})", id)?;
        }
        Ok(())
    }
}

pub type Listener = Box<dyn FnMut(&GrowthEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listeners are called synchronously, in the order they subscribed.
/// Nothing is buffered: a late subscriber never sees earlier events.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &GrowthEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
