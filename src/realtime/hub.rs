//! Subscription registry and fan-out
//!
//! The hub holds no authoritative state: connections and channel memberships
//! are rebuilt by clients when they reconnect.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::events::ServerEvent;

pub type ConnectionId = Uuid;

/// Named group of connections
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Every connection bound to one student
    Student(Uuid),
    /// Admin dashboards
    Admins,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Student(id) => write!(f, "student:{}", id),
            Channel::Admins => write!(f, "admins"),
        }
    }
}

impl Channel {
    pub fn parse(name: &str) -> Option<Self> {
        if name == "admins" {
            return Some(Channel::Admins);
        }
        name.strip_prefix("student:")
            .and_then(|id| Uuid::parse_str(id).ok())
            .map(Channel::Student)
    }
}

/// Where an emission goes, in a form that can cross instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Target {
    Channel(String),
    All,
}

/// Emission forwarded to the other server instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    pub origin: Uuid,
    pub target: Target,
    pub frame: String,
}

struct Connection {
    sender: UnboundedSender<String>,
    student_id: Option<Uuid>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    channels: HashMap<Channel, HashSet<ConnectionId>>,
}

#[derive(Clone)]
pub struct RealtimeHub {
    registry: Arc<RwLock<Registry>>,
    instance_id: Uuid,
    relay: Option<UnboundedSender<RelayMessage>>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    /// Hub that only delivers to local connections
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            instance_id: Uuid::new_v4(),
            relay: None,
        }
    }

    /// Hub that also forwards every channel or broadcast emission to `relay`
    pub fn with_relay(relay: UnboundedSender<RelayMessage>) -> Self {
        Self {
            relay: Some(relay),
            ..Self::new()
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a connection; frames for it arrive on the returned receiver
    pub fn register(&self) -> (ConnectionId, UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.write().connections.insert(
            id,
            Connection {
                sender,
                student_id: None,
            },
        );
        tracing::debug!(connection = %id, "Realtime connection registered");
        (id, receiver)
    }

    /// Drop a connection and all its memberships
    pub fn unregister(&self, id: ConnectionId) {
        let mut registry = self.write();
        registry.connections.remove(&id);
        registry.channels.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        tracing::debug!(connection = %id, "Realtime connection removed");
    }

    /// Join a channel. Joining twice is a no-op.
    pub fn join(&self, id: ConnectionId, channel: Channel) {
        let mut registry = self.write();
        if registry.connections.contains_key(&id) {
            registry.channels.entry(channel).or_default().insert(id);
        }
    }

    /// Bind the connection to a student and join that student's channel
    pub fn bind_student(&self, id: ConnectionId, student_id: Uuid) {
        {
            let mut registry = self.write();
            match registry.connections.get_mut(&id) {
                Some(connection) => connection.student_id = Some(student_id),
                None => return,
            }
        }
        self.join(id, Channel::Student(student_id));
    }

    pub fn student_of(&self, id: ConnectionId) -> Option<Uuid> {
        self.read()
            .connections
            .get(&id)
            .and_then(|c| c.student_id)
    }

    pub fn members(&self, channel: &Channel) -> usize {
        self.read().channels.get(channel).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    /// Send to a single local connection
    pub fn emit_to(&self, id: ConnectionId, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        if let Some(connection) = self.read().connections.get(&id) {
            // A closed receiver means the socket is shutting down
            let _ = connection.sender.send(frame);
        }
    }

    /// Send to every member of a channel, here and on other instances
    pub fn emit_to_channel(&self, channel: &Channel, event: &ServerEvent, except: Option<ConnectionId>) {
        let Some(frame) = encode(event) else { return };
        self.deliver_local(&Target::Channel(channel.to_string()), &frame, except);
        self.forward(Target::Channel(channel.to_string()), frame);
    }

    /// Send to every connection, here and on other instances
    pub fn broadcast(&self, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        self.deliver_local(&Target::All, &frame, None);
        self.forward(Target::All, frame);
    }

    /// Deliver an already encoded frame to local connections only
    pub fn deliver_local(&self, target: &Target, frame: &str, except: Option<ConnectionId>) {
        let registry = self.read();
        let recipients: Vec<&Connection> = match target {
            Target::All => registry.connections.values().collect(),
            Target::Channel(name) => Channel::parse(name)
                .and_then(|c| registry.channels.get(&c))
                .map(|members| {
                    members
                        .iter()
                        .filter(|id| Some(**id) != except)
                        .filter_map(|id| registry.connections.get(id))
                        .collect()
                })
                .unwrap_or_default(),
        };
        for connection in recipients {
            let _ = connection.sender.send(frame.to_string());
        }
    }

    fn forward(&self, target: Target, frame: String) {
        if let Some(relay) = &self.relay {
            let message = RelayMessage {
                origin: self.instance_id,
                target,
                frame,
            };
            if relay.send(message).is_err() {
                tracing::warn!("Realtime relay is gone; emission stays local");
            }
        }
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match event.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode realtime event");
            None
        }
    }
}
