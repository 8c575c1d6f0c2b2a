//! Document and layer-composition notifications
//!
//! External event sources publish into an [`EventBus`] through cloned
//! [`EventSender`] handles. The owning document context drains the bus on
//! its own loop; observers registered with [`EventBus::subscribe`] get a
//! copy of every drained notification until the bus is shut down.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Document lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    Opened,
    Saved,
    Closed,
}

/// Layer-composition notifications, carrying the affected layer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerEvent {
    SublayersChanged(String),
    MutenessChanged(String),
    LockChanged(String),
}

impl LayerEvent {
    pub fn identifier(&self) -> &str {
        match self {
            LayerEvent::SublayersChanged(identifier)
            | LayerEvent::MutenessChanged(identifier)
            | LayerEvent::LockChanged(identifier) => identifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Document(DocumentEvent),
    Layer(LayerEvent),
}

impl Notification {
    /// Whether the notification asks for a correction pass.
    pub fn triggers_validation(&self) -> bool {
        !matches!(self, Notification::Document(DocumentEvent::Closed))
    }
}

impl From<DocumentEvent> for Notification {
    fn from(event: DocumentEvent) -> Self {
        Notification::Document(event)
    }
}

impl From<LayerEvent> for Notification {
    fn from(event: LayerEvent) -> Self {
        Notification::Layer(event)
    }
}

/// Cloneable handle used by event sources to publish.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<Notification>,
}

impl EventSender {
    /// Publish a notification. Returns `false` once the bus is gone.
    pub fn send(&self, notification: impl Into<Notification>) -> bool {
        self.sender.send(notification.into()).is_ok()
    }
}

/// Inbound queue plus observer fan-out for one document.
pub struct EventBus {
    sender: Sender<Notification>,
    receiver: Receiver<Notification>,
    observers: Mutex<Vec<Sender<Notification>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    pub fn publish(&self, notification: impl Into<Notification>) {
        // The bus holds its own receiver, so the channel cannot be disconnected.
        let _ = self.sender.send(notification.into());
    }

    /// Register an observer. The receiver disconnects on [`shutdown`](Self::shutdown).
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = unbounded();
        self.observers.lock().push(sender);
        receiver
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Take every queued notification and forward each one to observers.
    /// Observers whose receiver was dropped are forgotten.
    pub fn drain(&self) -> Vec<Notification> {
        let drained: Vec<Notification> = self.receiver.try_iter().collect();
        self.broadcast(&drained);
        drained
    }

    /// Forward notifications to observers without queuing them.
    pub fn broadcast(&self, notifications: &[Notification]) {
        if notifications.is_empty() {
            return;
        }
        let mut observers = self.observers.lock();
        observers.retain(|observer| {
            notifications
                .iter()
                .all(|notification| observer.send(notification.clone()).is_ok())
        });
    }

    /// Discard queued notifications without forwarding them.
    pub fn discard(&self) -> usize {
        self.receiver.try_iter().count()
    }

    /// Drop every observer registration.
    pub fn shutdown(&self) {
        self.discard();
        self.observers.lock().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
