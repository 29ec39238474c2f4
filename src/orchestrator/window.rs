//! Narrow ports onto the window system: popup opening, popup-side opener
//! access, and cross-window messaging. The orchestrators only see these
//! traits, so every flow is drivable in tests without a browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::models::message::InboundMessage;

/// Handle to a popup window this client opened.
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;

    /// Close the window; closing an already-closed window is a no-op.
    fn close(&self);
}

/// Opens popup windows. `None` means the user agent blocked the popup.
pub trait WindowOpener: Send + Sync {
    fn open(&self, url: &str, name: &str, features: &str) -> Option<Box<dyn PopupWindow>>;
}

/// The popup's view of the window that opened it, plus the ability to close
/// itself once the exchange is over.
pub trait OpenerWindow: Send + Sync {
    /// Post a message back to the opener window.
    fn post_message(&self, data: serde_json::Value);

    /// Close this popup.
    fn close(&self);
}

/// Fan-out source of window messages, standing in for the window's message
/// event. Subscriptions are registered listeners; dropping one unregisters
/// it, so a terminated session cannot leak a listener.
pub struct MessageHub {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<InboundMessage>>>,
    next_id: AtomicU64,
}

impl MessageHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Register a listener.
    pub fn subscribe(self: &Arc<Self>) -> MessageSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .insert(id, tx);
        MessageSubscription {
            id,
            hub: Arc::clone(self),
            rx,
        }
    }

    /// Deliver a message to every registered listener.
    pub fn post(&self, origin: impl Into<String>, data: serde_json::Value) {
        let message = InboundMessage {
            origin: origin.into(),
            data,
        };
        let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        for sender in subscribers.values() {
            // A send to a subscription mid-drop just goes nowhere.
            let _ = sender.send(message.clone());
        }
    }

    /// Number of registered listeners; sessions must leave this at its
    /// pre-session value once terminal.
    pub fn listener_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .len()
    }
}

/// A registered message listener; unregisters itself on drop.
pub struct MessageSubscription {
    id: u64,
    hub: Arc<MessageHub>,
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl MessageSubscription {
    /// Next delivered message; `None` once the hub side is gone.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.hub
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .remove(&self.id);
    }
}
