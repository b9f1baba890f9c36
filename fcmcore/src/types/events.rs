use crate::classify::{
    ClassifyError, DeviceAccountUpdate, InboundEvent, NonconversationalMessage, PushMessage,
};
use std::sync::{Arc, PoisonError, RwLock};

pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

/// Fans events out to every registered handler, synchronously and in
/// registration order.
#[derive(Default, Clone)]
pub struct CoreEventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl CoreEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Returns true if there are any event handlers registered.
    pub fn has_handlers(&self) -> bool {
        !self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn dispatch(&self, event: &Event) {
        for handler in self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            handler.handle_event(event);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnected {
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// The MCS login handshake completed.
    Connected,
    /// The MCS session ended, for any reason.
    Disconnected(Disconnected),
    NewMessage(PushMessage),
    NonconversationalMessage(NonconversationalMessage),
    DeviceAccountUpdate(DeviceAccountUpdate),
    /// A single push could not be classified. The session carries on.
    Error(Arc<ClassifyError>),
}

impl From<InboundEvent> for Event {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::NewMessage(m) => Event::NewMessage(m),
            InboundEvent::NonconversationalMessage(m) => Event::NonconversationalMessage(m),
            InboundEvent::DeviceAccountUpdate(u) => Event::DeviceAccountUpdate(u),
        }
    }
}
