use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::ModelKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ModelLoading { name: String, kind: ModelKind },
    ModelLoaded { name: String, kind: ModelKind },
    ModelLoadFailed { name: String, error: String },
    ModelReplaced { name: String },
    ModelUnloaded { name: String },
    ActiveModelChanged { name: Option<String> },
    InferenceError { model: String, error: String },
}

impl Event {
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ModelLoading { .. } => "model_loading",
            Event::ModelLoaded { .. } => "model_loaded",
            Event::ModelLoadFailed { .. } => "model_load_failed",
            Event::ModelReplaced { .. } => "model_replaced",
            Event::ModelUnloaded { .. } => "model_unloaded",
            Event::ActiveModelChanged { .. } => "active_model_changed",
            Event::InferenceError { .. } => "inference_error",
        }
    }
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
    fn name(&self) -> &str;
}

pub type HandlerId = usize;

#[derive(Default)]
struct Handlers {
    next_id: HandlerId,
    entries: HashMap<HandlerId, Arc<dyn EventHandler>>,
}

/// Fan-out of registry events to subscribed handlers, in subscription order.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Handlers>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<H: EventHandler + 'static>(&self, handler: H) -> HandlerId {
        self.subscribe_arc(Arc::new(handler))
    }

    pub fn subscribe_arc(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        let mut handlers = self.handlers.write();
        handlers.next_id += 1;
        let id = handlers.next_id;
        tracing::debug!("Subscribed event handler {} as #{}", handler.name(), id);
        handlers.entries.insert(id, handler);
        id
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.handlers.write().entries.remove(&id).is_some()
    }

    pub fn publish(&self, event: Event) {
        let handlers: Vec<(HandlerId, Arc<dyn EventHandler>)> = {
            let guard = self.handlers.read();
            let mut entries: Vec<_> = guard
                .entries
                .iter()
                .map(|(id, h)| (*id, Arc::clone(h)))
                .collect();
            entries.sort_by_key(|(id, _)| *id);
            entries
        };

        for (_, handler) in handlers {
            handler.handle(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.handlers.write().entries.clear();
    }
}

pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &Event) {
        match event {
            Event::ModelLoadFailed { .. } | Event::InferenceError { .. } => {
                tracing::warn!(event = event.type_name(), "{:?}", event)
            }
            _ => tracing::info!(event = event.type_name(), "{:?}", event),
        }
    }

    fn name(&self) -> &str {
        "logging"
    }
}
