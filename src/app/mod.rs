pub mod events;

pub use events::{Event, EventBus, EventHandler, HandlerId, LoggingHandler};
