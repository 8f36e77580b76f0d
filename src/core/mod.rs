//! Core engine module - lifecycle and event distribution

mod engine;
mod event_bus;

pub use engine::Engine;
pub use event_bus::{Event, EventBus, EventPayload, EventType};
