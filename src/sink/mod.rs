//! External Adapters
//!
//! Persistence and tournament notification, both injected into the session
//! controller at construction.

pub mod results;
pub mod events;

pub use results::{ResultSink, SinkError, MemoryResultSink, JsonLinesResultSink};
pub use events::{
    EventPublisher, PublishError, ChannelPublisher, GameResultEvent, OutboundEvent,
    RESULTS_EXCHANGE, GAME_RESULT_ROUTING_KEY,
};
