//! Lifecycle event system: a broadcast bus the coordinators publish
//! pairing, queue and execution events onto.

pub mod publisher;

pub use publisher::{EventPublisher, PublishedEvent};
