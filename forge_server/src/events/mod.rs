//! Typed build events streamed to subscribers.
//!
//! Events are emitted in phase execution order and consumed only by the
//! live stream; they are never persisted.

pub mod build;
