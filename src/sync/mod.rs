//! Async primitives (§4.D): thread-safe bridges between radio callbacks
//! and request coroutines. Each primitive guards its state with a mutex
//! held only across the synchronous portion of an operation — never
//! across an `.await` (§5 "Shared resources").
//!
//! §9 describes a separate `Scheduler` port (`post`/`post_and_wait`) for
//! handing a completion from a radio-thread callback to the event-loop
//! thread. This crate's event loop *is* the tokio runtime the primitives
//! already run on, so each primitive hands off via `tokio::sync::oneshot`
//! directly rather than through a standalone scheduler type — a waiter
//! registers a sender, a trigger/post consumes it, and tokio delivers the
//! result to whichever task polls the receiver. No separate `Scheduler`
//! handle is threaded through construction.

pub mod fuse;
pub mod keyed_event;
pub mod response_stream;

pub use fuse::Fuse;
pub use keyed_event::KeyedEvent;
pub use response_stream::ResponseStream;
