//! DAB sessions over a publish/subscribe broker
//!
//! A [`DabSession`] owns one broker connection. A single delivery loop drains
//! inbound messages in order: responses to our own requests are handed to the
//! waiting caller through the [`CorrelationRegistry`], everything else goes to
//! the [`Dispatcher`] and its request handlers.

mod client;
mod config;
mod dispatch;
pub mod messages;
mod registry;

pub use client::{DabSession, SessionBuilder, SessionState};
pub use config::SessionConfig;
pub use dispatch::{Dispatch, Dispatcher, HandlerFn, Reply, RequestHandler, RetainedMessage};
pub use registry::{CorrelationRegistry, PendingResponse};
