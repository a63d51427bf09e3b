//! DAB over MQTT - request/response correlation on top of publish/subscribe
//!
//! Devices answer DAB commands on `<command topic>/<correlation id>` and reply on
//! `_response/<request topic>`. Controllers issue commands as if they were plain
//! async calls. Both roles share one [`DabSession`] type.

pub mod broker;
pub mod device;
pub mod error;
pub mod session;
pub mod topics;
pub mod transport;

pub use broker::MemoryBroker;
pub use error::{DabError, HandlerError, HandlerResult, Result};
pub use session::messages::ErrorResponse;
pub use session::{DabSession, RequestHandler, RetainedMessage, SessionBuilder, SessionConfig, SessionState};
pub use topics::{TopicError, TopicFilter};
pub use transport::{Connector, MqttConfig, MqttConnector, Transport, TransportEvent};
