//! # tether-gateway
//!
//! Contract for the chat-platform side of the bridge, plus an in-process
//! loopback implementation.
//!
//! The real platform SDK is an external collaborator; everything the rest
//! of the system needs from it is captured by the [`ChatGateway`] trait:
//! channel resolution, fire-and-forget sends, inbound event delivery and
//! role queries. [`LoopbackGateway`] implements the same contract in
//! memory and is what the tests (and a gateway-less deployment) run
//! against.

pub mod events;
pub mod gateway;
pub mod loopback;

pub use events::InboundEvent;
pub use gateway::{ChatGateway, GatewayError};
pub use loopback::{LoopbackGateway, OutboundPayload, OutboundRecord};
