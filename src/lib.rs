//! An implementation of Media over QUIC Transport (MoQT).
//!
//! Two peers exchange versioned control messages on a dedicated
//! bidirectional stream and carry media objects on unidirectional streams or
//! datagrams. Either peer may publish and subscribe to named tracks; this
//! crate implements the session state machine and its bookkeeping, generic
//! over a QUIC or WebTransport substrate via the [`transport`] traits.
//!
//! The entry point is [`Endpoint`], which drives a [`Session`] over a
//! connection. The [`Session`] handle is the application's API: subscribe,
//! announce, fetch, and accept or reject the peer's requests as they arrive
//! on the message queue.

pub mod coding;
pub mod data;
pub mod message;
pub mod setup;
pub mod transport;

mod endpoint;
mod error;
mod session;
mod util;

pub use endpoint::*;
pub use error::*;
pub use session::*;
