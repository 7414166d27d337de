use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

/// Whether the endpoint initiated the connection.
///
/// The perspective determines the setup direction and the parity of the
/// request IDs generated by this endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Perspective {
	Client,
	Server,
}

impl Perspective {
	pub fn peer(&self) -> Self {
		match self {
			Self::Client => Self::Server,
			Self::Server => Self::Client,
		}
	}

	// Request IDs start at the parity of the perspective and increment by 2,
	// so client and server IDs never collide.
	pub(crate) fn request_id_parity(&self) -> u64 {
		match self {
			Self::Client => 0,
			Self::Server => 1,
		}
	}
}

impl fmt::Display for Perspective {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Client => write!(f, "client"),
			Self::Server => write!(f, "server"),
		}
	}
}

/// The substrate carrying the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
	Quic,
	WebTransport,
}

/// An opaque error produced by the connection substrate.
#[derive(Clone)]
pub struct TransportError(Arc<dyn std::error::Error + Send + Sync>);

impl TransportError {
	pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
		Self(Arc::new(err))
	}
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl fmt::Debug for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl std::error::Error for TransportError {}

/// A QUIC connection or WebTransport session.
///
/// The session engine is generic over this trait so it runs unchanged over
/// raw QUIC or a WebTransport binding.
#[async_trait]
pub trait Connection: Clone + Send + Sync + 'static {
	type SendStream: SendStream;
	type RecvStream: RecvStream;

	async fn open_bi(&self) -> Result<(Self::SendStream, Self::RecvStream), TransportError>;
	async fn accept_bi(&self) -> Result<(Self::SendStream, Self::RecvStream), TransportError>;

	async fn open_uni(&self) -> Result<Self::SendStream, TransportError>;
	async fn accept_uni(&self) -> Result<Self::RecvStream, TransportError>;

	async fn send_datagram(&self, payload: Bytes) -> Result<(), TransportError>;
	async fn recv_datagram(&self) -> Result<Bytes, TransportError>;

	/// Close the connection with an application error code.
	fn close(&self, code: u64, reason: &str);

	fn perspective(&self) -> Perspective;
}

/// The outgoing half of a stream.
#[async_trait]
pub trait SendStream: Send + Unpin + 'static {
	/// Write the entire buffer to the stream.
	async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

	/// Abandon the stream with an application error code.
	fn reset(&mut self, code: u64);

	fn id(&self) -> u64;
}

/// The incoming half of a stream.
#[async_trait]
pub trait RecvStream: Send + Unpin + 'static {
	/// Read the next chunk of at most `max` bytes, or `None` at the end of the stream.
	async fn read(&mut self, max: usize) -> Result<Option<Bytes>, TransportError>;

	/// Tell the peer to stop sending with an application error code.
	fn stop(&mut self, code: u64);

	fn id(&self) -> u64;
}
