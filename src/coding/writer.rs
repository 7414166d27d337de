use bytes::BytesMut;

use crate::error::SessionError;
use crate::transport::SendStream;

use super::Encode;

/// Encodes values and writes them to a stream, one buffer per value.
pub struct Writer<S: SendStream> {
	stream: S,
	buffer: BytesMut,
}

impl<S: SendStream> Writer<S> {
	pub fn new(stream: S) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	pub async fn encode<T: Encode>(&mut self, msg: &T) -> Result<(), SessionError> {
		self.buffer.clear();
		msg.encode(&mut self.buffer)?;
		self.stream.write(&self.buffer).await?;

		Ok(())
	}

	pub async fn write(&mut self, buf: &[u8]) -> Result<(), SessionError> {
		self.stream.write(buf).await?;
		Ok(())
	}

	pub fn reset(&mut self, code: u64) {
		self.stream.reset(code);
	}
}
