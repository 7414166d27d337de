use std::io;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::SessionError;
use crate::transport::RecvStream;

use super::{Decode, DecodeError};

/// Decodes length-delimited values from a stream, owning the buffering.
pub struct Reader<R: RecvStream> {
	stream: R,
	buffer: BytesMut,
}

impl<R: RecvStream> Reader<R> {
	pub fn new(stream: R) -> Self {
		Self {
			stream,
			buffer: Default::default(),
		}
	}

	pub async fn decode<T: Decode>(&mut self) -> Result<T, SessionError> {
		loop {
			// Try to decode with the current buffer.
			let mut cursor = io::Cursor::new(&self.buffer);
			match T::decode(&mut cursor) {
				Ok(msg) => {
					let size = cursor.position() as usize;
					self.buffer.advance(size);
					return Ok(msg);
				}
				Err(DecodeError::More(_)) => {}
				Err(err) => return Err(err.into()),
			};

			if !self.fill().await? {
				return Err(DecodeError::UnexpectedEnd.into());
			}
		}
	}

	/// Read exactly `size` bytes of payload.
	pub async fn read_exact(&mut self, size: usize) -> Result<Bytes, SessionError> {
		while self.buffer.len() < size {
			if !self.fill().await? {
				return Err(DecodeError::UnexpectedEnd.into());
			}
		}

		Ok(self.buffer.split_to(size).freeze())
	}

	/// Returns true when the stream is finished and fully drained.
	pub async fn done(&mut self) -> Result<bool, SessionError> {
		Ok(self.buffer.is_empty() && !self.fill().await?)
	}

	pub fn stop(&mut self, code: u64) {
		self.stream.stop(code);
	}

	async fn fill(&mut self) -> Result<bool, SessionError> {
		match self.stream.read(8192).await? {
			Some(chunk) => {
				self.buffer.extend_from_slice(&chunk);
				Ok(true)
			}
			None => Ok(false),
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::message::{self, Message};
	use crate::util::test::TestStream;

	use super::*;

	#[tokio::test]
	async fn reassembles_split_reads() {
		// An UNSUBSCRIBE frame delivered one byte at a time.
		let mut reader = Reader::new(TestStream::new([&[0x0a], &[0x00], &[0x01], &[0x07]]));

		let msg: Message = reader.decode().await.unwrap();
		assert_eq!(msg, message::Unsubscribe { request_id: 7 }.into());
		assert!(reader.done().await.unwrap());
	}

	#[tokio::test]
	async fn truncated_frame() {
		// The length prefix promises more bytes than the stream carries.
		let mut reader = Reader::new(TestStream::new([&[0x0a, 0x00, 0x01]]));

		let err = reader.decode::<Message>().await.unwrap_err();
		assert!(matches!(err, SessionError::Decode(DecodeError::UnexpectedEnd)));
	}
}
