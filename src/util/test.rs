use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;

use crate::transport::{RecvStream, TransportError};

/// A receive stream yielding one queued chunk per read call.
pub struct TestStream {
	chunks: VecDeque<Bytes>,
}

impl TestStream {
	pub fn new<const N: usize>(chunks: [&[u8]; N]) -> Self {
		Self {
			chunks: chunks.iter().map(|chunk| Bytes::copy_from_slice(chunk)).collect(),
		}
	}
}

#[async_trait]
impl RecvStream for TestStream {
	async fn read(&mut self, _max: usize) -> Result<Option<Bytes>, TransportError> {
		Ok(self.chunks.pop_front())
	}

	fn stop(&mut self, _code: u64) {}

	fn id(&self) -> u64 {
		0
	}
}
