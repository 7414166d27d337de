use async_trait::async_trait;
use bytes::{Buf, Bytes};

use crate::coding::{Decode, DecodeError, Reader};
use crate::error::SessionError;
use crate::transport::RecvStream;

use super::{Header, Object, OBJECT_STATUS_NORMAL};

/// A source of decoded objects from one incoming data stream.
///
/// A lazy, finite, non-restartable sequence: objects are decoded on demand
/// and the sequence ends at the end of the stream or on the first error.
#[async_trait]
pub trait ObjectStream: Send {
	fn header(&self) -> &Header;

	/// The next object, or `None` at the end of the stream.
	async fn next(&mut self) -> Result<Option<Object>, SessionError>;

	/// Abandon the stream with an application error code.
	fn stop(&mut self, code: u64);
}

/// Decodes the objects of one unidirectional stream.
pub struct StreamParser<R: RecvStream> {
	header: Header,
	reader: Reader<R>,
}

impl<R: RecvStream> StreamParser<R> {
	/// Read the stream header and select the parser variant.
	pub async fn accept(mut reader: Reader<R>) -> Result<Self, SessionError> {
		let header: Header = reader.decode().await?;
		log::trace!("accepted data stream: {:?}", header);

		Ok(Self { header, reader })
	}
}

#[async_trait]
impl<R: RecvStream> ObjectStream for StreamParser<R> {
	fn header(&self) -> &Header {
		&self.header
	}

	async fn next(&mut self) -> Result<Option<Object>, SessionError> {
		if self.reader.done().await? {
			return Ok(None);
		}

		let (mut object, size) = match &self.header {
			Header::Track(header) => {
				let meta: TrackObject = self.reader.decode().await?;
				let object = Object {
					group_id: meta.group_id,
					subgroup_id: 0,
					object_id: meta.object_id,
					publisher_priority: header.publisher_priority,
					status: meta.status,
					payload: Bytes::new(),
				};
				(object, meta.size)
			}
			Header::Subgroup(header) => {
				let meta: SubgroupObject = self.reader.decode().await?;
				let object = Object {
					group_id: header.group_id,
					subgroup_id: header.subgroup_id,
					object_id: meta.object_id,
					publisher_priority: header.publisher_priority,
					status: meta.status,
					payload: Bytes::new(),
				};
				(object, meta.size)
			}
			Header::Fetch(_) => {
				let meta: FetchObject = self.reader.decode().await?;
				let object = Object {
					group_id: meta.group_id,
					subgroup_id: meta.subgroup_id,
					object_id: meta.object_id,
					publisher_priority: meta.publisher_priority,
					status: meta.status,
					payload: Bytes::new(),
				};
				(object, meta.size)
			}
		};

		object.payload = self.reader.read_exact(size).await?;
		log::trace!("received object: {:?}", object);

		Ok(Some(object))
	}

	fn stop(&mut self, code: u64) {
		self.reader.stop(code);
	}
}

// The per-object wire encodings. The payload size is decoded here; when it
// is zero an object status follows instead of a payload.

struct TrackObject {
	group_id: u64,
	object_id: u64,
	size: usize,
	status: u64,
}

impl Decode for TrackObject {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let group_id = u64::decode(r)?;
		let object_id = u64::decode(r)?;
		let size = usize::decode(r)?;
		let status = match size {
			0 => u64::decode(r)?,
			_ => OBJECT_STATUS_NORMAL,
		};

		Ok(Self {
			group_id,
			object_id,
			size,
			status,
		})
	}
}

struct SubgroupObject {
	object_id: u64,
	size: usize,
	status: u64,
}

impl Decode for SubgroupObject {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let object_id = u64::decode(r)?;
		let size = usize::decode(r)?;
		let status = match size {
			0 => u64::decode(r)?,
			_ => OBJECT_STATUS_NORMAL,
		};

		Ok(Self { object_id, size, status })
	}
}

#[cfg(test)]
mod tests {
	use crate::coding::Encode;
	use crate::util::test::TestStream;

	use super::super::{FetchHeader, SubgroupHeader, OBJECT_STATUS_END_OF_GROUP};
	use super::*;

	#[tokio::test]
	async fn subgroup_stream() {
		let mut buf = Vec::new();

		let header: Header = SubgroupHeader {
			track_alias: 0,
			group_id: 3,
			subgroup_id: 1,
			publisher_priority: 127,
		}
		.into();
		header.encode(&mut buf).unwrap();

		// Two objects: one with a payload, one empty carrying a status.
		5u64.encode(&mut buf).unwrap(); // object_id
		5usize.encode(&mut buf).unwrap(); // size
		buf.extend_from_slice(b"frame");
		6u64.encode(&mut buf).unwrap();
		0usize.encode(&mut buf).unwrap();
		OBJECT_STATUS_END_OF_GROUP.encode(&mut buf).unwrap();

		let reader = Reader::new(TestStream::new([buf.as_slice()]));
		let mut parser = StreamParser::accept(reader).await.unwrap();
		assert_eq!(parser.header(), &header);

		let object = parser.next().await.unwrap().unwrap();
		assert_eq!(object.group_id, 3);
		assert_eq!(object.subgroup_id, 1);
		assert_eq!(object.object_id, 5);
		assert_eq!(object.publisher_priority, 127);
		assert_eq!(object.payload.as_ref(), b"frame");

		let object = parser.next().await.unwrap().unwrap();
		assert_eq!(object.object_id, 6);
		assert_eq!(object.status, OBJECT_STATUS_END_OF_GROUP);
		assert!(object.payload.is_empty());

		assert!(parser.next().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn fetch_stream() {
		let mut buf = Vec::new();

		let header: Header = FetchHeader { request_id: 2 }.into();
		header.encode(&mut buf).unwrap();

		1u64.encode(&mut buf).unwrap(); // group_id
		0u64.encode(&mut buf).unwrap(); // subgroup_id
		7u64.encode(&mut buf).unwrap(); // object_id
		1u8.encode(&mut buf).unwrap(); // publisher_priority
		2usize.encode(&mut buf).unwrap(); // size
		buf.extend_from_slice(b"ab");

		let reader = Reader::new(TestStream::new([buf.as_slice()]));
		let mut parser = StreamParser::accept(reader).await.unwrap();

		let object = parser.next().await.unwrap().unwrap();
		assert_eq!(object.group_id, 1);
		assert_eq!(object.object_id, 7);
		assert_eq!(object.payload.as_ref(), b"ab");

		assert!(parser.next().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn truncated_payload() {
		let mut buf = Vec::new();

		let header: Header = FetchHeader { request_id: 0 }.into();
		header.encode(&mut buf).unwrap();

		0u64.encode(&mut buf).unwrap();
		0u64.encode(&mut buf).unwrap();
		0u64.encode(&mut buf).unwrap();
		0u8.encode(&mut buf).unwrap();
		10usize.encode(&mut buf).unwrap(); // promises more than the stream holds
		buf.extend_from_slice(b"abc");

		let reader = Reader::new(TestStream::new([buf.as_slice()]));
		let mut parser = StreamParser::accept(reader).await.unwrap();

		assert!(parser.next().await.is_err());
	}
}

struct FetchObject {
	group_id: u64,
	subgroup_id: u64,
	object_id: u64,
	publisher_priority: u8,
	size: usize,
	status: u64,
}

impl Decode for FetchObject {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let group_id = u64::decode(r)?;
		let subgroup_id = u64::decode(r)?;
		let object_id = u64::decode(r)?;
		let publisher_priority = u8::decode(r)?;
		let size = usize::decode(r)?;
		let status = match size {
			0 => u64::decode(r)?,
			_ => OBJECT_STATUS_NORMAL,
		};

		Ok(Self {
			group_id,
			subgroup_id,
			object_id,
			publisher_priority,
			size,
			status,
		})
	}
}
