use bytes::Bytes;

// Object statuses, meaningful only when the payload is empty.
pub const OBJECT_STATUS_NORMAL: u64 = 0x0;
pub const OBJECT_STATUS_DOES_NOT_EXIST: u64 = 0x1;
pub const OBJECT_STATUS_END_OF_GROUP: u64 = 0x3;
pub const OBJECT_STATUS_END_OF_TRACK: u64 = 0x4;

/// A single media object, delivered to the subscriber.
///
/// Objects within one stream arrive in stream order; there is no ordering
/// across streams.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Object {
	pub group_id: u64,
	pub subgroup_id: u64,
	pub object_id: u64,
	pub publisher_priority: u8,

	/// Only meaningful when the payload is empty.
	pub status: u64,
	pub payload: Bytes,
}
