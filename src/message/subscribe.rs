use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params, Tuple};

/// A position in a track, as a (group, object) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
	pub group: u64,
	pub object: u64,
}

impl Decode for Location {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let group = u64::decode(r)?;
		let object = u64::decode(r)?;

		Ok(Self { group, object })
	}
}

impl Encode for Location {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.group.encode(w)?;
		self.object.encode(w)?;

		Ok(())
	}
}

/// The group delivery order requested by the subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupOrder {
	/// Defer to the publisher's preference.
	#[default]
	Publisher,
	Ascending,
	Descending,
}

impl Decode for GroupOrder {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		match u8::decode(r)? {
			0 => Ok(Self::Publisher),
			1 => Ok(Self::Ascending),
			2 => Ok(Self::Descending),
			_ => Err(DecodeError::InvalidValue),
		}
	}
}

impl Encode for GroupOrder {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		let value: u8 = match self {
			Self::Publisher => 0,
			Self::Ascending => 1,
			Self::Descending => 2,
		};
		value.encode(w)
	}
}

/// Sent by the subscriber to request all future objects for a track.
///
/// Objects will use the provided track alias instead of the full track name,
/// to save bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscribe {
	pub request_id: u64,
	pub track_alias: u64,
	pub namespace: Tuple,
	pub name: String,

	pub subscriber_priority: u8,
	pub group_order: GroupOrder,

	pub filter_type: u64,
	pub start: Location,
	pub end_group: u64,

	pub params: Params,
}

impl Decode for Subscribe {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let track_alias = u64::decode(r)?;
		let namespace = Tuple::decode(r)?;
		let name = String::decode(r)?;
		let subscriber_priority = u8::decode(r)?;
		let group_order = GroupOrder::decode(r)?;
		let filter_type = u64::decode(r)?;
		let start = Location::decode(r)?;
		let end_group = u64::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			track_alias,
			namespace,
			name,
			subscriber_priority,
			group_order,
			filter_type,
			start,
			end_group,
			params,
		})
	}
}

impl Encode for Subscribe {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.track_alias.encode(w)?;
		self.namespace.encode(w)?;
		self.name.encode(w)?;
		self.subscriber_priority.encode(w)?;
		self.group_order.encode(w)?;
		self.filter_type.encode(w)?;
		self.start.encode(w)?;
		self.end_group.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to accept a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeOk {
	pub request_id: u64,

	/// How long the subscription remains valid, in milliseconds; zero means forever.
	pub expires: u64,
	pub group_order: GroupOrder,

	/// The largest location produced so far, if any content exists.
	pub largest: Option<Location>,

	pub params: Params,
}

impl Decode for SubscribeOk {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let expires = u64::decode(r)?;
		let group_order = GroupOrder::decode(r)?;

		// The largest location is only present when content exists.
		let largest = match bool::decode(r)? {
			true => Some(Location::decode(r)?),
			false => None,
		};

		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			expires,
			group_order,
			largest,
			params,
		})
	}
}

impl Encode for SubscribeOk {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.expires.encode(w)?;
		self.group_order.encode(w)?;

		match &self.largest {
			Some(largest) => {
				true.encode(w)?;
				largest.encode(w)?;
			}
			None => false.encode(w)?,
		}

		self.params.encode(w)?;

		Ok(())
	}
}

/// Sent by the publisher to reject a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeError {
	pub request_id: u64,
	pub error_code: u64,
	pub reason: String,

	/// The alias the subscriber proposed, echoed back.
	pub track_alias: u64,
}

impl Decode for SubscribeError {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let error_code = u64::decode(r)?;
		let reason = String::decode(r)?;
		let track_alias = u64::decode(r)?;

		Ok(Self {
			request_id,
			error_code,
			reason,
			track_alias,
		})
	}
}

impl Encode for SubscribeError {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.error_code.encode(w)?;
		self.reason.encode(w)?;
		self.track_alias.encode(w)?;

		Ok(())
	}
}

/// Sent by the subscriber to end a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unsubscribe {
	pub request_id: u64,
}

impl Decode for Unsubscribe {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;

		Ok(Self { request_id })
	}
}

impl Encode for Unsubscribe {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)
	}
}

/// Sent by the publisher when a subscription ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeDone {
	pub request_id: u64,
	pub status_code: u64,

	/// How many data streams were opened for the subscription.
	pub stream_count: u64,
	pub reason: String,
}

impl Decode for SubscribeDone {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let status_code = u64::decode(r)?;
		let stream_count = u64::decode(r)?;
		let reason = String::decode(r)?;

		Ok(Self {
			request_id,
			status_code,
			stream_count,
			reason,
		})
	}
}

impl Encode for SubscribeDone {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.status_code.encode(w)?;
		self.stream_count.encode(w)?;
		self.reason.encode(w)?;

		Ok(())
	}
}

/// Sent by the subscriber to narrow an active subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscribeUpdate {
	pub request_id: u64,
	pub start: Location,
	pub end_group: u64,
	pub subscriber_priority: u8,
	pub params: Params,
}

impl Decode for SubscribeUpdate {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let request_id = u64::decode(r)?;
		let start = Location::decode(r)?;
		let end_group = u64::decode(r)?;
		let subscriber_priority = u8::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self {
			request_id,
			start,
			end_group,
			subscriber_priority,
			params,
		})
	}
}

impl Encode for SubscribeUpdate {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.request_id.encode(w)?;
		self.start.encode(w)?;
		self.end_group.encode(w)?;
		self.subscriber_priority.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}
