use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params};

use super::Version;

/// Sent by the server in response to the client setup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
	/// The version selected from the client's list.
	pub version: Version,

	/// Setup parameters: MAX_REQUEST_ID.
	pub params: Params,
}

impl Decode for Server {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let version = Version::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self { version, params })
	}
}

impl Encode for Server {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.version.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}
