use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError, Params};

use super::Versions;

/// Sent by the client to begin the session handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Client {
	/// The list of supported versions in preferred order.
	pub versions: Versions,

	/// Setup parameters: MAX_REQUEST_ID, plus PATH over native QUIC.
	pub params: Params,
}

impl Decode for Client {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let versions = Versions::decode(r)?;
		let params = Params::decode(r)?;

		Ok(Self { versions, params })
	}
}

impl Encode for Client {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.versions.encode(w)?;
		self.params.encode(w)?;

		Ok(())
	}
}
