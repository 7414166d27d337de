use std::fmt;
use std::ops::Deref;

use bytes::{Buf, BufMut};

use crate::coding::{Decode, DecodeError, Encode, EncodeError};

/// A version of the protocol, negotiated during setup.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

impl Version {
	/// <https://www.ietf.org/archive/id/draft-ietf-moq-transport-11.html>
	pub const DRAFT_11: Version = Version(0xff00000b);

	/// The versions this implementation speaks, in preference order.
	pub fn supported() -> Versions {
		[Version::DRAFT_11].into()
	}
}

impl Decode for Version {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		Ok(Self(u64::decode(r)?))
	}
}

impl Encode for Version {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.0.encode(w)
	}
}

impl fmt::Debug for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Self::DRAFT_11 => write!(f, "DRAFT_11"),
			Self(other) => write!(f, "UNKNOWN(0x{:x})", other),
		}
	}
}

/// A list of versions, as offered by the client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Versions(Vec<Version>);

impl Decode for Versions {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let count = usize::decode(r)?;
		let mut versions = Vec::with_capacity(count.min(16));

		for _ in 0..count {
			versions.push(Version::decode(r)?);
		}

		Ok(Self(versions))
	}
}

impl Encode for Versions {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.0.len().encode(w)?;

		for version in &self.0 {
			version.encode(w)?;
		}

		Ok(())
	}
}

impl Deref for Versions {
	type Target = [Version];

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<Vec<Version>> for Versions {
	fn from(versions: Vec<Version>) -> Self {
		Self(versions)
	}
}

impl<const N: usize> From<[Version; N]> for Versions {
	fn from(versions: [Version; N]) -> Self {
		Self(versions.to_vec())
	}
}
