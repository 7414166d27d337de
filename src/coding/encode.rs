use bytes::{BufMut, Bytes};
use thiserror::Error;

pub trait Encode: Sized {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError>;
}

/// An encode error.
#[derive(Error, Debug, Clone)]
pub enum EncodeError {
	#[error("varint bounds exceeded")]
	BoundsExceeded,

	#[error("value too long")]
	TooLong,
}

impl Encode for u8 {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u8(*self);
		Ok(())
	}
}

impl Encode for bool {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		w.put_u8(*self as u8);
		Ok(())
	}
}

impl Encode for Bytes {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.len().encode(w)?;
		w.put_slice(self);
		Ok(())
	}
}

impl Encode for String {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.as_str().encode(w)
	}
}

impl Encode for &str {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.len().encode(w)?;
		w.put_slice(self.as_bytes());
		Ok(())
	}
}
