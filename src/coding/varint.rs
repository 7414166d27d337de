use bytes::{Buf, BufMut};

use super::{Decode, DecodeError, Encode, EncodeError};

// QUIC variable-length integers: the top two bits of the first byte give the
// encoded size (1, 2, 4 or 8 bytes), leaving 62 usable bits.

impl Decode for u64 {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		Self::decode_remaining(r, 1)?;

		let first = r.get_u8();
		let size = 1usize << (first >> 6);
		let mut value = (first & 0b0011_1111) as u64;

		Self::decode_remaining(r, size - 1)?;
		for _ in 1..size {
			value = (value << 8) | r.get_u8() as u64;
		}

		Ok(value)
	}
}

impl Encode for u64 {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		let value = *self;
		if value < (1 << 6) {
			w.put_u8(value as u8);
		} else if value < (1 << 14) {
			w.put_u16(value as u16 | (0b01 << 14));
		} else if value < (1 << 30) {
			w.put_u32(value as u32 | (0b10 << 30));
		} else if value < (1 << 62) {
			w.put_u64(value | (0b11 << 62));
		} else {
			return Err(EncodeError::BoundsExceeded);
		}

		Ok(())
	}
}

impl Decode for usize {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		u64::decode(r)?.try_into().map_err(|_| DecodeError::BoundsExceeded)
	}
}

impl Encode for usize {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		(*self as u64).encode(w)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn roundtrip(value: u64, size: usize) {
		let mut buf = Vec::new();
		value.encode(&mut buf).unwrap();
		assert_eq!(buf.len(), size);

		let mut read = buf.as_slice();
		assert_eq!(u64::decode(&mut read).unwrap(), value);
		assert!(read.is_empty());
	}

	#[test]
	fn sizes() {
		roundtrip(0, 1);
		roundtrip(63, 1);
		roundtrip(64, 2);
		roundtrip(16383, 2);
		roundtrip(16384, 4);
		roundtrip((1 << 30) - 1, 4);
		roundtrip(1 << 30, 8);
		roundtrip((1 << 62) - 1, 8);
	}

	#[test]
	fn too_large() {
		let mut buf = Vec::new();
		assert!(matches!((1u64 << 62).encode(&mut buf), Err(EncodeError::BoundsExceeded)));
	}

	#[test]
	fn partial() {
		// A two byte varint with only one byte available.
		let mut read: &[u8] = &[0x40];
		assert!(matches!(u64::decode(&mut read), Err(DecodeError::More(1))));
	}
}
