use std::fmt;

use bytes::{Buf, BufMut};

use super::{Decode, DecodeError, Encode, EncodeError};

/// A hierarchical track namespace: an ordered list of UTF-8 parts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tuple(Vec<String>);

impl Tuple {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add a part to the end of the tuple.
	pub fn push<S: ToString>(mut self, part: S) -> Self {
		self.0.push(part.to_string());
		self
	}

	/// Returns true if this tuple starts with the given prefix.
	pub fn has_prefix(&self, prefix: &Tuple) -> bool {
		self.0.len() >= prefix.0.len() && self.0.iter().zip(prefix.0.iter()).all(|(a, b)| a == b)
	}

	pub fn parts(&self) -> &[String] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<Vec<String>> for Tuple {
	fn from(parts: Vec<String>) -> Self {
		Self(parts)
	}
}

impl<S: ToString> FromIterator<S> for Tuple {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(|part| part.to_string()).collect())
	}
}

impl fmt::Display for Tuple {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.join("/"))
	}
}

impl Decode for Tuple {
	fn decode<B: Buf>(r: &mut B) -> Result<Self, DecodeError> {
		let count = usize::decode(r)?;
		let mut parts = Vec::with_capacity(count.min(16));

		for _ in 0..count {
			parts.push(String::decode(r)?);
		}

		Ok(Self(parts))
	}
}

impl Encode for Tuple {
	fn encode<W: BufMut>(&self, w: &mut W) -> Result<(), EncodeError> {
		self.0.len().encode(w)?;

		for part in &self.0 {
			part.encode(w)?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefix() {
		let namespace = Tuple::new().push("live").push("room").push("alice");

		assert!(namespace.has_prefix(&Tuple::new()));
		assert!(namespace.has_prefix(&Tuple::new().push("live")));
		assert!(namespace.has_prefix(&Tuple::new().push("live").push("room")));
		assert!(namespace.has_prefix(&namespace));

		assert!(!namespace.has_prefix(&Tuple::new().push("room")));
		assert!(!namespace.has_prefix(&namespace.clone().push("video")));
	}

	#[test]
	fn roundtrip() {
		let namespace = Tuple::new().push("live").push("room");

		let mut buf = Vec::new();
		namespace.encode(&mut buf).unwrap();

		let decoded = Tuple::decode(&mut buf.as_slice()).unwrap();
		assert_eq!(decoded, namespace);
	}
}
