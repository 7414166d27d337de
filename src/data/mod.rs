mod datagram;
mod header;
mod object;
mod stream;

pub use datagram::*;
pub use header::*;
pub use object::*;
pub use stream::*;
