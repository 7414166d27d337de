mod client;
mod server;
mod version;

pub use client::*;
pub use server::*;
pub use version::*;
