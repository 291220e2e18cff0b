//! Graph store boundary: connection handling, writes and reads.

pub mod client;
pub mod reader;
pub mod writer;

pub use client::GraphClient;
pub use reader::GraphReader;
pub use writer::{GraphWriter, PropValue};
