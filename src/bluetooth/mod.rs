pub mod decoder;
pub mod link;

pub use decoder::{decode_line, DecodeError, DecodeFailure};
pub use link::{run_link, DeviceCommand, LinkError, LinkEvent};
