pub mod controller;
pub mod frame;
pub mod message;

pub use controller::{spawn_writer, Bridge, Sender};
pub use frame::{decode_message, encode_message, FrameCodec, MAX_FROM_BROWSER, MAX_TO_BROWSER};
pub use message::{InvalidMessage, PreviewRequest, Response};
