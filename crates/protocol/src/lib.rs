//! Wire types for the snaplink capture link.
//!
//! - [`Message`] / [`Kind`] - the envelope exchanged with the remote endpoint
//! - [`Codec`] - JSON text encoding for both the `type` and `action` variants
//! - [`LocalCommand`] / [`CommandReply`] - the in-process command surface
//! - [`StatusEvent`] / [`UiEvent`] - what UI surfaces get told
//! - [`StoredRecord`] and the polling fallback bodies

pub mod codec;
pub mod command;
pub mod message;
pub mod record;
pub mod status;

pub use codec::{Codec, DecodeError, Discriminator};
pub use command::{CommandReply, LocalCommand};
pub use message::{Kind, Message, Payload, now_millis};
pub use record::{
	CheckStatusResponse, Direction, LATEST_MESSAGE_KEY, MESSAGE_LOG_KEY, PendingCapture,
	StoredRecord, UploadScreenshot,
};
pub use status::{ConnectionState, LinkStatus, StatusEvent, UiEvent};
