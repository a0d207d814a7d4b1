pub mod channel;
pub mod domain;
pub mod recorder;

pub use channel::{ChatChannel, DynChatChannel, SqliteChatChannel};
pub use domain::{ChatScope, MediaKind, MessageDraft, MessagePayload};
pub use recorder::{AudioRecorder, RecordingStore};
