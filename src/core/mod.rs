pub mod chat;
pub mod dispatcher;
mod error;
pub mod formatter;
pub mod tool_round;

pub use chat::{ChatOutcome, ChatRequest, ChatService, HistoryAppend};
pub use dispatcher::{Dispatcher, Reply};
pub use error::ChatError;
pub use formatter::{format_history, parse_image, ImageError, PendingInput};
