pub mod chat;
pub mod product;
pub mod turn;

pub use chat::{ChatReply, ChatRequest, Language, ResponseType};
pub use product::ProductRecord;
pub use turn::{ConversationTurn, NewTurn};
