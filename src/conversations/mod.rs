mod service;

pub use service::ConversationService;
