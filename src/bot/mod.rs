pub mod commands;
pub mod messages;
pub mod notifier;
pub mod webapp;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
