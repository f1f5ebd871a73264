pub mod assistant;
pub mod ollama;
pub mod validator;

pub use assistant::AiAssistant;
