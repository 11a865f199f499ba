//! Model service clients, prompt templates and answer parsing

pub mod json;
pub mod ollama;
pub mod openai;
pub mod prompt;
mod retry;

pub use json::{extract_fenced_json, parse_structured_answer};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use prompt::PromptBuilder;
