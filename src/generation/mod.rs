// file: src/generation/mod.rs
// description: prompt rendering and language model completion
// reference: internal module structure

pub mod generator;
pub mod prompt;

pub use generator::{OpenAiChatClient, ResponseGenerator};
pub use prompt::{PromptBuilder, PromptInput, RESPONSE_DIRECTIVES};
