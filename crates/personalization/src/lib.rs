//! Message personalization: renders a row into a prompt and turns the prompt
//! into a message body through a text-generation provider.

pub mod generator;
pub mod personalizer;

pub use generator::{EchoGenerator, OpenAiGenerator};
pub use personalizer::personalize;
