//! Transport contract for the external text generator.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One inbound text blob plus the id used for origin keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorReply {
    pub text: String,
    pub message_id: u64,
}

/// Transport failure reported by a generator implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorError {
    pub message: String,
}

impl GeneratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for GeneratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "generator failed: {}", self.message)
    }
}

impl Error for GeneratorError {}

/// Sends one instruction string and returns the generator's reply.
pub trait Generator {
    fn generate(&mut self, prompt: &str) -> Result<GeneratorReply, GeneratorError>;
}
