//! Chatbot service client and wire types
//!
//! The chatbot is an external HTTP service that answers a single free-text
//! query with a JSON body containing an `answer`.

mod client;
mod types;

pub use client::ChatbotClient;
pub use types::*;
