//! cb-core: chatbot-bridge core library
//!
//! 設定の読み込み、エラー型、外部チャットボットサービスとの
//! HTTP 通信を提供します。

pub mod chatbot;
pub mod config;
pub mod error;

pub use chatbot::{ChatbotClient, QueryRequest, QueryResponse, FALLBACK_REPLY};
pub use config::{ApiConfig, ChatbotConfig, Config, WhatsAppConfig};
pub use error::{Error, Result};
