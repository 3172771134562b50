//! vocab-stream: a growing word vocabulary with real-time tokenization.
//!
//! Text typed by interactive clients is tokenized, looked up against a shared
//! append-only vocabulary and streamed back with per-token ids and categories.
//! Scraped pages grow the vocabulary in the background; every live session is
//! told when that happens.
//!
//! ## Pieces
//!
//! - [`tokenizer`] - segmentation and token classification (pure functions)
//! - [`vocabulary`] - concurrency-safe word ↔ id store over a pluggable backend
//! - [`extractor`] - URL → plain text
//! - [`training`] - background scrape → tokenize → filter → insert jobs
//! - [`hub`] - registry of live sessions and out-of-band notifications
//! - [`session`] - per-connection tokenize protocol
//! - `api` - axum routes (feature `server`)

pub mod config;
pub mod error;
pub mod extractor;
pub mod hub;
pub mod session;
pub mod tokenizer;
pub mod training;
pub mod vocabulary;

#[cfg(feature = "server")]
pub mod api;

pub use config::ServiceConfig;
pub use error::{VocabError, VocabResult};
pub use hub::{BroadcastHub, HubEvent};
pub use session::TokenizeSession;
pub use tokenizer::{classify, tokenize, Token, TokenCategory};
pub use training::TrainingWorker;
pub use vocabulary::{VocabularyEntry, VocabularyStore, UNKNOWN_ID};
