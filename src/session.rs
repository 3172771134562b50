//! Real-time tokenize session.
//!
//! One session per connection. Each incoming `{"text": ...}` frame is
//! tokenized, every token is looked up (lowercased) in the shared store and
//! classified, and a single `tokens` frame goes back, in token order. The
//! session never writes to the vocabulary and keeps no vocabulary state of
//! its own; every request is answered against the live store.
//!
//! Sessions are registered with the [`BroadcastHub`] for their whole
//! lifetime and surface its notifications as `vocabularyUpdated` frames.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{VocabError, VocabResult};
use crate::hub::{BroadcastHub, HubEvent, SessionId, Subscription};
use crate::tokenizer::{tokenize, TokenCategory};
use crate::vocabulary::VocabularyStore;

pub const UPDATE_MESSAGE: &str = "New words learned!";

/// Client → server frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    pub text: String,
}

/// One annotated token in a `tokens` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenView {
    pub text: String,
    pub id: u32,
    pub category: TokenCategory,
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    Tokens {
        tokens: Vec<TokenView>,
        #[serde(rename = "vocabSize")]
        vocab_size: u64,
    },
    VocabularyUpdated {
        #[serde(rename = "newEntries")]
        new_entries: usize,
        #[serde(rename = "vocabSize")]
        vocab_size: u64,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn from_error(err: &VocabError) -> Self {
        ServerFrame::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }

    pub fn to_json(&self) -> VocabResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<HubEvent> for ServerFrame {
    fn from(event: HubEvent) -> Self {
        match event {
            HubEvent::VocabularyUpdated {
                new_entries,
                vocab_size,
            } => ServerFrame::VocabularyUpdated {
                new_entries,
                vocab_size,
                message: UPDATE_MESSAGE.to_string(),
            },
        }
    }
}

/// Tokenize `text` and annotate each token against `store`.
///
/// Unknown words get [`crate::UNKNOWN_ID`]; a failing store is an error, not
/// a page full of unknowns.
pub async fn annotate(store: &VocabularyStore, text: &str) -> VocabResult<Vec<TokenView>> {
    let tokens = tokenize(text);
    let mut views = Vec::with_capacity(tokens.len());
    for token in tokens {
        views.push(TokenView {
            text: token.text.to_string(),
            id: store.lookup_or_unknown(token.text).await?,
            category: token.category(),
        });
    }
    Ok(views)
}

pub struct TokenizeSession {
    store: Arc<VocabularyStore>,
    subscription: Subscription,
}

impl TokenizeSession {
    /// Open a session and register it with `hub`.
    pub fn open(store: Arc<VocabularyStore>, hub: &Arc<BroadcastHub>) -> Self {
        let subscription = hub.subscribe();
        tracing::debug!(session = %subscription.id(), "tokenize session opened");
        Self {
            store,
            subscription,
        }
    }

    pub fn id(&self) -> SessionId {
        self.subscription.id()
    }

    /// Tokenize one text and report the current vocabulary size.
    pub async fn tokenize(&self, text: &str) -> VocabResult<ServerFrame> {
        let tokens = annotate(&self.store, text).await?;
        let vocab_size = self.store.size().await?;
        Ok(ServerFrame::Tokens { tokens, vocab_size })
    }

    /// Answer one raw client frame. Always produces exactly one frame back;
    /// failures come back as `error` frames and leave the session usable.
    pub async fn handle_frame(&self, raw: &str) -> ServerFrame {
        let message: ClientMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                let err = VocabError::Protocol(format!("expected {{\"text\": string}}: {e}"));
                tracing::debug!(session = %self.id(), error = %err, "malformed frame");
                return ServerFrame::from_error(&err);
            }
        };

        match self.tokenize(&message.text).await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(session = %self.id(), error = %err, "tokenize request failed");
                ServerFrame::from_error(&err)
            }
        }
    }

    /// Next out-of-band notification. `None` once the hub dropped this session.
    pub async fn next_notification(&mut self) -> Option<ServerFrame> {
        self.subscription.recv().await.map(ServerFrame::from)
    }

    /// Deregister from the hub.
    pub fn close(self) {
        tracing::debug!(session = %self.id(), "tokenize session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::UNKNOWN_ID;

    fn fixture() -> (Arc<VocabularyStore>, Arc<BroadcastHub>) {
        (
            Arc::new(VocabularyStore::in_memory()),
            Arc::new(BroadcastHub::new()),
        )
    }

    #[tokio::test]
    async fn test_unknown_tokens_default_to_unk() {
        let (store, hub) = fixture();
        let session = TokenizeSession::open(store, &hub);

        let frame = session.handle_frame(r#"{"text": "Room 101!"}"#).await;
        assert_eq!(
            frame,
            ServerFrame::Tokens {
                tokens: vec![
                    TokenView {
                        text: "Room".into(),
                        id: UNKNOWN_ID,
                        category: TokenCategory::Word
                    },
                    TokenView {
                        text: "101".into(),
                        id: UNKNOWN_ID,
                        category: TokenCategory::Number
                    },
                    TokenView {
                        text: "!".into(),
                        id: UNKNOWN_ID,
                        category: TokenCategory::Punctuation
                    },
                ],
                vocab_size: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_known_words_use_lowercase_lookup() {
        let (store, hub) = fixture();
        let id = store.insert_if_absent("room").await.unwrap();
        let session = TokenizeSession::open(store, &hub);

        match session.tokenize("ROOM room").await.unwrap() {
            ServerFrame::Tokens { tokens, vocab_size } => {
                assert_eq!(tokens[0].text, "ROOM");
                assert_eq!(tokens[0].id, id);
                assert_eq!(tokens[1].id, id);
                assert_eq!(vocab_size, 1);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_frames_get_error_frame() {
        let (store, hub) = fixture();
        let session = TokenizeSession::open(store, &hub);

        for raw in ["not json", r#"{"txt": "x"}"#, r#"{"text": 5}"#] {
            match session.handle_frame(raw).await {
                ServerFrame::Error { code, .. } => assert_eq!(code, "malformed_message"),
                other => panic!("unexpected frame for {raw}: {other:?}"),
            }
        }

        // Still usable afterwards
        assert!(matches!(
            session.handle_frame(r#"{"text": "ok"}"#).await,
            ServerFrame::Tokens { .. }
        ));
    }

    #[tokio::test]
    async fn test_session_is_registered_for_its_lifetime() {
        let (store, hub) = fixture();
        let mut session = TokenizeSession::open(store, &hub);
        assert_eq!(hub.len(), 1);

        hub.broadcast(&HubEvent::VocabularyUpdated {
            new_entries: 2,
            vocab_size: 2,
        });
        assert_eq!(
            session.next_notification().await,
            Some(ServerFrame::VocabularyUpdated {
                new_entries: 2,
                vocab_size: 2,
                message: UPDATE_MESSAGE.to_string(),
            })
        );

        session.close();
        assert!(hub.is_empty());
    }

    #[test]
    fn test_frame_wire_shape() {
        let frame = ServerFrame::Tokens {
            tokens: vec![TokenView {
                text: "!".into(),
                id: 1,
                category: TokenCategory::Punctuation,
            }],
            vocab_size: 7,
        };
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "tokens");
        assert_eq!(json["vocabSize"], 7);
        assert_eq!(json["tokens"][0]["category"], "Punctuation");

        let update: serde_json::Value = serde_json::to_value(ServerFrame::from(
            HubEvent::VocabularyUpdated {
                new_entries: 1,
                vocab_size: 9,
            },
        ))
        .unwrap();
        assert_eq!(update["type"], "vocabularyUpdated");
        assert_eq!(update["newEntries"], 1);
    }
}
