//! Vocabulary export files.
//!
//! Shape: `{"word2idx": {"word": id, ...}}`. Other top-level keys are ignored
//! and a missing `word2idx` reads as an empty vocabulary.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::VocabularyEntry;
use crate::error::VocabResult;

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    word2idx: HashMap<String, u32>,
}

/// Parse an export document into entries ordered by id.
pub fn parse_export(json: &str) -> VocabResult<Vec<VocabularyEntry>> {
    let export: ExportFile = serde_json::from_str(json)?;
    let mut entries: Vec<VocabularyEntry> = export
        .word2idx
        .into_iter()
        .map(|(word, id)| VocabularyEntry { word, id })
        .collect();
    entries.sort_unstable_by_key(|e| e.id);
    Ok(entries)
}

pub async fn load_export(path: impl AsRef<Path>) -> VocabResult<Vec<VocabularyEntry>> {
    let raw = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_export(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VocabError;

    #[test]
    fn test_parse_export_orders_by_id() {
        let entries = parse_export(
            r#"{"word2idx": {"cat": 1002, "<UNK>": 1, "the": 1001}, "idx2word": {}}"#,
        )
        .unwrap();
        assert_eq!(
            entries,
            vec![
                VocabularyEntry::new("<UNK>", 1),
                VocabularyEntry::new("the", 1001),
                VocabularyEntry::new("cat", 1002),
            ]
        );
    }

    #[test]
    fn test_missing_map_is_empty() {
        assert!(parse_export("{}").unwrap().is_empty());
    }

    #[test]
    fn test_negative_ids_are_rejected() {
        let err = parse_export(r#"{"word2idx": {"x": -4}}"#).unwrap_err();
        assert!(matches!(err, VocabError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = load_export("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, VocabError::Io(_)));
    }
}
