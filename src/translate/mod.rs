// Translation client layer
//
// - client: chat-completions backed translator (the production implementation)
// - mock: scripted translator replaying canned replies, used by tests

pub mod client;
pub mod mock;

use async_trait::async_trait;
use tracing::warn;

pub use client::*;
use crate::error::{Result, SubtransError};

/// Translates an ordered list of strings in one request.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns translations parallel to `items`.
    ///
    /// A successful result may be shorter than `items` when the service
    /// dropped entries; it is never longer.
    async fn translate(&self, items: &[String], batch_label: Option<&str>) -> Result<Vec<String>>;
}

/// Result of one batch request, as seen by the scheduler
#[derive(Debug)]
pub enum TranslationOutcome {
    /// Every item translated, in order
    Complete(Vec<String>),
    /// Some trailing items were not returned
    Partial {
        received: Vec<(usize, String)>,
        missing: Vec<usize>,
    },
    Failed(SubtransError),
}

impl TranslationOutcome {
    /// Classify a raw translator result against the number of items sent
    pub fn classify(expected: usize, result: Result<Vec<String>>) -> Self {
        match result {
            Ok(mut translations) => {
                if translations.len() > expected {
                    warn!(
                        "Received {} translations for {} items, ignoring the excess",
                        translations.len(),
                        expected
                    );
                    translations.truncate(expected);
                }

                if translations.len() == expected {
                    Self::Complete(translations)
                } else {
                    let missing = (translations.len()..expected).collect();
                    let received = translations.into_iter().enumerate().collect();
                    Self::Partial { received, missing }
                }
            }
            Err(e) => Self::Failed(e),
        }
    }
}

/// Translate and require an exact item count
pub async fn translate_exact(
    translator: &dyn Translator,
    items: &[String],
    batch_label: Option<&str>,
) -> Result<Vec<String>> {
    let translations = translator.translate(items, batch_label).await?;
    if translations.len() != items.len() {
        return Err(SubtransError::CountMismatch {
            received: translations.len(),
            expected: items.len(),
        });
    }
    Ok(translations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::ScriptedTranslator;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_complete() {
        let outcome = TranslationOutcome::classify(2, Ok(strings(&["a", "b"])));
        assert!(matches!(outcome, TranslationOutcome::Complete(v) if v == strings(&["a", "b"])));
    }

    #[test]
    fn test_classify_partial_reports_missing_positions() {
        let outcome = TranslationOutcome::classify(3, Ok(strings(&["a", "b"])));
        match outcome {
            TranslationOutcome::Partial { received, missing } => {
                assert_eq!(received, vec![(0, "a".to_string()), (1, "b".to_string())]);
                assert_eq!(missing, vec![2]);
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_truncates_excess() {
        let outcome = TranslationOutcome::classify(1, Ok(strings(&["a", "b", "c"])));
        assert!(matches!(outcome, TranslationOutcome::Complete(v) if v == strings(&["a"])));
    }

    #[test]
    fn test_classify_failure() {
        let outcome = TranslationOutcome::classify(1, Err(SubtransError::Network("down".into())));
        assert!(matches!(outcome, TranslationOutcome::Failed(SubtransError::Network(_))));
    }

    #[tokio::test]
    async fn test_translate_exact_rejects_short_result() {
        let translator = ScriptedTranslator::new().reply_with(vec!["only one"]);
        let err = translate_exact(&translator, &strings(&["x", "y"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubtransError::CountMismatch { received: 1, expected: 2 }));
    }
}
