use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::BatchConfig;
use crate::error::{Result, SubtransError};
use crate::events::{BatchEvent, EventSink};
use crate::subtitle::Cue;
use crate::translate::{TranslationOutcome, Translator};
use super::recovery::{fill, RecoveryController};
use super::{BatchResolution, CancellationFlag, RunSummary};

/// Mutable scheduling context for a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    pub current_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    /// Offset into the list of cues still awaiting translation
    pub cursor: usize,
}

impl SchedulerState {
    pub fn new(config: &BatchConfig) -> Self {
        let min = config.min_size.max(1);
        let max = config.max_size.max(min);
        Self {
            current_batch_size: config.base_size.clamp(min, max),
            min_batch_size: min,
            max_batch_size: max,
            cursor: 0,
        }
    }

    /// Size of the next batch given how many cues remain
    pub fn next_batch_len(&self, remaining: usize) -> usize {
        self.current_batch_size.min(remaining)
    }

    /// After a batch that translated in one piece
    pub fn grow(&mut self) {
        self.current_batch_size = (self.current_batch_size + 1).min(self.max_batch_size);
    }

    /// After a batch that exhausted its whole-batch retries
    pub fn shrink(&mut self) {
        self.current_batch_size = self
            .current_batch_size
            .saturating_sub(2)
            .max(self.min_batch_size);
    }
}

/// Drives translation of a cue sequence in adaptively sized batches
pub struct BatchScheduler {
    translator: Arc<dyn Translator>,
    config: BatchConfig,
    events: EventSink,
    cancel: CancellationFlag,
}

impl BatchScheduler {
    pub fn new(translator: Arc<dyn Translator>, config: BatchConfig, events: EventSink) -> Self {
        Self {
            translator,
            config,
            events,
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.config.backoff_base_ms.saturating_mul(factor))
    }

    /// Translate every cue that has no translation yet.
    ///
    /// Translation failures never abort the run; affected cues keep their
    /// source text. Only cancellation ends the run early.
    pub async fn run(&self, cues: &mut [Cue]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let pending: Vec<usize> = cues
            .iter()
            .enumerate()
            .filter(|(_, cue)| !cue.is_translated() && !cue.source_text.trim().is_empty())
            .map(|(position, _)| position)
            .collect();
        summary.skipped = cues.len() - pending.len();

        if pending.is_empty() {
            self.events.info("All cues already translated, nothing to send");
            self.events.progress(100);
            return Ok(summary);
        }

        let mut state = SchedulerState::new(&self.config);
        let mut batch_number = 0;

        while state.cursor < pending.len() {
            if self.cancel.is_cancelled() {
                self.events.warn("Translation cancelled by user");
                return Err(SubtransError::Cancelled);
            }

            let len = state.next_batch_len(pending.len() - state.cursor);
            let positions = &pending[state.cursor..state.cursor + len];
            batch_number += 1;

            let resolution = self.run_batch(cues, positions, batch_number, &mut state).await?;
            debug!(
                "Batch {} resolved: {} translated, {} fallback, next size {}",
                batch_number, resolution.translated, resolution.fallbacks, state.current_batch_size
            );

            summary.batches += 1;
            summary.translated += resolution.translated;
            summary.fallbacks += resolution.fallbacks;

            state.cursor += len;
            self.events.progress((state.cursor * 100 / pending.len()) as u8);
        }

        self.events.info(format!(
            "Translation finished: {} batches, {} translated, {} kept original",
            summary.batches, summary.translated, summary.fallbacks
        ));
        Ok(summary)
    }

    async fn run_batch(
        &self,
        cues: &mut [Cue],
        positions: &[usize],
        number: usize,
        state: &mut SchedulerState,
    ) -> Result<BatchResolution> {
        // The label names the span of cue numbers, not a contiguous range:
        // skipped cues inside the span are not part of the batch.
        let first = positions[0] + 1;
        let last = positions[positions.len() - 1] + 1;
        let label = format!("{}-{}", first, last);
        let items: Vec<String> = positions
            .iter()
            .map(|&p| cues[p].source_text.clone())
            .collect();
        let recovery = RecoveryController::new(self.translator.as_ref(), &self.events);
        let max_attempts = self.config.max_retries.max(1);

        self.events.info(format!(
            "Translating batch {} ({}), size={}",
            number, label, items.len()
        ));
        self.events.batch(BatchEvent::Started {
            number,
            first,
            last,
            size: items.len(),
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self.translator.translate(&items, Some(&label)).await;

            match TranslationOutcome::classify(items.len(), result) {
                TranslationOutcome::Complete(translations) => {
                    let mut resolution = BatchResolution::default();
                    for (&p, translation) in positions.iter().zip(translations) {
                        if fill(&mut cues[p], translation) {
                            resolution.translated += 1;
                        } else {
                            resolution.fallbacks += 1;
                        }
                    }

                    self.events.info(format!("Batch {} completed", number));
                    self.events.batch(BatchEvent::Succeeded { number });
                    state.grow();
                    return Ok(resolution);
                }
                TranslationOutcome::Partial { received, missing } => {
                    self.events.warn(format!(
                        "Partial translation: {}/{} succeeded",
                        received.len(),
                        items.len()
                    ));
                    self.events.batch(BatchEvent::PartiallySucceeded {
                        number,
                        received: received.len(),
                        expected: items.len(),
                    });
                    return Ok(recovery
                        .resolve_partial(cues, positions, received, &missing, &label)
                        .await);
                }
                TranslationOutcome::Failed(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    self.events.warn(format!(
                        "Batch {} failed (attempt {}/{}): {}",
                        number, attempt, max_attempts, e
                    ));
                    self.events.info(format!("Retrying in {} ms...", delay.as_millis()));
                    self.events.batch(BatchEvent::Retrying {
                        number,
                        attempt,
                        max_attempts,
                        delay_ms: delay.as_millis() as u64,
                        error: e.to_string(),
                    });

                    if self.cancel.is_cancelled() {
                        self.events.warn("Translation cancelled by user");
                        return Err(SubtransError::Cancelled);
                    }
                    tokio::time::sleep(delay).await;
                }
                TranslationOutcome::Failed(e) => {
                    self.events.error(format!(
                        "Batch {} failed after {} attempts: {}",
                        number, attempt, e
                    ));
                    self.events.batch(BatchEvent::Exhausted { number });
                    state.shrink();
                    return Ok(recovery.resolve_individually(cues, positions).await);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use crate::translate::mock::ScriptedTranslator;

    fn batch_config() -> BatchConfig {
        BatchConfig {
            base_size: 4,
            min_size: 3,
            max_size: 6,
            max_retries: 3,
            backoff_base_ms: 0,
        }
    }

    fn cues(n: usize) -> Vec<Cue> {
        (0..n)
            .map(|i| {
                Cue::new(
                    (i + 1).to_string(),
                    "00:00:00,000 --> 00:00:01,000",
                    format!("line {}", i + 1),
                )
            })
            .collect()
    }

    #[test]
    fn test_state_bounds() {
        let mut state = SchedulerState::new(&batch_config());
        assert_eq!(state.current_batch_size, 4);

        for _ in 0..10 {
            state.grow();
            assert!(state.current_batch_size <= 6);
        }
        assert_eq!(state.current_batch_size, 6);

        state.shrink();
        assert_eq!(state.current_batch_size, 4);
        state.shrink();
        assert_eq!(state.current_batch_size, 3);
        state.shrink();
        assert_eq!(state.current_batch_size, 3);
        assert_eq!(state.next_batch_len(2), 2);
    }

    #[tokio::test]
    async fn test_growing_batches_cover_everything_in_order() {
        let translator = Arc::new(ScriptedTranslator::new());
        let scheduler =
            BatchScheduler::new(translator.clone(), batch_config(), EventSink::disabled());
        let mut cues = cues(12);

        let summary = scheduler.run(&mut cues).await.unwrap();

        // sizes 4, 5, then the remaining 3
        let sizes: Vec<usize> = translator.calls().iter().map(|c| c.items.len()).collect();
        assert_eq!(sizes, vec![4, 5, 3]);
        assert_eq!(
            summary,
            RunSummary { batches: 3, translated: 12, fallbacks: 0, skipped: 0 }
        );
        for cue in &cues {
            assert_eq!(cue.translated_text, ScriptedTranslator::translated(&cue.source_text));
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_shrink_and_fall_back() {
        let translator = Arc::new(
            ScriptedTranslator::new()
                .fail_with(SubtransError::Network("timeout".into()))
                .fail_with(SubtransError::Network("timeout".into()))
                .fail_with(SubtransError::Network("timeout".into())),
        );
        let (events, mut rx) = EventSink::channel();
        let scheduler = BatchScheduler::new(translator.clone(), batch_config(), events);
        let mut cues = cues(7);

        let summary = scheduler.run(&mut cues).await.unwrap();

        // 3 failed batch attempts, 4 single-item calls, then a batch of 3 (4 - 2 floored at 3)
        let calls = translator.calls();
        assert_eq!(calls.len(), 3 + 4 + 1);
        assert!(calls[3..7].iter().all(|c| c.items.len() == 1 && c.batch_label.is_none()));
        assert_eq!(calls[7].items.len(), 3);
        assert_eq!(summary.translated, 7);

        let mut retrying = 0;
        let mut exhausted = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::Batch(BatchEvent::Retrying { .. }) => retrying += 1,
                PipelineEvent::Batch(BatchEvent::Exhausted { number }) => {
                    assert_eq!(number, 1);
                    exhausted += 1;
                }
                _ => {}
            }
        }
        assert_eq!(retrying, 2);
        assert_eq!(exhausted, 1);
    }

    #[tokio::test]
    async fn test_partial_batch_keeps_size() {
        let translator = Arc::new(ScriptedTranslator::new().reply_partial(2));
        let scheduler =
            BatchScheduler::new(translator.clone(), batch_config(), EventSink::disabled());
        let mut cues = cues(8);

        scheduler.run(&mut cues).await.unwrap();

        let sizes: Vec<usize> = translator.calls().iter().map(|c| c.items.len()).collect();
        // partial batch of 4, reduced retry of 2, then the next batch is still 4
        assert_eq!(sizes, vec![4, 2, 4]);
        assert!(cues.iter().all(|c| c.is_translated()));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let translator = Arc::new(
            ScriptedTranslator::new()
                .fail_with(SubtransError::Format("garbled".into()))
                .reply_echo(),
        );
        let scheduler =
            BatchScheduler::new(translator.clone(), batch_config(), EventSink::disabled());
        let mut cues = cues(3);

        let summary = scheduler.run(&mut cues).await.unwrap();
        assert_eq!(translator.call_count(), 2);
        assert_eq!(summary.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_already_translated_cues_are_skipped() {
        let translator = Arc::new(ScriptedTranslator::failing());
        let scheduler =
            BatchScheduler::new(translator.clone(), batch_config(), EventSink::disabled());
        let mut cues = cues(3);
        for cue in cues.iter_mut() {
            cue.translated_text = format!("done {}", cue.index);
        }
        let before = cues.clone();

        let summary = scheduler.run(&mut cues).await.unwrap();
        assert_eq!(translator.call_count(), 0);
        assert_eq!(summary.skipped, 3);
        assert_eq!(cues, before);
    }

    #[tokio::test]
    async fn test_batch_label_spans_skipped_cues() {
        let translator = Arc::new(ScriptedTranslator::new());
        let (events, mut rx) = EventSink::channel();
        let scheduler = BatchScheduler::new(translator.clone(), batch_config(), events);
        let mut cues = cues(4);
        cues[1].translated_text = "done 2".to_string();

        let summary = scheduler.run(&mut cues).await.unwrap();
        assert_eq!(summary.skipped, 1);

        let calls = translator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].batch_label.as_deref(), Some("1-4"));
        assert_eq!(calls[0].items, vec!["line 1", "line 3", "line 4"]);

        let mut started = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Batch(event @ BatchEvent::Started { .. }) = event {
                started.push(event);
            }
        }
        assert_eq!(
            started,
            vec![BatchEvent::Started { number: 1, first: 1, last: 4, size: 3 }]
        );
        assert_eq!(cues[1].translated_text, "done 2");
    }

    #[tokio::test]
    async fn test_cancel_before_first_batch() {
        let translator = Arc::new(ScriptedTranslator::new());
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let scheduler =
            BatchScheduler::new(translator.clone(), batch_config(), EventSink::disabled())
                .with_cancellation(cancel);
        let mut cues = cues(3);

        let err = scheduler.run(&mut cues).await.unwrap_err();
        assert!(matches!(err, SubtransError::Cancelled));
        assert_eq!(translator.call_count(), 0);
    }
}
