use crate::events::EventSink;
use crate::subtitle::{single_line, Cue};
use crate::translate::{translate_exact, Translator};
use super::BatchResolution;

/// Store a translation on a cue as single-line text, falling back to the
/// source for blank text.
///
/// Returns whether the cue received a genuine translation.
pub(crate) fn fill(cue: &mut Cue, translation: String) -> bool {
    let translation = single_line(&translation);
    if translation.is_empty() {
        cue.translated_text = cue.source_text.clone();
        false
    } else {
        cue.translated_text = translation;
        true
    }
}

fn tally(genuine: bool) -> BatchResolution {
    if genuine {
        BatchResolution { translated: 1, fallbacks: 0 }
    } else {
        BatchResolution { translated: 0, fallbacks: 1 }
    }
}

/// Resolves batches the scheduler could not translate in one piece.
///
/// After either entry point returns, every cue at the given positions holds a
/// translation or its own source text.
pub struct RecoveryController<'a> {
    translator: &'a dyn Translator,
    events: &'a EventSink,
}

impl<'a> RecoveryController<'a> {
    pub fn new(translator: &'a dyn Translator, events: &'a EventSink) -> Self {
        Self { translator, events }
    }

    /// Handle a short response.
    ///
    /// `positions` maps batch offsets to cue positions; `received` and
    /// `missing` are batch offsets.
    pub async fn resolve_partial(
        &self,
        cues: &mut [Cue],
        positions: &[usize],
        received: Vec<(usize, String)>,
        missing: &[usize],
        batch_label: &str,
    ) -> BatchResolution {
        let mut resolution = BatchResolution::default();
        for (offset, translation) in received {
            let genuine = fill(&mut cues[positions[offset]], translation);
            resolution = resolution.merge(tally(genuine));
        }

        let missing_positions: Vec<usize> =
            missing.iter().map(|&offset| positions[offset]).collect();
        if missing_positions.is_empty() {
            return resolution;
        }

        let items: Vec<String> = missing_positions
            .iter()
            .map(|&p| cues[p].source_text.clone())
            .collect();
        self.events.info(format!("Retrying {} missing items", items.len()));

        let retry_label = format!("RETRY-{}", batch_label);
        match translate_exact(self.translator, &items, Some(&retry_label)).await {
            Ok(translations) => {
                for (&p, translation) in missing_positions.iter().zip(translations) {
                    resolution = resolution.merge(tally(fill(&mut cues[p], translation)));
                }
                self.events.info("Missing items translated");
                resolution
            }
            Err(e) => {
                self.events.error(format!("Retry failed: {}", e));
                resolution.merge(self.resolve_individually(cues, &missing_positions).await)
            }
        }
    }

    /// Translate each cue on its own; any failure keeps that cue's source text
    pub async fn resolve_individually(
        &self,
        cues: &mut [Cue],
        positions: &[usize],
    ) -> BatchResolution {
        let mut resolution = BatchResolution::default();

        for &p in positions {
            let item = [cues[p].source_text.clone()];
            let genuine = match translate_exact(self.translator, &item, None).await {
                Ok(mut translations) => fill(&mut cues[p], translations.remove(0)),
                Err(e) => {
                    self.events.debug(format!("Line {} failed individually: {}", p + 1, e));
                    fill(&mut cues[p], String::new())
                }
            };

            if genuine {
                self.events.info(format!("Translated line {} individually", p + 1));
            } else {
                self.events.warn(format!("Using original for line {}", p + 1));
            }
            resolution = resolution.merge(tally(genuine));
        }

        resolution
    }
}
