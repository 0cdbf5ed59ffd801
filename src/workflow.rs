use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, SubtransError};
use crate::events::{EventSink, PipelineEvent};
use crate::pipeline::{BatchScheduler, CancellationFlag, RunSummary};
use crate::subtitle::{read_srt, write_srt};
use crate::translate::{ChatTranslator, Translator};

pub struct Workflow {
    config: Config,
    translator: Arc<dyn Translator>,
}

impl Workflow {
    /// Workflow backed by the configured chat completions endpoint
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let translator = Arc::new(ChatTranslator::new(config.translate.clone())?);
        Ok(Self { config, translator })
    }

    /// Workflow using a caller-supplied translator
    pub fn with_translator(config: Config, translator: Arc<dyn Translator>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, translator })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate one subtitle file and write the result.
    ///
    /// Fails only when the input cannot be read or decoded, the output cannot
    /// be written, or the run is cancelled. Translation failures degrade
    /// individual cues to their source text instead.
    pub async fn translate_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        events: &EventSink,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        events.progress(0);
        events.info(format!("Reading subtitles from {}", input_path.display()));
        let mut cues = read_srt(input_path).await?;
        events.info(format!("Found {} subtitle cues", cues.len()));

        let scheduler = BatchScheduler::new(
            self.translator.clone(),
            self.config.batch.clone(),
            events.clone(),
        )
        .with_cancellation(cancel.clone());
        let summary = scheduler.run(&mut cues).await?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        write_srt(output_path, &cues).await?;

        events.progress(100);
        info!(
            "Wrote {} cues to {} ({} fell back to source text)",
            cues.len(),
            output_path.display(),
            summary.fallbacks
        );
        Ok(summary)
    }
}

/// Derive `<stem>_<suffix>.srt` next to the input file
pub fn default_output_path<P: AsRef<Path>>(input_path: P, suffix: &str) -> Result<PathBuf> {
    let input_path = input_path.as_ref();
    let stem = input_path
        .file_stem()
        .ok_or_else(|| {
            SubtransError::Config(format!(
                "Invalid subtitle filename: {}",
                input_path.display()
            ))
        })?
        .to_string_lossy();

    Ok(input_path.with_file_name(format!("{}_{}.srt", stem, suffix)))
}

/// Handle to a translation job running on its own task
pub struct TranslationJob {
    pub handle: JoinHandle<Result<PathBuf>>,
    pub events: UnboundedReceiver<PipelineEvent>,
    pub cancel: CancellationFlag,
}

/// Run `translate_file` on a dedicated task.
///
/// The job always ends its event stream with `Finished` or `Failed`.
pub fn spawn_translation_job(
    workflow: Arc<Workflow>,
    input_path: PathBuf,
    output_path: PathBuf,
) -> TranslationJob {
    let (sink, events) = EventSink::channel();
    let cancel = CancellationFlag::new();
    let job_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        match workflow.translate_file(&input_path, &output_path, &sink, &job_cancel).await {
            Ok(_) => {
                sink.finished(output_path.clone());
                Ok(output_path)
            }
            Err(e) => {
                sink.error(format!("Translation job failed: {}", e));
                sink.failed(e.to_string());
                Err(e)
            }
        }
    });

    TranslationJob { handle, events, cancel }
}
