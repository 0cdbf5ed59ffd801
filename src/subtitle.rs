use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SubtransError};

/// One subtitle entry.
///
/// `index` and `time_range` are the raw tokens captured at decode time and are
/// written back unchanged; only `translated_text` is ever mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: String,
    pub time_range: String,
    pub source_text: String,
    pub translated_text: String,
}

impl Cue {
    pub fn new(
        index: impl Into<String>,
        time_range: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            time_range: time_range.into(),
            source_text: source_text.into(),
            translated_text: String::new(),
        }
    }

    /// Text written on output: the translation, or the source when none was obtained
    pub fn output_text(&self) -> &str {
        if self.translated_text.is_empty() {
            &self.source_text
        } else {
            &self.translated_text
        }
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.is_empty()
    }
}

/// Collapse any run of whitespace, newlines included, into a single space
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn index_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("valid index pattern"))
}

fn time_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{2}:\d{2}:\d{2},\d{3} --> \d{2}:\d{2}:\d{2},\d{3}$")
            .expect("valid time range pattern")
    })
}

/// Parse an SRT document into cues.
///
/// Each block is anchored on an index line directly followed by a time range
/// line; text runs until the next blank line or the end of input. Anything
/// that does not start such a block is skipped.
pub fn decode(document: &str) -> Result<Vec<Cue>> {
    let normalized = document
        .strip_prefix('\u{feff}')
        .unwrap_or(document)
        .replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let index = lines[i].trim_end();
        let time = lines.get(i + 1).map(|l| l.trim_end());

        match time {
            Some(time) if index_line().is_match(index) && time_line().is_match(time) => {
                let mut text_lines = Vec::new();
                let mut j = i + 2;
                while j < lines.len() && !lines[j].trim().is_empty() {
                    text_lines.push(lines[j].trim());
                    j += 1;
                }

                cues.push(Cue::new(index, time, text_lines.join(" ")));
                i = j;
            }
            _ => i += 1,
        }
    }

    if cues.is_empty() {
        return Err(SubtransError::Format(
            "No subtitle cues recognized in input".to_string(),
        ));
    }

    debug!("Decoded {} subtitle cues", cues.len());
    Ok(cues)
}

/// Serialize cues back into an SRT document
pub fn encode(cues: &[Cue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{}\n{}\n\n",
            cue.index,
            cue.time_range,
            single_line(cue.output_text())
        ));
    }

    srt_content
}

/// Read and decode an SRT file
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SubtransError::FileNotFound(path.display().to_string()));
    }

    let content = fs::read_to_string(path).await?;
    let cues = decode(&content)?;

    info!("Loaded {} cues from {}", cues.len(), path.display());
    Ok(cues)
}

/// Encode and write cues to an SRT file
pub async fn write_srt<P: AsRef<Path>>(path: P, cues: &[Cue]) -> Result<()> {
    let path = path.as_ref();
    info!("Writing SRT file: {}", path.display());

    fs::write(path, encode(cues)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello there.\n\n\
                          2\n00:00:03,000 --> 00:00:05,000\nThis spans\ntwo lines.\n\n\
                          10\n00:01:00,000 --> 00:01:02,000\nSkipped numbering\n";

    #[test]
    fn test_decode_basic_blocks() {
        let cues = decode(SAMPLE).unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].index, "1");
        assert_eq!(cues[0].time_range, "00:00:01,000 --> 00:00:02,500");
        assert_eq!(cues[0].source_text, "Hello there.");
        assert_eq!(cues[1].source_text, "This spans two lines.");
        assert_eq!(cues[2].index, "10");
        assert!(cues.iter().all(|c| c.translated_text.is_empty()));
    }

    #[test]
    fn test_decode_crlf_and_bom() {
        let doc = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nLine one\r\nLine two\r\n\r\n";
        let cues = decode(doc).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].source_text, "Line one Line two");
    }

    #[test]
    fn test_decode_tolerates_garbage_and_truncated_tail() {
        let doc = "garbage header\n\n\
                   1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\
                   2\n00:00:03,000 --> 00:00:04,000\nTrunc";
        let cues = decode(doc).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1].source_text, "Trunc");
    }

    #[test]
    fn test_decode_empty_input_is_format_error() {
        assert!(matches!(decode(""), Err(SubtransError::Format(_))));
        assert!(matches!(
            decode("not a subtitle file\nat all\n"),
            Err(SubtransError::Format(_))
        ));
    }

    #[test]
    fn test_encode_uses_translation_or_fallback() {
        let mut cues = decode(SAMPLE).unwrap();
        cues[0].translated_text = "你好。".to_string();

        let out = encode(&cues);
        assert!(out.starts_with("1\n00:00:01,000 --> 00:00:02,500\n你好。\n\n"));
        assert!(out.contains("2\n00:00:03,000 --> 00:00:05,000\nThis spans two lines.\n\n"));
        assert!(out.ends_with("10\n00:01:00,000 --> 00:01:02,000\nSkipped numbering\n\n"));
    }

    #[test]
    fn test_roundtrip_preserves_tokens() {
        let mut cues = decode(SAMPLE).unwrap();
        cues[1].translated_text = "translated".to_string();

        let again = decode(&encode(&cues)).unwrap();
        assert_eq!(again.len(), cues.len());
        for (a, b) in cues.iter().zip(&again) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.time_range, b.time_range);
            assert_eq!(a.output_text(), b.source_text);
        }
    }

    #[test]
    fn test_multiline_translation_stays_in_its_cue() {
        let mut cues = decode(SAMPLE).unwrap();
        cues[0].translated_text = "你好\n\n朋友".to_string();
        cues[1].translated_text = "世界\r\n第二行".to_string();

        let again = decode(&encode(&cues)).unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(again[0].source_text, "你好 朋友");
        assert_eq!(again[1].source_text, "世界 第二行");
        assert_eq!(again[2].index, "10");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("  a\n\n b\tc  "), "a b c");
        assert_eq!(single_line("\n \n"), "");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_srt("/definitely/not/here.srt").await.unwrap_err();
        assert!(matches!(err, SubtransError::FileNotFound(_)));
    }
}
