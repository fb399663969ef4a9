//! Local Tesseract engine driven through its command-line interface.
//!
//! Each call writes the buffer to a temporary PNG and runs
//!
//! ```text
//! tesseract <file> stdout --psm <N> -l <LANG> tsv
//! ```
//!
//! The TSV report has one row per layout element; level-5 rows are words.
//! Words are regrouped into lines by their `(page, block, par, line)` key and
//! the confidence is the mean of all word confidences that are not `-1`.

use super::{LayoutMode, RawRecognition, RecognitionAdapter};
use crate::buffer::PixelBuffer;
use crate::error::RecognitionError;
use crate::pipeline::encode::encode_png_async;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Word rows in Tesseract's TSV output.
const WORD_LEVEL: &str = "5";

/// Adapter for a locally installed `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run `tesseract --version` and return its first line.
    ///
    /// Used to fail fast with a readable hint before a whole catalog of
    /// passes errors out one by one.
    pub async fn probe(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RecognitionError::Unavailable(format!("{}: {e}", self.binary.display())))?;
        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }
}

#[async_trait]
impl RecognitionAdapter for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &PixelBuffer,
        mode: LayoutMode,
    ) -> Result<RawRecognition, RecognitionError> {
        let png = encode_png_async(image)
            .await
            .map_err(|e| RecognitionError::Failed(format!("PNG encode: {e}")))?;

        let tmp = tempfile::Builder::new()
            .prefix("clinocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| RecognitionError::Failed(format!("temp file: {e}")))?;
        tokio::fs::write(tmp.path(), &png)
            .await
            .map_err(|e| RecognitionError::Failed(format!("temp file: {e}")))?;

        let psm = mode.tesseract_psm().to_string();
        let mut cmd = Command::new(&self.binary);
        cmd.arg(tmp.path())
            .arg("stdout")
            .args(["--psm", psm.as_str()])
            .args(["-l", self.language.as_str()])
            .arg("tsv")
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| RecognitionError::Timeout {
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RecognitionError::Unavailable(format!(
                    "'{}' not found on PATH",
                    self.binary.display()
                )),
                _ => RecognitionError::Failed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Failed(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = parse_tsv(&stdout)?;
        debug!(
            "tesseract psm {} → {} chars @ {:.1}",
            psm,
            parsed.text.len(),
            parsed.confidence
        );
        Ok(parsed)
    }
}

/// Turn Tesseract's TSV report into text and a mean word confidence.
pub fn parse_tsv(tsv: &str) -> Result<RawRecognition, RecognitionError> {
    let mut rows = tsv.lines().filter(|l| !l.trim().is_empty());
    match rows.next() {
        Some(header) if header.starts_with("level") => {}
        Some(other) => {
            return Err(RecognitionError::Malformed(format!(
                "expected TSV header, got '{}'",
                other.chars().take(40).collect::<String>()
            )))
        }
        None => return Err(RecognitionError::Malformed("empty TSV output".into())),
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current_key: Option<(&str, &str, &str, &str)> = None;
    let mut conf_sum = 0.0f64;
    let mut conf_count = 0usize;

    for row in rows {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 11 {
            return Err(RecognitionError::Malformed(format!(
                "TSV row has {} columns",
                cols.len()
            )));
        }
        if cols[0] != WORD_LEVEL {
            continue;
        }
        let word = cols.get(11).map(|w| w.trim()).unwrap_or_default();
        if word.is_empty() {
            continue;
        }

        let conf: f64 = cols[10]
            .trim()
            .parse()
            .map_err(|_| RecognitionError::Malformed(format!("bad confidence '{}'", cols[10])))?;
        if conf >= 0.0 {
            conf_sum += conf;
            conf_count += 1;
        }

        let key = (cols[1], cols[2], cols[3], cols[4]);
        match lines.last_mut() {
            Some(line) if current_key == Some(key) => {
                line.push(' ');
                line.push_str(word);
            }
            _ => {
                lines.push(word.to_string());
                current_key = Some(key);
            }
        }
    }

    let confidence = if conf_count == 0 {
        0.0
    } else {
        (conf_sum / conf_count as f64) as f32
    };
    Ok(RawRecognition {
        text: lines.join("\n"),
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn report(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s.push('\n');
        s
    }

    #[test]
    fn words_are_grouped_into_lines() {
        let tsv = report(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t",
            "4\t1\t1\t1\t1\t0\t10\t10\t300\t30\t-1\t",
            "5\t1\t1\t1\t1\t1\t10\t10\t40\t30\t91.5\tBP",
            "5\t1\t1\t1\t1\t2\t60\t10\t90\t30\t88.5\t120/80",
            "5\t1\t1\t1\t2\t1\t10\t50\t120\t30\t70\tmorphine",
            "5\t1\t1\t1\t2\t2\t140\t50\t40\t30\t90\t10mg",
        ]);
        let r = parse_tsv(&tsv).unwrap();
        assert_eq!(r.text, "BP 120/80\nmorphine 10mg");
        assert!((r.confidence - 85.0).abs() < 1e-4, "{}", r.confidence);
    }

    #[test]
    fn negative_confidences_are_ignored() {
        let tsv = report(&[
            "5\t1\t1\t1\t1\t1\t0\t0\t1\t1\t-1\tx",
            "5\t1\t1\t1\t1\t2\t0\t0\t1\t1\t60\ty",
        ]);
        let r = parse_tsv(&tsv).unwrap();
        assert_eq!(r.text, "x y");
        assert_eq!(r.confidence, 60.0);
    }

    #[test]
    fn header_only_means_no_text() {
        let r = parse_tsv(&report(&[])).unwrap();
        assert_eq!(r.text, "");
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_tsv("Error opening data file"),
            Err(RecognitionError::Malformed(_))
        ));
        assert!(matches!(parse_tsv(""), Err(RecognitionError::Malformed(_))));
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let engine = TesseractCli::new("/nonexistent/tesseract-binary", "eng", 5);
        let buf = PixelBuffer::from_fn_gray(4, 4, |_, _| 255);
        let err = engine
            .recognize(&buf, LayoutMode::SingleBlock)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Unavailable(_)), "{err}");
    }
}
