//! Recognition through the `tesseract` command line.
//!
//! The PNG is piped to `tesseract stdin stdout -l <lang> tsv` and the TSV
//! word rows are reassembled into lines and paragraphs.

use std::io::Write;
use std::process::{Command, Stdio};

use log::debug;

use super::{Progress, ProgressSink, Recognition, RecognitionEngine, RecognitionError};

/// Level of word rows in tesseract's TSV output.
const WORD_LEVEL: u32 = 5;

#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }
}

impl RecognitionEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, png: &[u8], progress: &ProgressSink) -> Result<Recognition, RecognitionError> {
        progress.report(Progress::recognizing(0.0));
        debug!("running {} -l {}", self.program, self.language);

        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l", &self.language, "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecognitionError::Engine(format!("cannot run {}: {e}", self.program)))?;

        // An early exit breaks the pipe; its status and stderr win over the
        // write error.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|e| RecognitionError::Engine(format!("{} did not finish: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        written.map_err(|e| RecognitionError::Engine(format!("cannot write image to {}: {e}", self.program)))?;

        progress.report(Progress::recognizing(1.0));
        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Rebuild text from TSV word rows: words on a line are joined by spaces,
/// lines by newlines and paragraphs by a blank line. Confidence is the mean
/// of the word confidences, 0 when there are none.
pub fn parse_tsv(tsv: &str) -> Recognition {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut last_line: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().ok();
        let (Some(level), Some(block), Some(par), Some(line)) = (num(0), num(2), num(3), num(4)) else {
            continue;
        };
        let Ok(conf) = cols[10].trim().parse::<f32>() else {
            continue;
        };
        let word = cols[11].trim();
        if level != WORD_LEVEL || conf < 0.0 || word.is_empty() {
            continue;
        }

        match last_line {
            Some((b, p, _)) if (b, p) != (block, par) => text.push_str("\n\n"),
            Some(key) if key != (block, par, line) => text.push('\n'),
            Some(_) => text.push(' '),
            None => {}
        }
        text.push_str(word);
        last_line = Some((block, par, line));
        confidences.push(conf);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    Recognition { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn joins_words_lines_and_paragraphs() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t200\t100\t-1\t",
            "4\t1\t1\t1\t1\t0\t10\t10\t100\t20\t-1\t",
            "5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t90\tHello",
            "5\t1\t1\t1\t1\t2\t60\t10\t40\t20\t80\tworld",
            "5\t1\t1\t1\t2\t1\t10\t40\t40\t20\t70\tsecond",
            "5\t1\t2\t1\t1\t1\t10\t80\t40\t20\t60\tnext",
        ]);
        let recognition = parse_tsv(&input);
        assert_eq!(recognition.text, "Hello world\nsecond\n\nnext");
        assert!((recognition.confidence - 75.0).abs() < 1e-4);
    }

    #[test]
    fn skips_blank_words_and_negative_confidence() {
        let input = tsv(&[
            "5\t1\t1\t1\t1\t1\t0\t0\t1\t1\t-1\tghost",
            "5\t1\t1\t1\t1\t2\t0\t0\t1\t1\t95\t ",
            "5\t1\t1\t1\t1\t3\t0\t0\t1\t1\t50\tword",
        ]);
        let recognition = parse_tsv(&input);
        assert_eq!(recognition.text, "word");
        assert_eq!(recognition.confidence, 50.0);
    }

    #[test]
    fn empty_output_has_zero_confidence() {
        let recognition = parse_tsv(HEADER);
        assert_eq!(recognition.text, "");
        assert_eq!(recognition.confidence, 0.0);
        assert_eq!(parse_tsv("").text, "");
    }

    #[test]
    fn missing_program_is_an_engine_error() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let sink = ProgressSink { job: uuid::Uuid::nil(), events: tx };
        let engine = TesseractEngine::new("ocr-canvas-missing-tesseract", "eng");
        assert!(matches!(
            engine.recognize(b"\x89PNG", &sink),
            Err(RecognitionError::Engine(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn early_exit_reports_engine_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let script = std::env::temp_dir().join(format!("ocr-canvas-early-exit-{}.sh", uuid::Uuid::new_v4()));
        std::fs::write(&script, "#!/bin/sh\necho \"Failed loading language 'xx'\" >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (tx, _rx) = std::sync::mpsc::channel();
        let sink = ProgressSink { job: uuid::Uuid::nil(), events: tx };
        let engine = TesseractEngine::new(script.to_string_lossy(), "xx");
        let image = vec![0u8; 4 * 1024 * 1024];
        let result = engine.recognize(&image, &sink);
        let _ = std::fs::remove_file(&script);

        match result {
            Err(RecognitionError::Engine(message)) => {
                assert!(message.contains("Failed loading language"), "{message}");
                assert!(!message.contains("cannot write image"), "{message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
