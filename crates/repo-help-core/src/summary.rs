//! Structured summarizer output and its delimited text codec.
//!
//! A summarizer produces an ordered list of [`SummaryChunk`]s: the
//! file-level summary first, then one chunk per discovered unit (for
//! example a function). Language models cannot emit that structure
//! directly, so the prompt asks for a delimited text form which
//! [`parse_delimited`] turns back into a [`Summary`]:
//!
//! ~~~text
//! Handles user login and session refresh.
//! === CHUNK ===
//! `login()` validates credentials and issues a token.
//! === CODE ===
//! ```js
//! function login(user, pass) { ... }
//! ```
//! ~~~
//!
//! Blank segments are discarded and ordinals are assigned by position
//! among the remaining ones. A segment with only a code part uses the
//! code as its text, so every chunk has something to embed.

use crate::models::{Chunk, Namespace};

/// Line separating independent chunks.
pub const CHUNK_DELIMITER: &str = "=== CHUNK ===";

/// Line separating a chunk's narrative from its code excerpt.
pub const CODE_DELIMITER: &str = "=== CODE ===";

/// One chunk of summarizer output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryChunk {
    pub text: String,
    pub code: Option<String>,
}

impl SummaryChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
        }
    }

    pub fn with_code(text: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: Some(code.into()),
        }
    }
}

/// Ordered summarizer output for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub chunks: Vec<SummaryChunk>,
}

impl Summary {
    pub fn new(chunks: Vec<SummaryChunk>) -> Self {
        Self { chunks }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Assign ordinals and docIds for `path` in `namespace`.
    pub fn into_chunks(self, namespace: &Namespace, path: &str) -> Vec<Chunk> {
        self.chunks
            .into_iter()
            .enumerate()
            .map(|(i, c)| Chunk::new(namespace, path, i as u32, c.text, c.code))
            .collect()
    }
}

/// Parse delimited summarizer text into a [`Summary`].
///
/// Text without [`CHUNK_DELIMITER`] becomes a single whole-file chunk.
/// Blank input yields an empty summary.
pub fn parse_delimited(raw: &str) -> Summary {
    let mut chunks = Vec::new();
    for segment in split_on_line(raw, CHUNK_DELIMITER) {
        let mut parts = split_on_line(&segment, CODE_DELIMITER).into_iter();
        let text = parts.next().unwrap_or_default().trim().to_string();
        let code = parts
            .map(|p| strip_fences(&p))
            .filter(|c| !c.is_empty())
            .reduce(|mut acc, c| {
                acc.push('\n');
                acc.push_str(&c);
                acc
            });

        let text = match (text.is_empty(), &code) {
            (false, _) => text,
            (true, Some(code)) => code.clone(),
            (true, None) => continue,
        };
        chunks.push(SummaryChunk { text, code });
    }
    Summary { chunks }
}

/// Serialize a [`Summary`] into the delimited form.
pub fn to_delimited(summary: &Summary) -> String {
    summary
        .chunks
        .iter()
        .map(|c| match &c.code {
            Some(code) => format!("{}\n{}\n{}", c.text, CODE_DELIMITER, code),
            None => c.text.clone(),
        })
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", CHUNK_DELIMITER))
}

/// Split on lines whose trimmed content equals `delimiter`.
fn split_on_line(text: &str, delimiter: &str) -> Vec<String> {
    let mut segments = vec![String::new()];
    for line in text.lines() {
        if line.trim() == delimiter {
            segments.push(String::new());
            continue;
        }
        if let Some(current) = segments.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    segments
}

/// Trim a code excerpt and drop surrounding markdown fences.
fn strip_fences(code: &str) -> String {
    let trimmed = code.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Opening fence may carry a language tag.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}
