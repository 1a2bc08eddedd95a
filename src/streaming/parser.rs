//! Incremental parser for newline-delimited JSON streams
//!
//! Network chunks split objects at arbitrary byte offsets. The parser
//! buffers bytes and hands back every complete top-level object found by
//! bracket matching, leaving any partial tail for the next push.

use serde::Deserialize;

use crate::errors::{RagError, Result};

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// One object from Ollama's `/api/generate` stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateChunk {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RagError::ModelFailure(format!("malformed model reply: {}", e)))
    }
}

/// Incremental JSON parser
#[derive(Debug)]
pub struct JsonParser {
    buffer: Vec<u8>,
    max_buffer_size: usize,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer_size,
        }
    }

    /// Append bytes and drain every complete object now in the buffer
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        if self.buffer.len() + bytes.len() > self.max_buffer_size {
            return Err(RagError::ModelFailure(format!(
                "stream buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len() + bytes.len(),
                self.max_buffer_size
            )));
        }

        self.buffer.extend_from_slice(bytes);

        let mut objects = Vec::new();
        while let Some((start, end)) = self.find_complete_json()? {
            objects.push(String::from_utf8_lossy(&self.buffer[start..=end]).into_owned());
            self.buffer.drain(..=end);
        }
        Ok(objects)
    }

    /// Bracket matching over the buffer, ignoring braces inside strings
    ///
    /// Returns the byte range of the first complete object, if any.
    fn find_complete_json(&self) -> Result<Option<(usize, usize)>> {
        let mut depth: i64 = 0;
        let mut start: Option<usize> = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, &byte) in self.buffer.iter().enumerate() {
            if escape_next {
                escape_next = false;
                continue;
            }

            match byte {
                b'\\' if in_string => escape_next = true,
                b'"' => in_string = !in_string,
                _ if in_string => {}
                b'{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                b'}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(RagError::ModelFailure(
                            "mismatched braces in model stream".to_string(),
                        ));
                    }
                    if depth == 0 {
                        if let Some(start) = start {
                            return Ok(Some((start, i)));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(None)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// True when nothing but whitespace is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}
