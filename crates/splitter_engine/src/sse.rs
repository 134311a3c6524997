/// Longest line, or accumulated event data, the decoder will buffer.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Only `data` fields matter for progress events; `event`, `id` and `retry`
/// are accepted and dropped. An event still open when the body ends is
/// discarded, as the format requires a blank line to dispatch.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the `data` payloads of every event it completed.
    /// Fails once a line or an event grows past [`MAX_LINE_BYTES`].
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, String> {
        self.pending.extend_from_slice(chunk);
        let mut dispatched = Vec::new();

        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    dispatched.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
                let buffered: usize = self.data.iter().map(|d| d.len() + 1).sum();
                if buffered > MAX_LINE_BYTES {
                    return Err(format!("event data exceeds {MAX_LINE_BYTES} bytes"));
                }
            }
        }

        if self.pending.len() > MAX_LINE_BYTES {
            return Err(format!("line exceeds {MAX_LINE_BYTES} bytes"));
        }
        Ok(dispatched)
    }
}
