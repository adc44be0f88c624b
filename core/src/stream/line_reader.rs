use tokio::io::{AsyncRead, AsyncReadExt};

/// Hard cap on a single JSON line; anything longer is skipped, not fatal.
pub const JSON_LINE_MAX_BYTES: usize = 10 * 1024 * 1024;
/// How much of an oversized or malformed line is kept for diagnostics.
pub const JSON_LINE_PREVIEW_BYTES: usize = 256;

const READ_CHUNK: usize = 64 * 1024;

pub(crate) enum RawLine {
    /// `line()` holds the complete line, CR/LF stripped.
    Complete,
    /// The line exceeded the cap; `preview()` holds its head, the rest was
    /// discarded through the next newline.
    Oversized,
}

/// Line framing over an async byte stream with a length cap.
///
/// One instance is created per child process and its buffers are reused
/// across lines; long streams are the common case.
pub(crate) struct LineReader<R> {
    rd: R,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    line: Vec<u8>,
    preview: Vec<u8>,
    max_bytes: usize,
    preview_bytes: usize,
    skipping: bool,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(rd: R) -> Self {
        Self::with_limits(rd, JSON_LINE_MAX_BYTES, JSON_LINE_PREVIEW_BYTES)
    }

    pub fn with_limits(rd: R, max_bytes: usize, preview_bytes: usize) -> Self {
        Self {
            rd,
            chunk: vec![0u8; READ_CHUNK],
            pending: Vec::with_capacity(8 * 1024),
            line: Vec::with_capacity(8 * 1024),
            preview: Vec::with_capacity(preview_bytes),
            max_bytes,
            preview_bytes,
            skipping: false,
            eof: false,
        }
    }

    pub fn line(&self) -> &[u8] {
        &self.line
    }

    pub fn preview(&self) -> &[u8] {
        &self.preview
    }

    /// Returns the next framed line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<RawLine>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                if self.skipping {
                    self.pending.drain(..=pos);
                    self.skipping = false;
                    return Ok(Some(RawLine::Oversized));
                }
                if pos > self.max_bytes {
                    self.capture_preview_to(pos);
                    self.pending.drain(..=pos);
                    return Ok(Some(RawLine::Oversized));
                }
                self.line.clear();
                self.line.extend_from_slice(&self.pending[..pos]);
                self.pending.drain(..=pos);
                trim_cr(&mut self.line);
                return Ok(Some(RawLine::Complete));
            }

            if !self.skipping && self.pending.len() > self.max_bytes {
                self.capture_preview_to(self.pending.len());
                self.pending.clear();
                self.skipping = true;
            } else if self.skipping {
                self.pending.clear();
            }

            if self.eof {
                if self.skipping {
                    self.skipping = false;
                    return Ok(Some(RawLine::Oversized));
                }
                if self.pending.is_empty() {
                    return Ok(None);
                }
                // Final partial line without a trailing newline.
                self.line.clear();
                self.line.append(&mut self.pending);
                trim_cr(&mut self.line);
                return Ok(Some(RawLine::Complete));
            }

            let n = self.rd.read(&mut self.chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&self.chunk[..n]);
            }
        }
    }

    fn capture_preview_to(&mut self, available: usize) {
        self.preview.clear();
        let take = self.preview_bytes.min(available).min(self.pending.len());
        self.preview.extend_from_slice(&self.pending[..take]);
    }
}

fn trim_cr(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
}

/// Resync helper for callers that keep a persistent decode buffer across
/// partial lines: drops everything up to and including the next newline and
/// returns the remainder, or `None` when no newline is buffered yet.
pub fn discard_through_newline(buffered: &[u8]) -> Option<&[u8]> {
    let pos = buffered.iter().position(|&b| b == b'\n')?;
    Some(&buffered[pos + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8], max: usize) -> Vec<(bool, Vec<u8>)> {
        let mut reader = LineReader::with_limits(input, max, 8);
        let mut out = Vec::new();
        while let Some(kind) = reader.next_line().await.unwrap() {
            match kind {
                RawLine::Complete => out.push((false, reader.line().to_vec())),
                RawLine::Oversized => out.push((true, reader.preview().to_vec())),
            }
        }
        out
    }

    #[tokio::test]
    async fn frames_simple_lines() {
        let lines = collect(b"one\ntwo\r\nthree", 100).await;
        assert_eq!(
            lines,
            vec![
                (false, b"one".to_vec()),
                (false, b"two".to_vec()),
                (false, b"three".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_with_preview() {
        let mut input = vec![b'x'; 64];
        input.push(b'\n');
        input.extend_from_slice(b"ok\n");
        let lines = collect(&input, 16).await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].0);
        assert_eq!(lines[0].1, b"xxxxxxxx".to_vec());
        assert_eq!(lines[1], (false, b"ok".to_vec()));
    }

    #[tokio::test]
    async fn oversized_line_at_eof() {
        let input = vec![b'y'; 64];
        let lines = collect(&input, 16).await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let lines = collect(b"", 16).await;
        assert!(lines.is_empty());
    }

    #[test]
    fn discard_through_newline_resyncs() {
        assert_eq!(discard_through_newline(b"garbage\nrest"), Some(&b"rest"[..]));
        assert_eq!(discard_through_newline(b"tail\n"), Some(&b""[..]));
        assert_eq!(discard_through_newline(b"no newline yet"), None);
    }
}
