//! Normalizes the line-delimited JSON streams of the four backend CLIs into
//! a single `(message, session_id)` pair.
//!
//! Dialect-O (opencode) and dialect-G (gemini) are additive streams where
//! every delta matters; dialect-X (codex) and dialect-C (claude) are
//! replace-wins. The end-of-stream message priority encodes that split.

pub mod event;
pub mod line_reader;

use tokio::io::AsyncRead;

use crate::util::truncate_bytes;
use event::{normalize_text, OpencodePart, UnifiedEvent};
use line_reader::{LineReader, RawLine, JSON_LINE_MAX_BYTES};

pub use event::UnifiedEvent as StreamEvent;
pub use line_reader::discard_through_newline;

/// Hooks a caller may install to nudge progress timers while the stream is
/// being consumed.
pub trait StreamObserver: Send {
    fn on_message(&mut self) {}
    fn on_complete(&mut self) {}
}

/// Observer that ignores every notification.
pub struct NullObserver;

impl StreamObserver for NullObserver {}

#[derive(Debug, Default, Clone)]
pub struct StreamOutcome {
    /// Final assistant message, selected by dialect priority.
    pub message: String,
    /// Backend-assigned session/thread identifier, possibly empty.
    pub session_id: String,
    /// Count of dropped lines (oversized or malformed).
    pub warnings: u64,
    /// Count of non-empty lines seen.
    pub events: u64,
}

/// Consumes a child's stdout to completion and returns the normalized
/// outcome. Malformed and oversized lines are warned and dropped; they never
/// abort the stream.
pub async fn parse_json_stream<R, O>(rd: R, observer: &mut O) -> StreamOutcome
where
    R: AsyncRead + Unpin,
    O: StreamObserver + ?Sized,
{
    let mut reader = LineReader::new(rd);
    let mut out = StreamOutcome::default();

    let mut codex_message = String::new();
    let mut claude_message = String::new();
    let mut gemini_buffer = String::new();
    let mut opencode_message = String::new();

    loop {
        let kind = match reader.next_line().await {
            Ok(Some(kind)) => kind,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "read stdout error");
                break;
            }
        };

        match kind {
            RawLine::Oversized => {
                out.events += 1;
                out.warnings += 1;
                tracing::warn!(
                    limit = JSON_LINE_MAX_BYTES,
                    preview = %truncate_bytes(reader.preview(), 100),
                    "skipped overlong JSON line"
                );
                continue;
            }
            RawLine::Complete => {}
        }

        let line = trim_ascii(reader.line());
        if line.is_empty() {
            continue;
        }
        out.events += 1;

        // Single decode for all backend dialects.
        let ev: UnifiedEvent = match serde_json::from_slice(line) {
            Ok(ev) => ev,
            Err(_) => {
                out.warnings += 1;
                tracing::warn!(
                    preview = %truncate_bytes(line, 100),
                    "failed to parse event"
                );
                continue;
            }
        };

        // Classify by field presence; the order below is the detection
        // precedence (most specific first).
        let is_opencode = !ev.opencode_session_id.is_empty() && ev.part.is_some();
        let is_codex = !ev.thread_id.is_empty()
            || !ev.item_type().is_empty()
            || ev.event_type == "turn.started"
            || ev.event_type == "turn.completed";
        let is_claude = !ev.subtype.is_empty()
            || !ev.result.is_empty()
            || (ev.event_type == "result" && !ev.session_id.is_empty() && ev.status.is_empty());
        let is_gemini = (ev.event_type == "init" && !ev.session_id.is_empty())
            || !ev.role.is_empty()
            || ev.delta.is_some()
            || !ev.status.is_empty();

        if is_opencode {
            if out.session_id.is_empty() {
                out.session_id = ev.opencode_session_id.clone();
            }

            let part: OpencodePart = match ev
                .part
                .as_ref()
                .map(|p| serde_json::from_value(p.clone()))
                .transpose()
            {
                Ok(part) => part.unwrap_or_default(),
                Err(err) => {
                    out.warnings += 1;
                    tracing::warn!(error = %err, "failed to parse opencode part");
                    continue;
                }
            };

            if !part.session_id.is_empty() && out.session_id.is_empty() {
                out.session_id = part.session_id.clone();
            }

            tracing::debug!(
                event = out.events,
                event_type = %ev.event_type,
                part_type = %part.part_type,
                "parsed opencode event"
            );

            if ev.event_type == "text" && !part.text.is_empty() {
                opencode_message.push_str(&part.text);
                observer.on_message();
            }

            if part.part_type == "step-finish" && part.reason == "stop" {
                observer.on_complete();
            }
            continue;
        }

        if is_codex {
            tracing::debug!(
                event = out.events,
                event_type = %ev.event_type,
                thread_id = %ev.thread_id,
                "parsed codex event"
            );

            match ev.event_type.as_str() {
                "thread.started" => {
                    out.session_id = ev.thread_id.clone();
                }
                "thread.completed" => {
                    if !ev.thread_id.is_empty() && out.session_id.is_empty() {
                        out.session_id = ev.thread_id.clone();
                    }
                    observer.on_complete();
                }
                "turn.completed" => {
                    observer.on_complete();
                }
                "item.completed" => {
                    if ev.item_type() == "agent_message" {
                        let text = ev
                            .item
                            .as_ref()
                            .and_then(|i| i.get("text"))
                            .map(normalize_text)
                            .unwrap_or_default();
                        if !text.is_empty() {
                            codex_message = text;
                            observer.on_message();
                        }
                    }
                }
                _ => {}
            }
            continue;
        }

        if is_claude {
            if !ev.session_id.is_empty() && out.session_id.is_empty() {
                out.session_id = ev.session_id.clone();
            }

            tracing::debug!(
                event = out.events,
                event_type = %ev.event_type,
                subtype = %ev.subtype,
                result_len = ev.result.len(),
                "parsed claude event"
            );

            if !ev.result.is_empty() {
                claude_message = ev.result.clone();
                observer.on_message();
            }

            if ev.event_type == "result" {
                observer.on_complete();
            }
            continue;
        }

        if is_gemini {
            if !ev.session_id.is_empty() && out.session_id.is_empty() {
                out.session_id = ev.session_id.clone();
            }

            if !ev.content.is_empty() {
                gemini_buffer.push_str(&ev.content);
            }

            if !ev.status.is_empty() {
                observer.on_message();

                if ev.event_type == "result"
                    && matches!(ev.status.as_str(), "success" | "error" | "complete" | "failed")
                {
                    observer.on_complete();
                }
            }

            tracing::debug!(
                event = out.events,
                event_type = %ev.event_type,
                role = %ev.role,
                status = %ev.status,
                content_len = ev.content.len(),
                "parsed gemini event"
            );
            continue;
        }

        // Unknown event shape; ignore.
    }

    out.message = if !opencode_message.is_empty() {
        opencode_message
    } else if !gemini_buffer.is_empty() {
        gemini_buffer
    } else if !claude_message.is_empty() {
        claude_message
    } else {
        codex_message
    };

    tracing::debug!(
        events = out.events,
        message_len = out.message.len(),
        session_id_found = !out.session_id.is_empty(),
        "stream parse completed"
    );

    out
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|p| p + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(input: &str) -> StreamOutcome {
        parse_json_stream(input.as_bytes(), &mut NullObserver).await
    }

    #[tokio::test]
    async fn codex_replace_wins() {
        let out = parse(concat!(
            "{\"type\":\"thread.started\",\"thread_id\":\"T1\"}\n",
            "{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\",\"text\":\"first\"}}\n",
            "{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\",\"text\":\"second\"}}\n",
            "{\"type\":\"thread.completed\",\"thread_id\":\"T1\"}\n",
        ))
        .await;
        assert_eq!(out.message, "second");
        assert_eq!(out.session_id, "T1");
        assert_eq!(out.warnings, 0);
    }

    #[tokio::test]
    async fn codex_array_text_joined() {
        let out = parse(
            "{\"type\":\"item.completed\",\"item\":{\"type\":\"agent_message\",\"text\":[\"a\",\"b\"]}}\n",
        )
        .await;
        assert_eq!(out.message, "ab");
    }

    #[tokio::test]
    async fn gemini_deltas_accumulate() {
        let out = parse(concat!(
            "{\"type\":\"init\",\"session_id\":\"G1\"}\n",
            "{\"type\":\"message\",\"role\":\"assistant\",\"content\":\"hel\",\"delta\":true}\n",
            "{\"type\":\"message\",\"role\":\"assistant\",\"content\":\"lo\",\"delta\":true}\n",
            "{\"type\":\"result\",\"status\":\"success\"}\n",
        ))
        .await;
        assert_eq!(out.message, "hello");
        assert_eq!(out.session_id, "G1");
    }

    #[tokio::test]
    async fn malformed_line_is_dropped_not_fatal() {
        let out = parse(concat!(
            "this is not json\n",
            "{\"type\":\"result\",\"subtype\":\"ok\",\"session_id\":\"S\",\"result\":\"done\"}\n",
        ))
        .await;
        assert_eq!(out.message, "done");
        assert_eq!(out.session_id, "S");
        assert_eq!(out.warnings, 1);
    }

    #[tokio::test]
    async fn blank_lines_ignored() {
        let out = parse("\n\n  \n{\"type\":\"result\",\"result\":\"x\",\"session_id\":\"s\"}\n").await;
        assert_eq!(out.message, "x");
        assert_eq!(out.events, 1);
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_outcome() {
        let out = parse("").await;
        assert!(out.message.is_empty());
        assert!(out.session_id.is_empty());
        assert_eq!(out.events, 0);
    }

    #[tokio::test]
    async fn observer_sees_message_and_completion() {
        struct Counting {
            messages: usize,
            completions: usize,
        }
        impl StreamObserver for Counting {
            fn on_message(&mut self) {
                self.messages += 1;
            }
            fn on_complete(&mut self) {
                self.completions += 1;
            }
        }

        let mut obs = Counting {
            messages: 0,
            completions: 0,
        };
        let input = concat!(
            "{\"type\":\"text\",\"sessionID\":\"Z\",\"part\":{\"type\":\"text\",\"text\":\"hi\"}}\n",
            "{\"type\":\"step-finish\",\"sessionID\":\"Z\",\"part\":{\"type\":\"step-finish\",\"reason\":\"stop\"}}\n",
        );
        let out = parse_json_stream(input.as_bytes(), &mut obs).await;
        assert_eq!(out.message, "hi");
        assert_eq!(out.session_id, "Z");
        assert_eq!(obs.messages, 1);
        assert_eq!(obs.completions, 1);
    }

    #[tokio::test]
    async fn final_partial_line_without_newline_is_parsed() {
        let out =
            parse("{\"type\":\"result\",\"subtype\":\"ok\",\"session_id\":\"S\",\"result\":\"tail\"}").await;
        assert_eq!(out.message, "tail");
        assert_eq!(out.session_id, "S");
    }
}
