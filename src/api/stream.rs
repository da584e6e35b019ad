//! Server-sent event decoding for streaming runs.
//!
//! The provider streams `event:`/`data:` frames separated by blank lines. Bytes
//! are buffered until a full line is available so multi-byte characters split
//! across chunks decode intact.

use anyhow::{Context, Result};
use async_stream::stream;
use futures_util::StreamExt;
use tracing::debug;

use super::types::{
    AnnotationObject, FileAnnotation, MessageContent, MessageObject, RunEvent, RunObject,
    RunStepObject, StepDetails, ToolCallObject,
};
use super::EventStream;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Default)]
pub(super) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..newline_pos]);
            if let Some(frame) = self.feed_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the body ends.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(frame) = self.feed_line(line.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.flush()
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn flush(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

fn function_calls(calls: Vec<ToolCallObject>) -> Vec<super::ToolCall> {
    calls
        .into_iter()
        .filter_map(ToolCallObject::into_tool_call)
        .collect()
}

/// Map one frame onto the events the agent cares about.
pub(super) fn parse_frame(frame: &SseFrame) -> Result<Vec<RunEvent>> {
    let events = match frame.event.as_str() {
        "thread.message.completed" => {
            let message: MessageObject = serde_json::from_str(&frame.data)
                .context("Failed to parse completed message")?;
            message
                .content
                .into_iter()
                .filter_map(|content| match content {
                    MessageContent::Text { text } => Some(RunEvent::TextDone {
                        text: text.value,
                        annotations: text
                            .annotations
                            .into_iter()
                            .filter_map(|annotation| match annotation {
                                AnnotationObject::FilePath { text, file_path } => {
                                    Some(FileAnnotation {
                                        text,
                                        file_id: file_path.file_id,
                                    })
                                }
                                AnnotationObject::Other => None,
                            })
                            .collect(),
                    }),
                    MessageContent::Other => None,
                })
                .collect()
        }
        "thread.run.step.completed" => {
            let step: RunStepObject =
                serde_json::from_str(&frame.data).context("Failed to parse completed run step")?;
            match step.step_details {
                StepDetails::ToolCalls { tool_calls } => function_calls(tool_calls)
                    .into_iter()
                    .map(RunEvent::ToolCallDone)
                    .collect(),
                StepDetails::Other => Vec::new(),
            }
        }
        "thread.run.requires_action" => {
            let run: RunObject =
                serde_json::from_str(&frame.data).context("Failed to parse paused run")?;
            let tool_calls = run
                .required_action
                .and_then(|action| action.submit_tool_outputs)
                .map(|submit| function_calls(submit.tool_calls))
                .unwrap_or_default();
            vec![RunEvent::RequiresAction {
                run_id: run.id,
                tool_calls,
            }]
        }
        "thread.run.completed" => vec![RunEvent::Completed],
        "thread.run.failed"
        | "thread.run.expired"
        | "thread.run.cancelled"
        | "thread.run.incomplete" => {
            let run: RunObject =
                serde_json::from_str(&frame.data).context("Failed to parse finished run")?;
            let reason = match run.last_error {
                Some(err) if !err.message.is_empty() => format!("{}: {}", err.code, err.message),
                _ => format!("run {} ended with status {}", run.id, run.status),
            };
            vec![RunEvent::Failed(reason)]
        }
        "error" => vec![RunEvent::Failed(frame.data.clone())],
        "done" => vec![RunEvent::Done],
        other => {
            debug!("Skipping stream event {}", other);
            Vec::new()
        }
    };
    Ok(events)
}

/// Turn an open streaming response into run events.
///
/// The stream ends after the first error.
pub(super) fn run_event_stream(response: reqwest::Response) -> EventStream {
    Box::pin(stream! {
        let mut decoder = SseDecoder::default();
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(anyhow::Error::new(e).context("Failed to read event stream chunk"));
                    return;
                }
            };

            for frame in decoder.push(&chunk) {
                match parse_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            match parse_frame(&frame) {
                Ok(events) => {
                    for event in events {
                        yield Ok(event);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    })
}
