//! # Console Adapter
//!
//! Stands in for a platform client: events arrive as JSON lines on stdin and
//! outgoing actions are printed to stdout, one JSON object per line.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use serde::Serialize;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio_stream::wrappers::LinesStream;

use crate::domain::event::Event;
use crate::domain::traits::{ActionSink, EventSource};

type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Reads one JSON event per line; blank lines are ignored and malformed lines
/// are logged and skipped.
pub struct JsonLinesSource {
    events: EventStream,
}

impl JsonLinesSource {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let mut lines = LinesStream::new(tokio::io::AsyncBufReadExt::lines(reader));
        let events = async_stream::stream! {
            let mut line_no = 0usize;
            while let Some(line) = lines.next().await {
                line_no += 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!("Failed to read event stream: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(&line) {
                    Ok(event) => yield event,
                    Err(e) => tracing::warn!(line = line_no, "Skipping malformed event: {e}"),
                }
            }
        };
        Self {
            events: Box::pin(events),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl EventSource for JsonLinesSource {
    async fn next_event(&mut self) -> Option<Event> {
        self.events.next().await
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ActionRecord<'a> {
    Send {
        chat_id: i64,
        message_id: i64,
        text: &'a str,
    },
    Edit {
        chat_id: i64,
        message_id: i64,
        text: &'a str,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    SendFile {
        chat_id: i64,
        file_name: &'a str,
        bytes: usize,
        caption: Option<&'a str>,
    },
    Forward {
        to_chat: i64,
        from_chat: i64,
        message_ids: &'a [i64],
    },
}

/// Prints every action as a JSON line.
pub struct ConsoleSink {
    out: Mutex<Pin<Box<dyn AsyncWrite + Send>>>,
    next_id: AtomicI64,
}

impl ConsoleSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        Self {
            out: Mutex::new(Box::pin(writer)),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }

    async fn emit(&self, record: ActionRecord<'_>) -> Result<(), String> {
        let mut line = serde_json::to_string(&record).map_err(|e| e.to_string())?;
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        out.flush().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ActionSink for ConsoleSink {
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<i64, String> {
        let message_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.emit(ActionRecord::Send {
            chat_id,
            message_id,
            text: content,
        })
        .await?;
        Ok(message_id)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, content: &str) -> Result<(), String> {
        self.emit(ActionRecord::Edit {
            chat_id,
            message_id,
            text: content,
        })
        .await
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), String> {
        self.emit(ActionRecord::Delete {
            chat_id,
            message_id,
        })
        .await
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Bytes,
        caption: Option<&str>,
    ) -> Result<(), String> {
        self.emit(ActionRecord::SendFile {
            chat_id,
            file_name,
            bytes: data.len(),
            caption,
        })
        .await
    }

    async fn forward_messages(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_ids: &[i64],
    ) -> Result<(), String> {
        self.emit(ActionRecord::Forward {
            to_chat,
            from_chat,
            message_ids,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventKind;

    #[tokio::test]
    async fn test_source_skips_blank_and_malformed_lines() {
        let input = concat!(
            "{\"chat_id\": 1, \"message_id\": 2, \"sender_id\": 3, \"text\": \".ping\", \"outgoing\": true}\n",
            "\n",
            "not json\n",
            "{\"kind\": \"deleted\", \"chat_id\": 1, \"deleted_ids\": [4, 5]}\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()));

        let first = source.next_event().await.unwrap();
        assert_eq!(first.text, ".ping");
        assert!(first.outgoing);

        let second = source.next_event().await.unwrap();
        assert_eq!(second.kind, EventKind::Deleted);
        assert_eq!(second.deleted_ids, vec![4, 5]);

        assert!(source.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_sink_writes_json_lines() {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let sink = ConsoleSink::new(writer);

        let id = sink.send_message(7, "hi").await.unwrap();
        sink.delete_message(7, id).await.unwrap();
        drop(sink);

        let mut output = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut reader, &mut output)
            .await
            .unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines[0]["action"], "send");
        assert_eq!(lines[0]["text"], "hi");
        assert_eq!(lines[1]["action"], "delete");
        assert_eq!(lines[1]["message_id"], id);
    }
}
