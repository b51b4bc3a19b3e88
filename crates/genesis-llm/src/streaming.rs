use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;

use crate::error::CapabilityError;
use crate::traits::TokenStream;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn is_done(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .is_some()
    }
}

/// Parse an OpenAI-style server-sent event byte stream into text fragments
///
/// Lines are buffered across chunk boundaries; only `data: ` lines are read and
/// `data: [DONE]` ends the stream. Malformed payloads and transport errors are
/// surfaced as items so the consumer decides whether to stop.
pub fn parse_chat_sse_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer: VecDeque<u8> = VecDeque::with_capacity(8192);

        'outer: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes.as_ref());

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        let Ok(line_str) = std::str::from_utf8(&line_bytes) else {
                            yield Err(CapabilityError::Stream("invalid UTF-8 in event stream".to_string()));
                            continue;
                        };
                        let line = line_str.trim();

                        if line.is_empty() {
                            continue;
                        }

                        if let Some(data) = line.strip_prefix("data:") {
                            let data = data.trim_start();
                            if data == "[DONE]" {
                                break 'outer;
                            }

                            match serde_json::from_str::<ChatStreamChunk>(data) {
                                Ok(chunk) => {
                                    if let Some(content) = chunk.content() {
                                        yield Ok(content.to_string());
                                    }
                                }
                                Err(e) => {
                                    yield Err(CapabilityError::InvalidResponse(format!(
                                        "Failed to parse chat chunk: {}",
                                        e
                                    )));
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(CapabilityError::Stream(e.to_string()));
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> String {
        format!(
            "data: {{\"id\":\"c1\",\"model\":\"m\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}},\"finish_reason\":null}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    #[tokio::test]
    async fn test_tokens_split_across_chunks() {
        let raw = format!("{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo"));
        let (a, b) = raw.split_at(17);
        let source = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(a.as_bytes().to_vec()),
            Ok(b.as_bytes().to_vec()),
        ]);

        let tokens: Vec<String> = parse_chat_sse_stream(source)
            .map(|t| t.unwrap())
            .collect()
            .await;

        assert_eq!(tokens, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn test_done_marker_stops_stream() {
        let raw = format!("{}data: [DONE]\n\n{}", chunk("a"), chunk("ignored"));
        let source = futures::stream::iter(vec![Ok::<_, std::io::Error>(raw.into_bytes())]);

        let tokens: Vec<String> = parse_chat_sse_stream(source)
            .map(|t| t.unwrap())
            .collect()
            .await;

        assert_eq!(tokens, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let source = futures::stream::iter(vec![
            Ok(chunk("partial").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let items: Vec<_> = parse_chat_sse_stream(source).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(CapabilityError::Stream(_))));
    }
}
