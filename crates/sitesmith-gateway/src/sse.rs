//! Incremental decoder for the provider's server-sent event feed
use serde::Deserialize;

/// Splits a byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line is available, so a multi-byte
/// character split across two network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every payload completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(&['\r', '\n'][..]);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload.to_string())
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    /// Folds a later usage report into this one. Streams report input
    /// counts at start and output counts at the end.
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.max(other.input_tokens);
        self.cache_read_input_tokens = self.cache_read_input_tokens.max(other.cache_read_input_tokens);
        self.cache_creation_input_tokens =
            self.cache_creation_input_tokens.max(other.cache_creation_input_tokens);
        self.output_tokens = self.output_tokens.max(other.output_tokens);
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum StreamEvent {
    MessageStart {
        message: StartMessage,
    },
    ContentBlockDelta {
        delta: Delta,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<Usage>,
    },
    Error {
        error: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartMessage {
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_across_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: content_block_delta\ndata: {\"a\"").is_empty());
        let out = decoder.push(b":1}\n\ndata: {\"b\":2}\n");
        assert_eq!(out, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let bytes = "data: {\"text\":\"caf\u{e9}\"}\n".as_bytes();
        let split = bytes.len() - 4;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let out = decoder.push(&bytes[split..]);
        assert_eq!(out, vec!["{\"text\":\"caf\u{e9}\"}".to_string()]);
    }

    #[test]
    fn test_done_marker_and_crlf() {
        let mut decoder = SseDecoder::new();
        let out = decoder.push(b"data: {\"x\":1}\r\ndata: [DONE]\r\n");
        assert_eq!(out, vec!["{\"x\":1}".to_string()]);
        assert!(decoder.push(b"data: {\"tail\":true}").is_empty());
        assert_eq!(decoder.finish(), vec!["{\"tail\":true}".to_string()]);
    }

    #[test]
    fn test_event_shapes() {
        let delta: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(delta, StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { ref text } } if text == "Hi"));

        let ping: StreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, StreamEvent::Other));
    }

    #[test]
    fn test_usage_merge() {
        let mut usage = Usage { input_tokens: 1200, cache_read_input_tokens: 800, ..Usage::default() };
        usage.merge(&Usage { output_tokens: 3000, ..Usage::default() });
        assert_eq!(usage.input_tokens, 1200);
        assert_eq!(usage.output_tokens, 3000);
    }
}
