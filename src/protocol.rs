//! JSON envelopes exchanged with the realtime endpoint.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

pub const AUDIO_DELTA: &str = "response.audio.delta";
pub const AUDIO_DONE: &str = "response.audio.done";
pub const TEXT: &str = "response.text";
pub const TEXT_DELTA: &str = "response.text.delta";
pub const TRANSCRIPT_DELTA: &str = "response.audio_transcript.delta";
pub const ERROR: &str = "error";

/// Outbound envelope, tagged by `type`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseOptions },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResponseOptions {
    pub modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ClientEvent {
    pub fn audio_append(pcm: &[u8]) -> Self {
        ClientEvent::InputAudioAppend {
            audio: BASE64.encode(pcm),
        }
    }

    /// Ask the endpoint to speak first, with optional instructions.
    pub fn response_create(instructions: Option<String>) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseOptions {
                modalities: vec!["audio".into(), "text".into()],
                instructions,
            },
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// 服务器消息结构体
#[derive(Deserialize, Debug)]
struct ServerMessage {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    delta: Option<String>, // 音频或文本增量
    text: Option<String>,
    error: Option<Value>,
}

/// Inbound envelope after demultiplexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Decoded PCM payload of `response.audio.delta`.
    AudioDelta(Vec<u8>),
    AudioDone,
    Text(String),
    Error(String),
    /// Any other kind; carried for logging only.
    Other(String),
}

impl ServerEvent {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let msg: ServerMessage = serde_json::from_str(text)?;
        let msg_type = msg.msg_type.ok_or(ProtocolError::MissingType)?;

        let event = match msg_type.as_str() {
            AUDIO_DELTA => {
                let delta = msg.delta.ok_or_else(|| ProtocolError::MissingField {
                    kind: msg_type.clone(),
                    field: "delta",
                })?;
                ServerEvent::AudioDelta(BASE64.decode(delta.as_bytes())?)
            }
            AUDIO_DONE => ServerEvent::AudioDone,
            TEXT => ServerEvent::Text(msg.text.unwrap_or_default()),
            TEXT_DELTA | TRANSCRIPT_DELTA => ServerEvent::Text(msg.delta.unwrap_or_default()),
            ERROR => ServerEvent::Error(error_message(msg.error.as_ref())),
            _ => ServerEvent::Other(msg_type),
        };
        Ok(event)
    }
}

fn error_message(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(s)) => s.clone(),
        Some(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| obj.to_string()),
        None => "unspecified error".to_string(),
    }
}
