//! Shared wire definitions for Chorus client-server communication.
//!
//! Everything travels as JSON over HTTP:
//! - Clients post command batches (`{"commands": [...]}`) to queue playback
//! - Clients read and edit per-voice properties
//! - Every failure comes back as `{"message": "..."}`

use serde::{Deserialize, Serialize};

/// Default listen address of the server
pub const DEFAULT_ADDR: &str = "127.0.0.1:7902";

/// HTTP routes served by the server
pub mod routes {
    pub const AUDIO_COMMAND: &str = "/v1/audio/command";
    pub const AUDIO_ENABLE: &str = "/v1/audio/enable";
    pub const AUDIO_DISABLE: &str = "/v1/audio/disable";
    pub const AUDIO_RESTART: &str = "/v1/audio/restart";
    pub const AUDIO_PAUSE: &str = "/v1/audio/pause";
    pub const VOICES: &str = "/v1/voices";
    pub const VOICE: &str = "/v1/voice";
    pub const VOICE_RATE: &str = "/v1/voice/rate";
    pub const VOICE_PITCH: &str = "/v1/voice/pitch";
    pub const VOICE_VOLUME: &str = "/v1/voice/volume";
    pub const VOICE_DEFAULT: &str = "/v1/voice/default";
}

/// Kind of a playback command, as tagged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum CommandKind {
    /// Play a preloaded sound effect by index
    PlaySound = 1,
    /// Pause the queue for a number of seconds
    Wait = 2,
    /// Speak plain text
    SpeakText = 3,
    /// Speak SSML markup
    SpeakSsml = 4,
}

impl CommandKind {
    /// Wire tag for this kind
    pub fn tag(self) -> i16 {
        self as i16
    }

    /// Look up a kind by its wire tag
    pub fn from_tag(tag: i64) -> Option<Self> {
        match tag {
            1 => Some(Self::PlaySound),
            2 => Some(Self::Wait),
            3 => Some(Self::SpeakText),
            4 => Some(Self::SpeakSsml),
            _ => None,
        }
    }
}

/// Payload of a command. Which variant is legal depends on the command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CommandValue {
    /// Numeric view of the payload, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CommandValue::Integer(i) => Some(*i as f64),
            CommandValue::Float(f) => Some(*f),
            CommandValue::Text(_) => None,
        }
    }

    /// Short name of the payload type, used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CommandValue::Integer(_) => "integer",
            CommandValue::Float(_) => "float",
            CommandValue::Text(_) => "string",
        }
    }
}

/// A single command as submitted by a client.
///
/// `kind` is kept as a raw integer so that unknown tags can be reported
/// instead of failing deserialization of the whole body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: i64,
    pub value: CommandValue,
}

impl Command {
    pub fn play_sound(index: i16) -> Self {
        Self {
            kind: CommandKind::PlaySound.tag().into(),
            value: CommandValue::Integer(index.into()),
        }
    }

    pub fn wait(seconds: f64) -> Self {
        Self {
            kind: CommandKind::Wait.tag().into(),
            value: CommandValue::Float(seconds),
        }
    }

    pub fn speak_text(text: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::SpeakText.tag().into(),
            value: CommandValue::Text(text.into()),
        }
    }

    pub fn speak_ssml(ssml: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::SpeakSsml.tag().into(),
            value: CommandValue::Text(ssml.into()),
        }
    }
}

/// Body of `POST /v1/audio/command`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandBatch {
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl CommandBatch {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

/// Properties of one installed voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProperty {
    pub id: String,
    pub display_name: String,
    pub language: String,
    pub speaking_rate: f64,
    pub audio_pitch: f64,
    pub audio_volume: f64,
}

/// Response of `GET /v1/voices`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCollection {
    /// Position of the engine's default voice in `voices`
    pub default_voice_index: i32,
    pub voices: Vec<VoiceProperty>,
}

/// Body of `POST /v1/voice`.
///
/// Absent fields are left untouched. Negative values are treated as absent
/// so older clients that send `-1` for "unchanged" keep working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaking_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_volume: Option<f64>,
}

impl VoiceUpdate {
    pub fn with_speaking_rate(mut self, rate: f64) -> Self {
        self.speaking_rate = Some(rate);
        self
    }

    pub fn with_audio_pitch(mut self, pitch: f64) -> Self {
        self.audio_pitch = Some(pitch);
        self
    }

    pub fn with_audio_volume(mut self, volume: f64) -> Self {
        self.audio_volume = Some(volume);
        self
    }
}

/// Empty success body (`{}`) of action endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

/// Error envelope shared by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
