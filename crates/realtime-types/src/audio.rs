/// Base64 encoded little-endian PCM16 audio, as sent in `input_audio_buffer.append`.
pub type Base64EncodedAudioBytes = String;

/// The sample rate the realtime API expects for `pcm16` audio.
pub const PCM16_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(rename = "g711_ulaw")]
    G711ULaw,
    #[serde(rename = "g711_alaw")]
    G711ALaw,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

/// Model used for transcribing the user's input audio.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TranscriptionModel {
    #[serde(rename = "whisper-1")]
    Whisper,
    #[serde(rename = "gpt-4o-transcribe")]
    Gpt4oTranscribe,
    #[serde(rename = "gpt-4o-mini-transcribe")]
    Gpt4oMiniTranscribe,
    #[serde(untagged)]
    Other(String),
}

impl TranscriptionModel {
    pub fn as_str(&self) -> &str {
        match self {
            TranscriptionModel::Whisper => "whisper-1",
            TranscriptionModel::Gpt4oTranscribe => "gpt-4o-transcribe",
            TranscriptionModel::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
            TranscriptionModel::Other(name) => name,
        }
    }
}

impl From<&str> for TranscriptionModel {
    fn from(value: &str) -> Self {
        match value {
            "whisper-1" => TranscriptionModel::Whisper,
            "gpt-4o-transcribe" => TranscriptionModel::Gpt4oTranscribe,
            "gpt-4o-mini-transcribe" => TranscriptionModel::Gpt4oMiniTranscribe,
            other => TranscriptionModel::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioTranscription {
    /// The model to use for transcription, e.g. "whisper-1"
    model: TranscriptionModel,
}

impl InputAudioTranscription {
    pub fn new(model: TranscriptionModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &TranscriptionModel {
        &self.model
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad(ServerVadTurnDetection),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ServerVadTurnDetection {
    /// Activation threshold for VAD (0.0 to 1.0).
    threshold: f32,
    /// Amount of audio to include before speech starts (in milliseconds).
    prefix_padding_ms: u32,
    /// Duration of silence to detect speech stop (in milliseconds).
    silence_duration_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interrupt_response: Option<bool>,
}

impl Default for ServerVadTurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            create_response: None,
            interrupt_response: None,
        }
    }
}

impl ServerVadTurnDetection {
    pub fn with_silence_duration_ms(mut self, silence_duration_ms: u32) -> Self {
        self.silence_duration_ms = silence_duration_ms;
        self
    }

    pub fn with_create_response(mut self, create_response: bool) -> Self {
        self.create_response = Some(create_response);
        self
    }

    pub fn with_interrupt_response(mut self, interrupt_response: bool) -> Self {
        self.interrupt_response = Some(interrupt_response);
        self
    }
}
