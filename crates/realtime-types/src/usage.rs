use std::ops::AddAssign;

/// Token usage reported on `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub input_token_details: InputTokenDetails,
    #[serde(default)]
    pub output_token_details: OutputTokenDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputTokenDetails {
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub text_tokens: u64,
    #[serde(default)]
    pub audio_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OutputTokenDetails {
    #[serde(default)]
    pub text_tokens: u64,
    #[serde(default)]
    pub audio_tokens: u64,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl AddAssign<&Usage> for Usage {
    fn add_assign(&mut self, rhs: &Usage) {
        self.total_tokens += rhs.total_tokens;
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.input_token_details.cached_tokens += rhs.input_token_details.cached_tokens;
        self.input_token_details.text_tokens += rhs.input_token_details.text_tokens;
        self.input_token_details.audio_tokens += rhs.input_token_details.audio_tokens;
        self.output_token_details.text_tokens += rhs.output_token_details.text_tokens;
        self.output_token_details.audio_tokens += rhs.output_token_details.audio_tokens;
    }
}

/// Usage reported on `conversation.item.input_audio_transcription.completed`.
///
/// Token-billed models fill in the token counts, duration-billed ones only `seconds`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub seconds: f64,
}

impl TranscriptionUsage {
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0 && self.seconds == 0.0
    }
}

impl AddAssign<&TranscriptionUsage> for TranscriptionUsage {
    fn add_assign(&mut self, rhs: &TranscriptionUsage) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.total_tokens += rhs.total_tokens;
        self.seconds += rhs.seconds;
    }
}
