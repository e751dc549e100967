use mentor_realtime_types::{TranscriptionUsage, Usage};

/// Running usage totals for one connection.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    usage: Usage,
    transcription_usage: TranscriptionUsage,
    transcription_model: Option<String>,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_usage(&mut self, usage: &Usage) {
        self.usage += usage;
    }

    pub(crate) fn update_transcription_usage(&mut self, usage: &TranscriptionUsage) {
        self.transcription_usage += usage;
    }

    pub(crate) fn set_transcription_model(&mut self, model: &str) {
        self.transcription_model = Some(model.to_string());
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub fn transcription_usage(&self) -> &TranscriptionUsage {
        &self.transcription_usage
    }

    pub fn transcription_model(&self) -> Option<&str> {
        self.transcription_model.as_deref()
    }
}
