pub mod client;
pub mod server;

use client::*;
use server::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend(InputAudioBufferAppendEvent),
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate(ConversationItemCreateEvent),
    #[serde(rename = "response.create")]
    ResponseCreate(ResponseCreateEvent),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "close")]
    Close { reason: Option<String> },
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(SpeechStartedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    ConversationItemInputAudioTranscriptionDelta(InputAudioTranscriptionDeltaEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    ConversationItemInputAudioTranscriptionCompleted(InputAudioTranscriptionCompletedEvent),
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    ConversationItemInputAudioTranscriptionFailed(InputAudioTranscriptionFailedEvent),
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta(ResponseAudioTranscriptDeltaEvent),
    #[serde(rename = "response.audio_transcript.done")]
    ResponseAudioTranscriptDone(ResponseAudioTranscriptDoneEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseDoneEvent),
    /// Any event type this crate does not model.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agent_transcript_delta() {
        let json = r#"{
            "type": "response.audio_transcript.delta",
            "event_id": "evt_1",
            "response_id": "resp_1",
            "item_id": "item_9",
            "output_index": 0,
            "content_index": 0,
            "delta": "Hel"
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ResponseAudioTranscriptDelta(event) => {
                assert_eq!(event.item_id(), "item_9");
                assert_eq!(event.delta(), "Hel");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_response_done_usage() {
        let json = r#"{
            "type": "response.done",
            "event_id": "evt_2",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "usage": {"total_tokens": 12, "input_tokens": 8, "output_tokens": 4}
            }
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ResponseDone(event) => {
                let usage = event.response().usage().unwrap();
                assert_eq!(usage.total_tokens, 12);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unmodelled_events_map_to_unknown() {
        let json = r#"{"type": "rate_limits.updated", "event_id": "evt_3", "rate_limits": []}"#;
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(json).unwrap(),
            ServerEvent::Unknown
        ));
    }

    #[test]
    fn quota_errors_are_recognised() {
        let json = r#"{
            "type": "error",
            "event_id": "evt_4",
            "error": {"type": "invalid_request_error", "code": "insufficient_quota", "message": "out of credits"}
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::Error(event) => assert!(event.error().is_quota_exhausted()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
