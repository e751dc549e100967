use anyhow::{Context, Result};
use clap::Parser;
use mentor_core::{ConversationSession, Participants, StartError, SystemClock};
use mentor_service::audio;
use mentor_service::config::{Config, INPUT_CHUNK_SIZE};
use mentor_service::http_store::HttpHistoryStore;
use mentor_service::llm_types::audio::{PCM16_SAMPLE_RATE, TranscriptionModel, Voice};
use mentor_service::openai_adapter::{OpenAIAdapter, SessionSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::time::ChronoLocal;

/// How long to keep listening for the mentor's reply once the recording has been played.
const REPLY_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(version, about = "Runs one voice mentoring conversation from a recorded WAV file")]
struct Cli {
    /// Training module the conversation belongs to
    #[arg(long)]
    module_id: String,
    /// Name shown for the trainee in the transcript
    #[arg(long, default_value = "You")]
    user_name: String,
    /// Name shown for the AI mentor in the transcript
    #[arg(long, default_value = "Mentor")]
    mentor_name: String,
    /// System instructions for the mentor
    #[arg(long, default_value = "You are a friendly mentor. Keep answers short and ask one question at a time.")]
    instructions: String,
    /// 24 kHz mono 16-bit PCM WAV file used as microphone input
    #[arg(long)]
    audio: PathBuf,
    /// Optional text message sent once the conversation is connected
    #[arg(long)]
    opening: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting mentor service...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Load Input Audio ---
    let samples = audio::read_wav(&args.audio)?;
    tracing::info!(
        "Loaded {:.1}s of input audio from {}",
        samples.len() as f64 / f64::from(PCM16_SAMPLE_RATE),
        args.audio.display()
    );

    // --- 5. Wire the Session ---
    let store = Arc::new(HttpHistoryStore::new(
        &config.history_api_url,
        config.history_api_token.clone(),
    ));
    let adapter = OpenAIAdapter::new(
        config.openai_api_key.clone(),
        config.realtime_model.clone(),
        SessionSettings {
            instructions: args.instructions.clone(),
            voice: Voice::Alloy,
            transcription_model: TranscriptionModel::from(config.transcription_model.as_str()),
        },
    );
    let mut session = ConversationSession::new(
        adapter,
        store.clone(),
        store,
        SystemClock,
        Participants::new(args.user_name.clone(), args.mentor_name.clone()),
    )
    .with_save_interval(config.save_interval);

    let mut states = session.subscribe_state();
    let state_logger = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::info!("Connection is {}", state);
        }
    });

    // --- 6. Start the Conversation ---
    let (audio_rx, playback) = audio::stream_samples(samples, INPUT_CHUNK_SIZE);
    match session.start(&args.module_id, audio_rx).await {
        Ok(history_id) => tracing::info!("Recording conversation into history entry {}", history_id),
        Err(StartError::Connect(e)) if e.is_credits() => {
            tracing::error!("Not enough credits to start a conversation: {}", e);
            return Err(e).context("Insufficient credits");
        }
        Err(e) => return Err(e).context("Failed to start conversation"),
    }

    if let Some(opening) = &args.opening {
        if let Err(e) = session.send_message(opening).await {
            session.shutdown().await;
            return Err(e).context("Failed to send opening message");
        }
    }

    tokio::select! {
        result = playback => {
            if let Err(e) = result {
                tracing::error!("Audio playback task failed: {}", e);
            }
            tracing::info!("Input finished; waiting {:?} for the mentor's reply...", REPLY_GRACE_PERIOD);
            tokio::time::sleep(REPLY_GRACE_PERIOD).await;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }

    // --- 7. Wrap Up ---
    let outcome = session
        .finish()
        .await
        .context("Failed to store the final transcript")?;
    tracing::info!("Final transcript save: {:?}", outcome);
    state_logger.abort();

    println!("{}", session.transcript().formatted_text());
    Ok(())
}
