// scribe-relay CLI: transcribe one or more media files through the pipeline.

use clap::Parser;
use scribe_relay::{
    FileStateStore, HttpCredentialBroker, HttpProviderClient, MediaFile, PipelineConfig,
    TranscribeError, TranscriptionPipeline,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "scribe-relay", about = "Upload media files and fetch their transcripts")]
struct Cli {
    /// Media files to transcribe, processed strictly in order
    files: Vec<PathBuf>,

    /// Check for an interrupted job from a previous run and finish it first
    #[arg(long)]
    resume: bool,

    /// Where job progress is persisted across restarts
    #[arg(long, default_value = "scribe-relay-state.json")]
    state_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, TranscribeError> {
    let config = PipelineConfig::from_env();

    let broker = Arc::new(HttpCredentialBroker::new(&config.broker_base_url)?);
    let client = Arc::new(HttpProviderClient::new(
        &config.provider_base_url,
        &config.provider_api_key,
    )?);
    let store = Arc::new(FileStateStore::new(cli.state_file.clone()));

    let mut pipeline = TranscriptionPipeline::new(config, broker, client, store).with_observer(
        Box::new(|update| {
            tracing::info!(
                "{}: {:?} {}%{}",
                update.file_name,
                update.status,
                update.progress_percent,
                update
                    .eta_seconds
                    .map(|eta| format!(" (~{}s left)", eta))
                    .unwrap_or_default()
            );
        }),
    );

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current operation");
            cancel.cancel();
        }
    });

    if cli.resume {
        if let Some(done) = pipeline.resume().await? {
            println!(
                "Resumed job {} finished ({:.1}s of audio):\n{}",
                done.job_id.as_deref().unwrap_or("<unknown>"),
                done.duration_secs,
                done.text
            );
        }
    }

    if cli.files.is_empty() {
        return Ok(true);
    }

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        files.push(load_media(path)?);
    }

    let mut scheduler = scribe_relay::BatchScheduler::new();
    let summary = scheduler.run(&mut pipeline, files).await;

    for outcome in &summary.outcomes {
        match (&outcome.result, &outcome.error) {
            (Some(done), _) => {
                println!(
                    "=== {} ({:?} route, {} chunk(s), {:.1}s) ===\n{}\n",
                    outcome.file_name, done.provider, done.chunk_count, done.duration_secs, done.text
                );
            }
            (None, Some(e)) => eprintln!("{}: failed: {}", outcome.file_name, e),
            (None, None) => {}
        }
    }

    println!(
        "{} succeeded, {} failed",
        summary.success_count(),
        summary.failure_count()
    );
    Ok(summary.failure_count() == 0)
}

fn load_media(path: &Path) -> Result<MediaFile, TranscribeError> {
    let bytes = fs::read(path)
        .map_err(|e| TranscribeError::Validation(format!("Cannot read {}: {}", path.display(), e)))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TranscribeError::Validation(format!("Invalid file name: {}", path.display()))
        })?
        .to_string();

    Ok(MediaFile {
        mime_type: mime_for(&name).to_string(),
        name,
        bytes,
    })
}

fn mime_for(name: &str) -> &'static str {
    match name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}
