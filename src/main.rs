use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use narration_engine::logging;
use narration_engine::narration::config::load_config;
use narration_engine::narration::transport::{format_clock, TransportInput, TransportView};
use narration_engine::narration::{
    ContentLanguage, FileStore, NarrationConfig, NarrationSession, NarrationSource, PlaybackRate,
    PlaybackSnapshot, PlaybackStatus, SimulatedSpeechEngine, SpeechEngine, VoiceProfile,
};

/// Narrate a text or HTML file, resuming where the last run stopped
#[derive(Parser)]
#[command(name = "narrate", version, about)]
struct Cli {
    /// File to narrate
    file: PathBuf,

    /// Key for stored preferences; defaults to the file name
    #[arg(long)]
    content_id: Option<String>,

    /// Treat the input as HTML (implied by a .html/.htm extension)
    #[arg(long)]
    html: bool,

    /// Playback rate: 0.75, 1, 1.25 or 1.5
    #[arg(short, long)]
    rate: Option<f64>,

    /// JSON config file
    #[arg(short, long, env = "NARRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Start at this position instead of the stored one
    #[arg(long)]
    from_ms: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "info,narration_engine=debug",
        _ => "trace",
    };
    logging::init(filter);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path),
        None => NarrationConfig::default(),
    };

    let raw = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let content_id = match cli.content_id.clone() {
        Some(id) => id,
        None => cli
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("input path has no file name")?,
    };
    let is_html = cli.html
        || cli
            .file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
    let source = if is_html {
        NarrationSource::from_html(content_id, &raw)
    } else {
        NarrationSource::from_text(content_id, raw)
    };
    if source.is_empty() {
        println!("Nothing to narrate in {}", cli.file.display());
        return Ok(());
    }

    let rate = cli
        .rate
        .map(|value| {
            PlaybackRate::from_multiplier(value)
                .with_context(|| format!("unsupported rate {value}; use 0.75, 1, 1.25 or 1.5"))
        })
        .transpose()?;

    let storage_dir = config
        .storage_dir
        .clone()
        .unwrap_or_else(FileStore::default_dir);
    let store = Arc::new(FileStore::new(storage_dir));
    let engine = Arc::new(
        SimulatedSpeechEngine::default().with_words_per_minute(config.words_per_minute),
    );
    let voices = engine.voices();
    let language = source.language;

    let session = NarrationSession::mount(source, engine, store, &config).await;
    if let Some(rate) = rate {
        session.set_rate(rate)?;
    }
    session.play(cli.from_ms)?;

    let mut updates = session.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut started = false;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_progress(&snapshot, language, &voices, config.max_voice_options);
                match snapshot.status {
                    PlaybackStatus::Playing => started = true,
                    PlaybackStatus::Idle if started => break,
                    _ => {}
                }
            }
            _ = &mut ctrl_c => {
                session.pause()?;
                let snapshot = session.current().await?;
                println!();
                println!(
                    "Paused at {}; run again to resume.",
                    format_clock(snapshot.position.position_ms)
                );
                break;
            }
        }
    }

    session.unmount().await;
    Ok(())
}

fn print_progress(
    snapshot: &PlaybackSnapshot,
    language: ContentLanguage,
    voices: &[VoiceProfile],
    max_voice_options: usize,
) {
    let view = TransportView::render(&TransportInput {
        snapshot,
        text_is_empty: false,
        language,
        voices,
        max_voice_options,
    });
    match view {
        TransportView::Hidden => {}
        TransportView::Unsupported { message } => println!("{message}"),
        TransportView::Controls(controls) => {
            let rate = controls
                .rates
                .iter()
                .find(|option| option.selected)
                .map(|option| option.label)
                .unwrap_or("1x");
            println!(
                "[{}] {} / {}  chunk {}/{}  {}",
                controls.toggle.label,
                controls.progress.elapsed_label,
                controls.progress.total_label,
                snapshot.current_chunk_index + 1,
                snapshot.chunk_count,
                rate,
            );
        }
    }
}
