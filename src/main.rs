//! parlo demo: a scripted interpreter session against mock collaborators.
//!
//! Emits a handful of recognized utterances whose synthesis completes out of
//! order, then prints the pipeline events as they arrive. Playback still
//! follows capture order, which is the point of the exercise.

use clap::Parser;
use owo_colors::OwoColorize;
use parlo::{
    EventKind, MockSpeechPlatform, NullAudioOutput, SessionConfig, SessionController, SessionEvent,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PHRASES: &[(&str, &str)] = &[
    ("Good morning", "Buenos dias"),
    ("How are you today", "Como estas hoy"),
    ("See you tomorrow", "Hasta manana"),
    ("Thank you very much", "Muchas gracias"),
    ("Where is the station", "Donde esta la estacion"),
];

#[derive(Parser, Debug)]
#[command(name = "parlo", version = Box::leak(parlo::version_string().into_boxed_str()) as &str, about = "Live speech-to-speech interpreter pipeline demo")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source language code (overrides config)
    #[arg(long)]
    source: Option<String>,

    /// Target language code (overrides config)
    #[arg(long)]
    target: Option<String>,

    /// Forced-segmentation interval, e.g. "250ms" (overrides config)
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Number of scripted utterances to run through the pipeline
    #[arg(long, default_value_t = 3)]
    utterances: usize,

    /// Print events as JSON lines instead of colored text
    #[arg(long)]
    json: bool,
}

fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::SessionStarted {
            source_language,
            target_language,
        } => format!(
            "{} {} -> {}",
            "session started".cyan(),
            source_language,
            target_language
        ),
        SessionEvent::SessionEnded => format!("{}", "session ended".cyan()),
        SessionEvent::SegmentCreated { segment } => format!(
            "{} #{} ({:?}) \"{}\"",
            "created  ".green(),
            segment.id,
            segment.timestamp,
            segment.original_text.as_deref().unwrap_or("")
        ),
        SessionEvent::SegmentUpdated { segment } => format!(
            "{} #{} {:?}",
            "updated  ".yellow(),
            segment.id,
            segment.status
        ),
        SessionEvent::SegmentCompleted { segment } => format!(
            "{} #{} \"{}\"",
            "completed".green().bold(),
            segment.id,
            segment.translated_text.as_deref().unwrap_or("")
        ),
        SessionEvent::SegmentError { segment, error } => {
            format!("{} #{} {}", "error    ".red().bold(), segment.id, error)
        }
        SessionEvent::SimultaneousCaptureChanged { enabled } => {
            format!("{} {}", "capture-while-speaking".cyan(), enabled)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let count = args.utterances.clamp(1, PHRASES.len());

    let mut config = match &args.config {
        Some(path) => SessionConfig::load_or_default(path),
        None => SessionConfig::default(),
    };
    if let Some(source) = &args.source {
        config.languages.source = source.clone();
    }
    if let Some(target) = &args.target {
        config.languages.target = target.clone();
    }
    if let Some(interval) = args.interval {
        config.segmentation.interval_ms = interval.as_millis() as u64;
    }
    if config.platform.api_key.is_none() {
        // The mock platform never checks the key; session start still does.
        config.platform.api_key = Some("demo".to_string());
    }

    // Later utterances synthesize faster, so completion order is reversed
    // and the scheduler has to restore capture order.
    let mut platform = MockSpeechPlatform::new();
    for (i, (_, translated)) in PHRASES.iter().take(count).enumerate() {
        let delay = Duration::from_millis(40 * (count - i) as u64);
        platform = platform.with_synthesis_delay_for(translated, delay);
    }
    let platform = Arc::new(platform);
    let audio = Arc::new(NullAudioOutput::new().with_rate(1));

    let controller = SessionController::new(config, platform.clone(), audio);
    let bus = controller.bus();

    let json = args.json;
    let finished = Arc::new(AtomicUsize::new(0));
    for kind in EventKind::ALL {
        let finished = finished.clone();
        bus.subscribe(kind, move |event| {
            if json {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("parlo: failed to encode event: {e}"),
                }
            } else {
                println!("{}", render(event));
            }
            if matches!(
                event,
                SessionEvent::SegmentCompleted { .. } | SessionEvent::SegmentError { .. }
            ) {
                finished.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    controller.start().await?;
    for (original, translated) in PHRASES.iter().take(count) {
        platform.emit_recognized(original, translated).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while finished.load(Ordering::SeqCst) < count {
        if tokio::time::Instant::now() >= deadline {
            eprintln!("parlo: timed out waiting for playback to finish");
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    controller.stop().await?;
    controller.dispose().await;
    Ok(())
}
