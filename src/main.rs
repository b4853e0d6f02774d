use anyhow::{Context, Result, bail};
use clap::Parser;
use livecap::audio::activity::{ActivityDetector, RmsActivityDetector};
use livecap::audio::wav::WavAudioSource;
use livecap::backend::TranscriptionBackend;
use livecap::cli::{Cli, Command};
use livecap::config::Config;
use livecap::pipeline::orchestrator::{EngineConfig, SessionEngine};
use livecap::pipeline::sink::{ConsoleSink, MultiSink, SegmentSink};
use livecap::recording::TranscriptRecorder;
use livecap::session::{SessionConfig, SessionRegistry, SessionState};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match cli.command {
        Command::Run {
            input,
            chunk,
            vad,
            record,
            no_color,
        } => {
            let mut config = Config::load_or_default(&config_path)
                .with_context(|| format!("loading config from {}", config_path.display()))?
                .with_env_overrides();

            if let Some(chunk) = chunk {
                config.chunking.chunk_secs = chunk.as_secs_f64();
            }
            if vad {
                config.chunking.voice_gated = true;
            }

            run_session(&config, &input, record, no_color)
        }
        Command::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

fn run_session(
    config: &Config,
    input: &std::path::Path,
    record: Option<PathBuf>,
    no_color: bool,
) -> Result<()> {
    let backend = build_backend(config)?;

    let source = WavAudioSource::from_path(input)
        .with_context(|| format!("reading {}", input.display()))?;
    eprintln!(
        "livecap: transcribing {} ({:.1}s) via {}",
        input.display(),
        source.duration_secs(),
        backend.name()
    );

    let registry = SessionRegistry::new(SessionConfig {
        max_degraded_chunks: config.session.max_degraded_chunks,
    });
    let session = registry.create();

    let color = !no_color && std::io::stdout().is_terminal();
    let mut sinks: Vec<Box<dyn SegmentSink>> = vec![Box::new(ConsoleSink::new(color))];
    if let Some(dir) = record {
        sinks.push(Box::new(
            TranscriptRecorder::create(&dir, session.id())
                .with_context(|| format!("creating recorder in {}", dir.display()))?,
        ));
    }

    let detector: Option<Box<dyn ActivityDetector>> = config.chunking.voice_gated.then(|| {
        Box::new(RmsActivityDetector::new(config.audio.activity_threshold))
            as Box<dyn ActivityDetector>
    });

    let engine = SessionEngine::new(EngineConfig::from_config(config));
    let handle = engine.start(
        Box::new(source),
        backend,
        session.clone(),
        Box::new(MultiSink::new(sinks)),
        detector,
    )?;

    let snapshot = handle.wait();

    if snapshot.state == SessionState::Failed {
        match snapshot.failure {
            Some(failure) => bail!("session {}: {}", snapshot.id, failure),
            None => bail!("session {} failed", snapshot.id),
        }
    }
    Ok(())
}

#[cfg(feature = "http-backend")]
fn build_backend(config: &Config) -> Result<Arc<dyn TranscriptionBackend>> {
    use livecap::backend::HttpBackend;
    Ok(Arc::new(HttpBackend::new(&config.backend)?))
}

#[cfg(not(feature = "http-backend"))]
fn build_backend(_config: &Config) -> Result<Arc<dyn TranscriptionBackend>> {
    bail!("this build has no transcription backend (enable the http-backend feature)")
}
