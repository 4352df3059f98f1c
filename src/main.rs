use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voice_relay::{ApiServerBuilder, Config, Pipeline, SpeechToText, TextToSpeech, WebhookBackend};

/// Voice relay - speech in, conversational backend, speech out
#[derive(Parser)]
#[command(name = "voice-relay", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_relay=info",
        1 => "info,voice_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        port = config.server.port,
        stt = %config.stt.url,
        backend = %config.backend.url,
        tts = %config.tts.url,
        "starting voice relay"
    );

    let pipeline = Pipeline::new(
        Arc::new(SpeechToText::new(&config.stt)),
        Arc::new(WebhookBackend::new(&config.backend)),
        Arc::new(TextToSpeech::new(&config.tts)),
        config.pipeline_settings(),
    );

    let server = ApiServerBuilder::new(pipeline, config.server.port)
        .max_upload_bytes(config.server.max_upload_bytes)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
