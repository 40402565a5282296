//! On-task annotation CLI.
//!
//! Usage: `ontask [INPUT]`. Without an argument the input comes from
//! `ONTASK_INPUT` (default `P7.mp4`).

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ontask_gemini::GeminiClient;
use ontask_media::{check_ffmpeg, check_ffprobe, EncodeSettings, FfmpegTransformer};
use ontask_worker::{Pipeline, PipelineConfig, TokioClock};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["ontask=info", "ontask_worker=info", "ontask_media=info", "ontask_gemini=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn fail(message: String) -> ! {
    error!("{}", message);
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    // Another component may already have installed a provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = PipelineConfig::from_env();
    if let Some(arg) = std::env::args().nth(1) {
        config.input_path = PathBuf::from(arg);
    }
    info!("Pipeline config: {:?}", config);

    if let Err(e) = config.validate().and_then(|_| config.check_input()) {
        fail(e.to_string());
    }

    if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
        fail(e.to_string());
    }

    let client = match GeminiClient::from_env() {
        Ok(client) => client,
        Err(e) => fail(format!("Failed to create inference client: {}", e)),
    };

    let transformer = FfmpegTransformer::new(EncodeSettings {
        crf: config.crf,
        timeout_secs: config.ffmpeg_timeout_secs,
        ..Default::default()
    });

    let input = config.input_path.clone();
    let pipeline = Pipeline::new(config, Arc::new(transformer), Arc::new(client), Arc::new(TokioClock));

    match pipeline.run(&input).await {
        Ok(summary) => {
            println!();
            println!("{}", "=".repeat(50));
            println!("SUCCESS! Processed {} chunks.", summary.chunks_processed);
            if summary.chunks_skipped > 0 {
                println!("Skipped {} segments that produced no usable video.", summary.chunks_skipped);
            }
            if !summary.failed_chunks.is_empty() {
                println!(
                    "{} chunks contributed no annotations (see log).",
                    summary.failed_chunks.len()
                );
            }
            println!("Intervals: {}", summary.annotations);
            println!("Results saved to: {}", summary.output_path.display());
            println!("{}", "=".repeat(50));
        }
        Err(e) => fail(e.to_string()),
    }
}
