mod application;
mod config;
mod domain;
mod infrastructure;
mod text;

pub use application::generator;
pub use domain::types;
pub use infrastructure::{model, server};

use clap::{Parser, ValueEnum};
use config::AppConfig;
use generator::{Generator, GeneratorConfig, ProgressSink};
use model::OllamaClient;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use types::SummaryLength;

#[derive(Parser, Debug)]
#[command(
    name = "briefgen",
    version,
    about = "Summary and FAQ generation backed by a local model server"
)]
struct Cli {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_enum, default_value_t = RunMode::Summarize)]
    mode: RunMode,
    #[arg(long, value_enum, default_value_t = SummaryLength::Medium)]
    length: SummaryLength,
    #[arg(long, default_value_t = 5)]
    questions: usize,
    #[arg(long)]
    stream: bool,
    #[arg(long)]
    text_file: Option<String>,
    #[arg(long, default_value = "127.0.0.1:8080")]
    rest_addr: SocketAddr,
    text: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RunMode {
    Summarize,
    Faq,
    Rest,
}

/// Progress reporting for the single-shot CLI modes.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn begin_step(&self, current: usize, total: usize) {
        info!(current, total, "Processing section");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting briefgen");
    let cli = Cli::parse();
    debug!(?cli.mode, config = ?cli.config, model = ?cli.model, "CLI arguments parsed");

    let config_path = cli.config.as_deref().map(Path::new);
    let mut file_config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration using default path or defaults");
    }
    apply_cli_overrides(&cli, &mut file_config);

    debug!(server_url = %file_config.server_url, "Creating model server client");
    let client = OllamaClient::new(file_config.server_url.clone(), file_config.timeout_secs);
    let generator_config = GeneratorConfig::new(file_config.model.clone())
        .with_limits(
            file_config.faq_single_call_limit,
            file_config.faq_chunk_size,
            file_config.max_output_chars,
        )
        .with_streaming(cli.stream);
    let generator = Arc::new(Generator::new(client, generator_config));

    info!(mode = ?cli.mode, "Running in selected mode");
    match cli.mode {
        RunMode::Summarize => {
            let text = load_text(&cli)?;
            let result = generator
                .summarize(&text, cli.length, None, Some(&LogProgress))
                .await;
            emit_result(result)?;
        }
        RunMode::Faq => {
            let text = load_text(&cli)?;
            let result = generator
                .generate_faq(&text, cli.questions, None, Some(&LogProgress))
                .await;
            emit_result(result)?;
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(generator, cli.rest_addr).await?;
        }
    }
    info!("Execution finished");
    Ok(())
}

fn emit_result(result: Result<String, model::ModelError>) -> Result<(), Box<dyn Error>> {
    match result {
        Ok(content) => {
            let output = json!({ "content": content });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(error) => {
            eprintln!("{}", error.user_message());
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(url) = &cli.server_url {
        info!(url = %url, "Overriding server URL from CLI flag");
        config.server_url = url.clone();
    }
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
}

fn load_text(cli: &Cli) -> Result<String, Box<dyn Error>> {
    if let Some(path) = &cli.text_file {
        info!(path = %path, "Loading input text from file");
        let content = fs::read_to_string(path)?;
        return Ok(normalize_text(content));
    }

    if !cli.text.is_empty() {
        info!("Using input text provided through CLI arguments");
        let joined = cli.text.join(" ");
        return Ok(normalize_text(joined));
    }

    if atty::isnt(atty::Stream::Stdin) {
        info!("Reading input text from standard input");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(normalize_text(buffer));
    }

    warn!("Input text not provided via arguments, file, or stdin");
    Err("input text required via arguments, file, or stdin".into())
}

fn normalize_text(text: String) -> String {
    text.trim().to_string()
}
