//! Manual smoke-test CLI for the protocol translation core. NOT an
//! HTTP front-end — routing, auth, and endpoint selection remain
//! external collaborators (see SPEC_FULL.md §2). This binary exists so
//! a developer can exercise an adapter or transducer against a JSON or
//! SSE fixture file without standing up a server.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use futures::stream;
use llm_proxy_core::adapters::{
    AnthropicMessagesAdapter, ChatCompletionsAdapter, FormatAdapter, GeminiAdapter, ResponsesAdapter,
};
use llm_proxy_core::logging::default_logger;
use llm_proxy_core::transducer::{
    anthropic_to_cc::AnthropicToChatCompletions, cc_to_anthropic::ChatCompletionsToAnthropic,
    cc_to_responses::ChatCompletionsToResponses, gemini_to_anthropic::GeminiToAnthropic,
    gemini_to_cc::GeminiToChatCompletions, responses_to_cc::ResponsesToChatCompletions, drive, Transducer,
};

#[derive(Parser)]
#[command(name = "llm-proxy-core")]
#[command(author, version, about = "Protocol translation core smoke-test CLI", long_about = None)]
struct Cli {
    /// Enable verbose diagnostics via the log facade
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Family {
    ChatCompletions,
    Responses,
    Anthropic,
    Gemini,
}

#[derive(Clone, Copy, ValueEnum)]
enum BodyKind {
    Request,
    Response,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a non-streaming request or response body between two families
    Convert {
        #[arg(long)]
        from: Family,
        #[arg(long)]
        to: Family,
        #[arg(long, value_enum)]
        kind: BodyKind,
        /// Path to the input JSON file
        #[arg(short, long)]
        input: PathBuf,
        /// Path to write the converted JSON; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert an SSE stream fixture between two families
    ConvertStream {
        #[arg(long)]
        from: Family,
        #[arg(long)]
        to: Family,
        /// Path to the input SSE fixture file
        #[arg(short, long)]
        input: PathBuf,
        /// Path to write the converted SSE stream; stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn adapter_for(family: Family) -> Box<dyn FormatAdapter> {
    let logger = Some(default_logger());
    match family {
        Family::ChatCompletions => Box::new(ChatCompletionsAdapter::new(logger)),
        Family::Responses => Box::new(ResponsesAdapter::new(logger)),
        Family::Anthropic => Box::new(AnthropicMessagesAdapter::new(logger)),
        Family::Gemini => Box::new(GeminiAdapter::new(logger)),
    }
}

fn transducer_for(from: Family, to: Family) -> Option<Box<dyn Transducer>> {
    match (from, to) {
        (Family::ChatCompletions, Family::Responses) => Some(Box::new(ChatCompletionsToResponses::new())),
        (Family::ChatCompletions, Family::Anthropic) => Some(Box::new(ChatCompletionsToAnthropic::new())),
        (Family::Anthropic, Family::ChatCompletions) => Some(Box::new(AnthropicToChatCompletions::new())),
        (Family::Responses, Family::ChatCompletions) => Some(Box::new(ResponsesToChatCompletions::new())),
        (Family::Gemini, Family::ChatCompletions) => Some(Box::new(GeminiToChatCompletions::new())),
        (Family::Gemini, Family::Anthropic) => Some(Box::new(GeminiToAnthropic::new())),
        _ => None,
    }
}

async fn write_output(output: &Option<PathBuf>, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    match output {
        Some(path) => tokio::fs::write(path, bytes).await,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bytes).await?;
            stdout.flush().await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.verbose {
        let _ = simplelog::TermLogger::init(
            log::LevelFilter::Debug,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Auto,
        );
    }

    match cli.command {
        Commands::Convert { from, to, kind, input, output } => {
            let bytes = match fs::read(&input) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("failed to read {}: {e}", input.display());
                    std::process::exit(1);
                }
            };
            let source = adapter_for(from);
            let target = adapter_for(to);
            let result = match kind {
                BodyKind::Request => source
                    .parse_request(&bytes)
                    .and_then(|req| target.build_request(&req)),
                BodyKind::Response => source
                    .parse_response(&bytes)
                    .and_then(|resp| target.build_response(&resp)),
            };
            match result {
                Ok(converted) => {
                    if let Err(e) = write_output(&output, &converted).await {
                        eprintln!("failed to write output: {e}");
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("conversion failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::ConvertStream { from, to, input, output } => {
            let Some(mut transducer) = transducer_for(from, to) else {
                eprintln!("no transducer registered for this family pair");
                std::process::exit(1);
            };
            let bytes = match fs::read(&input) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("failed to read {}: {e}", input.display());
                    std::process::exit(1);
                }
            };
            let logger: Arc<dyn llm_proxy_core::logging::Logger> = default_logger();
            let input_stream = stream::once(async move { Ok(bytes::Bytes::from(bytes)) });

            let mut out_buf: Vec<u8> = Vec::new();
            if let Err(e) = drive(input_stream, transducer.as_mut(), &mut out_buf, Some(logger.as_ref())).await {
                eprintln!("stream conversion failed: {e}");
                std::process::exit(1);
            }
            if let Err(e) = write_output(&output, &out_buf).await {
                eprintln!("failed to write output: {e}");
                std::process::exit(1);
            }
        }
    }
}
