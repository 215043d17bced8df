use anyhow::Result;
use backdrop_generator::client::{BackdropClient, PromptSession, SessionState, DEFAULT_SERVER_URL};
use backdrop_generator::config::Config;
use backdrop_generator::server;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "backdrop-generator")]
#[command(about = "Generate AI virtual meeting backgrounds")]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the generation proxy (default).
    Serve,
    /// Ask a running proxy for a background and save it as a JPEG.
    Generate {
        /// Scene description.
        prompt: String,
        /// Base URL of the proxy.
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,
        /// Where to write the image.
        #[arg(short, long, default_value = "virtual-background.jpg")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backdrop_generator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server().await,
        Command::Generate {
            prompt,
            server,
            output,
        } => run_generate(&prompt, &server, output).await,
    }
}

async fn run_server() -> Result<()> {
    info!("Starting backdrop-generator");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run_generate(prompt: &str, server: &str, output: PathBuf) -> Result<()> {
    let client = BackdropClient::new(server);
    let mut session = PromptSession::new();

    if !session.can_submit(prompt) {
        error!("Prompt cannot be empty.");
        std::process::exit(2);
    }

    info!("Generating background for: {}", prompt.trim());

    session.submit(&client, prompt).await;

    match session.state().clone() {
        SessionState::Success { .. } => {
            session.save_jpeg(&output)?;
            Ok(())
        }
        SessionState::Failed { message } => {
            error!("Generation failed: {}", message);
            std::process::exit(1);
        }
        state => anyhow::bail!("Unexpected session state: {:?}", state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = CliArgs::try_parse_from(["backdrop-generator"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_generate() {
        let args = CliArgs::try_parse_from([
            "backdrop-generator",
            "generate",
            "a quiet library",
            "--output",
            "out.jpg",
        ])
        .unwrap();

        match args.command {
            Some(Command::Generate {
                prompt,
                server,
                output,
            }) => {
                assert_eq!(prompt, "a quiet library");
                assert_eq!(server, DEFAULT_SERVER_URL);
                assert_eq!(output, PathBuf::from("out.jpg"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
