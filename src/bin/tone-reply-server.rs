use argh::FromArgs;
use std::{process::ExitCode, sync::Arc};
use tone_reply::{GeminiClient, GeminiConfig, ReplyEngine, ReplyPipeline, config::API_KEY_VAR, shell};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Serves a page that turns conversation screenshots into replies.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

// the blocking Gemini client is built before any tokio runtime exists
fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: ServerArgs = argh::from_env();

    let config = match GeminiConfig::load(&std::env::current_dir()?) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            log::error!("Please set your Gemini API key: export {API_KEY_VAR}=... or add it to .env");
            return Ok(ExitCode::FAILURE);
        }
    };

    let client = GeminiClient::new(&config);
    log::info!("Using endpoint {}", client.endpoint());
    let engine = Arc::new(ReplyEngine::new(ReplyPipeline::new(client)));

    let app = shell::router(engine);

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    log::info!("Starting the server");
    log::info!("Listening on: {addr}");
    log::info!("Press Ctrl+C to stop the server");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await
    })?;

    Ok(ExitCode::SUCCESS)
}
