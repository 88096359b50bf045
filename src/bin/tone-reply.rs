use argh::FromArgs;
use reqwest::blocking::{Client, multipart};
use std::{path::PathBuf, process::ExitCode};
use tone_reply::{
    GeminiClient, GeminiConfig, ImageAsset, ReplyPipeline, ReplyRequest, config::API_KEY_VAR,
};

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Generate a reply to a conversation screenshot
struct ClientArgs {
    /// the host of a running tone-reply-server
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port of a running tone-reply-server
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "reply", "submit" or "results"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Reply(ReplyCommand),
    Submit(SubmitCommand),
    Results(ResultsCommand),
}

#[derive(FromArgs)]
/// Call Gemini directly and print the reply
#[argh(subcommand, name = "reply")]
struct ReplyCommand {
    /// the path to the screenshot
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the tone of the reply
    #[argh(option, short = 't', default = "String::from(\"casual\")")]
    tone: String,
}

#[derive(FromArgs)]
/// Upload a screenshot to the server
#[argh(subcommand, name = "submit")]
struct SubmitCommand {
    /// the path to the screenshot
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the tone of the reply
    #[argh(option, short = 't', default = "String::from(\"casual\")")]
    tone: String,
}

#[derive(FromArgs)]
/// Check for a finished reply on the server
#[argh(subcommand, name = "results")]
struct ResultsCommand {}

fn reply(command: ReplyCommand) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = match GeminiConfig::load(&std::env::current_dir()?) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            eprintln!("Please set your Gemini API key: export {API_KEY_VAR}=... or add it to .env");
            return Ok(ExitCode::FAILURE);
        }
    };

    let tone = command.tone.trim();
    if tone.is_empty() {
        eprintln!("Please provide a tone");
        return Ok(ExitCode::FAILURE);
    }

    let pipeline = ReplyPipeline::new(GeminiClient::new(&config));
    let outcome = ImageAsset::from_path(&command.image_path).and_then(|image| {
        pipeline.generate(&ReplyRequest {
            image,
            tone: tone.to_string(),
        })
    });

    match outcome {
        Ok(reply) => {
            println!("{reply}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: ClientArgs = argh::from_env();

    let client = Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Reply(reply_command) => return reply(reply_command),
        ClientCommands::Submit(submit_command) => {
            let form = multipart::Form::new()
                .text("tone", submit_command.tone)
                .file("image", &submit_command.image_path)?;

            let response = client
                .post(format!("http://{addr}/reply"))
                .multipart(form)
                .send()?;

            let result = response.json::<serde_json::Value>()?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
        ClientCommands::Results(_) => {
            let response = client.get(format!("http://{addr}/results")).send()?;

            let result = response.json::<serde_json::Value>()?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
