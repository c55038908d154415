//! One-shot CLI: `finbrief [--session ID] [--intent NAME] <message...>`

use finbrief::{
    agent::Orchestrator, config::Settings, models::Intent, state::build_checkpoint_store,
    state::TurnRequest, tools::create_default_collaborators,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct CliArgs {
    session_id: String,
    force_intent: Option<Intent>,
    message: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut session_id = "cli".to_string();
    let mut force_intent = None;
    let mut words = Vec::new();

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--session" => {
                session_id = args.next().ok_or("--session needs a value")?;
            }
            "--intent" => {
                let raw = args.next().ok_or("--intent needs a value")?;
                let intent: Intent = serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
                    .map_err(|_| format!("unknown intent {:?}", raw))?;
                force_intent = Some(intent);
            }
            _ => words.push(arg),
        }
    }

    if words.is_empty() {
        return Err("usage: finbrief [--session ID] [--intent NAME] <message...>".to_string());
    }

    Ok(CliArgs {
        session_id,
        force_intent,
        message: words.join(" "),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let settings = Settings::from_env()?;

    let collaborators = create_default_collaborators(&settings);
    let store = build_checkpoint_store(settings.database_url.as_deref());
    let orchestrator = Orchestrator::with_defaults(collaborators, store);

    info!(session_id = %args.session_id, "Running turn");

    let request = TurnRequest {
        force_intent: args.force_intent,
        ..Default::default()
    };

    match orchestrator
        .process_turn(&args.session_id, &args.message, request)
        .await
    {
        Ok(output) => {
            println!("{}", output.final_answer);
            info!(
                intent = %output.intent,
                trace = ?output.debug.trace.iter().map(|s| s.name()).collect::<Vec<_>>(),
                "Turn finished"
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
