//! `forgeloop agent` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use forgeloop_agent::{
    AgentLoop, AgentStreamEvent, ConversationHistory, ProviderSummarizer, Session, TurnOutcome,
};
use forgeloop_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Providers that run on the local machine and need no API key.
const LOCAL_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && !LOCAL_PROVIDERS.contains(&config.default_provider.as_str()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
        eprintln!("    export OPENAI_API_KEY='sk-...'             (for OpenAI direct)");
        eprintln!("    export FORGELOOP_API_KEY='sk-...'          (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let session = Arc::new(build_session(&config)?);
    spawn_interrupt_handler(session.clone());

    if let Some(msg) = message {
        // Single message mode
        let outcome = session.submit(&msg).await?;
        print_outcome(&outcome);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Forgeloop — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Tools:     {}", session.agent().registry().names().join(", "));
    println!("  Encoding:  {:?}", session.agent().action_encoding());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels a running turn; type 'exit' to quit, '/reset' to clear history.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                session.reset().await?;
                println!("  History cleared.");
                println!();
            }
            input => match session.submit(input).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            },
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Wire provider, tools, summarizer and event rendering into a session.
fn build_session(config: &AppConfig) -> Result<Session, Box<dyn std::error::Error>> {
    let router = forgeloop_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let tools = Arc::new(forgeloop_tools::default_registry(&config.tools));

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(render_events(rx));

    let agent = AgentLoop::from_config(provider.clone(), tools, config).with_events(tx);

    let summarizer = Arc::new(ProviderSummarizer::new(
        provider,
        config.default_model.clone(),
    ));
    let history = ConversationHistory::new().with_summarizer(summarizer, config.context.clone());

    Ok(Session::new(
        agent,
        history,
        config.system_prompt_preamble.as_deref(),
    ))
}

/// Ctrl+C cancels the running turn; with no turn running it exits.
fn spawn_interrupt_handler(session: Arc<Session>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if session.request_cancel() {
                eprintln!();
                eprintln!("  [Cancelling...]");
            } else {
                println!();
                println!("  Goodbye!");
                std::process::exit(0);
            }
        }
    });
}

/// Show tool activity as it happens. Model text is printed once the turn ends.
async fn render_events(mut rx: mpsc::Receiver<AgentStreamEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentStreamEvent::Thought { content } => {
                eprintln!("  · {}", content.lines().next().unwrap_or_default());
            }
            AgentStreamEvent::ToolCall { name, input, .. } => {
                eprintln!("  → {name} {input}");
            }
            AgentStreamEvent::ToolResult { name, success, .. } => {
                let status = if success { "ok" } else { "failed" };
                eprintln!("  ← {name}: {status}");
            }
            AgentStreamEvent::Error { message } => eprintln!("  [Model error] {message}"),
            AgentStreamEvent::Chunk { .. }
            | AgentStreamEvent::Done { .. }
            | AgentStreamEvent::Cancelled { .. } => {}
        }
    }
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Cancelled { iterations } => {
            println!("  [Turn cancelled after {iterations} model call(s)]");
        }
        TurnOutcome::Final { answer, .. } | TurnOutcome::LimitReached { message: answer, .. } => {
            println!();
            for line in answer.lines() {
                println!("  Assistant > {line}");
            }
        }
    }
    println!();
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
