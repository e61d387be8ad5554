//! `profesor chat`: Interactive or single-message chat.

use std::future::Future;
use std::io::Write;

use profesor_agent::{ChatDispatcher, ChatRequest, StreamEvent};
use profesor_config::AppConfig;
use profesor_core::error::GenerationErrorKind;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use super::{build_dispatcher, load_config};

pub async fn run(
    message: Option<String>,
    stream: bool,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    // Fail early with setup instructions when no API key is set
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PROFESOR_API_KEY  (highest priority)");
        eprintln!("    GOOGLE_API_KEY");
        eprintln!("    GEMINI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let (dispatcher, hub) = build_dispatcher(&config)?;
    let request = |text: String| ChatRequest {
        message: text,
        model: model.clone(),
        use_streaming: stream,
        ..ChatRequest::default()
    };

    if let Some(msg) = message {
        let result = answer(&dispatcher, request(msg)).await;
        hub.cleanup();
        return result;
    }

    println!();
    println!("  El Profesor — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", model.as_deref().unwrap_or(&config.default_model));
    println!("  Streaming: {}", if stream { "on" } else { "off" });
    println!();
    println!("  Type your question and press Enter. Ctrl+C stops an answer.");
    println!("  Type 'exit' or press Ctrl+C at the prompt to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = next_input(&mut lines, interrupted()).await? {
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if !text.is_empty() {
            if let Err(e) = answer(&dispatcher, request(text.to_string())).await {
                eprintln!("  [Error] {e}");
            }
            println!();
        }
        prompt()?;
    }

    hub.cleanup();
    println!();
    println!("  Goodbye!");
    Ok(())
}

/// The next typed line, or `None` at end of input or on interrupt.
async fn next_input<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> std::io::Result<Option<String>> {
    tokio::select! {
        line = lines.next_line() => line,
        () = interrupt => Ok(None),
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn answer(
    dispatcher: &ChatDispatcher,
    request: ChatRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    if !request.use_streaming {
        eprint!("  Thinking...");
        let response = dispatcher.respond(&request).await;
        eprint!("\r              \r");
        let response = response?;
        if let Some(tool) = &response.tool_used {
            eprintln!("  [{}] {}", tool.tool, tool.reasoning);
        }
        println!("{}", response.response);
        return Ok(());
    }

    let mut events = dispatcher.respond_stream(&request).await?;
    let mut stdout = std::io::stdout();
    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                events.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };

        match event {
            StreamEvent::Content { text } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamEvent::ToolUsed { tool, reasoning } => {
                eprintln!("  [{tool}] {reasoning}");
            }
            StreamEvent::Complete => println!(),
            StreamEvent::Error { message, kind } => {
                println!();
                eprintln!("  {}", guidance(kind, &message));
            }
        }
    }
    Ok(())
}

fn guidance(kind: GenerationErrorKind, message: &str) -> String {
    match kind {
        GenerationErrorKind::Quota => {
            format!("[Quota] {message}. Wait a moment and try again.")
        }
        GenerationErrorKind::ModelUnavailable => {
            format!("[Model unavailable] {message}. Try another model with --model.")
        }
        GenerationErrorKind::Cancelled => "[Stopped]".to_string(),
        GenerationErrorKind::General => format!("[Error] {message}"),
    }
}
