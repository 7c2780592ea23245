//! Math Coach CLI
//!
//! Main entry point for a hint-gated tutoring session, either in the
//! terminal or served over HTTP.

use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mathcoach_core::{
    create_router, Action, AppState, ChatMessage, Config, Controller, Credential,
    GeminiHintEngine, Outcome, ProblemBank, Role, SessionState, SessionView, Verdict,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Math Coach - Socratic AMC 10 practice
///
/// Works through a bank of math problems, unlocking up to three
/// progressively stronger hints per problem before you answer.
#[derive(Parser, Debug)]
#[command(name = "mathcoach")]
#[command(version, about, long_about = None)]
struct Args {
    /// CSV problem bank: a URL or a file path (default: problemSource from config)
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Path to configuration file (default: mathcoach.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Model identifier for the hint service
    #[arg(short, long)]
    model: Option<String>,

    /// Serve the session over HTTP instead of the terminal
    #[arg(long)]
    serve: bool,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Do(Action),
    Show,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let command = match word.to_ascii_lowercase().as_str() {
            "hint" | "h" => Self::Do(Action::RequestHint),
            "answer" | "a" => Self::Do(Action::SubmitAnswer(rest.to_string())),
            "next" | "n" => Self::Do(Action::AdvanceProblem),
            "reset" | "r" => Self::Do(Action::ResetSession),
            "source" if !rest.is_empty() => Self::Do(Action::ReloadProblemBank(rest.to_string())),
            "show" | "s" => Self::Show,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Math Coach starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads config, builds the controller, and runs the chosen surface.
async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(ref source) = args.source {
        config.problem_source.clone_from(source);
    }
    if let Some(ref model) = args.model {
        config.model.clone_from(model);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let credential = acquire_credential(&config, !args.serve)?;
    let hints = Arc::new(GeminiHintEngine::from_config(&config, credential));
    let bank = ProblemBank::new(config.source_timeout())?;
    let mut controller = Controller::new(bank, hints);
    let mut session = SessionState::new();

    let outcome = controller
        .handle(
            &mut session,
            Action::ReloadProblemBank(config.problem_source.clone()),
        )
        .await;
    print_outcome(&outcome);

    if args.serve {
        serve(controller, session, args.port).await
    } else {
        run_terminal(controller, session).await
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Reads the API key from the environment, or asks once on an interactive terminal.
///
/// An empty answer leaves the session without a key; hints then explain how
/// to supply one.
fn acquire_credential(config: &Config, interactive: bool) -> anyhow::Result<Option<Credential>> {
    if let Some(credential) = Credential::from_env(&config.credential_env) {
        tracing::info!(env_var = %config.credential_env, "API key loaded from environment");
        return Ok(Some(credential));
    }

    if !interactive || !std::io::stdin().is_terminal() {
        tracing::warn!(env_var = %config.credential_env, "No API key configured; hints are disabled");
        return Ok(None);
    }

    let key = dialoguer::Password::new()
        .with_prompt(format!(
            "Gemini API key (leave empty to skip; or set {})",
            config.credential_env
        ))
        .allow_empty_password(true)
        .interact()?;

    let credential = Credential::new(key);
    if credential.is_none() {
        tracing::warn!("No API key entered; hints are disabled");
    }
    Ok(credential)
}

/// Serves the session over HTTP until Ctrl+C.
async fn serve(controller: Controller, session: SessionState, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let router = create_router(AppState::with_session(controller, session));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

/// Runs the interactive terminal loop until `quit`, end of input, or Ctrl+C.
async fn run_terminal(mut controller: Controller, mut session: SessionState) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    print_view(&controller.view(&session));

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            None => {}
            Some(Command::Do(action)) => {
                let show_view = !matches!(action, Action::SubmitAnswer(_));
                let outcome = controller.handle(&mut session, action).await;
                print_outcome(&outcome);
                if show_view || matches!(outcome, Outcome::AnswerChecked { .. }) {
                    print_view(&controller.view(&session));
                }
            }
            Some(Command::Show) => print_view(&controller.view(&session)),
            Some(Command::Help) => print_help(),
            Some(Command::Quit) => break,
            Some(Command::Unknown(input)) => {
                println!("Unknown command: '{input}'. Type 'help' for commands.");
            }
        }
    }

    let elapsed = session.elapsed();
    println!();
    println!(
        "Session ended after {}m {}s",
        elapsed.num_minutes(),
        elapsed.num_seconds() % 60
    );
    Ok(())
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Problem source: {}", config.problem_source);
    println!("  Model: {}", config.model);
    println!("  Hint timeout: {}s", config.hint_timeout_secs);
}

fn print_help() {
    println!();
    println!("Commands:");
    println!("  hint             ask for the next hint (up to 3 per problem)");
    println!("  answer <text>    submit an answer");
    println!("  next             go to the next problem after a correct answer");
    println!("  reset            clear hints and chat for this problem");
    println!("  source <csv>     load problems from a URL or file");
    println!("  show             show the current problem again");
    println!("  help             show this list");
    println!("  quit             leave");
}

/// Prints what the last action did.
fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::HintGiven { level, .. } => println!("Hint {level} unlocked."),
        Outcome::HintUnavailable { message } => println!("{message}"),
        Outcome::NoMoreHints => println!("No more hints available."),
        Outcome::AnswerChecked {
            verdict: Verdict::Correct,
            ..
        } => println!("Correct! Type 'next' to continue."),
        Outcome::AnswerChecked {
            verdict: Verdict::Incorrect,
            ..
        } => println!("Incorrect. Try again."),
        Outcome::Advanced { .. } => println!("Moving on."),
        Outcome::AdvanceRejected => println!("Answer this problem correctly before moving on."),
        Outcome::SessionReset => println!("Attempt cleared."),
        Outcome::BankReloaded { count, error: None } => println!("Loaded {count} problems."),
        Outcome::BankReloaded {
            error: Some(message),
            ..
        } => println!("Could not load problems: {message}"),
        Outcome::NoProblems => println!("No problems loaded. Use 'source <csv>' to load some."),
    }
}

/// Prints the current problem, transcript and hint budget.
fn print_view(view: &SessionView) {
    println!();
    let (Some(number), Some(text)) = (view.problem_number, view.problem_text.as_deref()) else {
        match view.load_error.as_deref() {
            Some(error) => println!("No problems loaded: {error}"),
            None => println!("No problems loaded."),
        }
        return;
    };

    println!(
        "Problem {number} of {} ({:.0}%)",
        view.total,
        view.progress * 100.0
    );
    println!("{text}");

    if !view.transcript.is_empty() {
        println!();
        for message in &view.transcript {
            print_message(message);
        }
    }

    println!();
    println!(
        "Hints used: {}/{} ({} remaining)",
        view.hints_used,
        view.hints_used + view.hints_remaining,
        view.hints_remaining
    );
    if let Some(explanation) = view.explanation.as_deref().filter(|e| !e.is_empty()) {
        println!("Explanation: {explanation}");
    }
}

fn print_message(message: &ChatMessage) {
    let speaker = match message.role {
        Role::Student => "You",
        Role::Coach => "Coach",
    };
    println!("  {speaker}: {}", message.content);
}
