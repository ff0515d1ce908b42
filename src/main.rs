//! Repo Scan Agent - LLM-driven static analysis for git repositories
//!
//! A CLI tool that lets a local Ollama model choose and run scanners
//! against a cloned repository and produce a report from their output.
//!
//! Exit codes:
//!   0 - Success (the agent produced a final answer)
//!   1 - Runtime error (configuration, reasoning backend, I/O, etc.)
//!   2 - The agent exhausted its iteration budget

use anyhow::{Context, Result};
use repo_scan_agent::agent::tools::redact_transcript;
use repo_scan_agent::agent::{AnalysisAgent, OllamaReasoner, ReasoningEngine, ToolRegistry};
use repo_scan_agent::cli::Args;
use repo_scan_agent::config::{Config, CONFIG_FILE_NAME};
use repo_scan_agent::error::AgentError;
use repo_scan_agent::models::{AgentOutcome, AgentStep, AnalysisTask};
use repo_scan_agent::repo::RepoFetcher;
use repo_scan_agent::scanner::{build_scanners, ScannerSettings};
use repo_scan_agent::store::ResultStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Repo Scan Agent v{}", env!("CARGO_PKG_VERSION"));
    debug!("Repository: {}", args.repo_url());

    match run_analysis(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .repo-scan.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, scanner commands, and timeouts.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run one task end to end. Returns the process exit code.
async fn run_analysis(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let task = args.to_task();
    print_banner(&task, &config);

    let store = Arc::new(ResultStore::new(config.embedder()?).with_capacity(config.store.capacity));
    let fetcher = RepoFetcher::new(config.clone_options(!args.quiet && !args.json));
    let scanners = build_scanners(&ScannerSettings::from(&config.scanners));
    let registry = Arc::new(ToolRegistry::standard(scanners, fetcher, Arc::clone(&store)));

    let reasoner: Arc<dyn ReasoningEngine> = Arc::new(
        OllamaReasoner::new(config.ollama_settings()).context("Failed to initialize Ollama client")?,
    );
    let agent = AnalysisAgent::new(config.agent_config(), registry, reasoner);

    println!("\n🔬 Running analysis...\n");

    let outcome = match agent.run(&task).await {
        Ok(outcome) => outcome,
        Err(AgentError::IterationBudgetExceeded {
            iterations,
            transcript,
        }) => {
            if args.show_steps {
                print_steps(&transcript);
            }
            eprintln!(
                "\n⛔ No final answer after {} iterations (exit code 2).",
                iterations
            );
            return Ok(2);
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Agent finished after {} iterations; {} results stored",
        outcome.iterations(),
        store.len()
    );

    if args.json {
        let shown = AgentOutcome {
            answer: outcome.answer.clone(),
            transcript: redact_transcript(&outcome.transcript),
        };
        let json = serde_json::to_string_pretty(&shown)
            .context("Failed to serialize agent outcome")?;
        println!("{}", json);
    } else {
        if args.show_steps {
            print_steps(&outcome.transcript);
        }
        println!("\n📝 Final Answer:\n\n{}", outcome.answer.text);
    }

    if let Some(ref output) = args.output {
        write_answer(output, &outcome)?;
        if !args.json {
            println!("\n✅ Report saved to: {}", output.display());
        }
    }

    if !args.json {
        println!(
            "\n📊 {} iterations in {:.1}s",
            outcome.iterations(),
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(0)
}

fn print_banner(task: &AnalysisTask, config: &Config) {
    println!("📥 Analyzing repository: {}", task.repository_url());
    println!("   Branch: {}", task.branch());
    println!("   Directory: {}", task.directory_label());
    println!("   Report format: {}", task.output_format());
    println!("   Report language: {}", task.output_language());
    if let Some(tool) = task.selected_tool() {
        println!("   Selected tool: {}", tool);
    }
    println!("🤖 Model: {} ({})", config.model.name, config.model.ollama_url);
}

fn print_steps(transcript: &[AgentStep]) {
    println!("\n🧭 Intermediate steps:");
    for (i, step) in redact_transcript(transcript).iter().enumerate() {
        println!("\n[{}] Thought: {}", i + 1, step.thought);
        match step.chosen_tool {
            Some(tool) => println!("    Action: {} | {}", tool, step.action_input),
            None => println!("    Action: (none)"),
        }
        println!("    Observation: {}", step.observation);
    }
}

fn write_answer(path: &Path, outcome: &AgentOutcome) -> Result<()> {
    std::fs::write(path, &outcome.answer.text)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
