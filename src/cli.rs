//! CLI interface for chat-curator

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{self, Config};
use crate::memory::{InteractionRecord, InteractionStore};

#[derive(Parser)]
#[command(name = "chat-curator")]
#[command(about = "Local LLM chat with feedback capture and curated answer reuse", long_about = None)]
#[command(version)]
struct Cli {
    /// History database (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Model name (overrides config)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Ollama base URL (overrides config)
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    host: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default when no command given)
    Chat,
    /// Ask one question, store the exchange and print the answer
    Ask {
        /// The question
        prompt: String,
    },
    /// List recent exchanges
    History {
        /// Maximum records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show one exchange in full
    Show {
        /// Record ID
        id: i64,
    },
    /// Rate a stored answer
    Feedback {
        /// Record ID
        id: i64,
        /// up or down
        #[arg(value_enum)]
        rating: Rating,
    },
    /// Store a better answer for a record
    Curate {
        /// Record ID
        id: i64,
        /// Replacement answer
        text: String,
    },
    /// Show which earlier answer would be reused for a prompt
    Lookup {
        /// Prompt to match
        prompt: String,
    },
    /// Show history statistics
    Stats,
    /// Create the config file and history database
    Init,
    /// Configure the assistant
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set the model name
        #[arg(long)]
        set_model: Option<String>,
        /// Set the Ollama base URL
        #[arg(long)]
        set_host: Option<String>,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Rating {
    Up,
    Down,
}

impl Cli {
    /// Load config and fold in command-line overrides
    fn effective_config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(db) = &self.db {
            config.store.database_path = Some(db.clone());
        }
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if let Some(host) = &self.host {
            config.model.host = host.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None | Some(Commands::Chat) => {
            let config = cli.effective_config()?;
            crate::agent::start_chat(&config).await?;
        }
        Some(Commands::Ask { prompt }) => {
            let config = cli.effective_config()?;
            let mut session = crate::agent::build_session(&config)?;
            let outcome = session.submit_prompt(prompt).await?;
            if outcome.reused_context.is_some() {
                eprintln!("(used an earlier approved answer as context)");
            }
            println!("{}", outcome.response);
            eprintln!("#{}", outcome.record_id);
        }
        Some(Commands::History { limit }) => {
            let store = crate::agent::open_store(&cli.effective_config()?)?;
            list_history(&store, *limit)?;
        }
        Some(Commands::Show { id }) => {
            let store = crate::agent::open_store(&cli.effective_config()?)?;
            show_record(&store, *id)?;
        }
        Some(Commands::Feedback { id, rating }) => {
            let store = crate::agent::open_store(&cli.effective_config()?)?;
            if store.set_feedback(*id, *rating == Rating::Up)? {
                println!("Thanks for your feedback!");
            } else {
                anyhow::bail!("No record with id {}", id);
            }
        }
        Some(Commands::Curate { id, text }) => {
            if text.trim().is_empty() {
                anyhow::bail!("Curated response is empty");
            }
            let store = crate::agent::open_store(&cli.effective_config()?)?;
            if store.set_curated_response(*id, text)? {
                println!("✓ Saved a better answer for #{}", id);
            } else {
                anyhow::bail!("No record with id {}", id);
            }
        }
        Some(Commands::Lookup { prompt }) => {
            let config = cli.effective_config()?;
            let store = crate::agent::open_store(&config)?;
            match crate::memory::find_reusable_answer(&store, prompt, config.matcher.threshold) {
                Some(answer) => println!("{}", answer),
                None => println!("No reusable answer."),
            }
        }
        Some(Commands::Stats) => {
            let store = crate::agent::open_store(&cli.effective_config()?)?;
            let stats = store.stats()?;
            println!("History: {}", store.path().display());
            println!("  records:  {}", stats.total_records);
            println!("  positive: {}", stats.positive);
            println!("  negative: {}", stats.negative);
            println!("  unrated:  {}", stats.unrated);
            println!("  curated:  {}", stats.curated);
        }
        Some(Commands::Init) => {
            let config = cli.effective_config()?;
            let store = crate::agent::open_store(&config)?;
            println!("Config:  {}", config::config_path()?.display());
            println!("History: {}", store.path().display());
        }
        Some(Commands::Config { set_model, set_host, reset, .. }) => {
            if *reset {
                config::reset_config()?;
            } else if let Some(model) = set_model {
                config::set_model(model)?;
            } else if let Some(host) = set_host {
                config::set_host(host)?;
            } else {
                config::show_config()?;
            }
        }
    }

    Ok(())
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    } else {
        flat
    }
}

fn list_history(store: &InteractionStore, limit: usize) -> Result<()> {
    let records = store.list_recent(limit)?;
    if records.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    for record in records {
        let marker = record.feedback.map(|f| f.symbol()).unwrap_or("  ");
        let curated = if record.curated_response.is_some() { " ✎" } else { "" };
        println!(
            "#{:<5} {} {}{}  {}",
            record.id,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            marker,
            curated,
            one_line(&record.prompt, 60)
        );
    }
    Ok(())
}

fn show_record(store: &InteractionStore, id: i64) -> Result<()> {
    let record: InteractionRecord = store
        .get_record(id)?
        .ok_or_else(|| anyhow::anyhow!("No record with id {}", id))?;

    println!("#{}  {}", record.id, record.timestamp.to_rfc3339());
    println!("Feedback: {}", record.feedback.map(|f| f.to_string()).unwrap_or_else(|| "unset".to_string()));
    println!("\nPrompt:\n{}", record.prompt);
    println!("\nResponse:\n{}", record.response);
    if let Some(curated) = &record.curated_response {
        println!("\nCurated response:\n{}", curated);
    }
    Ok(())
}
