//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default directory holding `prices.json` and `events.json`.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default knowledge directory scanned by `index build`.
pub const DEFAULT_KNOWLEDGE_DIR: &str = "knowledge/processed";

/// Nexus: grounded research assistant for export-control case studies.
///
/// Indexes a markdown knowledge base, then answers questions with a
/// tool-calling model that cites the retrieved chunks.
#[derive(Parser, Debug)]
#[command(name = "nexus")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vector index database.
    ///
    /// Defaults to `.nexus/index.db` in the current directory.
    #[arg(short, long, env = "NEXUS_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory containing market data (`prices.json`, `events.json`).
    #[arg(long, env = "NEXUS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Vector index operations (build, status).
    #[command(subcommand)]
    Index(IndexCommands),

    /// Search the knowledge base without calling a model.
    #[command(after_help = r#"Examples:
  nexus search "entity list"                       # Top 4 chunks
  nexus search "October 7 rules" -k 8              # Top 8 chunks
  nexus search "licensing" --source-type event_db  # Only event records
  nexus search "A100" --severity Critical
  nexus --format json search "TSMC" | jq '.results[].chunk_id'
"#)]
    Search {
        /// Search query text.
        query: String,

        /// Maximum number of results.
        #[arg(short = 'k', long, default_value_t = crate::retrieval::DEFAULT_TOP_K)]
        top_k: usize,

        /// Restrict to one source type (`event_db`, `methodology`, `case_study`, `other`).
        #[arg(long)]
        source_type: Option<String>,

        /// Restrict to one event severity.
        #[arg(long)]
        severity: Option<String>,
    },

    /// Ask a question; the model may call analysis tools before answering.
    #[command(after_help = r#"Examples:
  nexus ask "How did NVDA react to the October 2022 rules?"
  nexus ask "Compare TSM and ASML since 2023" --model gemini-2.0-flash
  nexus ask "And AMD?" --history turns.json        # Continue a conversation
  nexus --format json ask "What is the CAR for NVDA?" | jq '.citations'

History file format (JSON array of prior turns):
[
  {"role": "user", "content": "..."},
  {"role": "assistant", "content": "..."}
]"#)]
    Ask {
        /// The question.
        question: String,

        /// Model identifier (defaults to `NEXUS_MODEL` or gpt-4o-mini).
        #[arg(short, long)]
        model: Option<String>,

        /// JSON file with prior conversation turns.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Maximum tool-calling rounds before a forced answer.
        #[arg(long)]
        max_rounds: Option<usize>,
    },

    /// Analysis tool operations (list, run).
    #[command(subcommand)]
    Tools(ToolsCommands),

    /// List selectable models and their providers.
    Models,
}

/// Vector index subcommands.
#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Rebuild the index from a knowledge directory.
    ///
    /// Replaces every indexed chunk. An empty directory leaves the
    /// existing index untouched.
    #[command(after_help = r#"Examples:
  nexus index build                                # From knowledge/processed
  nexus index build --knowledge-dir ./docs
  nexus --db-path /tmp/idx.db index build
"#)]
    Build {
        /// Directory of markdown documents.
        #[arg(short, long, default_value = DEFAULT_KNOWLEDGE_DIR)]
        knowledge_dir: PathBuf,
    },

    /// Show index statistics.
    Status,
}

/// Analysis tool subcommands.
#[derive(Subcommand, Debug)]
pub enum ToolsCommands {
    /// List registered tools with their descriptions.
    List,

    /// Run a tool directly with JSON arguments.
    #[command(after_help = r#"Examples:
  nexus tools run price_tool --args '{"tickers": ["NVDA", "AMD"]}'
  nexus tools run event_study_tool --args '{"severity_filter": ["Critical"]}'
  nexus tools run volatility_tool
"#)]
    Run {
        /// Tool name.
        name: String,

        /// Arguments as a JSON object.
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }

    /// Returns the market data directory, using the default if not specified.
    #[must_use]
    pub fn get_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(command: Commands) -> Cli {
        Cli {
            db_path: None,
            data_dir: None,
            verbose: false,
            format: "text".to_string(),
            command,
        }
    }

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_paths() {
        let cli = cli(Commands::Models);
        assert_eq!(cli.get_db_path(), PathBuf::from(crate::storage::DEFAULT_DB_PATH));
        assert_eq!(cli.get_data_dir(), PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_custom_db_path() {
        let mut cli = cli(Commands::Models);
        cli.db_path = Some(PathBuf::from("/custom/path.db"));
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/path.db"));
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["nexus", "ask", "why?", "--max-rounds", "2", "-m", "gpt-4o"])
            .unwrap_or_else(|_| unreachable!());
        let Commands::Ask {
            question,
            model,
            max_rounds,
            history,
        } = cli.command
        else {
            unreachable!()
        };
        assert_eq!(question, "why?");
        assert_eq!(model.as_deref(), Some("gpt-4o"));
        assert_eq!(max_rounds, Some(2));
        assert!(history.is_none());
    }

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["nexus", "--format", "json", "search", "rules"])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "json");
        let Commands::Search { top_k, source_type, .. } = cli.command else {
            unreachable!()
        };
        assert_eq!(top_k, crate::retrieval::DEFAULT_TOP_K);
        assert!(source_type.is_none());
    }

    #[test]
    fn test_parse_tools_run_default_args() {
        let cli = Cli::try_parse_from(["nexus", "tools", "run", "price_tool"])
            .unwrap_or_else(|_| unreachable!());
        let Commands::Tools(ToolsCommands::Run { name, args }) = cli.command else {
            unreachable!()
        };
        assert_eq!(name, "price_tool");
        assert_eq!(args, "{}");
    }
}
