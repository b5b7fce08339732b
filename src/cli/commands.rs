//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::agent::config::DEFAULT_USER_ERROR_CHARS;
use crate::agent::{AgentConfig, AgentReply, ChatMessage, Orchestrator, ToolRegistry, create_client, models};
use crate::cli::output::OutputFormat;
use crate::cli::parser::{Cli, Commands, IndexCommands, ToolsCommands};
use crate::core::Hit;
use crate::embedding::{create_embedder, try_create_embedder};
use crate::error::{CommandError, Result, truncate_chars};
use crate::retrieval::{RetrievalFilters, Retriever, build_index};
use crate::storage::SqliteVectorStore;
use crate::tools::{MarketData, default_registry};

/// Citations shown after an answer.
const MAX_DISPLAYED_CITATIONS: usize = 5;
/// Characters of tool arguments shown per call.
const TOOL_ARGS_DISPLAY_CHARS: usize = 120;
/// Characters of chunk text shown per search hit.
const SEARCH_PREVIEW_CHARS: usize = 150;

// ==================== Parameter Structs ====================

/// Parameters for the search command.
#[derive(Debug, Clone)]
pub struct SearchParams<'a> {
    /// Search query text.
    pub query: &'a str,
    /// Maximum number of results.
    pub top_k: usize,
    /// Restrict to one source type.
    pub source_type: Option<&'a str>,
    /// Restrict to one severity.
    pub severity: Option<&'a str>,
}

/// Parameters for the ask command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question.
    pub question: &'a str,
    /// Model override.
    pub model: Option<&'a str>,
    /// Prior turns file.
    pub history: Option<&'a Path>,
    /// Tool round budget override.
    pub max_rounds: Option<usize>,
}

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();
    let data_dir = cli.get_data_dir();

    match &cli.command {
        Commands::Index(IndexCommands::Build { knowledge_dir }) => {
            cmd_index_build(&db_path, knowledge_dir, format)
        }
        Commands::Index(IndexCommands::Status) => cmd_index_status(&db_path, format),
        Commands::Search {
            query,
            top_k,
            source_type,
            severity,
        } => {
            let params = SearchParams {
                query,
                top_k: *top_k,
                source_type: source_type.as_deref(),
                severity: severity.as_deref(),
            };
            cmd_search(&db_path, &params, format)
        }
        Commands::Ask {
            question,
            model,
            history,
            max_rounds,
        } => {
            let params = AskParams {
                question,
                model: model.as_deref(),
                history: history.as_deref(),
                max_rounds: *max_rounds,
            };
            cmd_ask(&db_path, &data_dir, &params, format)
        }
        Commands::Tools(ToolsCommands::List) => cmd_tools_list(&data_dir, format),
        Commands::Tools(ToolsCommands::Run { name, args }) => cmd_tools_run(&data_dir, name, args, format),
        Commands::Models => Ok(cmd_models(format)),
    }
}

// ==================== Helpers ====================

fn open_store(db_path: &Path) -> Result<SqliteVectorStore> {
    if !db_path.exists() {
        return Err(CommandError::ExecutionFailed(format!(
            "No index found at {}. Run 'nexus index build' first.",
            db_path.display()
        ))
        .into());
    }
    Ok(SqliteVectorStore::open(db_path)?)
}

fn load_registry(data_dir: &Path) -> Result<ToolRegistry> {
    let data = MarketData::load(data_dir)
        .map_err(|e| CommandError::ExecutionFailed(format!("Failed to load market data: {e}")))?;
    Ok(default_registry(&Arc::new(data)))
}

fn load_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CommandError::InvalidArgument(format!("cannot read history file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        CommandError::InvalidArgument(format!("history file {} is not a JSON turn list: {e}", path.display()))
            .into()
    })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}")).into()
    })
}

fn to_pretty_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")).into())
}

// ==================== Index Commands ====================

fn cmd_index_build(db_path: &Path, knowledge_dir: &Path, format: OutputFormat) -> Result<String> {
    if !knowledge_dir.is_dir() {
        return Err(CommandError::InvalidArgument(format!(
            "knowledge directory not found: {}",
            knowledge_dir.display()
        ))
        .into());
    }
    let store = SqliteVectorStore::open(db_path)?;
    let embedder = try_create_embedder()?;
    let report = build_index(knowledge_dir, &store, embedder.as_ref())?;

    match format {
        OutputFormat::Text => {
            if report.chunks == 0 {
                return Ok(format!(
                    "No documents found in {}; index left unchanged.\n",
                    knowledge_dir.display()
                ));
            }
            let mut output = format!(
                "Indexed {} chunks from {} documents into {}\n",
                report.chunks,
                report.documents,
                db_path.display()
            );
            for (source_type, count) in &report.source_types {
                let _ = writeln!(output, "  {source_type:<12} {count}");
            }
            Ok(output)
        }
        OutputFormat::Json => {
            let json = json!({
                "db_path": db_path.to_string_lossy(),
                "knowledge_dir": knowledge_dir.to_string_lossy(),
                "embedder": embedder.name(),
                "report": report,
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_index_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    if !db_path.exists() {
        return Ok(match format {
            OutputFormat::Text => format!(
                "No index at {}. Run 'nexus index build' to create one.\n",
                db_path.display()
            ),
            OutputFormat::Json => format.to_json(&json!({
                "db_path": db_path.to_string_lossy(),
                "exists": false,
            })),
        });
    }

    let stats = open_store(db_path)?.stats()?;
    match format {
        OutputFormat::Text => {
            let mut output = format!("Index: {}\n", db_path.display());
            let _ = writeln!(output, "Chunks: {}", stats.chunks);
            let _ = writeln!(output, "Documents: {}", stats.documents);
            let _ = writeln!(output, "Embedder: {}", stats.embedder.as_deref().unwrap_or("-"));
            let _ = writeln!(
                output,
                "Dimensions: {}",
                stats.dimensions.map_or_else(|| "-".to_string(), |d| d.to_string())
            );
            if !stats.source_types.is_empty() {
                output.push_str("Source types:\n");
                for (source_type, count) in &stats.source_types {
                    let _ = writeln!(output, "  {source_type:<12} {count}");
                }
            }
            Ok(output)
        }
        OutputFormat::Json => {
            let json = json!({
                "db_path": db_path.to_string_lossy(),
                "exists": true,
                "stats": stats,
            });
            Ok(format.to_json(&json))
        }
    }
}

// ==================== Search Commands ====================

fn cmd_search(db_path: &Path, params: &SearchParams<'_>, format: OutputFormat) -> Result<String> {
    let store = open_store(db_path)?;
    let retriever = Retriever::new(Arc::new(store), create_embedder()).with_top_k(params.top_k);
    let filters = RetrievalFilters {
        source_type: params.source_type.map(String::from),
        severity: params.severity.map(String::from),
        top_k: None,
    };
    let hits = retriever
        .retrieve(params.query, &filters)
        .map_err(|e| CommandError::ExecutionFailed(format!("Search failed: {e}")))?;
    Ok(format_search_results(&hits, params.query, format))
}

fn format_search_results(hits: &[Hit], query: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                return format!("No results found for query: \"{query}\"\n");
            }

            let mut output = String::new();
            let _ = writeln!(output, "Search results for \"{query}\" ({} results):\n", hits.len());
            let _ = writeln!(output, "{:<32} {:<10} {:<12}", "Chunk ID", "Distance", "Source");
            output.push_str(&"-".repeat(56));
            output.push('\n');

            for hit in hits {
                let _ = writeln!(
                    output,
                    "{:<32} {:<10.4} {:<12}",
                    hit.chunk_id,
                    hit.distance,
                    hit.source_type()
                );
                let preview = truncate_chars(&hit.text.replace('\n', " "), SEARCH_PREVIEW_CHARS);
                let _ = writeln!(output, "  {preview}");
            }
            output
        }
        OutputFormat::Json => {
            let json = json!({
                "query": query,
                "count": hits.len(),
                "results": hits,
            });
            format.to_json(&json)
        }
    }
}

// ==================== Agent Commands ====================

fn cmd_ask(db_path: &Path, data_dir: &Path, params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(model) = params.model {
        builder = builder.model(model);
    }
    if let Some(rounds) = params.max_rounds {
        builder = builder.max_tool_rounds(rounds);
    }
    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!(
            "Agent configuration error: {}",
            e.user_message(DEFAULT_USER_ERROR_CHARS)
        ))
    })?;
    let client = create_client(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!(
            "Provider creation failed: {}",
            e.user_message(DEFAULT_USER_ERROR_CHARS)
        ))
    })?;

    let history = params.history.map(load_history).transpose()?.unwrap_or_default();
    let retriever = open_retriever(db_path);
    let registry = load_registry(data_dir)?;
    let orchestrator = Orchestrator::new(client, retriever, registry, &config);

    let rt = runtime()?;
    let reply = rt
        .block_on(orchestrator.run_agent(params.question, &history))
        .map_err(|e| {
            CommandError::ExecutionFailed(format!("Error: {}", e.user_message(DEFAULT_USER_ERROR_CHARS)))
        })?;

    match format {
        OutputFormat::Text => Ok(format_reply(&reply)),
        OutputFormat::Json => to_pretty_json(&reply),
    }
}

/// Retriever over the index at `db_path`, or `None` when it cannot be opened.
fn open_retriever(db_path: &Path) -> Option<Retriever> {
    if !db_path.exists() {
        warn!(path = %db_path.display(), "no index found, answering from tools only");
        return None;
    }
    match SqliteVectorStore::open(db_path) {
        Ok(store) => Some(Retriever::new(Arc::new(store), create_embedder())),
        Err(e) => {
            warn!(error = %e, "failed to open index, answering from tools only");
            None
        }
    }
}

fn format_reply(reply: &AgentReply) -> String {
    let mut output = reply.response.clone();
    if !output.ends_with('\n') {
        output.push('\n');
    }
    if !reply.citations.is_empty() {
        output.push_str("\nSources:\n");
        for citation in reply.citations.iter().take(MAX_DISPLAYED_CITATIONS) {
            let _ = writeln!(output, "  - {citation}");
        }
    }
    if !reply.tools_called.is_empty() {
        output.push_str("\nTools:\n");
        for record in &reply.tools_called {
            let args = truncate_chars(&record.arguments_json(), TOOL_ARGS_DISPLAY_CHARS);
            let _ = writeln!(output, "  - {}({args})", record.tool);
        }
    }
    output
}

// ==================== Tool Commands ====================

fn cmd_tools_list(data_dir: &Path, format: OutputFormat) -> Result<String> {
    let registry = load_registry(data_dir)?;
    let definitions = registry.definitions();
    match format {
        OutputFormat::Text => {
            let mut output = format!("{} tools available:\n\n", definitions.len());
            for definition in &definitions {
                let _ = writeln!(output, "{}", definition.name);
                let _ = writeln!(output, "  {}", definition.description);
            }
            Ok(output)
        }
        OutputFormat::Json => to_pretty_json(&definitions),
    }
}

fn cmd_tools_run(data_dir: &Path, name: &str, raw_args: &str, format: OutputFormat) -> Result<String> {
    let registry = load_registry(data_dir)?;
    if !registry.contains(name) {
        return Err(CommandError::InvalidArgument(format!(
            "unknown tool '{name}' (available: {})",
            registry.names().join(", ")
        ))
        .into());
    }
    let args = match serde_json::from_str::<Value>(raw_args) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(CommandError::InvalidArgument("--args must be a JSON object".to_string()).into());
        }
        Err(e) => {
            return Err(CommandError::InvalidArgument(format!("--args is not valid JSON: {e}")).into());
        }
    };

    let raw = registry.execute(name, &args);
    let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
    Ok(format.to_json(&value))
}

fn cmd_models(format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("{:<20} {:<26} {:<10}\n", "Model", "ID", "Provider");
            output.push_str(&"-".repeat(58));
            output.push('\n');
            for model in models() {
                let _ = writeln!(output, "{:<20} {:<26} {:<10}", model.label, model.id, model.provider.as_str());
            }
            output
        }
        OutputFormat::Json => format.to_json(models()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolExecutionRecord;
    use clap::Parser;

    fn run(args: &[&str]) -> Result<String> {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap_or_else(|_| unreachable!());
        execute(&cli)
    }

    #[test]
    fn test_models_lists_catalog() {
        let out = run(&["nexus", "models"]).unwrap_or_default();
        assert!(out.contains("gpt-4o-mini"));
        assert!(out.contains("gemini-2.0-flash"));
        assert!(out.contains("anthropic"));
    }

    #[test]
    fn test_models_json() {
        let out = run(&["nexus", "--format", "json", "models"]).unwrap_or_default();
        let value: Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value.as_array().map(Vec::len), Some(6));
    }

    #[test]
    fn test_tools_list_without_data() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let data_dir = dir.path().to_string_lossy().into_owned();
        let out = run(&["nexus", "--data-dir", &data_dir, "tools", "list"]).unwrap_or_default();
        assert!(out.starts_with("4 tools available"));
        assert!(out.contains("event_study_tool"));
    }

    #[test]
    fn test_tools_run_rejects_unknown_tool() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let data_dir = dir.path().to_string_lossy().into_owned();
        let err = run(&["nexus", "--data-dir", &data_dir, "tools", "run", "nope"]);
        assert!(err.is_err_and(|e| e.to_string().contains("unknown tool 'nope'")));
    }

    #[test]
    fn test_tools_run_rejects_non_object_args() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let data_dir = dir.path().to_string_lossy().into_owned();
        let err = run(&["nexus", "--data-dir", &data_dir, "tools", "run", "price_tool", "--args", "[1]"]);
        assert!(err.is_err_and(|e| e.to_string().contains("JSON object")));
    }

    #[test]
    fn test_tools_run_without_data_reports_error_payload() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let data_dir = dir.path().to_string_lossy().into_owned();
        let out = run(&[
            "nexus",
            "--data-dir",
            &data_dir,
            "tools",
            "run",
            "price_tool",
            "--args",
            r#"{"tickers": ["NVDA"]}"#,
        ])
        .unwrap_or_default();
        let value: Value = serde_json::from_str(&out).unwrap_or_default();
        assert!(value["error"].is_string());
    }

    #[test]
    fn test_index_status_without_index() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let db = dir.path().join("missing.db").to_string_lossy().into_owned();
        let out = run(&["nexus", "--db-path", &db, "index", "status"]).unwrap_or_default();
        assert!(out.starts_with("No index at"));
    }

    #[test]
    fn test_search_without_index_fails() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let db = dir.path().join("missing.db").to_string_lossy().into_owned();
        assert!(run(&["nexus", "--db-path", &db, "search", "rules"]).is_err());
    }

    #[test]
    fn test_format_reply_limits_citations_and_args() {
        let mut arguments = serde_json::Map::new();
        arguments.insert("tickers".to_string(), json!(vec!["NVDA"; 40]));
        let reply = AgentReply {
            response: "Answer.".to_string(),
            citations: (0..8).map(|i| format!("doc_chunk_{i}")).collect(),
            tools_called: vec![ToolExecutionRecord {
                tool: "price_tool".to_string(),
                arguments,
                result_preview: String::new(),
            }],
        };

        let out = format_reply(&reply);
        assert!(out.starts_with("Answer.\n"));
        assert!(out.contains("doc_chunk_4"));
        assert!(!out.contains("doc_chunk_5"));
        let tool_line = out.lines().find(|l| l.contains("price_tool(")).unwrap_or_default();
        assert_eq!(tool_line.chars().count(), "  - price_tool(".len() + TOOL_ARGS_DISPLAY_CHARS + 1);
    }
}
