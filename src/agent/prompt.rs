//! System prompt and the retrieval-augmented user turn.
//!
//! Both templates can be overridden from files in a prompt directory;
//! each missing file falls back to its compiled-in default.

use std::path::{Path, PathBuf};

/// System prompt for the research assistant.
pub const SYSTEM_PROMPT: &str = r"You are NEXUS, a finance research assistant for the semiconductor export-control case study and its market implications across the AI chip ecosystem.

GROUNDING RULES:
1. When you use case-study knowledge, cite it as [chunk_id] exactly as it appears in the retrieved context.
2. For numbers, CAR results, volatility metrics, correlations or any other quantitative claim, call the appropriate tool. Never invent figures.
3. If neither the retrieved context nor any tool can answer, say: I don't have grounded information for that in the case materials or tools.

AVAILABLE TOOLS:
- event_study_tool: cumulative abnormal return (CAR) analysis around export-control events. Use for stock reactions to regulatory events.
- volatility_tool: options-implied and historical realized volatility. Use for options and risk questions.
- ecosystem_tool: compare semiconductor ecosystem tickers (NVDA, AMD, INTC, TSM, ASML, AVGO, GOOGL, AMZN, MSFT) against a benchmark.
- price_tool: prices, return summaries, drawdowns and correlation matrices.

ANSWER FORMAT:
1. **Answer**: direct response, one to three paragraphs.
2. **Evidence Used**:
   - Citations: [chunk_ids] from the retrieved context, if any
   - Tools: tool_name(key_params) and a brief result, if any
3. **Assumptions & Limitations**: data windows, benchmarks and caveats.

STYLE:
- Be concise and quantitatively precise.
- Keep finance terms distinct: CAR is not a raw return, implied volatility is not realized volatility, beta is not correlation.
- Say so when a result is not statistically significant.";

/// User-turn template wrapping retrieved context around the question.
///
/// `{context}` and `{question}` are substituted verbatim.
pub const RAG_CONTEXT_TEMPLATE: &str =
    "RETRIEVED CONTEXT (use for citations):\n{context}\n\nUSER QUESTION: {question}";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/nexus-rs/prompts";

/// Filename for the system prompt override.
const SYSTEM_FILENAME: &str = "system.md";
/// Filename for the context template override.
const RAG_CONTEXT_FILENAME: &str = "rag_context.md";

/// Prompt templates used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System turn seeded at the start of every exchange.
    pub system: String,
    /// Template for the augmented user turn.
    pub rag_context: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::defaults()
    }
}

impl PromptSet {
    /// Loads prompts from `prompt_dir`, or from `~/.config/nexus-rs/prompts`
    /// when `None`. Each file is loaded independently.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir.map(Path::to_path_buf).or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            system: load_file(SYSTEM_FILENAME, SYSTEM_PROMPT),
            rag_context: load_file(RAG_CONTEXT_FILENAME, RAG_CONTEXT_TEMPLATE),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            rag_context: RAG_CONTEXT_TEMPLATE.to_string(),
        }
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Builds the augmented user turn from formatted context and the raw question.
    #[must_use]
    pub fn augment(&self, context: &str, question: &str) -> String {
        build_augmented_prompt(&self.rag_context, context, question)
    }
}

/// Substitutes `context` and `question` into `template`.
///
/// The question is substituted last so placeholder text inside retrieved
/// documents is never expanded.
#[must_use]
pub fn build_augmented_prompt(template: &str, context: &str, question: &str) -> String {
    match template.split_once("{context}") {
        Some((before, after)) => format!(
            "{}{context}{}",
            before.replace("{question}", question),
            after.replace("{question}", question)
        ),
        None => template.replace("{question}", question),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmented_prompt_layout() {
        let prompt = build_augmented_prompt(RAG_CONTEXT_TEMPLATE, "[a:chunk_0] (source: event_db)\ntext", "Why?");
        assert_eq!(
            prompt,
            "RETRIEVED CONTEXT (use for citations):\n[a:chunk_0] (source: event_db)\ntext\n\nUSER QUESTION: Why?"
        );
    }

    #[test]
    fn test_placeholders_in_context_are_not_expanded() {
        let prompt = build_augmented_prompt(RAG_CONTEXT_TEMPLATE, "doc mentions {question}", "Q");
        assert!(prompt.contains("doc mentions {question}"));
        assert!(prompt.ends_with("USER QUESTION: Q"));
    }

    #[test]
    fn test_system_prompt_names_every_tool() {
        for tool in ["event_study_tool", "volatility_tool", "ecosystem_tool", "price_tool"] {
            assert!(SYSTEM_PROMPT.contains(tool), "missing {tool}");
        }
        assert!(SYSTEM_PROMPT.contains("Evidence Used"));
        assert!(SYSTEM_PROMPT.contains("Assumptions"));
        assert!(SYSTEM_PROMPT.contains("grounded"));
    }

    #[test]
    fn test_load_overrides_present_files_only() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(SYSTEM_FILENAME), "custom system")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.system, "custom system");
        assert_eq!(prompts.rag_context, RAG_CONTEXT_TEMPLATE);
    }

    #[test]
    fn test_load_missing_dir_uses_defaults() {
        let prompts = PromptSet::load(Some(Path::new("/nonexistent/nexus/prompts")));
        assert_eq!(prompts, PromptSet::defaults());
    }
}
