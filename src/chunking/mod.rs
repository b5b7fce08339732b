//! Markdown-aware document chunking.
//!
//! Knowledge documents are markdown files whose `## ` headings delimit
//! sections. Sections are merged greedily into chunks bounded by
//! [`DEFAULT_CHUNK_SIZE`] characters; a single section larger than the
//! bound becomes its own oversized chunk rather than being cut mid-text.
//! Every chunk inherits the document's metadata verbatim.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::core::{Chunk, Metadata};
use crate::error::ChunkingError;

/// Default chunk size bound, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Metadata keys recognised as `key: value` lines in a document.
pub const METADATA_FIELDS: [&str; 6] = ["doc_id", "date", "severity", "event_type", "tickers", "source"];

/// Separator placed between merged sections.
const SECTION_JOINER: &str = "\n\n";

/// Marker that starts a new section (preceded by a newline).
const SECTION_MARKER: &str = "\n## ";

/// Prefix used in chunk IDs when a document declares no `doc_id`.
const UNKNOWN_DOC_ID: &str = "unknown";

/// Extracts document-level metadata from markdown front matter.
///
/// A `# ` line sets `title`. Lines of the form `doc_id: ...`, `date: ...`,
/// `severity: ...`, `event_type: ...`, `tickers: ...` and `source: ...`
/// set the corresponding field. Later lines overwrite earlier ones.
#[must_use]
pub fn extract_metadata(content: &str) -> Metadata {
    let mut metadata = Metadata::new();
    for line in content.lines() {
        if let Some(title) = line.strip_prefix("# ") {
            metadata.insert("title".to_string(), title.trim().to_string());
        }
        for field in METADATA_FIELDS {
            if let Some(rest) = line.strip_prefix(field)
                && let Some(value) = rest.strip_prefix(':')
            {
                metadata.insert(field.to_string(), value.trim().to_string());
            }
        }
    }
    metadata
}

/// Splits markdown into `## `-delimited sections, trimmed, empties dropped.
fn split_sections(content: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    for (idx, _) in content.match_indices(SECTION_MARKER) {
        sections.push(&content[start..idx]);
        // Skip the newline; the section keeps its "## " heading.
        start = idx + 1;
    }
    sections.push(&content[start..]);

    sections
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Chunks a markdown document with the default size bound.
///
/// See [`chunk_markdown_with_size`].
#[must_use]
pub fn chunk_markdown(content: &str, metadata: &Metadata) -> Vec<Chunk> {
    chunk_markdown_with_size(content, metadata, DEFAULT_CHUNK_SIZE)
}

/// Chunks a markdown document into metadata-tagged segments.
///
/// A section is appended to the current buffer when the buffer length plus
/// the section length is strictly below `chunk_size` (the blank-line joiner
/// is not counted); otherwise the buffer is flushed and the section starts a
/// new one. A merged chunk is therefore at most `chunk_size + 1` characters. Section order is preserved. A document
/// with no non-empty sections yields no chunks.
///
/// Chunk IDs are `{doc_id}:chunk_{n}` (`unknown` when the metadata has no
/// `doc_id`), and each chunk's metadata also records its own `chunk_id`.
#[must_use]
pub fn chunk_markdown_with_size(content: &str, metadata: &Metadata, chunk_size: usize) -> Vec<Chunk> {
    let mut texts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for section in split_sections(content) {
        let section_len = section.chars().count();

        if current_len + section_len < chunk_size {
            if !current.is_empty() {
                current.push_str(SECTION_JOINER);
                current_len += SECTION_JOINER.len();
            }
            current.push_str(section);
            current_len += section_len;
        } else {
            if !current.is_empty() {
                texts.push(std::mem::take(&mut current));
            }
            current.push_str(section);
            current_len = section_len;
        }
    }
    if !current.trim().is_empty() {
        texts.push(current);
    }

    let doc_id = metadata
        .get("doc_id")
        .map_or(UNKNOWN_DOC_ID, String::as_str);

    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let chunk_id = Chunk::make_id(doc_id, i);
            let mut chunk_metadata = metadata.clone();
            chunk_metadata.insert("chunk_id".to_string(), chunk_id.clone());
            Chunk {
                chunk_id,
                text,
                metadata: chunk_metadata,
            }
        })
        .collect()
}

/// Classifies a document by the directory it lives in.
#[must_use]
pub fn source_type_for_dir(dir: &Path) -> &'static str {
    let dir = dir.to_string_lossy();
    if dir.contains("events") {
        "event_db"
    } else if dir.contains("methodology") {
        "methodology"
    } else if dir.contains("case_study") {
        "case_study"
    } else {
        "other"
    }
}

/// Loads every `*.md` file under `directory` and chunks it.
///
/// Files are visited in file-name order. Each document gains
/// `source_file` and `source_type` metadata; documents without a declared
/// `doc_id` use their file stem so chunk IDs stay globally unique.
///
/// # Errors
///
/// Returns [`ChunkingError::Io`] if the directory cannot be walked or a
/// file cannot be read as UTF-8.
pub fn load_and_chunk_directory(directory: &Path) -> Result<Vec<Chunk>, ChunkingError> {
    load_and_chunk_directory_with_size(directory, DEFAULT_CHUNK_SIZE)
}

/// Like [`load_and_chunk_directory`] with an explicit chunk size bound.
///
/// # Errors
///
/// Returns [`ChunkingError::Io`] on traversal or read failures.
pub fn load_and_chunk_directory_with_size(
    directory: &Path,
    chunk_size: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    let mut all_chunks = Vec::new();

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|e| ChunkingError::Io {
            path: directory.display().to_string(),
            source: e.into(),
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ChunkingError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let mut metadata = extract_metadata(&content);
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !metadata.contains_key("doc_id")
            && let Some(stem) = path.file_stem()
        {
            metadata.insert("doc_id".to_string(), stem.to_string_lossy().into_owned());
        }
        metadata.insert("source_file".to_string(), file_name);
        let source_type = path.parent().map_or("other", source_type_for_dir);
        metadata.insert("source_type".to_string(), source_type.to_string());

        let chunks = chunk_markdown_with_size(&content, &metadata, chunk_size);
        debug!(file = %path.display(), chunks = chunks.len(), source_type, "chunked document");
        all_chunks.extend(chunks);
    }

    Ok(all_chunks)
}
