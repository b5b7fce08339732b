//! # nexus-rs
//!
//! Grounded research assistant for export-control case studies.
//!
//! A question is answered in three steps: relevant chunks of a markdown
//! knowledge base are retrieved from a local vector index, a chat model
//! (`OpenAI`, Gemini or Anthropic) reasons over them and may call
//! quantitative analysis tools, and the final answer is returned together
//! with the chunk IDs it can cite.
//!
//! ## Modules
//!
//! - [`chunking`]: markdown documents to bounded, metadata-tagged chunks
//! - [`embedding`]: text embedding backends
//! - [`storage`]: persistent `SQLite` vector index
//! - [`retrieval`]: index builds, similarity search, prompt context
//! - [`agent`]: provider adapters, routing, the tool-calling loop
//! - [`tools`]: price, event-study, volatility and ecosystem tools
//! - [`cli`]: the `nexus` command line
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nexus_rs::agent::{AgentConfig, Orchestrator, create_client};
//! use nexus_rs::embedding::create_embedder;
//! use nexus_rs::retrieval::Retriever;
//! use nexus_rs::storage::SqliteVectorStore;
//! use nexus_rs::tools::{MarketData, default_registry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let store = Arc::new(SqliteVectorStore::open(".nexus/index.db")?);
//! let retriever = Retriever::new(store, create_embedder());
//! let tools = default_registry(&Arc::new(MarketData::load("data".as_ref())?));
//!
//! let orchestrator = Orchestrator::new(create_client(&config)?, Some(retriever), tools, &config);
//! let reply = orchestrator.run_agent("How did NVDA react to the October 2022 rules?", &[]).await?;
//! println!("{}\n{:?}", reply.response, reply.citations);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod core;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod storage;
pub mod tools;

pub use agent::{AgentConfig, AgentReply, ChatClient, Orchestrator, ProviderKind};
pub use core::{Chunk, Hit, Metadata};
pub use error::{Error, Result};
pub use retrieval::{RetrievalFilters, Retriever, build_index};
pub use storage::{SqliteVectorStore, VectorStore};
