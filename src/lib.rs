//! # Search Agent
//!
//! A conversational agent that answers questions with a language model and
//! a web search tool, remembering each conversation thread across requests.
//!
//! This library provides:
//! - A tool-calling agent loop with a round limit
//! - Per-thread conversation storage (in memory or SQLite)
//! - An HTTP API for chatting and browsing stored threads
//! - Adapters for Ollama (model) and Tavily (search)
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Load the thread's history and append the user's message
//! 2. Call the model with the available tools
//! 3. Execute any requested tool calls and feed the results back
//! 4. Repeat until the model answers, then save the history
//!
//! ## Example
//!
//! ```rust,ignore
//! use search_agent::{agent::SearchAgent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = SearchAgent::from_config(&config)?;
//! let messages = agent.run("What is the capital of France?", "t1").await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod messages;
pub mod store;
pub mod tools;

pub use config::Config;
