//! The agent façade: history in, loop, history out.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::llm::{ModelClient, OllamaClient};
use crate::messages::{messages_to_records, Message, MessageRecord};
use crate::store::{build_store, ConversationStore};
use crate::tools::{TavilySearch, ToolRegistry};

use super::agent_loop::{AgentLoop, LoopState};
use super::AgentError;

/// Thread used when the caller does not name one.
pub const DEFAULT_THREAD_ID: &str = "default";

/// Runs conversations against a model, a tool set and a store.
///
/// `run` calls for the same thread are queued behind each other, so two
/// concurrent requests cannot both read the same history and overwrite
/// each other's turn. Different threads run fully in parallel.
pub struct SearchAgent {
    agent_loop: AgentLoop,
    store: Arc<dyn ConversationStore>,
    thread_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SearchAgent {
    pub fn new(
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        max_rounds: usize,
    ) -> Self {
        Self {
            agent_loop: AgentLoop::new(model, tools, max_rounds),
            store,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire up Ollama, Tavily and the configured store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let model = OllamaClient::new(
            config.ollama_base_url.clone(),
            config.model_name.clone(),
            config.temperature,
            config.request_timeout,
        )?;
        let search = TavilySearch::with_base_url(
            config.tavily_base_url.clone(),
            config.tavily_api_key.clone(),
            config.max_results,
            config.request_timeout,
        )?;
        let store = build_store(&config.store)?;

        Ok(Self::new(
            Arc::new(model),
            Arc::new(ToolRegistry::with_search(search)),
            store,
            config.max_rounds,
        ))
    }

    async fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.thread_locks.lock().await;
        Arc::clone(locks.entry(thread_id.to_string()).or_default())
    }

    /// Drop the thread's lock entry unless another run is queued on it.
    async fn release_thread_lock(&self, thread_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.thread_locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(thread_id);
        }
    }

    /// Answer `query` in the context of `thread_id` and persist the turn.
    ///
    /// Returns the whole serialized history of the thread. Nothing is
    /// saved if the model fails or the round limit is hit.
    pub async fn run(
        &self,
        query: &str,
        thread_id: &str,
    ) -> Result<Vec<MessageRecord>, AgentError> {
        if thread_id.trim().is_empty() {
            return Err(AgentError::InvalidInput(
                "thread_id must not be empty".to_string(),
            ));
        }

        let lock = self.thread_lock(thread_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_locked(query, thread_id).await
        };
        self.release_thread_lock(thread_id, lock).await;
        result
    }

    async fn run_locked(
        &self,
        query: &str,
        thread_id: &str,
    ) -> Result<Vec<MessageRecord>, AgentError> {
        let mut messages = self.store.load(thread_id).await?;
        let prior = messages.len();
        messages.push(Message::human(query));

        tracing::info!(thread_id = %thread_id, prior_messages = prior, "Running agent");

        let outcome = self.agent_loop.run(LoopState::new(messages)).await?;
        self.store.save(thread_id, &outcome.state.messages).await?;

        tracing::info!(
            thread_id = %thread_id,
            rounds = outcome.rounds,
            messages = outcome.state.messages.len(),
            "Agent run complete"
        );

        Ok(messages_to_records(&outcome.state.messages))
    }

    /// Serialized history of a thread; empty if unknown.
    pub async fn get_conversation(
        &self,
        thread_id: &str,
    ) -> Result<Vec<MessageRecord>, AgentError> {
        let messages = self.store.load(thread_id).await?;
        Ok(messages_to_records(&messages))
    }

    /// All known thread ids.
    pub async fn list_conversations(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.store.list_threads().await?)
    }

    pub fn store_is_persistent(&self) -> bool {
        self.store.is_persistent()
    }
}
