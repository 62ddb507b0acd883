use std::sync::Arc;

use async_trait::async_trait;
use citywords_proto::WorkerEvent;
use citywords_store::{
    CityStoreApi, GameSessionStoreApi, GameSettingsApi, TeamStoreApi, UserStoreApi, WordStoreApi,
};

use citywords_proto::SenderCommand;

/// Thin seam over the dictionary HTTP client so the state machine can be
/// exercised with a fake in tests instead of a live network call.
#[async_trait]
pub trait DictionaryApi: Send + Sync {
    async fn is_noun(&self, word: &str) -> anyhow::Result<bool>;
}

/// A side effect the state machine wants carried out: either a command for
/// the sender to execute, or a self-addressed follow-up event the worker
/// should receive again later (optionally delayed).
#[derive(Debug, Clone)]
pub enum Effect {
    Send(SenderCommand),
    SelfEvent {
        event: WorkerEvent,
        delay_ms: Option<u64>,
    },
}

/// The Worker's dependency bundle, collapsed into one struct with the Cities
/// and Words logic implemented as separate `impl` blocks (see `cities.rs`
/// and `words.rs`) rather than as a mixin hierarchy.
pub struct GameEngine {
    pub users: Arc<dyn UserStoreApi>,
    pub sessions: Arc<dyn GameSessionStoreApi>,
    pub team: Arc<dyn TeamStoreApi>,
    pub cities: Arc<dyn CityStoreApi>,
    pub words: Arc<dyn WordStoreApi>,
    pub settings: Arc<dyn GameSettingsApi>,
    pub dictionary: Arc<dyn DictionaryApi>,
}

impl GameEngine {
    pub fn new(
        users: Arc<dyn UserStoreApi>,
        sessions: Arc<dyn GameSessionStoreApi>,
        team: Arc<dyn TeamStoreApi>,
        cities: Arc<dyn CityStoreApi>,
        words: Arc<dyn WordStoreApi>,
        settings: Arc<dyn GameSettingsApi>,
        dictionary: Arc<dyn DictionaryApi>,
    ) -> Self {
        Self {
            users,
            sessions,
            team,
            cities,
            words,
            settings,
            dictionary,
        }
    }
}
