use crate::library::LibraryStore;
use std::sync::Arc;
use std::time::Instant;

use super::token::TokenCodec;
use super::ServerConfig;

pub type GuardedLibraryStore = Arc<dyn LibraryStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedLibraryStore,
    pub token_codec: Arc<TokenCodec>,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: GuardedLibraryStore, token_codec: TokenCodec) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            token_codec: Arc::new(token_codec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_store::CountingStore;

    #[test]
    fn clones_share_store_and_token_codec() {
        let store: GuardedLibraryStore = Arc::new(CountingStore::new());
        let state = ServerState::new(
            ServerConfig::default(),
            store.clone(),
            TokenCodec::new("0123456789abcdef0123456789abcdef"),
        );
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.store, &cloned.store));
        assert!(Arc::ptr_eq(&state.store, &store));
        assert!(Arc::ptr_eq(&state.token_codec, &cloned.token_codec));

        let token = state.token_codec.issue(7).unwrap();
        assert_eq!(cloned.token_codec.verify(&token).unwrap(), 7);
    }
}
