//! Registry of named ASR providers.
//!
//! Built once at start-up and shared with the HTTP layer. Lookups are concurrent
//! reads; registration takes the write lock.

use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::AsrProvider;

/// Thread-safe directory of provider adapters keyed by name
#[derive(Default)]
pub struct AsrRegistry {
    providers: RwLock<HashMap<String, Arc<dyn AsrProvider>>>,
}

impl AsrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under `name`.
    ///
    /// Registering a name twice keeps the first adapter and returns `false`.
    pub async fn register(&self, name: &str, provider: Arc<dyn AsrProvider>) -> bool {
        let mut providers = self.providers.write().await;
        if providers.contains_key(name) {
            info!("ASR provider [{}] already registered, skipping", name);
            return false;
        }
        providers.insert(name.to_string(), provider);
        info!("ASR provider [{}] registered", name);
        true
    }

    /// Resolve a provider by name. `None` means the name is unknown.
    pub async fn lookup(&self, name: &str) -> Option<Arc<dyn AsrProvider>> {
        self.providers.read().await.get(name).cloned()
    }

    /// Registered provider names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::AsrError;
    use async_trait::async_trait;

    struct FixedText(&'static str);

    #[async_trait]
    impl AsrProvider for FixedText {
        async fn recognize(&self, _audio: &[u8]) -> Result<String, AsrError> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_lookup_unknown_provider() {
        let registry = AsrRegistry::new();
        assert!(registry.lookup("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let registry = AsrRegistry::new();
        assert!(registry.register("x", Arc::new(FixedText("first"))).await);
        assert!(!registry.register("x", Arc::new(FixedText("second"))).await);

        let provider = registry.lookup("x").await.expect("provider registered");
        assert_eq!(provider.recognize(b"").await.unwrap(), "first");
        assert_eq!(registry.names().await, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(AsrRegistry::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .register(&format!("p{}", i % 4), Arc::new(FixedText("t")))
                    .await
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 4);
        assert_eq!(registry.names().await.len(), 4);
    }
}
