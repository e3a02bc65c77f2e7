//! Registered recompute functions.
//!
//! The route layer registers, at startup, the function able to rebuild each
//! cached query. Lookups try exact keys first, then patterns in
//! registration order.

use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::matcher::Pattern;
use crate::cache::Category;
use crate::error::Result;

/// Produces a fresh value for a key.
#[async_trait]
pub trait Recompute: Send + Sync {
    async fn recompute(&self, key: &str) -> anyhow::Result<Value>;

    /// TTL class for a freshly computed value of `key`.
    fn category(&self, _key: &str) -> Category {
        Category::Standard
    }
}

#[async_trait]
impl<F, Fut> Recompute for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn recompute(&self, key: &str) -> anyhow::Result<Value> {
        (self)(key.to_string()).await
    }
}

/// Wraps a recompute with a fixed category.
pub struct WithCategory<R> {
    inner: R,
    category: Category,
}

impl<R: Recompute> WithCategory<R> {
    pub fn new(inner: R, category: Category) -> Self {
        Self { inner, category }
    }
}

#[async_trait]
impl<R: Recompute> Recompute for WithCategory<R> {
    async fn recompute(&self, key: &str) -> anyhow::Result<Value> {
        self.inner.recompute(key).await
    }

    fn category(&self, _key: &str) -> Category {
        self.category
    }
}

type Registration = (Pattern, Arc<dyn Recompute>);

/// Maps keys and key patterns to recompute functions.
#[derive(Default)]
pub struct KeyRegistry {
    exact: DashMap<String, Arc<dyn Recompute>>,
    patterns: RwLock<Vec<Registration>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `recompute` for a key or pattern.
    ///
    /// Plain strings register an exact key and also act as a substring
    /// pattern; strings with regex metacharacters register a pattern only.
    /// Re-registering the same exact key replaces the previous function.
    pub fn register<R>(&self, pattern_or_key: &str, recompute: R) -> Result<()>
    where
        R: Recompute + 'static,
    {
        self.register_arc(pattern_or_key, Arc::new(recompute))
    }

    pub fn register_arc(&self, pattern_or_key: &str, recompute: Arc<dyn Recompute>) -> Result<()> {
        let pattern = Pattern::compile(pattern_or_key)?;
        if matches!(pattern, Pattern::Substring(_)) {
            self.exact.insert(pattern_or_key.to_string(), Arc::clone(&recompute));
        }
        let mut patterns = match self.patterns.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op = "register", "Recovered from poisoned registry lock");
                poisoned.into_inner()
            }
        };
        patterns.push((pattern, recompute));
        debug!(pattern = pattern_or_key, "Recompute registered");
        Ok(())
    }

    /// Finds the recompute function for a key.
    pub fn find_recompute(&self, key: &str) -> Option<Arc<dyn Recompute>> {
        if let Some(found) = self.exact.get(key) {
            return Some(Arc::clone(found.value()));
        }
        let patterns = match self.patterns.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(key))
            .map(|(_, recompute)| Arc::clone(recompute))
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        match self.patterns.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: Value) -> impl Recompute {
        move |_key: String| {
            let value = value.clone();
            async move { Ok::<_, anyhow::Error>(value) }
        }
    }

    #[tokio::test]
    async fn test_exact_registration() {
        let registry = KeyRegistry::new();
        registry.register("stats:2024-01", constant(json!("A"))).unwrap();

        let recompute = registry.find_recompute("stats:2024-01").unwrap();
        assert_eq!(recompute.recompute("stats:2024-01").await.unwrap(), json!("A"));
        assert_eq!(recompute.category("stats:2024-01"), Category::Standard);
    }

    #[tokio::test]
    async fn test_pattern_registration() {
        let registry = KeyRegistry::new();
        registry
            .register("^crimes:.*", |key: String| async move { Ok::<_, anyhow::Error>(json!({ "key": key })) })
            .unwrap();

        let recompute = registry.find_recompute("crimes:2024-01").unwrap();
        assert_eq!(
            recompute.recompute("crimes:2024-01").await.unwrap(),
            json!({ "key": "crimes:2024-01" })
        );
        assert!(registry.find_recompute("stats:2024-01").is_none());
    }

    #[tokio::test]
    async fn test_exact_wins_over_pattern() {
        let registry = KeyRegistry::new();
        registry.register("^stats:", constant(json!("pattern"))).unwrap();
        registry.register("stats:summary", constant(json!("exact"))).unwrap();

        let recompute = registry.find_recompute("stats:summary").unwrap();
        assert_eq!(recompute.recompute("stats:summary").await.unwrap(), json!("exact"));

        let recompute = registry.find_recompute("stats:2023-12").unwrap();
        assert_eq!(recompute.recompute("stats:2023-12").await.unwrap(), json!("pattern"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let registry = KeyRegistry::new();
        assert!(registry.register("crimes:[", constant(json!(0))).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_category() {
        let registry = KeyRegistry::new();
        registry
            .register("2019-", WithCategory::new(constant(json!(0)), Category::Historical))
            .unwrap();

        let recompute = registry.find_recompute("crimes:2019-04").unwrap();
        assert_eq!(recompute.category("crimes:2019-04"), Category::Historical);
    }
}
