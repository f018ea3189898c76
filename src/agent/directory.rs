//! Directory service for agent capabilities
//!
//! The directory maps instance names (e.g. `DF/MIRADASDFAgent`) to live agent
//! capabilities. Middleware bindings implement [`NameService`]; the in-memory
//! [`InMemoryNameService`] backs simulated runs and tests.

use super::DataFactoryAgent;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Capability: name resolution
#[async_trait]
pub trait NameService: Send + Sync {
    /// Resolve an instance name to an agent capability.
    ///
    /// Fails if the name is not registered or the service itself is unreachable.
    async fn resolve(&self, instance_name: &str) -> Result<Arc<dyn DataFactoryAgent>>;
}

/// In-process directory of registered agents.
#[derive(Default)]
pub struct InMemoryNameService {
    entries: RwLock<HashMap<String, Arc<dyn DataFactoryAgent>>>,
}

impl InMemoryNameService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an agent under `instance_name`.
    pub async fn register(
        &self,
        instance_name: impl Into<String>,
        agent: Arc<dyn DataFactoryAgent>,
    ) {
        self.entries.write().await.insert(instance_name.into(), agent);
    }
}

#[async_trait]
impl NameService for InMemoryNameService {
    async fn resolve(&self, instance_name: &str) -> Result<Arc<dyn DataFactoryAgent>> {
        self.entries
            .read()
            .await
            .get(instance_name)
            .cloned()
            .ok_or_else(|| anyhow!("'{instance_name}' is not registered"))
    }
}
