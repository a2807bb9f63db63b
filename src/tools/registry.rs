//! Tool registry: the name → handler map the front-end dispatches through.
//!
//! Provides:
//! - Registration of static and proxied tools (last write wins, logged)
//! - Snapshot lookups that never hold the lock across an `.await`
//! - Sorted catalog snapshots for `tools/list`

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::BoxFuture;
use serde_json::Value;

use super::types::{ToolCallError, ToolDescriptor, ToolOutcome};

// ─── Handlers ────────────────────────────────────────────────────────────────

/// Something that can execute a tool call.
pub trait ToolHandler: Send + Sync {
    /// Run the tool with the given parameters.
    fn invoke(&self, params: Value) -> BoxFuture<'static, ToolOutcome>;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = ToolOutcome> + Send + 'static,
{
    fn invoke(&self, params: Value) -> BoxFuture<'static, ToolOutcome> {
        Box::pin((self)(params))
    }
}

/// Where a registered tool came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Implemented inside the bridge itself.
    Static,
    /// Forwarded to the target process.
    Proxy,
}

/// One registered tool.
#[derive(Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub descriptor: Arc<ToolDescriptor>,
    pub origin: ToolOrigin,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

/// Concurrency-safe registry of every tool the bridge exposes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegistryEntry>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("registered", &self.tool_names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RegistryEntry>> {
        self.tools.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RegistryEntry>> {
        self.tools.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (or replace) a tool under its descriptor's name.
    ///
    /// A name collision replaces the existing entry and logs a warning.
    pub fn register_tool(
        &self,
        descriptor: Arc<ToolDescriptor>,
        origin: ToolOrigin,
        handler: Arc<dyn ToolHandler>,
    ) -> RegistryEntry {
        let entry = RegistryEntry {
            name: descriptor.name.clone(),
            descriptor,
            origin,
            handler,
        };

        let previous = self.write().insert(entry.name.clone(), entry.clone());

        match previous {
            Some(old) => tracing::warn!(
                tool = %entry.name,
                previous_origin = ?old.origin,
                new_origin = ?entry.origin,
                "tool name collision, replacing existing registration"
            ),
            None => tracing::debug!(tool = %entry.name, origin = ?entry.origin, "tool registered"),
        }

        entry
    }

    /// Register a tool implemented inside the bridge.
    pub fn register_static<H>(&self, descriptor: ToolDescriptor, handler: H) -> RegistryEntry
    where
        H: ToolHandler + 'static,
    {
        self.register_tool(Arc::new(descriptor), ToolOrigin::Static, Arc::new(handler))
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<RegistryEntry> {
        self.read().get(name).cloned()
    }

    /// Snapshot of every descriptor, sorted by name.
    pub fn list_all(&self) -> Vec<Arc<ToolDescriptor>> {
        let mut descriptors: Vec<Arc<ToolDescriptor>> = self
            .read()
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Sorted tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a tool by name.
    ///
    /// The handler is cloned out of the lock before it runs, so slow calls
    /// never block registration.
    pub async fn invoke(&self, name: &str, params: Value) -> ToolOutcome {
        let entry = self
            .lookup(name)
            .ok_or_else(|| ToolCallError::unknown_tool(name))?;
        entry.handler.invoke(params).await
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Count tools of one origin.
    pub fn count_by_origin(&self, origin: ToolOrigin) -> usize {
        self.read().values().filter(|e| e.origin == origin).count()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
