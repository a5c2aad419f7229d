//! Policy/handler registry (spec.md §4.10 as supplemented; CRUD over this
//! registry is out of scope per spec.md's Non-goals, only lookup/render is
//! needed here).
//!
//! A `Policy` owns a name and a set of named handlers, each a trait object
//! so `PolicyManager`/the HTTP layer can render window/bucket/Prometheus
//! views without knowing which concrete handler (DNS, flow, net) it holds.
//! `PolicyManager` follows the teacher's registry pattern: a
//! `parking_lot::RwLock<HashMap<...>>`, write-locked only for membership
//! changes, read-locked only for the span of a single `get`/render call
//! (spec.md §5 "scoped handle holding a shared lock for the duration of its
//! use").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CoreError;
use crate::handlers::{DnsHandler, FlowHandler, NetHandler};
use crate::metric::LabelMap;

/// Common rendering surface every concrete handler exposes, so a `Policy`
/// can hold a mix of DNS/flow/net handlers behind one vtable.
pub trait Handler: Send + Sync {
    fn rotate(&mut self);
    fn available_windows(&self) -> usize;

    /// Merged view of the most recent `n` periods (spec.md §6 `window/{N}`).
    fn render_window_json(&self, n: usize) -> Result<serde_json::Value, CoreError>;
    fn render_window_prometheus(&self, n: usize, labels: &LabelMap) -> Result<String, CoreError>;

    /// Single bucket `age` periods back (spec.md §6 `bucket/{N}`).
    fn render_bucket_json(&self, age: usize) -> Result<serde_json::Value, CoreError>;
}

fn window_to_age(n: usize) -> usize {
    n.saturating_sub(1)
}

impl Handler for DnsHandler {
    fn rotate(&mut self) {
        DnsHandler::rotate(self);
    }

    fn available_windows(&self) -> usize {
        self.period.available()
    }

    fn render_window_json(&self, n: usize) -> Result<serde_json::Value, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(serde_json::Value::Object(merged.metrics.to_json()))
    }

    fn render_window_prometheus(&self, n: usize, labels: &LabelMap) -> Result<String, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(merged.metrics.to_prometheus(labels))
    }

    fn render_bucket_json(&self, age: usize) -> Result<serde_json::Value, CoreError> {
        let bucket = self.period.bucket(age).ok_or(CoreError::WindowTooEarly {
            requested: age + 1,
            available: self.period.available(),
        })?;
        Ok(serde_json::Value::Object(bucket.read().metrics.to_json()))
    }
}

impl Handler for FlowHandler {
    fn rotate(&mut self) {
        FlowHandler::rotate(self);
    }

    fn available_windows(&self) -> usize {
        self.period.available()
    }

    fn render_window_json(&self, n: usize) -> Result<serde_json::Value, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(merged.metrics.to_json())
    }

    fn render_window_prometheus(&self, n: usize, labels: &LabelMap) -> Result<String, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(merged.metrics.to_prometheus(labels))
    }

    fn render_bucket_json(&self, age: usize) -> Result<serde_json::Value, CoreError> {
        let bucket = self.period.bucket(age).ok_or(CoreError::WindowTooEarly {
            requested: age + 1,
            available: self.period.available(),
        })?;
        Ok(bucket.read().metrics.to_json())
    }
}

impl Handler for NetHandler {
    fn rotate(&mut self) {
        NetHandler::rotate(self);
    }

    fn available_windows(&self) -> usize {
        self.period.available()
    }

    fn render_window_json(&self, n: usize) -> Result<serde_json::Value, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(serde_json::Value::Object(merged.metrics.to_json()))
    }

    fn render_window_prometheus(&self, n: usize, labels: &LabelMap) -> Result<String, CoreError> {
        let merged = self.period.merge_range(0, window_to_age(n))?;
        Ok(merged.metrics.to_prometheus(labels))
    }

    fn render_bucket_json(&self, age: usize) -> Result<serde_json::Value, CoreError> {
        let bucket = self.period.bucket(age).ok_or(CoreError::WindowTooEarly {
            requested: age + 1,
            available: self.period.available(),
        })?;
        Ok(serde_json::Value::Object(bucket.read().metrics.to_json()))
    }
}

/// A named graph of handlers sharing one tap's traffic (spec.md §3 "named
/// handler graphs").
pub struct Policy {
    pub name: String,
    handlers: RwLock<HashMap<String, Box<dyn Handler>>>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_handler(&self, name: impl Into<String>, handler: Box<dyn Handler>) {
        self.handlers.write().insert(name.into(), handler);
    }

    pub fn rotate_all(&self) {
        for handler in self.handlers.write().values_mut() {
            handler.rotate();
        }
    }

    /// Merged window across every handler, keyed by handler name.
    pub fn render_window_json(&self, n: usize) -> Result<serde_json::Value, CoreError> {
        let handlers = self.handlers.read();
        let mut out = serde_json::Map::new();
        for (name, handler) in handlers.iter() {
            out.insert(name.clone(), handler.render_window_json(n)?);
        }
        Ok(serde_json::Value::Object(out))
    }

    pub fn render_window_prometheus(&self, n: usize, labels: &LabelMap) -> Result<String, CoreError> {
        let handlers = self.handlers.read();
        let mut out = String::new();
        for handler in handlers.values() {
            out.push_str(&handler.render_window_prometheus(n, labels)?);
        }
        Ok(out)
    }

    pub fn render_bucket_json(&self, age: usize) -> Result<serde_json::Value, CoreError> {
        let handlers = self.handlers.read();
        let mut out = serde_json::Map::new();
        for (name, handler) in handlers.iter() {
            out.insert(name.clone(), handler.render_bucket_json(age)?);
        }
        Ok(serde_json::Value::Object(out))
    }
}

/// Registry of policies (spec.md §4.10). Membership changes take the write
/// lock; `get` takes the read lock only for the duration of the clone.
#[derive(Default)]
pub struct PolicyManager {
    policies: RwLock<HashMap<String, Arc<Policy>>>,
}

impl PolicyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, policy: Policy) -> Result<(), CoreError> {
        let mut policies = self.policies.write();
        if policies.contains_key(&policy.name) {
            return Err(CoreError::DuplicatePolicy(policy.name));
        }
        policies.insert(policy.name.clone(), Arc::new(policy));
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<(), CoreError> {
        self.policies
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::PolicyNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<Arc<Policy>, CoreError> {
        self.policies
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::PolicyNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.policies.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowConfig;

    #[test]
    fn add_and_get_round_trips() {
        let manager = PolicyManager::new();
        manager.add(Policy::new("default")).unwrap();
        assert_eq!(manager.get("default").unwrap().name, "default");
    }

    #[test]
    fn duplicate_add_errors() {
        let manager = PolicyManager::new();
        manager.add(Policy::new("default")).unwrap();
        let err = manager.add(Policy::new("default")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePolicy(_)));
    }

    #[test]
    fn missing_get_errors() {
        let manager = PolicyManager::new();
        let err = manager.get("nope").unwrap_err();
        assert!(matches!(err, CoreError::PolicyNotFound(_)));
    }

    #[test]
    fn render_window_json_nests_by_handler_name() {
        let policy = Policy::new("default");
        policy.add_handler("net", Box::new(NetHandler::new(WindowConfig::default())));
        let rendered = policy.render_window_json(1).unwrap();
        assert!(rendered.get("net").is_some());
    }

    #[test]
    fn render_bucket_beyond_available_is_window_too_early() {
        let policy = Policy::new("default");
        policy.add_handler("net", Box::new(NetHandler::new(WindowConfig::default())));
        let err = policy.render_bucket_json(5).unwrap_err();
        assert!(matches!(err, CoreError::WindowTooEarly { .. }));
    }
}
