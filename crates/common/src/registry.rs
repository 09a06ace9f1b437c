use std::collections::BTreeMap;

use crate::{Error, Result};

/// Name → factory lookup, filled explicitly at process start.
///
/// `F` is whatever constructor shape the plugin kind needs, typically a
/// `fn(...) -> Result<Arc<dyn Trait>>`.
pub struct Registry<F> {
    kind: &'static str,
    factories: BTreeMap<String, F>,
}

impl<F> Registry<F> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: F) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn get(&self, name: &str) -> Result<&F> {
        self.factories.get(name).ok_or_else(|| Error::PluginNotFound {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
