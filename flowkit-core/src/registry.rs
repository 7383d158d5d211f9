//! Component registry: the process-wide catalog of prototypes.
//!
//! The registry stores one prototype per component name and hands out fresh
//! instances on demand. Registration is explicit — a host populates the
//! registry at startup rather than relying on process-init side effects.

use crate::component::{Component, ComponentInfo};
use crate::error::{FlowError, Result};
use std::any::TypeId;
use std::collections::HashMap;

struct Entry {
    type_id: TypeId,
    prototype: Box<dyn Component>,
}

/// A catalog of component prototypes keyed by [`ComponentInfo::name`].
#[derive(Default)]
pub struct ComponentRegistry {
    entries: HashMap<String, Entry>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type under its own declared name.
    ///
    /// Re-registering the same type is a no-op; a different type under the
    /// same name is a [`FlowError::RegistryConflict`] — that is a wiring
    /// bug a host should treat as fatal.
    pub fn register<C: Component + Default + 'static>(&mut self) -> Result<()> {
        let prototype = C::default();
        let name = prototype.info().name;
        let type_id = TypeId::of::<C>();

        if let Some(existing) = self.entries.get(&name) {
            if existing.type_id == type_id {
                return Ok(());
            }
            return Err(FlowError::RegistryConflict { name });
        }

        tracing::debug!(component = %name, "registered component prototype");
        self.entries.insert(
            name,
            Entry {
                type_id,
                prototype: Box::new(prototype),
            },
        );
        Ok(())
    }

    /// Create a fresh instance of the named component.
    pub fn instance(&self, name: &str) -> Result<Box<dyn Component>> {
        self.entries
            .get(name)
            .map(|entry| entry.prototype.instance())
            .ok_or_else(|| FlowError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    /// Whether a prototype is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Descriptors of every registered prototype.
    pub fn infos(&self) -> Vec<ComponentInfo> {
        let mut infos: Vec<_> = self
            .entries
            .values()
            .map(|entry| entry.prototype.info())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Number of registered prototypes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
