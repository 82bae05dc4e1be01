// ABOUTME: Process-wide cache of struct field maps and the class-name registration table.
// ABOUTME: Each type's field map is built at most once, even when sessions race to first use it.

use crate::object::{FieldMap, Object};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

type Cell = Arc<OnceLock<Arc<dyn Any + Send + Sync>>>;

/// A class registered under a wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

/// Field maps and class registrations shared by decode sessions.
///
/// Sessions use [`Registry::global`] unless given another one with
/// [`Decoder::with_registry`](crate::Decoder::with_registry).
#[derive(Default)]
pub struct Registry {
    field_maps: RwLock<HashMap<TypeId, Cell>>,
    classes: RwLock<HashMap<String, ClassType>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    /// The field map for `T`, built on first use.
    pub fn fields<T: Object>(&self) -> Arc<FieldMap<T>> {
        let id = TypeId::of::<T>();
        let existing = self.field_maps.read().get(&id).cloned();
        let cell = existing.unwrap_or_else(|| self.field_maps.write().entry(id).or_default().clone());
        let map = cell
            .get_or_init(|| {
                let map = FieldMap::<T>::build();
                debug!(
                    class = T::class_name(),
                    fields = map.len(),
                    "field map built"
                );
                Arc::new(map) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        map.downcast::<FieldMap<T>>()
            .unwrap_or_else(|_| Arc::new(FieldMap::build()))
    }

    /// Number of field maps cached so far.
    #[must_use]
    pub fn field_map_count(&self) -> usize {
        self.field_maps
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Register `T` under its own class name and build its field map.
    pub fn register<T: Object>(&self) {
        self.register_as::<T>(T::class_name());
    }

    /// Register `T` under `name` and build its field map.
    pub fn register_as<T: Object>(&self, name: &str) {
        let class = ClassType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        };
        debug!(class = name, type_name = class.type_name, "class registered");
        self.classes.write().insert(name.to_string(), class);
        self.fields::<T>();
    }

    /// The type registered under `name`.
    #[must_use]
    pub fn class_type(&self, name: &str) -> Option<ClassType> {
        self.classes.read().get(name).copied()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }
}
