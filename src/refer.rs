// ABOUTME: Session-scoped table of decoded composite values addressed by back-reference index.
// ABOUTME: Containers reserve their slot before decoding children so indices follow wire order.

use crate::value::Value;
use std::any::Any;
use std::rc::Rc;
use tracing::trace;

/// One registered value.
#[derive(Clone)]
pub enum Reference {
    /// Slot reserved by a container whose elements are still being decoded.
    Pending,
    /// Slot of a dynamic container under construction; references resolve to this back edge.
    Building(Value),
    /// A fully decoded value in its dynamic form.
    Value(Rc<Value>),
    /// A value decoded into a shared handle, kept so later references return the same handle.
    Shared {
        /// The shared handle, type-erased.
        handle: Rc<dyn Any>,
        /// The same value in dynamic form, for destinations of another type.
        value: Rc<Value>,
    },
}

impl Reference {
    /// The dynamic form of the referenced value, unless the slot is still being filled.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Reference::Pending | Reference::Building(_) => None,
            Reference::Value(v) | Reference::Shared { value: v, .. } => Some(v),
        }
    }
}

/// Append-only reference table.
///
/// When disabled (simple mode) registration is a no-op and
/// [`last_index`](Self::last_index) reports `None`.
#[derive(Default)]
pub struct ReferenceTable {
    entries: Vec<Reference>,
    disabled: bool,
}

impl ReferenceTable {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Vec::new(),
            disabled: !enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.disabled = !enabled;
    }

    /// Append a value and return its index.
    pub fn add(&mut self, entry: Reference) -> Option<usize> {
        if self.disabled {
            return None;
        }
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        trace!(index, "reference registered");
        Some(index)
    }

    /// Reserve the next index for a container about to decode its elements.
    pub fn reserve(&mut self) -> Option<usize> {
        self.add(Reference::Pending)
    }

    /// Overwrite a previously registered slot.
    pub fn set(&mut self, index: usize, entry: Reference) {
        if self.disabled {
            return;
        }
        if let Some(slot) = self.entries.get_mut(index) {
            *slot = entry;
        }
    }

    /// Index of the most recent entry, or `None` if tracking is disabled or nothing is registered.
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        if self.disabled {
            return None;
        }
        self.entries.len().checked_sub(1)
    }

    #[must_use]
    pub fn read(&self, index: usize) -> Option<&Reference> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
