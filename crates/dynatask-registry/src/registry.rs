//! Type-name → capability dispatch.
//!
//! The registry is closed: `TypeRegistry::builtin()` holds exactly one
//! `IoKind` per `IoType`. `register` exists so tests and embedders can swap
//! a capability out, not to grow the type set at runtime.

use std::collections::HashMap;

use tracing::debug;

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    schema::{FieldDef, IoType},
};

use crate::{
    kind::IoKind,
    kinds::{
        ConfKind, ContextSelectionKind, ImageKind, LabelKind, MulticlassProbsKind, MultilabelKind,
        StringKind,
    },
};

pub struct TypeRegistry {
    kinds: HashMap<IoType, Box<dyn IoKind>>,
}

impl TypeRegistry {
    /// A registry with nothing registered. Every lookup fails.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// The registry of every built-in I/O type.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(StringKind));
        registry.register(Box::new(ImageKind));
        registry.register(Box::new(ContextSelectionKind));
        registry.register(Box::new(ConfKind));
        registry.register(Box::new(MulticlassProbsKind));
        registry.register(Box::new(LabelKind::multiclass()));
        registry.register(Box::new(LabelKind::target_label()));
        registry.register(Box::new(MultilabelKind));
        registry
    }

    /// Install `kind` under its own type, replacing any previous capability.
    pub fn register(&mut self, kind: Box<dyn IoKind>) {
        let io_type = kind.io_type();
        if self.kinds.insert(io_type, kind).is_some() {
            debug!(io_type = %io_type, "replaced registered I/O type");
        }
    }

    /// The capability for `field`'s type.
    pub fn lookup(&self, field: &FieldDef) -> TaskIoResult<&dyn IoKind> {
        self.kinds
            .get(&field.io_type)
            .map(|kind| &**kind)
            .ok_or_else(|| TaskIoError::UnknownType {
                field: field.name.clone(),
                type_name: field.io_type.to_string(),
            })
    }

    pub fn contains(&self, io_type: IoType) -> bool {
        self.kinds.contains_key(&io_type)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
