//! The per-type capability trait and the contexts it runs in.
//!
//! Every I/O type is one `IoKind`: it knows how to synthesize a pool of
//! representative values and how to check a value a model returned. Both
//! operations see the whole schema, not just their own field, because
//! selections and probability distributions validate against *another*
//! field's configuration or data.

use rand::RngCore;
use serde_json::Value;

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::SyntheticExample,
    schema::{Collection, FieldDef, IoType, TaskSchema},
    verify::Tolerances,
};

use crate::{cache::PoolCache, registry::TypeRegistry};

/// One I/O type's generator and verifier.
pub trait IoKind: Send + Sync {
    /// The type this capability implements.
    fn io_type(&self) -> IoType;

    /// Produce the mock-data pool for `field`.
    fn generate(&self, field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>>;

    /// Check a returned value. `Err` carries a human-readable reason.
    fn verify(&self, value: &Value, field: &FieldDef, ctx: &VerifyContext<'_>) -> Result<(), String>;
}

/// What a generator may consult while building a pool.
pub struct PoolContext<'a> {
    pub schema: &'a TaskSchema,
    /// The collection the field being generated belongs to; references
    /// resolve relative to it.
    pub collection: Collection,
    pub registry: &'a TypeRegistry,
    pub cache: &'a mut PoolCache,
    pub rng: &'a mut dyn RngCore,
}

impl PoolContext<'_> {
    /// The field `field` references.
    pub fn referent(&self, field: &FieldDef) -> TaskIoResult<&FieldDef> {
        self.schema
            .referent(self.collection, &field.name)
            .map(|(_, def)| def)
            .ok_or_else(|| TaskIoError::MissingReference {
                field: field.name.clone(),
                reference: field.reference().unwrap_or_default().to_string(),
            })
    }

    /// The pool generated for the referenced field's type, computing it
    /// through the shared cache if needed.
    pub fn referent_pool(&mut self, field: &FieldDef) -> TaskIoResult<Vec<Value>> {
        let schema = self.schema;
        let (key, referent) = schema
            .referent(self.collection, &field.name)
            .ok_or_else(|| TaskIoError::MissingReference {
                field: field.name.clone(),
                reference: field.reference().unwrap_or_default().to_string(),
            })?;
        let pool = self.cache.pool_for(
            schema,
            self.registry,
            key.collection,
            referent,
            &mut *self.rng,
        )?;
        Ok(pool.to_vec())
    }
}

/// What a verifier may consult while checking one value.
pub struct VerifyContext<'a> {
    pub schema: &'a TaskSchema,
    /// The collection of the field being verified (normally `Output`).
    pub collection: Collection,
    /// The example the response answers.
    pub example: &'a SyntheticExample,
    pub tolerances: &'a Tolerances,
}

impl VerifyContext<'_> {
    pub fn referent(&self, field: &FieldDef) -> Result<&FieldDef, String> {
        self.schema
            .referent(self.collection, &field.name)
            .map(|(_, def)| def)
            .ok_or_else(|| format!("reference of '{}' is unresolved", field.name))
    }
}
