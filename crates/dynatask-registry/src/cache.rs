//! Run-scoped memoization of mock-data pools.
//!
//! Pools are keyed by type, not by field: the first field of a type to be
//! generated fixes the pool every later field of that type indexes into.
//! A cache lives for one generation run and is never shared across schemas.

use std::collections::HashMap;

use rand::RngCore;
use serde_json::Value;
use tracing::debug;

use dynatask_contracts::{
    error::TaskIoResult,
    schema::{Collection, FieldDef, IoType, TaskSchema},
};

use crate::{kind::PoolContext, registry::TypeRegistry};

/// Write-once pools, one per type.
#[derive(Debug, Default)]
pub struct PoolCache {
    pools: HashMap<IoType, Vec<Value>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool for `field`'s type, generating it on first use.
    pub fn pool_for(
        &mut self,
        schema: &TaskSchema,
        registry: &TypeRegistry,
        collection: Collection,
        field: &FieldDef,
        rng: &mut dyn RngCore,
    ) -> TaskIoResult<&[Value]> {
        if !self.pools.contains_key(&field.io_type) {
            let kind = registry.lookup(field)?;
            let pool = {
                let mut ctx = PoolContext {
                    schema,
                    collection,
                    registry,
                    cache: self,
                    rng,
                };
                kind.generate(field, &mut ctx)?
            };
            debug!(
                io_type = %field.io_type,
                field = %field.name,
                size = pool.len(),
                "generated mock data pool"
            );
            self.pools.insert(field.io_type, pool);
        }
        Ok(self.pools.get(&field.io_type).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn get(&self, io_type: IoType) -> Option<&[Value]> {
        self.pools.get(&io_type).map(Vec::as_slice)
    }

    /// Length of the longest pool generated so far.
    pub fn max_len(&self) -> usize {
        self.pools.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
