//! Synthetic example generation.
//!
//! ```text
//! schema ─► pools (one per type, memoized) ─► N = longest pool
//!        ─► example i: fresh uid + pool[i mod len] for every example field
//! ```
//!
//! Short pools wrap around, so every example is fully populated even when
//! pool lengths differ. Targets are never generated: they are what the
//! model has to produce.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{Map, Value};
use tracing::{debug, info};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    example::{SampleOutput, SyntheticExample, MODEL_RESPONSE_KEY, RESPONSE_ID_KEY},
    schema::{Collection, FieldDef, TaskSchema},
};

use crate::{cache::PoolCache, registry::TypeRegistry};

pub struct MockDataGenerator<'a> {
    schema: &'a TaskSchema,
    registry: &'a TypeRegistry,
    rng: StdRng,
}

impl<'a> MockDataGenerator<'a> {
    /// A generator seeded from OS entropy.
    pub fn new(schema: &'a TaskSchema, registry: &'a TypeRegistry) -> Self {
        Self {
            schema,
            registry,
            rng: StdRng::from_entropy(),
        }
    }

    /// A generator whose pools are reproducible. Uids are still fresh.
    pub fn with_seed(schema: &'a TaskSchema, registry: &'a TypeRegistry, seed: u64) -> Self {
        Self {
            schema,
            registry,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The examples and the sample output descriptor.
    pub fn generate(&mut self) -> TaskIoResult<(Vec<SyntheticExample>, SampleOutput)> {
        let examples = self.examples()?;
        let sample = self.sample_output()?;
        Ok((examples, sample))
    }

    /// One example per entry of the longest pool.
    pub fn examples(&mut self) -> TaskIoResult<Vec<SyntheticExample>> {
        let schema = self.schema;
        let mut cache = PoolCache::new();

        let mut fields: Vec<(&FieldDef, Collection)> = Vec::new();
        for field in schema.inputs_without_targets() {
            fields.push((field, Collection::Input));
        }
        for field in schema.context() {
            fields.push((field, Collection::Context));
        }

        for (field, collection) in &fields {
            cache.pool_for(schema, self.registry, *collection, field, &mut self.rng)?;
        }

        let count = cache.max_len();
        let mut examples = Vec::with_capacity(count);
        for i in 0..count {
            let mut example = SyntheticExample::new();
            for (field, _) in &fields {
                example.insert(field.name.clone(), pick(&cache, field, i)?);
            }
            examples.push(example);
        }

        info!(
            task = %schema.task(),
            examples = examples.len(),
            pools = cache.len(),
            "generated synthetic examples"
        );
        Ok(examples)
    }

    /// Describe what a valid response for this task looks like.
    ///
    /// Uses its own cache: output references resolve against a different
    /// table than example fields, so the pools must not mix.
    pub fn sample_output(&mut self) -> TaskIoResult<SampleOutput> {
        let schema = self.schema;
        let mut cache = PoolCache::new();

        let mut model_response = Map::new();
        for field in schema.outputs() {
            cache.pool_for(schema, self.registry, Collection::Output, field, &mut self.rng)?;
            model_response.insert(field.name.clone(), pick(&cache, field, 0)?);
        }
        debug!(task = %schema.task(), fields = model_response.len(), "built sample output");

        let mut output_entry = Map::new();
        output_entry.insert(
            RESPONSE_ID_KEY.to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
        output_entry.insert(MODEL_RESPONSE_KEY.to_string(), Value::Object(model_response));

        Ok(SampleOutput {
            mandatory_fields: schema.targets().map(|f| f.name.clone()).collect(),
            optional_fields: schema.optional_outputs().map(|f| f.name.clone()).collect(),
            output_entry: Value::Object(output_entry),
        })
    }
}

fn pick(cache: &PoolCache, field: &FieldDef, index: usize) -> TaskIoResult<Value> {
    let pool = cache.get(field.io_type).unwrap_or_default();
    if pool.is_empty() {
        return Err(TaskIoError::SchemaMalformed {
            reason: format!(
                "type '{}' of field '{}' produced an empty mock data pool",
                field.io_type, field.name
            ),
        });
    }
    Ok(pool[index % pool.len()].clone())
}
