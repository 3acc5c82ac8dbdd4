//! The built-in I/O types.
//!
//! | type                         | pool                                  | accepts                                      |
//! |------------------------------|---------------------------------------|----------------------------------------------|
//! | `string`                     | three fixed strings                   | any string                                   |
//! | `image`                      | one base64 PNG                        | any string                                   |
//! | `context_string_selection`   | 10-char prefixes of the referent pool | a string contained in the referenced value   |
//! | `conf`                       | three random floats in `[0, 1)`       | a number in `[-ε, 1 + ε]`                    |
//! | `multiclass_probs`           | three normalized label distributions  | an object over exactly the labels, sum 1 ± ε |
//! | `multiclass`, `target_label` | the labels, shuffled                  | one of the labels                            |
//! | `multilabel`                 | one shuffled label list               | a list of labels                             |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};

use dynatask_contracts::{
    error::{TaskIoError, TaskIoResult},
    schema::{FieldDef, IoType},
};

use crate::kind::{IoKind, PoolContext, VerifyContext};

/// Characters kept from each referenced string by the selection generator.
pub const SELECTION_PREFIX_CHARS: usize = 10;

/// Pool size for the randomly generated numeric types.
pub const RANDOM_POOL_SIZE: usize = 3;

/// A 1x1 transparent PNG.
const MOCK_PNG: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

fn labels_of(field: &FieldDef) -> TaskIoResult<Vec<String>> {
    field
        .labels()
        .map(<[String]>::to_vec)
        .ok_or_else(|| TaskIoError::MissingParameter {
            field: field.name.clone(),
            type_name: field.io_type.to_string(),
            parameter: "labels".to_string(),
        })
}

fn expect_str<'v>(value: &'v Value) -> Result<&'v str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}"))
}

// ── string ───────────────────────────────────────────────────────────────────

pub struct StringKind;

impl IoKind for StringKind {
    fn io_type(&self) -> IoType {
        IoType::String
    }

    fn generate(&self, _field: &FieldDef, _ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        let long = (0..513).map(|x| format!("{x}_")).collect::<Vec<_>>().join(" ");
        Ok(vec![
            Value::from("It is a good day"),
            Value::from("Let's try a utf-8 like hackamore from j?\u{00a1}quima;"),
            Value::from(long),
        ])
    }

    fn verify(&self, value: &Value, _field: &FieldDef, _ctx: &VerifyContext<'_>) -> Result<(), String> {
        expect_str(value).map(|_| ())
    }
}

// ── image ────────────────────────────────────────────────────────────────────

pub struct ImageKind;

impl IoKind for ImageKind {
    fn io_type(&self) -> IoType {
        IoType::Image
    }

    fn generate(&self, _field: &FieldDef, _ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        Ok(vec![Value::from(STANDARD.encode(MOCK_PNG))])
    }

    // The encoding itself is not checked.
    fn verify(&self, value: &Value, _field: &FieldDef, _ctx: &VerifyContext<'_>) -> Result<(), String> {
        expect_str(value).map(|_| ())
    }
}

// ── context_string_selection ─────────────────────────────────────────────────

pub struct ContextSelectionKind;

impl IoKind for ContextSelectionKind {
    fn io_type(&self) -> IoType {
        IoType::ContextStringSelection
    }

    fn generate(&self, field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        let source = ctx.referent_pool(field)?;
        Ok(source
            .iter()
            .filter_map(Value::as_str)
            .map(|s| Value::from(s.chars().take(SELECTION_PREFIX_CHARS).collect::<String>()))
            .collect())
    }

    fn verify(&self, value: &Value, field: &FieldDef, ctx: &VerifyContext<'_>) -> Result<(), String> {
        let selection = expect_str(value)?;
        let referent = ctx.referent(field)?;
        let source = ctx
            .example
            .get(&referent.name)
            .ok_or_else(|| format!("example carries no value for '{}'", referent.name))?;

        let contained = match source {
            Value::String(s) => s.contains(selection),
            Value::Array(items) => items.iter().any(|item| item.as_str() == Some(selection)),
            _ => false,
        };
        if contained {
            Ok(())
        } else {
            Err(format!("'{selection}' is not a selection from '{}'", referent.name))
        }
    }
}

// ── conf ─────────────────────────────────────────────────────────────────────

pub struct ConfKind;

impl IoKind for ConfKind {
    fn io_type(&self) -> IoType {
        IoType::Conf
    }

    fn generate(&self, _field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        Ok((0..RANDOM_POOL_SIZE)
            .map(|_| Value::from(ctx.rng.gen::<f64>()))
            .collect())
    }

    fn verify(&self, value: &Value, _field: &FieldDef, ctx: &VerifyContext<'_>) -> Result<(), String> {
        // Integers such as `1` are not confidences.
        let conf = value
            .as_f64()
            .filter(|_| value.is_f64())
            .ok_or_else(|| format!("expected a float, got {value}"))?;
        let eps = ctx.tolerances.confidence_range;
        if conf < -eps || conf > 1.0 + eps {
            return Err(format!("confidence {conf} is outside [0, 1] (tolerance {eps})"));
        }
        Ok(())
    }
}

// ── multiclass_probs ─────────────────────────────────────────────────────────

pub struct MulticlassProbsKind;

impl IoKind for MulticlassProbsKind {
    fn io_type(&self) -> IoType {
        IoType::MulticlassProbs
    }

    fn generate(&self, field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        let labels = labels_of(ctx.referent(field)?)?;

        let mut pool = Vec::with_capacity(RANDOM_POOL_SIZE);
        for _ in 0..RANDOM_POOL_SIZE {
            let raw: Vec<f64> = labels.iter().map(|_| ctx.rng.gen::<f64>()).collect();
            let total: f64 = raw.iter().sum();
            let probs: Map<String, Value> = labels
                .iter()
                .zip(&raw)
                .map(|(label, p)| {
                    let p = if total > 0.0 { p / total } else { 1.0 / labels.len() as f64 };
                    (label.clone(), Value::from(p))
                })
                .collect();
            pool.push(Value::Object(probs));
        }
        Ok(pool)
    }

    fn verify(&self, value: &Value, field: &FieldDef, ctx: &VerifyContext<'_>) -> Result<(), String> {
        let probs = value
            .as_object()
            .ok_or_else(|| format!("expected an object of label probabilities, got {value}"))?;
        let labels = ctx
            .referent(field)?
            .labels()
            .ok_or_else(|| format!("reference of '{}' declares no labels", field.name))?;

        let same_keys = probs.len() == labels.len() && labels.iter().all(|l| probs.contains_key(l));
        if !same_keys {
            let got: Vec<&str> = probs.keys().map(String::as_str).collect();
            return Err(format!(
                "label set mismatch: expected [{}], got [{}]",
                labels.join(", "),
                got.join(", ")
            ));
        }

        let mut total = 0.0;
        for (label, p) in probs {
            total += p
                .as_f64()
                .ok_or_else(|| format!("probability for '{label}' is not a number"))?;
        }
        let eps = ctx.tolerances.probability_sum;
        if (total - 1.0).abs() > eps {
            return Err(format!("probabilities sum to {total}, expected 1 ± {eps}"));
        }
        Ok(())
    }
}

// ── multiclass / target_label ────────────────────────────────────────────────

/// Single-label classification. Serves both `multiclass` and `target_label`.
pub struct LabelKind {
    io_type: IoType,
}

impl LabelKind {
    pub fn multiclass() -> Self {
        Self { io_type: IoType::Multiclass }
    }

    pub fn target_label() -> Self {
        Self { io_type: IoType::TargetLabel }
    }
}

impl IoKind for LabelKind {
    fn io_type(&self) -> IoType {
        self.io_type
    }

    fn generate(&self, field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        let mut labels = labels_of(field)?;
        labels.shuffle(&mut *ctx.rng);
        Ok(labels.into_iter().map(Value::from).collect())
    }

    fn verify(&self, value: &Value, field: &FieldDef, _ctx: &VerifyContext<'_>) -> Result<(), String> {
        let label = expect_str(value)?;
        let labels = field.labels().unwrap_or_default();
        if labels.iter().any(|l| l == label) {
            Ok(())
        } else {
            Err(format!("'{label}' is not one of [{}]", labels.join(", ")))
        }
    }
}

// ── multilabel ───────────────────────────────────────────────────────────────

pub struct MultilabelKind;

impl IoKind for MultilabelKind {
    fn io_type(&self) -> IoType {
        IoType::Multilabel
    }

    fn generate(&self, field: &FieldDef, ctx: &mut PoolContext<'_>) -> TaskIoResult<Vec<Value>> {
        let mut labels = labels_of(field)?;
        labels.shuffle(&mut *ctx.rng);
        Ok(vec![Value::Array(labels.into_iter().map(Value::from).collect())])
    }

    fn verify(&self, value: &Value, field: &FieldDef, _ctx: &VerifyContext<'_>) -> Result<(), String> {
        let items = value
            .as_array()
            .ok_or_else(|| format!("expected a list of labels, got {value}"))?;
        let labels = field.labels().unwrap_or_default();
        for item in items {
            let label = expect_str(item)?;
            if !labels.iter().any(|l| l == label) {
                return Err(format!("'{label}' is not one of [{}]", labels.join(", ")));
            }
        }
        Ok(())
    }
}
