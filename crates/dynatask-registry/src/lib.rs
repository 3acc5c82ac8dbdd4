//! # dynatask-registry
//!
//! The closed set of I/O types and the mock data built from them.
//!
//! ## Pipeline
//!
//! ```text
//! TaskSchema ─► TypeRegistry::lookup(field) ─► IoKind::generate ─► PoolCache
//!                                                                     │
//!                       MockDataGenerator ◄───────────────────────────┘
//!                              │
//!                              ▼
//!               Vec<SyntheticExample> + SampleOutput
//! ```
//!
//! The same `IoKind` that generates a type's pool also verifies values of
//! that type in a model response; `dynatask-verify` calls back into the
//! registry for the per-field checks.

pub mod cache;
pub mod generate;
pub mod kind;
pub mod kinds;
pub mod registry;

pub use generate::MockDataGenerator;
pub use kind::{IoKind, PoolContext, VerifyContext};
pub use registry::TypeRegistry;

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use dynatask_contracts::{
        example::SyntheticExample,
        schema::{Collection, FieldDef, IoType, TaskSchema},
        verify::Tolerances,
    };

    use super::*;

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn schema() -> TaskSchema {
        TaskSchema::new(
            "mixed",
            vec![
                FieldDef::plain("question", IoType::String),
                FieldDef::with_labels("label", IoType::Multiclass, &["a", "b", "c"]),
            ],
            vec![FieldDef::plain("passage", IoType::String)],
            vec![
                FieldDef::with_labels("label", IoType::Multiclass, &["a", "b", "c"]),
                FieldDef::with_reference("probs", IoType::MulticlassProbs, "label"),
                FieldDef::with_reference("span", IoType::ContextStringSelection, "passage"),
                FieldDef::plain("conf", IoType::Conf),
                FieldDef::with_labels("tags", IoType::Multilabel, &["x", "y"]),
                FieldDef::plain("picture", IoType::Image),
            ],
        )
        .unwrap()
    }

    fn example() -> SyntheticExample {
        let mut example = SyntheticExample::with_uid("ex-1");
        example.insert("question", json!("Where?"));
        example.insert("passage", json!("It is a good day"));
        example
    }

    fn check(schema: &TaskSchema, field: &str, value: Value) -> Result<(), String> {
        check_with(schema, field, value, &Tolerances::default())
    }

    fn check_with(
        schema: &TaskSchema,
        field: &str,
        value: Value,
        tolerances: &Tolerances,
    ) -> Result<(), String> {
        let registry = TypeRegistry::builtin();
        let def = schema.output(field).unwrap();
        let example = example();
        let ctx = VerifyContext {
            schema,
            collection: Collection::Output,
            example: &example,
            tolerances,
        };
        registry.lookup(def).unwrap().verify(&value, def, &ctx)
    }

    // ── Registry ─────────────────────────────────────────────────────────────

    #[test]
    fn builtin_registry_covers_every_type() {
        let registry = TypeRegistry::builtin();
        assert_eq!(registry.len(), IoType::ALL.len());
        for io_type in IoType::ALL {
            assert!(registry.contains(io_type), "{io_type} is not registered");
        }
    }

    #[test]
    fn empty_registry_lookup_is_unknown_type() {
        let registry = TypeRegistry::empty();
        let field = FieldDef::plain("q", IoType::String);
        assert!(registry.lookup(&field).is_err());
    }

    // ── Per-type verification ────────────────────────────────────────────────

    #[test]
    fn label_must_be_declared() {
        let schema = schema();
        assert!(check(&schema, "label", json!("b")).is_ok());
        assert!(check(&schema, "label", json!("z")).is_err());
        assert!(check(&schema, "label", json!(1)).is_err());
    }

    #[test]
    fn probabilities_near_one_pass() {
        let schema = schema();
        let ok = json!({"a": 0.5, "b": 0.25, "c": 0.25005});
        assert!(check(&schema, "probs", ok).is_ok());
    }

    #[test]
    fn probability_tolerance_bounds_are_inclusive() {
        let schema = schema();
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.25, "c": 0.2501})).is_ok());
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.25, "c": 0.2499})).is_ok());
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.25, "c": 0.25011})).is_err());
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.25, "c": 0.24989})).is_err());
    }

    #[test]
    fn probabilities_far_from_one_fail() {
        let schema = schema();
        let err = check(&schema, "probs", json!({"a": 0.5, "b": 0.26, "c": 0.25})).unwrap_err();
        assert!(err.contains("sum"), "unexpected reason: {err}");
    }

    #[test]
    fn probabilities_need_exact_label_set() {
        let schema = schema();
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.5})).is_err());
        assert!(check(&schema, "probs", json!({"a": 0.5, "b": 0.5, "c": 0.0, "d": 0.0})).is_err());
    }

    #[test]
    fn probability_tolerance_is_configurable() {
        let schema = schema();
        let loose = Tolerances {
            probability_sum: 0.05,
            ..Tolerances::default()
        };
        let value = json!({"a": 0.5, "b": 0.26, "c": 0.25});
        assert!(check_with(&schema, "probs", value, &loose).is_ok());
    }

    #[test]
    fn selection_must_come_from_the_example() {
        let schema = schema();
        assert!(check(&schema, "span", json!("good day")).is_ok());
        let err = check(&schema, "span", json!("bad night")).unwrap_err();
        assert!(err.contains("passage"), "unexpected reason: {err}");
    }

    #[test]
    fn confidence_allows_small_overshoot() {
        let schema = schema();
        assert!(check(&schema, "conf", json!(0.3)).is_ok());
        assert!(check(&schema, "conf", json!(1.00005)).is_ok());
        assert!(check(&schema, "conf", json!(-0.00005)).is_ok());
        assert!(check(&schema, "conf", json!(1.01)).is_err());
        assert!(check(&schema, "conf", json!("0.3")).is_err());
    }

    #[test]
    fn confidence_tolerance_bounds_are_inclusive() {
        let schema = schema();
        assert!(check(&schema, "conf", json!(1.0001)).is_ok());
        assert!(check(&schema, "conf", json!(-0.0001)).is_ok());
        assert!(check(&schema, "conf", json!(1.00011)).is_err());
        assert!(check(&schema, "conf", json!(-0.00011)).is_err());
    }

    #[test]
    fn confidence_must_be_a_float() {
        let schema = schema();
        assert!(check(&schema, "conf", json!(1.0)).is_ok());
        assert!(check(&schema, "conf", json!(0.0)).is_ok());
        let err = check(&schema, "conf", json!(1)).unwrap_err();
        assert!(err.contains("float"), "unexpected reason: {err}");
        assert!(check(&schema, "conf", json!(0)).is_err());
    }

    #[test]
    fn multilabel_members_must_be_declared() {
        let schema = schema();
        assert!(check(&schema, "tags", json!(["y"])).is_ok());
        assert!(check(&schema, "tags", json!([])).is_ok());
        assert!(check(&schema, "tags", json!(["x", "w"])).is_err());
        assert!(check(&schema, "tags", json!("x")).is_err());
    }

    #[test]
    fn image_only_needs_a_string() {
        let schema = schema();
        assert!(check(&schema, "picture", json!("aGVsbG8=")).is_ok());
        assert!(check(&schema, "picture", json!(null)).is_err());
    }
}
