//! Task schema types.
//!
//! A `TaskSchema` is the declarative description of one benchmark task: the
//! fields the harness supplies (`input`), the auxiliary fields shared by
//! inputs and outputs (`context`), and the fields a model response may
//! populate (`output`). An input field whose name also appears among the
//! outputs is a *target*: the model must predict it in every response.
//!
//! Schemas are decoded from the `io_def` artifact shape and validated once,
//! at load time. Every `reference_name` is resolved into an explicit
//! dependency graph so verifiers never chase raw string lookups.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{TaskIoError, TaskIoResult},
    example::EXAMPLE_UID_KEY,
};

/// The closed set of I/O value types a field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoType {
    String,
    Image,
    ContextStringSelection,
    Conf,
    MulticlassProbs,
    Multiclass,
    TargetLabel,
    Multilabel,
}

impl IoType {
    /// Every built-in type, in declaration order.
    pub const ALL: [IoType; 8] = [
        IoType::String,
        IoType::Image,
        IoType::ContextStringSelection,
        IoType::Conf,
        IoType::MulticlassProbs,
        IoType::Multiclass,
        IoType::TargetLabel,
        IoType::Multilabel,
    ];

    /// The wire name used in schema artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            IoType::String => "string",
            IoType::Image => "image",
            IoType::ContextStringSelection => "context_string_selection",
            IoType::Conf => "conf",
            IoType::MulticlassProbs => "multiclass_probs",
            IoType::Multiclass => "multiclass",
            IoType::TargetLabel => "target_label",
            IoType::Multilabel => "multilabel",
        }
    }

    /// Parse a wire name. Returns `None` for names outside the closed set.
    pub fn parse(name: &str) -> Option<IoType> {
        IoType::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// True for the label-bearing types, which require `labels`.
    pub fn requires_labels(&self) -> bool {
        matches!(self, IoType::Multiclass | IoType::TargetLabel | IoType::Multilabel)
    }

    /// True for the types that depend on another field via `reference_name`.
    pub fn requires_reference(&self) -> bool {
        matches!(self, IoType::ContextStringSelection | IoType::MulticlassProbs)
    }
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the three field collections a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Input,
    Context,
    Output,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Collection::Input => "input",
            Collection::Context => "context",
            Collection::Output => "output",
        })
    }
}

/// Typed constructor parameters, one shape per family of types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldParams {
    /// No parameters (`string`, `image`, `conf`).
    Plain,
    /// The label set of a classification field.
    Labels(Vec<String>),
    /// The name of the field this one depends on.
    Reference(String),
}

/// One named, typed slot in a task schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub io_type: IoType,
    pub params: FieldParams,
}

impl FieldDef {
    pub fn plain(name: impl Into<String>, io_type: IoType) -> Self {
        Self {
            name: name.into(),
            io_type,
            params: FieldParams::Plain,
        }
    }

    pub fn with_labels(name: impl Into<String>, io_type: IoType, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            io_type,
            params: FieldParams::Labels(labels.iter().map(|l| l.to_string()).collect()),
        }
    }

    pub fn with_reference(
        name: impl Into<String>,
        io_type: IoType,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            io_type,
            params: FieldParams::Reference(reference.into()),
        }
    }

    /// The declared label set, if this field carries one.
    pub fn labels(&self) -> Option<&[String]> {
        match &self.params {
            FieldParams::Labels(labels) => Some(labels),
            _ => None,
        }
    }

    /// The referenced field name, if this field depends on another.
    pub fn reference(&self) -> Option<&str> {
        match &self.params {
            FieldParams::Reference(name) => Some(name),
            _ => None,
        }
    }
}

/// Address of a field inside a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub collection: Collection,
    pub name: String,
}

impl FieldKey {
    pub fn new(collection: Collection, name: impl Into<String>) -> Self {
        Self {
            collection,
            name: name.into(),
        }
    }
}

/// Read-only `reference_name` edges, resolved once when the schema loads.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<FieldKey, FieldKey>,
}

impl DependencyGraph {
    /// The field `key` depends on, if any.
    pub fn referent(&self, key: &FieldKey) -> Option<&FieldKey> {
        self.edges.get(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// A validated task schema. Immutable after construction.
#[derive(Debug, Clone)]
pub struct TaskSchema {
    task: String,
    inputs: Vec<FieldDef>,
    context: Vec<FieldDef>,
    outputs: Vec<FieldDef>,
    target_names: BTreeSet<String>,
    dependencies: DependencyGraph,
}

impl TaskSchema {
    /// Build and validate a schema from already-typed field lists.
    ///
    /// Checks name uniqueness per collection, required constructor
    /// arguments, and resolves every reference. Fails fast on the first
    /// problem.
    pub fn new(
        task: impl Into<String>,
        inputs: Vec<FieldDef>,
        context: Vec<FieldDef>,
        outputs: Vec<FieldDef>,
    ) -> TaskIoResult<Self> {
        for (collection, fields) in [
            (Collection::Input, &inputs),
            (Collection::Context, &context),
            (Collection::Output, &outputs),
        ] {
            check_unique(collection, fields)?;
            for field in fields {
                check_params(field)?;
                if collection != Collection::Output && field.name == EXAMPLE_UID_KEY {
                    return Err(TaskIoError::ReservedField {
                        collection: collection.to_string(),
                        name: field.name.clone(),
                    });
                }
            }
        }

        let output_names: HashSet<&str> = outputs.iter().map(|f| f.name.as_str()).collect();
        let target_names = inputs
            .iter()
            .filter(|f| output_names.contains(f.name.as_str()))
            .map(|f| f.name.clone())
            .collect();

        let mut schema = Self {
            task: task.into(),
            inputs,
            context,
            outputs,
            target_names,
            dependencies: DependencyGraph::default(),
        };
        schema.dependencies = schema.resolve_references()?;
        Ok(schema)
    }

    /// Decode the `io_def` artifact shape and validate it.
    pub fn from_value(value: Value) -> TaskIoResult<Self> {
        let raw: RawTaskSchema =
            serde_json::from_value(value).map_err(|e| TaskIoError::SchemaMalformed {
                reason: e.to_string(),
            })?;
        raw.into_schema()
    }

    /// Parse a JSON document and validate it.
    pub fn from_json_str(s: &str) -> TaskIoResult<Self> {
        let value: Value = serde_json::from_str(s).map_err(|e| TaskIoError::SchemaMalformed {
            reason: format!("invalid JSON: {e}"),
        })?;
        Self::from_value(value)
    }

    /// The task code, e.g. `"nli"`.
    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn inputs(&self) -> &[FieldDef] {
        &self.inputs
    }

    pub fn context(&self) -> &[FieldDef] {
        &self.context
    }

    pub fn outputs(&self) -> &[FieldDef] {
        &self.outputs
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// True when `name` is an input that is also an output.
    pub fn is_target(&self, name: &str) -> bool {
        self.target_names.contains(name)
    }

    /// Input fields that are also outputs, in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &FieldDef> {
        self.inputs.iter().filter(|f| self.is_target(&f.name))
    }

    /// Input fields the harness synthesizes, in declaration order.
    pub fn inputs_without_targets(&self) -> impl Iterator<Item = &FieldDef> {
        self.inputs.iter().filter(|f| !self.is_target(&f.name))
    }

    /// Every field a synthetic example carries: non-target inputs, then context.
    pub fn example_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.inputs_without_targets().chain(self.context.iter())
    }

    /// Output fields that are not targets.
    pub fn optional_outputs(&self) -> impl Iterator<Item = &FieldDef> {
        self.outputs.iter().filter(|f| !self.is_target(&f.name))
    }

    /// Look up a declared output by name.
    pub fn output(&self, name: &str) -> Option<&FieldDef> {
        self.outputs.iter().find(|f| f.name == name)
    }

    /// Look up any field by its key.
    pub fn field(&self, key: &FieldKey) -> Option<&FieldDef> {
        let fields = match key.collection {
            Collection::Input => &self.inputs,
            Collection::Context => &self.context,
            Collection::Output => &self.outputs,
        };
        fields.iter().find(|f| f.name == key.name)
    }

    /// The field that `name` in `collection` references, if any.
    pub fn referent(&self, collection: Collection, name: &str) -> Option<(&FieldKey, &FieldDef)> {
        let key = FieldKey::new(collection, name);
        let target = self.dependencies.referent(&key)?;
        self.field(target).map(|def| (target, def))
    }

    // ── Validation helpers ───────────────────────────────────────────────────

    /// Lookup order for references originating in `collection`.
    ///
    /// Inputs and context resolve against the data an example carries.
    /// Outputs resolve against sibling outputs first, then example data.
    fn search_order(&self, collection: Collection) -> Vec<Collection> {
        match collection {
            Collection::Input | Collection::Context => vec![Collection::Input, Collection::Context],
            Collection::Output => vec![Collection::Output, Collection::Context, Collection::Input],
        }
    }

    fn locate(&self, collection: Collection, name: &str) -> Option<FieldKey> {
        let found = match collection {
            Collection::Input => self
                .inputs_without_targets()
                .any(|f| f.name == name),
            Collection::Context => self.context.iter().any(|f| f.name == name),
            Collection::Output => self.outputs.iter().any(|f| f.name == name),
        };
        found.then(|| FieldKey::new(collection, name))
    }

    fn resolve_references(&self) -> TaskIoResult<DependencyGraph> {
        let mut edges = BTreeMap::new();

        for (collection, fields) in [
            (Collection::Input, &self.inputs),
            (Collection::Context, &self.context),
            (Collection::Output, &self.outputs),
        ] {
            for field in fields {
                let Some(reference) = field.reference() else {
                    continue;
                };

                let target = self
                    .search_order(collection)
                    .into_iter()
                    .find_map(|c| self.locate(c, reference))
                    .ok_or_else(|| TaskIoError::MissingReference {
                        field: field.name.clone(),
                        reference: reference.to_string(),
                    })?;

                // `locate` only returns keys for declared fields.
                let Some(referent) = self.field(&target) else {
                    continue;
                };
                check_referent(field, &target, referent)?;

                edges.insert(FieldKey::new(collection, field.name.clone()), target);
            }
        }

        Ok(DependencyGraph { edges })
    }
}

fn check_unique(collection: Collection, fields: &[FieldDef]) -> TaskIoResult<()> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(TaskIoError::DuplicateField {
                collection: collection.to_string(),
                name: field.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_params(field: &FieldDef) -> TaskIoResult<()> {
    let missing = |parameter: &str| TaskIoError::MissingParameter {
        field: field.name.clone(),
        type_name: field.io_type.to_string(),
        parameter: parameter.to_string(),
    };

    if field.io_type.requires_labels() {
        match field.labels() {
            Some(labels) if !labels.is_empty() => {}
            _ => return Err(missing("labels")),
        }
    }
    if field.io_type.requires_reference() && field.reference().is_none() {
        return Err(missing("reference_name"));
    }
    Ok(())
}

fn check_referent(field: &FieldDef, key: &FieldKey, referent: &FieldDef) -> TaskIoResult<()> {
    let invalid = |reason: &str| TaskIoError::InvalidReference {
        field: field.name.clone(),
        reference: key.name.clone(),
        reason: reason.to_string(),
    };

    match field.io_type {
        IoType::ContextStringSelection => {
            if key.collection == Collection::Output {
                return Err(invalid("selections must reference a field carried by the example"));
            }
            if referent.io_type != IoType::String {
                return Err(invalid("selections must reference a string field"));
            }
        }
        IoType::MulticlassProbs => {
            if referent.labels().is_none() {
                return Err(invalid("probability distributions must reference a field with labels"));
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Artifact decoding ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawTaskSchema {
    task: String,
    io_def: RawIoDef,
}

#[derive(Debug, Deserialize)]
struct RawIoDef {
    #[serde(default)]
    input: Vec<RawField>,
    #[serde(default)]
    context: Vec<RawField>,
    #[serde(default)]
    output: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    constructor_args: RawConstructorArgs,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstructorArgs {
    labels: Option<Vec<String>>,
    reference_name: Option<String>,
}

impl RawField {
    fn into_field(self) -> TaskIoResult<FieldDef> {
        let io_type = IoType::parse(&self.type_name).ok_or_else(|| TaskIoError::UnknownType {
            field: self.name.clone(),
            type_name: self.type_name.clone(),
        })?;

        let args = self.constructor_args;
        let params = if io_type.requires_reference() {
            args.reference_name
                .map(FieldParams::Reference)
                .unwrap_or(FieldParams::Plain)
        } else if let Some(labels) = args.labels {
            FieldParams::Labels(labels)
        } else {
            FieldParams::Plain
        };

        Ok(FieldDef {
            name: self.name,
            io_type,
            params,
        })
    }
}

impl RawTaskSchema {
    fn into_schema(self) -> TaskIoResult<TaskSchema> {
        let convert = |fields: Vec<RawField>| -> TaskIoResult<Vec<FieldDef>> {
            fields.into_iter().map(RawField::into_field).collect()
        };
        TaskSchema::new(
            self.task,
            convert(self.io_def.input)?,
            convert(self.io_def.context)?,
            convert(self.io_def.output)?,
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
