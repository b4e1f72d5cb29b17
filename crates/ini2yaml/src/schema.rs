//! trace record schema
//!
//! Every trace block is checked against a field catalogue. A field's [FieldSpec] says in which
//! processing stage it is written, what type its value should have and whether it is text
//! that must not be evaluated.
//!
//! Visibility for a record processed in stage `S`:
//!
//! | field stage | visible when |
//! |---|---|
//! | `common` | always |
//! | `firststage` / `secondstage` | `S` matches |
//! | `firststage-optional` / `secondstage-optional` | `S` matches and the block supplied it |
//! | `hidden` | never |
//!
//! Fields discovered while parsing (with `fields_on_the_fly`) get the stage `S` itself.
use crate::options::Stage;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldStage {
    Common,
    FirstStage,
    SecondStage,
    FirstStageOptional,
    SecondStageOptional,
    Hidden,
}

impl FieldStage {
    /// Stage ignoring the `-optional` suffix
    pub fn base(&self) -> Option<Stage> {
        match self {
            FieldStage::FirstStage | FieldStage::FirstStageOptional => Some(Stage::FirstStage),
            FieldStage::SecondStage | FieldStage::SecondStageOptional => Some(Stage::SecondStage),
            FieldStage::Common | FieldStage::Hidden => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            FieldStage::FirstStageOptional | FieldStage::SecondStageOptional
        )
    }
}

impl From<Stage> for FieldStage {
    fn from(value: Stage) -> Self {
        match value {
            Stage::FirstStage => FieldStage::FirstStage,
            Stage::SecondStage => FieldStage::SecondStage,
        }
    }
}

impl fmt::Display for FieldStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldStage::Common => "common",
            FieldStage::FirstStage => "firststage",
            FieldStage::SecondStage => "secondstage",
            FieldStage::FirstStageOptional => "firststage-optional",
            FieldStage::SecondStageOptional => "secondstage-optional",
            FieldStage::Hidden => "hidden",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    List,
    Any,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::List => "a list",
            FieldType::Any => "any value",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            // checked once resolved, if at all
            (_, Value::Reference(_) | Value::Shared(_) | Value::Deferred(_)) => true,
            (FieldType::Text, Value::String(_) | Value::Quoted(_) | Value::Date(_)) => true,
            (FieldType::List, Value::Array(_)) => true,
            _ => false,
        }
    }

    /// Type of a field that was discovered through its value
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::String(_) | Value::Quoted(_) => FieldType::Text,
            Value::Array(_) => FieldType::List,
            _ => FieldType::Any,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub is_standard: bool,
    pub stage: FieldStage,
    /// `Some(true)` verbatim text, `Some(false)` always evaluated, `None` decided by the value
    pub is_literal: Option<bool>,
    pub field_type: FieldType,
    pub default: Option<Value>,
    /// controls parsing itself and may never be set from a trace block
    pub control: bool,
}

impl FieldSpec {
    fn standard(stage: FieldStage, field_type: FieldType) -> Self {
        Self {
            is_standard: true,
            stage,
            is_literal: None,
            field_type,
            default: None,
            control: false,
        }
    }

    fn literal(mut self, is_literal: bool) -> Self {
        self.is_literal = Some(is_literal);
        self
    }

    fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn control() -> Self {
        Self {
            control: true,
            ..Self::standard(FieldStage::Hidden, FieldType::Any)
        }
    }

    /// Spec for a field that is not part of the catalogue
    pub fn discovered(stage: Stage, value: &Value, written_as_text: bool) -> Self {
        Self {
            is_standard: false,
            stage: stage.into(),
            is_literal: if written_as_text { None } else { Some(false) },
            field_type: FieldType::infer(value),
            default: None,
            control: false,
        }
    }

    pub fn is_visible(&self, stage: Stage, supplied: bool) -> bool {
        match self.stage {
            FieldStage::Hidden => false,
            FieldStage::Common => true,
            field_stage if field_stage.is_optional() => {
                supplied && field_stage.base() == Some(stage)
            }
            field_stage => field_stage.base() == Some(stage),
        }
    }
}

/// Field catalogue of one parse
///
/// Starts from the base catalogue and grows as fields are discovered. Iteration follows the
/// catalogue order, discovered fields come last.
#[derive(Debug, Clone)]
pub struct Registry {
    fields: IndexMap<String, FieldSpec>,
}

impl Registry {
    pub fn seeded() -> Self {
        use FieldStage::*;
        use FieldType::*;

        let empty = || Value::Array(vec![]);
        let fields = [
            ("variableName", FieldSpec::standard(Common, Text)),
            ("title", FieldSpec::standard(Common, Text)),
            ("originalVariable", FieldSpec::standard(FirstStageOptional, Text)),
            ("inputFileName", FieldSpec::standard(FirstStage, Any).with_default(empty())),
            (
                "inputFileName_dates",
                FieldSpec::standard(FirstStage, List).literal(false).with_default(empty()),
            ),
            ("measurementType", FieldSpec::standard(FirstStage, Text)),
            ("units", FieldSpec::standard(Common, Text)),
            ("instrument", FieldSpec::standard(FirstStage, Text)),
            ("instrumentType", FieldSpec::standard(FirstStage, Text)),
            ("instrumentSN", FieldSpec::standard(FirstStage, Text)),
            // deprecated, parsed but never written
            (
                "calibrationDates",
                FieldSpec::standard(Hidden, List).literal(false).with_default(empty()),
            ),
            (
                "loggedCalibration",
                FieldSpec::standard(FirstStage, List).literal(false).with_default(empty()),
            ),
            (
                "currentCalibration",
                FieldSpec::standard(FirstStage, List).literal(false).with_default(empty()),
            ),
            (
                "minMax",
                FieldSpec::standard(Common, List).literal(false).with_default(empty()),
            ),
            (
                "clamped_minMax",
                FieldSpec::standard(FirstStage, List).literal(false).with_default(empty()),
            ),
            (
                "zeroPt",
                FieldSpec::standard(FirstStage, List).literal(false).with_default(empty()),
            ),
            ("comments", FieldSpec::standard(Common, Text)),
            ("dependent", FieldSpec::standard(FirstStageOptional, Text)),
            ("Evaluate", FieldSpec::standard(Common, Text).literal(true)),
            ("postEvaluate", FieldSpec::standard(SecondStageOptional, Text).literal(true)),
            ("Overwrite", FieldSpec::standard(SecondStageOptional, Any)),
            ("ustarFiltering", FieldSpec::standard(SecondStageOptional, Any)),
            ("verbose", FieldSpec::control()),
            ("stage", FieldSpec::control()),
            ("fields_on_the_fly", FieldSpec::control()),
        ];

        Self {
            fields: fields
                .into_iter()
                .map(|(name, spec)| (name.to_string(), spec))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        let name = name.into();
        tracing::debug!(%name, stage = %spec.stage, "field discovered");
        self.fields.insert(name, spec);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Visible fields of a record in catalogue order
    ///
    /// Supplied values win over defaults. A visible field with neither is left out.
    pub fn project(
        &self,
        supplied: &IndexMap<String, Value>,
        stage: Stage,
    ) -> IndexMap<String, Value> {
        self.fields
            .iter()
            .filter(|(name, spec)| spec.is_visible(stage, supplied.contains_key(*name)))
            .filter_map(|(name, spec)| {
                supplied
                    .get(name)
                    .or(spec.default.as_ref())
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn supplied(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn optional_fields_need_a_value_and_the_stage() {
        let spec = Registry::seeded().get("dependent").cloned().unwrap();
        assert_eq!(spec.stage, FieldStage::FirstStageOptional);

        assert!(!spec.is_visible(Stage::FirstStage, false));
        assert!(!spec.is_visible(Stage::SecondStage, false));
        assert!(spec.is_visible(Stage::FirstStage, true));
        assert!(!spec.is_visible(Stage::SecondStage, true));
    }

    #[test]
    fn hidden_fields_are_never_visible() {
        let registry = Registry::seeded();
        for name in ["calibrationDates", "verbose", "stage"] {
            let spec = registry.get(name).unwrap();
            assert!(!spec.is_visible(Stage::FirstStage, true));
            assert!(!spec.is_visible(Stage::SecondStage, true));
        }
        assert!(registry.get("stage").unwrap().control);
        assert!(!registry.get("calibrationDates").unwrap().control);
    }

    #[test]
    fn projection_follows_catalogue_order_and_defaults() {
        let registry = Registry::seeded();
        let record = supplied(&[
            ("units", Value::string("C")),
            ("variableName", Value::string("TA")),
            ("calibrationDates", Value::Array(vec![])),
        ]);

        let first = registry.project(&record, Stage::FirstStage);
        assert_eq!(
            first.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![
                "variableName",
                "inputFileName",
                "inputFileName_dates",
                "units",
                "loggedCalibration",
                "currentCalibration",
                "minMax",
                "clamped_minMax",
                "zeroPt",
            ]
        );

        let second = registry.project(&record, Stage::SecondStage);
        assert_eq!(
            second.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["variableName", "units", "minMax"]
        );
    }

    #[test]
    fn discovered_fields_belong_to_the_current_stage() {
        let mut registry = Registry::seeded();
        let value = Value::Array(vec![Value::Integer(1)]);
        let spec = FieldSpec::discovered(Stage::SecondStage, &value, false);
        assert!(!spec.is_standard);
        assert_eq!(spec.field_type, FieldType::List);
        assert_eq!(spec.is_literal, Some(false));
        registry.insert("customField", spec);

        let record = supplied(&[("customField", value.clone())]);
        let projected = registry.project(&record, Stage::SecondStage);
        assert_eq!(projected.get("customField"), Some(&value));
        assert_eq!(projected.keys().last().map(String::as_str), Some("customField"));
    }

    #[test]
    fn type_acceptance() {
        assert!(FieldType::List.accepts(&Value::Array(vec![])));
        assert!(!FieldType::List.accepts(&Value::string("x")));
        assert!(FieldType::Text.accepts(&Value::Quoted("on".into())));
        assert!(!FieldType::Text.accepts(&Value::Decimal(1.0)));
        assert!(FieldType::Text.accepts(&Value::Reference("globalVars.a".into())));
    }
}
