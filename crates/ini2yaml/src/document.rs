//! Document assembly
//!
//! One [Document] is built per file. The file is normalized and split into statements, then
//! walked in order:
//!
//! - top-level assignments (`SiteID = 'BB'`, `globalVars.inst.a = [1 2]`) are evaluated and
//!   bound in the [Namespace] right away, so they can only reference what is defined above them
//! - `[Trace]` ... `[End]` blocks are evaluated field by field against the [Registry]; their
//!   references are resolved once the whole file is read
//! - `#include` directives parse the named file with a fresh namespace and keep its trace records
use crate::error::{Diagnostics, Error, Issue};
use crate::expr::{self, Evaluated};
use crate::namespace::{DefineError, Namespace, Node, Resolution};
use crate::normalize;
use crate::options::{ParseOptions, Stage, UnresolvedPolicy};
use crate::path::{Path, GLOBAL_VARS, METADATA};
use crate::schema::{FieldSpec, Registry};
use crate::sources::{Loader, MemoryLoader};
use crate::tokenize::{self, Assignment, Statement};
use crate::util;
use crate::value::{Resolved, Value};
use crate::visit::VisitValuesMut;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Older files spell the global variable root like this
const LEGACY_GLOBAL_VARS: &str = "globalVariables";

/// Name used for documents parsed from a string
const STRING_SOURCE: &str = "<string>";

const RENAMED_KEYS: &[(&str, &str)] = &[("Difference_GMT_to_local_time", "Diff_GMT_to_local_time")];

/// Key as it is written to the output
pub fn output_key(key: &str) -> &str {
    RENAMED_KEYS
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key, |(_, to)| *to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// requested by the caller
    Root,
    /// pulled in by an `#include` directive
    Include,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceRecord {
    fields: IndexMap<String, Value>,
}

impl TraceRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Trace records of an included file
///
/// Values are plain copies, the namespace of the included file is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludedFile {
    /// name as written in the directive
    pub file: String,
    pub trace: IndexMap<String, TraceRecord>,
}

#[derive(Debug)]
pub struct Document {
    kind: DocumentKind,
    file: String,
    stage: Stage,
    namespace: Namespace,
    trace: IndexMap<String, TraceRecord>,
    includes: IndexMap<String, IncludedFile>,
    diagnostics: Diagnostics,
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    pub fn metadata(&self) -> Option<&Node> {
        self.namespace.root(METADATA)
    }

    pub fn global_vars(&self) -> Option<&Node> {
        self.namespace.root(GLOBAL_VARS)
    }

    pub fn trace(&self) -> &IndexMap<String, TraceRecord> {
        &self.trace
    }

    pub fn includes(&self) -> &IndexMap<String, IncludedFile> {
        &self.includes
    }

    pub fn include_names(&self) -> impl Iterator<Item = &str> {
        self.includes.keys().map(String::as_str)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Value bound to a `globalVars.*` or `Metadata.*` path
    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.namespace
            .lookup(path)
            .map(|handle| self.namespace.get(handle))
    }

    /// Copy of `value` with every shared value inlined
    pub fn resolved(&self, value: &Value) -> Value {
        self.namespace.materialize(value)
    }

    fn into_included(self) -> (IndexMap<String, TraceRecord>, Diagnostics) {
        let Document {
            namespace,
            trace,
            diagnostics,
            ..
        } = self;

        let trace = trace
            .into_iter()
            .map(|(name, record)| {
                let fields = record
                    .fields
                    .iter()
                    .map(|(key, value)| (key.clone(), namespace.materialize(value)))
                    .collect();
                (name, TraceRecord { fields })
            })
            .collect();

        (trace, diagnostics)
    }
}

/// Parse `file` and everything it includes
///
/// ```
/// use ini2yaml::{options::{ParseOptions, Stage}, path::Path, sources};
///
/// let loader = sources! {
///     "BB/BB_firststage.ini" => "globalVars.inst.a = [1 2 3]\n[Trace]\nvariableName = 'TA'\n[End]",
/// };
/// let document = ini2yaml::parse(&loader, "BB/BB_firststage.ini", &ParseOptions::new(Stage::FirstStage))?;
/// assert!(document.trace().contains_key("TA"));
/// assert!(document.get(&Path::parse("globalVars.inst.a")).is_some());
/// # Ok::<(), ini2yaml::error::Error>(())
/// ```
pub fn parse<L: Loader>(loader: &L, file: &str, options: &ParseOptions) -> Result<Document, Error> {
    Assembler::new(loader, options).document(file, DocumentKind::Root)
}

/// Parse a document that is already in memory
///
/// `#include` directives cannot be followed and are reported as failed.
pub fn parse_str(text: &str, options: &ParseOptions) -> Result<Document, Error> {
    let loader = MemoryLoader::default();
    Assembler::new(&loader, options).assemble(text, STRING_SOURCE, DocumentKind::Root)
}

struct Assembler<'a> {
    loader: &'a dyn Loader,
    options: &'a ParseOptions,
    /// files currently being parsed, outermost first
    stack: Vec<String>,
}

impl<'a> Assembler<'a> {
    fn new(loader: &'a dyn Loader, options: &'a ParseOptions) -> Self {
        Self {
            loader,
            options,
            stack: vec![],
        }
    }

    fn document(&mut self, file: &str, kind: DocumentKind) -> Result<Document, Error> {
        let text = self
            .loader
            .load(file)
            .map_err(|source| Error::load(file, source))?;

        self.assemble(&text, file, kind)
    }

    fn assemble(&mut self, text: &str, file: &str, kind: DocumentKind) -> Result<Document, Error> {
        let span = tracing::debug_span!("parse", %file, ?kind);
        let _guard = span.enter();

        self.stack.push(file.to_string());
        let result = self.walk(text, FileState::new(file, kind, self.options));
        self.stack.pop();
        result
    }

    fn walk(&mut self, text: &str, mut state: FileState) -> Result<Document, Error> {
        let normalized = normalize::normalize(text, &mut state.diagnostics);
        let statements = tokenize::statements(&normalized);
        tracing::debug!(statements = statements.len(), "tokenized");

        state.seed_site_id();

        let mut block: Option<(usize, Vec<Assignment>)> = None;
        for statement in statements {
            match statement {
                Statement::TraceStart(line) => {
                    if let Some((start, _)) = block.replace((line, vec![])) {
                        state.diagnostics.log(Issue::UnterminatedBlock(start));
                    }
                }
                Statement::TraceEnd(line) => match block.take() {
                    Some((start, entries)) => state.trace_block(start, entries)?,
                    None => state.diagnostics.log(Issue::StrayEnd(line)),
                },
                Statement::Include { name, .. } => self.include(&name, &mut state),
                Statement::Assignment(assignment) => match block.as_mut() {
                    Some((_, entries)) => entries.push(assignment),
                    None => state.top_level(assignment)?,
                },
            }
        }

        if let Some((start, _)) = block {
            state.diagnostics.log(Issue::UnterminatedBlock(start));
        }

        state.finish()
    }

    fn include(&mut self, directive: &str, state: &mut FileState) {
        let file = util::unquote(directive.trim()).trim().to_string();
        let name = file
            .split_once('.')
            .map_or(file.as_str(), |(name, _)| name)
            .to_string();

        if self.stack.contains(&file) {
            state.diagnostics.log(Issue::IncludeCycle(file));
            return;
        }

        match self.document(&file, DocumentKind::Include) {
            Ok(included) => {
                let (trace, diagnostics) = included.into_included();
                tracing::debug!(%name, traces = trace.len(), "included");
                state.diagnostics.extend_from(&file, diagnostics);
                state.includes.insert(name, IncludedFile { file, trace });
            }
            Err(err) => state.diagnostics.log(Issue::IncludeFailed {
                name,
                message: err.to_string(),
            }),
        }
    }
}

/// Trace block that still has to be resolved
struct PendingRecord {
    name: String,
    fields: IndexMap<String, Value>,
}

/// Everything collected while walking one file
struct FileState<'a> {
    file: String,
    kind: DocumentKind,
    options: &'a ParseOptions,
    policy: UnresolvedPolicy,
    namespace: Namespace,
    registry: Registry,
    diagnostics: Diagnostics,
    records: Vec<PendingRecord>,
    includes: IndexMap<String, IncludedFile>,
    /// path set from the options that the file may override silently
    seeded: Option<Path>,
}

impl<'a> FileState<'a> {
    fn new(file: &str, kind: DocumentKind, options: &'a ParseOptions) -> Self {
        let policy = match kind {
            DocumentKind::Root => options.unresolved,
            DocumentKind::Include => options.unresolved_in_include,
        };

        Self {
            file: file.to_string(),
            kind,
            options,
            policy,
            namespace: Namespace::default(),
            registry: Registry::seeded(),
            diagnostics: Diagnostics::new(options.verbose),
            records: vec![],
            includes: IndexMap::new(),
            seeded: None,
        }
    }

    fn seed_site_id(&mut self) {
        let options = self.options;
        let Some(site_id) = &options.site_id else {
            return;
        };
        if self.kind != DocumentKind::Root {
            return;
        }

        let path = Path::metadata("SiteID");
        self.define(path.clone(), Value::string(site_id.as_str()));
        self.seeded = Some(path);
    }

    fn top_level(&mut self, assignment: Assignment) -> Result<(), Error> {
        let Some(path) = top_level_path(&assignment.key) else {
            self.diagnostics.log(Issue::UnknownField {
                context: format!("line {}", assignment.line),
                key: assignment.key,
            });
            return Ok(());
        };

        let context = path.to_string();
        let Some(Evaluated { mut value, .. }) = self.evaluate(&context, &assignment.value, None)
        else {
            return Ok(());
        };

        let resolution = self.namespace.resolve(&mut value);
        self.settle(&context, resolution)?;
        match self.policy {
            UnresolvedPolicy::Defer => defer_references(&mut value),
            _ if value.has_references() => return Ok(()),
            _ => {}
        }

        self.define(path, value);
        Ok(())
    }

    fn define(&mut self, path: Path, value: Value) {
        match self.namespace.define(path.clone(), value) {
            Ok(defined) => {
                if self.seeded.as_ref() == Some(&path) {
                    self.seeded = None;
                } else if defined.replaced {
                    self.diagnostics.log(Issue::PathCollision(path));
                }
            }
            Err(DefineError::TooDeep) => self.diagnostics.log(Issue::PathTooDeep(path)),
            Err(DefineError::Collision) => self.diagnostics.log(Issue::PathCollision(path)),
        }
    }

    fn trace_block(&mut self, start: usize, entries: Vec<Assignment>) -> Result<(), Error> {
        let mut context = format!("trace block on line {start}");
        let mut fields = IndexMap::new();

        for Assignment { key, value, .. } in entries {
            match self.registry.get(&key).cloned() {
                Some(spec) if spec.control => {
                    return Err(Error::SchemaConflict {
                        record: context,
                        key,
                    })
                }
                Some(spec) => {
                    let Some(evaluated) = self.evaluate(&context, &value, spec.is_literal) else {
                        continue;
                    };
                    if let Some(value) = self.check_type(&context, &key, &spec, evaluated.value) {
                        fields.insert(key, value);
                    }
                }
                None if self.options.fields_on_the_fly => {
                    let Some(evaluated) = self.evaluate(&context, &value, None) else {
                        continue;
                    };
                    let spec =
                        FieldSpec::discovered(self.options.stage, &evaluated.value, evaluated.text);
                    self.registry.insert(key.as_str(), spec);
                    fields.insert(key, evaluated.value);
                }
                None => self.diagnostics.log(Issue::UnknownField {
                    context: context.clone(),
                    key,
                }),
            }

            if let Some(name) = variable_name(&fields) {
                context = name;
            }
        }

        let Some(name) = variable_name(&fields) else {
            self.diagnostics.log(Issue::MissingVariableName(start));
            return Ok(());
        };

        tracing::trace!(%name, fields = fields.len(), "trace block");
        self.records.push(PendingRecord { name, fields });
        Ok(())
    }

    fn evaluate(&mut self, context: &str, raw: &str, literal: Option<bool>) -> Option<Evaluated> {
        expr::evaluate(raw, literal)
            .map_err(|err| {
                self.diagnostics.log(Issue::Expression {
                    context: context.to_string(),
                    value: raw.to_string(),
                    message: err.to_string(),
                })
            })
            .ok()
    }

    /// Value to keep for a field, falling back to the default for empty values of the wrong type
    fn check_type(
        &mut self,
        context: &str,
        key: &str,
        spec: &FieldSpec,
        value: Value,
    ) -> Option<Value> {
        if spec.field_type.accepts(&value) {
            return Some(value);
        }
        if value.is_empty_like() {
            return spec.default.clone();
        }

        self.diagnostics.log(Issue::TypeMismatch {
            context: context.to_string(),
            key: key.to_string(),
            expected: spec.field_type.name(),
            found: value.type_name(),
            value: serde_json::to_string(&value).unwrap_or_else(|_| value.type_name().to_string()),
        });
        Some(value)
    }

    /// Report the outcome of a resolution, failing on unresolved references if asked to
    fn settle(&mut self, context: &str, resolution: Resolution) -> Result<(), Error> {
        for (path, target) in resolution.guessed {
            self.diagnostics.log(Issue::ReferenceGuessed {
                context: context.to_string(),
                path,
                target,
            });
        }

        if self.policy == UnresolvedPolicy::Fail {
            if let Some(path) = resolution.unresolved.into_iter().next() {
                return Err(Error::UnresolvedReference {
                    context: context.to_string(),
                    path,
                });
            }
            return Ok(());
        }

        for path in resolution.unresolved {
            self.diagnostics.log(Issue::UnresolvedReference {
                context: context.to_string(),
                path,
            });
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document, Error> {
        let mut trace = IndexMap::new();

        for PendingRecord { name, mut fields } in std::mem::take(&mut self.records) {
            let resolution = self.namespace.resolve(&mut fields);
            self.settle(&name, resolution)?;
            match self.policy {
                UnresolvedPolicy::Defer => defer_references(&mut fields),
                _ => fields.retain(|_, value| !value.has_references()),
            }

            let record = TraceRecord {
                fields: self.registry.project(&fields, self.options.stage),
            };
            if trace.insert(name.clone(), record).is_some() {
                self.diagnostics.log(Issue::DuplicateTrace(name));
            }
        }

        tracing::debug!(
            traces = trace.len(),
            includes = self.includes.len(),
            issues = self.diagnostics.issues().len(),
            "assembled"
        );

        Ok(Document {
            kind: self.kind,
            file: self.file,
            stage: self.options.stage,
            namespace: self.namespace,
            trace,
            includes: self.includes,
            diagnostics: self.diagnostics,
        })
    }
}

/// Namespace path of a top-level key
///
/// Plain keys are metadata (`SiteID` is `Metadata.SiteID`).
fn top_level_path(key: &str) -> Option<Path> {
    let mut path = Path::parse(key);
    if path.len() == 1 {
        path = Path::metadata(key.trim());
    } else if path.root() == Some(LEGACY_GLOBAL_VARS) {
        let mut segments = path.segments().to_vec();
        segments[0] = GLOBAL_VARS.to_string();
        path = Path::new(segments);
    }

    path.is_addressable().then_some(path)
}

fn variable_name(fields: &IndexMap<String, Value>) -> Option<String> {
    fields
        .get("variableName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn defer_references<V: VisitValuesMut>(value: &mut V) {
    value.visit_references_mut(&mut |value: &mut Value| {
        if let Value::Reference(path) = value {
            *value = Value::Deferred(path.clone());
        }
    });
}

#[derive(derive_new::new)]
struct NodeView<'a> {
    node: &'a Node,
    namespace: &'a Namespace,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.node.value {
            Some(handle) => {
                Resolved::new(self.namespace.get(handle), self.namespace).serialize(serializer)
            }
            None => serializer.collect_map(
                self.node
                    .children
                    .iter()
                    .map(|(key, child)| (output_key(key), NodeView::new(child, self.namespace))),
            ),
        }
    }
}

#[derive(derive_new::new)]
struct FieldsView<'a> {
    fields: &'a IndexMap<String, Value>,
    namespace: &'a Namespace,
}

impl Serialize for FieldsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.fields
                .iter()
                .map(|(key, value)| (key, Resolved::new(value, self.namespace))),
        )
    }
}

#[derive(derive_new::new)]
struct TraceView<'a> {
    trace: &'a IndexMap<String, TraceRecord>,
    namespace: &'a Namespace,
}

impl Serialize for TraceView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.trace
                .iter()
                .map(|(name, record)| (name, FieldsView::new(&record.fields, self.namespace))),
        )
    }
}

/// Json-like view of the document, shared values are inlined at every use
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        let empty = Node::default();

        if self.kind == DocumentKind::Root {
            if let Some(metadata) = self.metadata() {
                map.serialize_entry("metadata", &NodeView::new(metadata, &self.namespace))?;
            }
            let global_vars = self.global_vars().unwrap_or(&empty);
            map.serialize_entry(GLOBAL_VARS, &NodeView::new(global_vars, &self.namespace))?;
        }

        map.serialize_entry("Trace", &TraceView::new(&self.trace, &self.namespace))?;

        if self.kind == DocumentKind::Root {
            let names: Vec<&str> = self.include_names().collect();
            map.serialize_entry("Include", &names)?;
        }
        map.end()
    }
}

impl Serialize for IncludedFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let namespace = Namespace::default();
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("Trace", &TraceView::new(&self.trace, &namespace))?;
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first_stage() -> ParseOptions {
        ParseOptions::new(Stage::FirstStage)
    }

    fn parse_text(text: &str) -> Document {
        parse_str(text, &first_stage()).unwrap()
    }

    #[test]
    fn top_level_keys_are_metadata() {
        let document = parse_text("SiteID = 'BB'\nDifference_GMT_to_local_time = 8\n");
        assert_eq!(
            document.get(&Path::metadata("SiteID")),
            Some(&Value::string("BB"))
        );
        assert_eq!(
            document.get(&Path::metadata("Difference_GMT_to_local_time")),
            Some(&Value::Integer(8))
        );
        assert!(document.global_vars().is_none());
    }

    #[test]
    fn legacy_root_is_accepted() {
        let document = parse_text("globalVariables.inst.a = 1\n");
        assert_eq!(
            document.get(&Path::parse("globalVars.inst.a")),
            Some(&Value::Integer(1))
        );
    }

    #[test]
    fn trace_records_follow_the_catalogue() {
        let document = parse_text(
            "[Trace]\nunits = 'C'\nvariableName = 'TA_1'\nminMax = [-40 50]\n[End]\n",
        );
        let record = &document.trace()["TA_1"];
        assert_eq!(
            record.keys().collect::<Vec<_>>(),
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
        assert_eq!(
            record.get("minMax"),
            Some(&Value::Array(vec![Value::Integer(-40), Value::Integer(50)]))
        );
    }

    #[test]
    fn trace_fields_share_global_values() {
        let document = parse_text(
            "globalVars.inst.a = [1 2]\n[Trace]\nvariableName = 'TA'\nminMax = globalVars.inst.a\n[End]\n",
        );
        let handle = document
            .namespace()
            .lookup(&Path::parse("globalVars.inst.a"))
            .unwrap();
        assert_eq!(
            document.trace()["TA"].get("minMax"),
            Some(&Value::Shared(handle))
        );
        assert!(document.namespace().is_shared(handle));
    }

    #[test]
    fn control_fields_abort_the_file() {
        let err = parse_str(
            "[Trace]\nvariableName = 'TA'\nstage = 'secondstage'\n[End]\n",
            &first_stage(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SchemaConflict { ref record, ref key } if record == "TA" && key == "stage"));
    }

    #[test]
    fn unknown_fields_without_discovery() {
        let document = parse_text("[Trace]\nvariableName = 'TA'\ncustom = 3\n[End]\n");
        assert!(document.trace()["TA"].get("custom").is_none());
        assert_eq!(
            document.diagnostics().issues(),
            &[Issue::UnknownField {
                context: "TA".into(),
                key: "custom".into()
            }]
        );
    }

    #[test]
    fn unknown_fields_with_discovery() {
        let options = first_stage().with_fields_on_the_fly(true);
        let document = parse_str(
            "[Trace]\nvariableName = 'TA'\ncustom = [1 2]\n[End]\n",
            &options,
        )
        .unwrap();
        assert_eq!(
            document.trace()["TA"].get("custom"),
            Some(&Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert!(document.diagnostics().is_empty());
    }

    #[test]
    fn empty_values_of_the_wrong_type_use_the_default() {
        let document = parse_text(
            "[Trace]\nvariableName = 'TA'\nminMax = ''\nunits = [1 2]\n[End]\n",
        );
        let record = &document.trace()["TA"];
        assert_eq!(record.get("minMax"), Some(&Value::Array(vec![])));
        assert_eq!(
            record.get("units"),
            Some(&Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert!(matches!(
            document.diagnostics().issues(),
            [Issue::TypeMismatch { key, .. }] if key == "units"
        ));
    }

    #[test]
    fn block_structure_issues() {
        let document = parse_text(
            "[End]\n[Trace]\nunits = 'C'\n[End]\n[Trace]\nvariableName = 'A'\n[Trace]\nvariableName = 'B'\n[End]\n[Trace]\nvariableName = 'B'\n[End]\n",
        );
        assert_eq!(document.trace().keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(
            document.diagnostics().issues(),
            &[
                Issue::StrayEnd(1),
                Issue::MissingVariableName(2),
                Issue::UnterminatedBlock(5),
                Issue::DuplicateTrace("B".into()),
            ]
        );
    }

    #[test]
    fn unresolved_policies() {
        let text = "globalVars.a = globalVars.missing\n[Trace]\nvariableName = 'TA'\nminMax = globalVars.nothing\n[End]\n";

        let omitted = parse_text(text);
        assert!(omitted.get(&Path::parse("globalVars.a")).is_none());
        assert_eq!(omitted.trace()["TA"].get("minMax"), Some(&Value::Array(vec![])));

        let deferred = parse_str(text, &first_stage().with_unresolved(UnresolvedPolicy::Defer)).unwrap();
        assert_eq!(
            deferred.get(&Path::parse("globalVars.a")),
            Some(&Value::Deferred(Path::parse("globalVars.missing")))
        );

        let failed = parse_str(text, &first_stage().with_unresolved(UnresolvedPolicy::Fail));
        assert!(matches!(failed, Err(Error::UnresolvedReference { .. })));
    }

    #[test]
    fn site_id_is_seeded_unless_set() {
        let options = first_stage().with_site_id("BB");
        let seeded = parse_str("Timezone = 7\n", &options).unwrap();
        assert_eq!(seeded.get(&Path::metadata("SiteID")), Some(&Value::string("BB")));

        let overridden = parse_str("SiteID = 'BB2'\n", &options).unwrap();
        assert_eq!(
            overridden.get(&Path::metadata("SiteID")),
            Some(&Value::string("BB2"))
        );
        assert!(overridden.diagnostics().is_empty());
    }

    #[test]
    fn includes_are_not_followed_from_strings() {
        let document = parse_text("#include sub.ini\n");
        assert!(document.includes().is_empty());
        assert!(matches!(
            document.diagnostics().issues(),
            [Issue::IncludeFailed { name, .. }] if name == "sub"
        ));
    }

    #[test]
    fn json_view_inlines_shared_values() {
        let document = parse_text(
            "Difference_GMT_to_local_time = -8\nglobalVars.a = [1 2]\nglobalVars.b = globalVars.a\n[Trace]\nvariableName = 'TA'\nminMax = globalVars.b\n[End]\n",
        );
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "metadata": { "Diff_GMT_to_local_time": -8 },
                "globalVars": { "a": [1, 2], "b": [1, 2] },
                "Trace": { "TA": {
                    "variableName": "TA",
                    "inputFileName": [],
                    "inputFileName_dates": [],
                    "loggedCalibration": [],
                    "currentCalibration": [],
                    "minMax": [1, 2],
                    "clamped_minMax": [],
                    "zeroPt": [],
                }},
                "Include": [],
            })
        );
    }
}
