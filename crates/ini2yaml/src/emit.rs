//! yaml writer
//!
//! serde_yaml can not emit anchors, so documents are laid out here and only scalars are
//! formatted by serde_yaml.
//!
//! A shared value is written in full the first time it is reached, tagged with an anchor named
//! after the path that defined it. Every later use is an alias:
//!
//! ```yaml
//! globalVars:
//!   inst:
//!     a: &globalVars_inst_a [1, 2, 3]
//!     b: *globalVars_inst_a
//! ```
//!
//! Lists of scalars use flow style, multi-line text uses literal blocks.
use crate::document::{output_key, Document, DocumentKind, IncludedFile, TraceRecord};
use crate::namespace::{Namespace, Node};
use crate::path::GLOBAL_VARS;
use crate::value::{Handle, Value, DATE_FORMAT};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const INDENT: usize = 2;

/// Characters that end a plain scalar inside `[...]`
const FLOW_INDICATORS: &[char] = &[',', '[', ']', '{', '}', '#'];

#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("Unable to format yaml scalar")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unable to format quoted scalar")]
    Json(#[from] serde_json::Error),
}

/// Render a parsed document
///
/// Included documents only carry their `Trace` section.
pub fn to_string(document: &Document) -> Result<String, EmitError> {
    let mut writer = Writer::new(document.namespace());

    if document.kind() == DocumentKind::Root {
        if let Some(metadata) = document.metadata() {
            writer.node(0, "metadata", metadata)?;
        }
        match document.global_vars() {
            Some(global_vars) => writer.node(0, GLOBAL_VARS, global_vars)?,
            None => writer.line(0, &format!("{GLOBAL_VARS}: {{}}")),
        }
    }

    writer.trace(document.trace())?;

    if document.kind() == DocumentKind::Root {
        writer.names(0, "Include", document.include_names())?;
    }

    Ok(writer.out)
}

/// Render the trace records taken from an included file
pub fn included_to_string(included: &IncludedFile) -> Result<String, EmitError> {
    let namespace = Namespace::default();
    let mut writer = Writer::new(&namespace);
    writer.trace(&included.trace)?;
    Ok(writer.out)
}

struct Writer<'n> {
    namespace: &'n Namespace,
    out: String,
    anchors: HashMap<Handle, String>,
    taken: HashSet<String>,
}

impl<'n> Writer<'n> {
    fn new(namespace: &'n Namespace) -> Self {
        Self {
            namespace,
            out: String::new(),
            anchors: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        self.out.extend(std::iter::repeat(' ').take(indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Anchor for the first emission of a shared slot
    fn anchor(&mut self, handle: Handle) -> String {
        let base = self.namespace.slot(handle).path.anchor();
        let mut name = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&name) {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }

        self.taken.insert(name.clone());
        self.anchors.insert(handle, name.clone());
        name
    }

    fn node(&mut self, indent: usize, key: &str, node: &Node) -> Result<(), EmitError> {
        let key = key_text(output_key(key))?;

        if let Some(handle) = node.value {
            return self.entry(indent, &format!("{key}:"), false, &Value::Shared(handle));
        }
        if node.children.is_empty() {
            self.line(indent, &format!("{key}: {{}}"));
            return Ok(());
        }

        self.line(indent, &format!("{key}:"));
        for (child_key, child) in &node.children {
            self.node(indent + INDENT, child_key, child)?;
        }
        Ok(())
    }

    fn trace(&mut self, trace: &IndexMap<String, TraceRecord>) -> Result<(), EmitError> {
        if trace.is_empty() {
            self.line(0, "Trace: {}");
            return Ok(());
        }

        self.line(0, "Trace:");
        for (name, record) in trace {
            self.line(INDENT, &format!("{}:", key_text(name)?));
            for (key, value) in record.fields() {
                let lead = format!("{}:", key_text(key)?);
                self.entry(INDENT * 2, &lead, false, value)?;
            }
        }
        Ok(())
    }

    fn names<'a>(
        &mut self,
        indent: usize,
        key: &str,
        names: impl Iterator<Item = &'a str>,
    ) -> Result<(), EmitError> {
        let names = names.map(key_text).collect::<Result<Vec<_>, _>>()?;
        if names.is_empty() {
            self.line(indent, &format!("{key}: []"));
            return Ok(());
        }

        self.line(indent, &format!("{key}:"));
        for name in names {
            self.line(indent, &format!("- {name}"));
        }
        Ok(())
    }

    /// Write `lead` (`key:` or `-`) followed by the value
    fn entry(&mut self, indent: usize, lead: &str, item: bool, value: &Value) -> Result<(), EmitError> {
        let namespace = self.namespace;
        let mut lead = lead.to_string();

        let value = match value {
            Value::Shared(handle) => {
                if let Some(name) = self.anchors.get(handle) {
                    let alias = format!("{lead} *{name}");
                    self.line(indent, &alias);
                    return Ok(());
                }
                if namespace.is_shared(*handle) {
                    let name = self.anchor(*handle);
                    lead = format!("{lead} &{name}");
                }
                namespace.get(*handle)
            }
            other => other,
        };

        match value {
            Value::Array(items) if items.is_empty() => self.line(indent, &format!("{lead} []")),
            Value::Array(items) if !items.iter().all(|item| self.is_flowable(item)) => {
                self.line(indent, &lead);
                let indent = if item { indent + INDENT } else { indent };
                for element in items {
                    self.entry(indent, "-", true, element)?;
                }
            }
            Value::String(text) if is_literal_block(text) => {
                self.line(indent, &format!("{lead} |-"));
                for text_line in text.split('\n') {
                    if text_line.is_empty() {
                        self.out.push('\n');
                    } else {
                        self.line(indent + INDENT, text_line);
                    }
                }
            }
            value => {
                let text = self.flow(value)?;
                self.line(indent, &format!("{lead} {text}"));
            }
        }
        Ok(())
    }

    fn is_flowable(&self, value: &Value) -> bool {
        match value {
            Value::Shared(handle) => {
                self.anchors.contains_key(handle) || self.is_flowable(self.namespace.get(*handle))
            }
            Value::Array(items) => items.iter().all(|item| self.is_flowable(item)),
            Value::String(text) => !text.contains('\n'),
            _ => true,
        }
    }

    /// Single line rendering of a flowable value
    fn flow(&mut self, value: &Value) -> Result<String, EmitError> {
        let namespace = self.namespace;

        match value {
            Value::Shared(handle) => {
                if let Some(name) = self.anchors.get(handle) {
                    return Ok(format!("*{name}"));
                }
                let target = namespace.get(*handle);
                if namespace.is_shared(*handle) {
                    let name = self.anchor(*handle);
                    Ok(format!("&{name} {}", self.flow(target)?))
                } else {
                    self.flow(target)
                }
            }
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.flow(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("[{}]", items.join(", ")))
            }
            Value::String(text) => string_text(text, true),
            Value::Quoted(text) => Ok(single_quoted(text)),
            Value::Date(date) => string_text(&date.format(DATE_FORMAT).to_string(), true),
            Value::Reference(path) | Value::Deferred(path) => {
                string_text(&format!("${{{path}}}"), true)
            }
            scalar => yaml_text(scalar),
        }
    }
}

fn yaml_text<T: Serialize + ?Sized>(value: &T) -> Result<String, EmitError> {
    Ok(serde_yaml::to_string(value)?
        .trim_end_matches('\n')
        .to_string())
}

fn key_text(key: &str) -> Result<String, EmitError> {
    string_text(key, false)
}

fn string_text(text: &str, in_flow: bool) -> Result<String, EmitError> {
    if text.contains('\n') {
        return Ok(serde_json::to_string(text)?);
    }

    let formatted = yaml_text(text)?;
    if formatted.contains('\n') {
        return Ok(serde_json::to_string(text)?);
    }

    let plain = !formatted.starts_with(['\'', '"']);
    if in_flow && plain && text.contains(FLOW_INDICATORS) {
        return Ok(single_quoted(text));
    }

    Ok(formatted)
}

fn single_quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Text that survives a `|-` block unchanged
fn is_literal_block(text: &str) -> bool {
    text.contains('\n')
        && !text.ends_with('\n')
        && !text.starts_with([' ', '\t', '\n'])
        && !text.contains('\r')
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::parse_str;
    use crate::options::{ParseOptions, Stage};

    fn emit(text: &str, stage: Stage) -> String {
        let document = parse_str(text, &ParseOptions::new(stage)).unwrap();
        to_string(&document).unwrap()
    }

    #[test]
    fn shared_values_are_anchored_once() {
        let yaml = emit(
            "globalVars.inst.a = [1 2 3]\nglobalVars.inst.b = globalVars.inst.a\nglobalVars.inst.c = [globalVars.inst.a, 4]\n",
            Stage::FirstStage,
        );
        insta::assert_snapshot!(yaml, @r###"
        globalVars:
          inst:
            a: &globalVars_inst_a [1, 2, 3]
            b: *globalVars_inst_a
            c: [*globalVars_inst_a, 4]
        Trace: {}
        Include: []
        "###);
    }

    #[test]
    fn trace_records_in_second_stage() {
        let yaml = emit(
            "SiteID = 'BB'\nDifference_GMT_to_local_time = 8\n[Trace]\nvariableName = 'TA'\nunits = 'C'\nminMax = [-40 50]\nEvaluate = 'TA = calc(TA_1);\nTA_2 = TA;'\n[End]\n",
            Stage::SecondStage,
        );
        insta::assert_snapshot!(yaml, @r###"
        metadata:
          SiteID: BB
          Diff_GMT_to_local_time: 8
        globalVars: {}
        Trace:
          TA:
            variableName: TA
            units: C
            minMax: [-40, 50]
            Evaluate: |-
              TA = calc(TA_1);
              TA_2 = TA;
        Include: []
        "###);
    }

    #[test]
    fn matrices_and_reserved_words() {
        let yaml = emit(
            "globalVars.cal = [1 2;3 4]\nglobalVars.mode = 'on'\nglobalVars.note = 'a, b'\n",
            Stage::FirstStage,
        );
        insta::assert_snapshot!(yaml, @r###"
        globalVars:
          cal: [[1, 2], [3, 4]]
          mode: 'on'
          note: a, b
        Trace: {}
        Include: []
        "###);
    }

    #[test]
    fn flow_lists_quote_indicators() {
        assert_eq!(string_text("a, b", true).unwrap(), "'a, b'");
        assert_eq!(string_text("a, b", false).unwrap(), "a, b");
        assert_eq!(string_text("it's", true).unwrap(), "it's");
        assert_eq!(string_text("two\nlines", true).unwrap(), "\"two\\nlines\"");
    }

    #[test]
    fn literal_blocks() {
        assert!(is_literal_block("a\nb"));
        assert!(!is_literal_block("a\nb\n"));
        assert!(!is_literal_block("  a\nb"));
        assert!(!is_literal_block("ab"));
    }

    #[test]
    fn output_reads_back() {
        let yaml = emit(
            "globalVars.inst.a = [1 2]\n[Trace]\nvariableName = 'TA'\nminMax = globalVars.inst.a\ncomments = 'first\n second'\n[End]\n",
            Stage::FirstStage,
        );
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["Trace"]["TA"]["minMax"], value["globalVars"]["inst"]["a"]);
        assert_eq!(
            value["Trace"]["TA"]["comments"],
            serde_yaml::Value::String("first second".into())
        );
    }
}
