//! fatal errors and recoverable issues
use crate::path::Path;
use crate::sources::LoadError;

/// Conditions that abort the parse of one file
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not a file: {0}")]
    FileNotFound(String),
    #[error("Unable to read {file}")]
    Load {
        file: String,
        #[source]
        source: LoadError,
    },
    #[error("{record}: `{key}` is a control field and must not be set in a trace block")]
    SchemaConflict { record: String, key: String },
    #[error("{context}: unresolved reference `{path}`")]
    UnresolvedReference { context: String, path: Path },
}

impl Error {
    pub(crate) fn load(file: &str, source: LoadError) -> Self {
        match source {
            LoadError::NotFound(_) => Error::FileNotFound(file.to_string()),
            source => Error::Load {
                file: file.to_string(),
                source,
            },
        }
    }
}

/// Recoverable problems found while parsing
///
/// Issues never stop the parse. They are collected in [Diagnostics] and handed to the caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Issue {
    #[error("{context}: `{key}` expects {expected}, found {found} `{value}`")]
    TypeMismatch {
        context: String,
        key: String,
        expected: &'static str,
        found: &'static str,
        value: String,
    },
    #[error("{context}: cannot evaluate `{value}`: {message}")]
    Expression {
        context: String,
        value: String,
        message: String,
    },
    #[error("{context}: invalid date `{value}`")]
    InvalidDate { context: String, value: String },
    #[error("{context}: unresolved reference `{path}`")]
    UnresolvedReference { context: String, path: Path },
    #[error("{context}: reference `{path}` guessed to mean `{target}`")]
    ReferenceGuessed {
        context: String,
        path: Path,
        target: Path,
    },
    #[error("{context}: unknown field `{key}`")]
    UnknownField { context: String, key: String },
    #[error("`{0}` is nested too deep")]
    PathTooDeep(Path),
    #[error("`{0}` is defined more than once")]
    PathCollision(Path),
    #[error("trace `{0}` is defined more than once")]
    DuplicateTrace(String),
    #[error("trace block starting on line {0} has no variableName")]
    MissingVariableName(usize),
    #[error("trace block starting on line {0} has no [End]")]
    UnterminatedBlock(usize),
    #[error("[End] on line {0} has no matching [Trace]")]
    StrayEnd(usize),
    #[error("include `{name}` failed: {message}")]
    IncludeFailed { name: String, message: String },
    #[error("include `{0}` includes itself")]
    IncludeCycle(String),
    #[error("in {file}: {issue}")]
    Included { file: String, issue: Box<Issue> },
}

/// Ordered collection of [Issue]s
#[derive(derive_new::new, Debug, Default, Clone)]
pub struct Diagnostics {
    #[new(default)]
    issues: Vec<Issue>,
    verbose: bool,
}

impl Diagnostics {
    pub fn log(&mut self, issue: Issue) {
        if self.verbose {
            tracing::warn!(%issue, "issue found");
        } else {
            tracing::debug!(%issue, "issue found");
        }
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Take over the issues of an included file, tagged with its name
    pub(crate) fn extend_from(&mut self, file: &str, other: Diagnostics) {
        self.issues
            .extend(other.issues.into_iter().map(|issue| Issue::Included {
                file: file.to_string(),
                issue: Box::new(issue),
            }));
    }
}
