//! # ini2yaml - legacy trace configuration converter
//!
//! Converts the `.ini` files of the trace analysis procedures into yaml (or json) while keeping
//! values that are referenced from several places as one shared value.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `ini2yaml` works internally.
//!
//! ### Input terms
//!
//! ```text
//! % comments start with a percent sign
//! SiteID = 'BB'                          <- metadata, addressable as Metadata.SiteID
//! globalVars.inst.range = [-40 60]       <- global variable (at most 3 levels deep)
//! #include shared_traces.ini             <- include, stored as Include.shared_traces
//!
//! [Trace]                                <- trace block
//! variableName = 'TA_1'
//! minMax = globalVars.inst.range         <- reference, shared with the global variable
//! Evaluate = 'TA_1 = calc(TA_1_raw);'    <- literal field, kept as text
//! [End]
//! ```
//!
//! ### Loading files
//!
//! Files are requested by name from a [sources::Loader]. The binary uses [sources::FsLoader],
//! tests mostly use [sources::MemoryLoader] (see [sources!]).
//!
//! ### Normalizing and splitting
//!
//! [normalize::normalize] rewrites the text into a form that is easy to split: comments are
//! removed, `datenum(...)` and `num2str(...)` are replaced, lists get comma delimiters and
//! block markers end up on their own lines. [tokenize::statements] then splits the text into
//! block markers, includes and `key = value` assignments.
//!
//! ### Evaluating values
//!
//! [expr::evaluate] turns a raw value into a [value::Value]. Whether a value is evaluated at all
//! depends on the literal flag of its field in the [schema::Registry].
//!
//! ### Resolving references
//!
//! Every top-level assignment is bound to a path in the [namespace::Namespace]. References to
//! those paths resolve to the slot handle of their target, so the output can emit the value
//! once and alias it everywhere else.
//!
//! ### Assembly
//!
//! [document::parse] drives all of the above per file and follows `#include` directives,
//! producing a [document::Document].
//!
//! ### Output
//!
//! [emit::to_string] writes yaml with anchors and aliases. Json output goes through [serde],
//! which inlines shared values.
pub mod document;
pub mod emit;
pub mod error;
pub mod expr;
pub mod namespace;
pub mod normalize;
pub mod options;
pub mod path;
pub mod schema;
pub mod sources;
pub mod tokenize;
mod util;
pub mod value;
mod visit;

pub use document::{parse, parse_str, Document};
