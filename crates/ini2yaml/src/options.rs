//! parse configuration
use std::fmt;
use std::str::FromStr;

/// Processing pass a configuration file is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    FirstStage,
    SecondStage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FirstStage => "firststage",
            Stage::SecondStage => "secondstage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown stage `{0}` (expected firststage or secondstage)")]
pub struct UnknownStage(String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firststage" => Ok(Stage::FirstStage),
            "secondstage" => Ok(Stage::SecondStage),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// What to do with a reference that does not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// report and leave the field out
    Omit,
    /// report and emit a `${path}` placeholder
    Defer,
    /// abort the file
    Fail,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub stage: Stage,
    /// log issues as warnings instead of debug events
    pub verbose: bool,
    /// accept trace fields that are not part of the base catalogue
    pub fields_on_the_fly: bool,
    /// `Metadata.SiteID` unless the file sets it
    pub site_id: Option<String>,
    pub unresolved: UnresolvedPolicy,
    pub unresolved_in_include: UnresolvedPolicy,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            verbose: true,
            fields_on_the_fly: false,
            site_id: None,
            unresolved: UnresolvedPolicy::Omit,
            unresolved_in_include: UnresolvedPolicy::Defer,
        }
    }
}

impl ParseOptions {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_fields_on_the_fly(mut self, fields_on_the_fly: bool) -> Self {
        self.fields_on_the_fly = fields_on_the_fly;
        self
    }

    pub fn with_site_id(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    pub fn with_unresolved(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved = policy;
        self
    }

    pub fn with_unresolved_in_include(mut self, policy: UnresolvedPolicy) -> Self {
        self.unresolved_in_include = policy;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stage_round_trips_through_text() {
        for stage in [Stage::FirstStage, Stage::SecondStage] {
            assert_eq!(stage.to_string().parse::<Stage>(), Ok(stage));
        }
        assert!("thirdstage".parse::<Stage>().is_err());
    }

    #[test]
    fn builder() {
        let options = ParseOptions::new(Stage::SecondStage)
            .with_fields_on_the_fly(true)
            .with_site_id("BB");
        assert_eq!(options.stage, Stage::SecondStage);
        assert!(options.fields_on_the_fly);
        assert_eq!(options.site_id.as_deref(), Some("BB"));
        assert_eq!(options.unresolved, UnresolvedPolicy::Omit);
        assert_eq!(options.unresolved_in_include, UnresolvedPolicy::Defer);
    }
}
