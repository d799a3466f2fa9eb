//! Field rules: ordered pattern lists with a normalizer per field.

pub mod normalize;
pub mod patterns;

pub use normalize::{decimal_point, strip_whitespace, Normalizer};
pub use patterns::{default_rules, DEFAULT_RULE_SET};

use std::collections::HashSet;

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Uncompiled description of one field, as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Output key and display label.
    pub name: String,
    /// Candidate patterns, highest priority first.
    pub patterns: Vec<String>,
    /// How a match becomes the stored value.
    pub normalizer: Normalizer,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, normalizer: Normalizer) -> Self {
        Self {
            name: name.into(),
            patterns: Vec::new(),
            normalizer,
        }
    }

    /// Append a lower-priority alternative wording.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Compile the patterns (case-insensitive) and check their group counts.
    pub fn compile(&self) -> Result<FieldSpec, RuleError> {
        if self.patterns.is_empty() {
            return Err(RuleError::Empty(self.name.clone()));
        }

        let required = self.normalizer.group_count();
        let mut patterns = Vec::with_capacity(self.patterns.len());

        for (index, source) in self.patterns.iter().enumerate() {
            let regex = RegexBuilder::new(source)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    field: self.name.clone(),
                    source,
                })?;

            // captures_len counts the implicit whole-match group
            let found = regex.captures_len() - 1;
            if found < required {
                return Err(RuleError::MissingGroups {
                    field: self.name.clone(),
                    index,
                    found,
                    required,
                });
            }
            patterns.push(regex);
        }

        Ok(FieldSpec {
            name: self.name.clone(),
            patterns,
            normalizer: self.normalizer,
        })
    }
}

/// A compiled field rule.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    patterns: Vec<Regex>,
    normalizer: Normalizer,
}

impl FieldSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn normalizer(&self) -> Normalizer {
        self.normalizer
    }

    /// Capture groups each pattern provides to the normalizer (1 or 2).
    pub fn group_count(&self) -> usize {
        self.normalizer.group_count()
    }

    /// First pattern, in priority order, that matches anywhere in `text`.
    ///
    /// Returns the pattern index with its captures. Later patterns are not
    /// tried once one matches, even if they would match earlier in the text.
    pub fn find<'t>(&self, text: &'t str) -> Option<(usize, Captures<'t>)> {
        self.patterns
            .iter()
            .enumerate()
            .find_map(|(index, regex)| regex.captures(text).map(|caps| (index, caps)))
    }

    /// Back to the configuration form.
    pub fn to_rule(&self) -> FieldRule {
        FieldRule {
            name: self.name.clone(),
            patterns: self.patterns.iter().map(|r| r.as_str().to_string()).collect(),
            normalizer: self.normalizer,
        }
    }
}

/// Ordered set of compiled field rules. Order is output order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    fields: Vec<FieldSpec>,
}

impl RuleSet {
    /// Compile a rule table, rejecting duplicate names.
    pub fn from_rules(rules: &[FieldRule]) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(rules.len());

        for rule in rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(RuleError::DuplicateField(rule.name.clone()));
            }
            fields.push(rule.compile()?);
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_rules(&self) -> Vec<FieldRule> {
        self.fields.iter().map(FieldSpec::to_rule).collect()
    }
}

impl Default for RuleSet {
    /// The built-in electricity invoice table.
    fn default() -> Self {
        DEFAULT_RULE_SET.clone()
    }
}
