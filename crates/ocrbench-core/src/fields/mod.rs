//! Structured field extraction from OCR text.
//!
//! Each field owns an ordered list of patterns. The first pattern that
//! yields a non-empty capture sets the field; later patterns for that field
//! are not consulted.

pub mod patterns;

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use patterns::*;

/// Target fields of a legal requirement document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    Fecha,
    AutoridadEmisora,
    Expediente,
    Oficio,
    TipoRequerimiento,
    Rfc,
}

impl FieldName {
    pub const ALL: [FieldName; 6] = [
        Self::Fecha,
        Self::AutoridadEmisora,
        Self::Expediente,
        Self::Oficio,
        Self::TipoRequerimiento,
        Self::Rfc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fecha => "fecha",
            Self::AutoridadEmisora => "autoridadEmisora",
            Self::Expediente => "expediente",
            Self::Oficio => "oficio",
            Self::TipoRequerimiento => "tipoRequerimiento",
            Self::Rfc => "rfc",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted values keyed by field. Unmatched fields are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredFields(BTreeMap<FieldName, String>);

impl StructuredFields {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.0.get(&field).map(|v| v.as_str())
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.0.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// One field and its patterns in priority order.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: FieldName,
    pub patterns: Vec<Regex>,
}

impl FieldRule {
    pub fn new(field: FieldName, patterns: Vec<Regex>) -> Self {
        Self { field, patterns }
    }

    /// Build a rule from pattern sources.
    pub fn from_patterns(field: FieldName, patterns: &[&str]) -> Result<Self> {
        let patterns = patterns.iter().map(|p| Regex::new(p)).collect::<std::result::Result<_, _>>()?;
        Ok(Self { field, patterns })
    }

    /// First accepted capture, trying patterns in order.
    fn apply(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            let caps = re.captures(text)?;
            let matched = caps.get(1).or_else(|| caps.get(0))?;
            let value = clean_capture(matched.as_str());
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

/// Applies field rules to OCR text.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<FieldRule>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    /// Extractor with the default rule table.
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Extract every field the rules can find in `raw_text`.
    pub fn extract(&self, raw_text: &str) -> StructuredFields {
        let text = normalize(raw_text);
        let mut fields = BTreeMap::new();

        for rule in &self.rules {
            if fields.contains_key(&rule.field) {
                continue;
            }
            if let Some(value) = rule.apply(&text) {
                fields.insert(rule.field, value);
            }
        }

        StructuredFields(fields)
    }
}

/// Uppercase and collapse every whitespace run to one space.
pub fn normalize(raw_text: &str) -> String {
    raw_text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

fn clean_capture(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':'))
}

fn default_rules() -> Vec<FieldRule> {
    vec![
        FieldRule::new(
            FieldName::Fecha,
            vec![
                FECHA_LABELED_ISO.clone(),
                FECHA_LABELED_DMY.clone(),
                FECHA_ISO.clone(),
                FECHA_DMY.clone(),
                FECHA_LONG.clone(),
            ],
        ),
        FieldRule::new(
            FieldName::AutoridadEmisora,
            vec![
                AUTORIDAD_LABELED.clone(),
                AUTORIDAD_FULL_NAME.clone(),
                AUTORIDAD_ACRONYM.clone(),
            ],
        ),
        FieldRule::new(
            FieldName::Expediente,
            vec![EXPEDIENTE_LABELED.clone(), EXPEDIENTE_SHORT.clone()],
        ),
        FieldRule::new(FieldName::Oficio, vec![OFICIO_LABELED.clone()]),
        FieldRule::new(
            FieldName::TipoRequerimiento,
            vec![TIPO_LABELED.clone(), TIPO_KEYWORD.clone()],
        ),
        FieldRule::new(FieldName::Rfc, vec![RFC_LABELED.clone(), RFC_STANDALONE.clone()]),
    ]
}
