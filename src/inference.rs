//! Column type inference.
//!
//! A [`TypeClassifier`] starts out believing a column could be any of the
//! candidate [`TypeTag`]s and drops a tag the first time a non-empty value
//! fails that tag's parse rule. Once every row has been observed the
//! surviving tag with the highest precedence decides the SQL type, and the
//! same parse rule re-renders each value for the load block.
//!
//! Empty values (and the `#DIV/0!` sentinel) never disqualify a tag; they
//! only make the column nullable. A column without a single non-empty value
//! therefore keeps every tag and resolves to `timestamptz`.

use std::fmt;

use anyhow::Result;
use log::debug;

use crate::{
    data::{normalize_sentinel, parse_date, parse_float, parse_integer, parse_percent},
    error::{ConvertError, ConvertResult},
};

/// A candidate column type, listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    Date,
    Integer,
    Float,
    Percent,
}

impl TypeTag {
    /// Every candidate, highest precedence first.
    pub const PRECEDENCE: [TypeTag; 4] = [
        TypeTag::Date,
        TypeTag::Integer,
        TypeTag::Float,
        TypeTag::Percent,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Applies the tag's parse rule, returning the canonical rendering.
    pub fn parse(self, value: &str) -> Result<String> {
        match self {
            TypeTag::Date => parse_date(value),
            TypeTag::Integer => parse_integer(value),
            TypeTag::Float => parse_float(value),
            TypeTag::Percent => parse_percent(value),
        }
    }

    pub fn sql_type(self) -> SqlType {
        match self {
            TypeTag::Date => SqlType::Timestamptz,
            TypeTag::Integer => SqlType::Integer,
            TypeTag::Float | TypeTag::Percent => SqlType::Float,
        }
    }
}

/// The SQL column types a table can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Timestamptz,
    Integer,
    Float,
    Text,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Timestamptz => "timestamptz",
            SqlType::Integer => "integer",
            SqlType::Float => "float",
            SqlType::Text => "text",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final type of a column, fixed once pass 1 is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumnType {
    /// Winning tag, or `None` when the column falls back to text.
    pub tag: Option<TypeTag>,
    pub nullable: bool,
}

impl ResolvedColumnType {
    pub fn sql_type(&self) -> SqlType {
        self.tag.map_or(SqlType::Text, TypeTag::sql_type)
    }

    /// Column type as it appears in `create table`, e.g. `integer not null`.
    pub fn column_definition(&self) -> String {
        if self.nullable {
            self.sql_type().to_string()
        } else {
            format!("{} not null", self.sql_type())
        }
    }

    /// Re-renders one raw value under this type. An empty result stands for SQL null.
    ///
    /// `column` only identifies the value in the error; a failure means the
    /// two passes disagree and the caller must not continue.
    pub fn normalize(&self, column: usize, raw: &str) -> ConvertResult<String> {
        let value = normalize_sentinel(raw);
        if value.is_empty() {
            return Ok(String::new());
        }
        let Some(tag) = self.tag else {
            return Ok(value.to_string());
        };
        tag.parse(value)
            .map_err(|err| ConvertError::InternalInvariant {
                column,
                tag,
                value: value.to_string(),
                reason: err.to_string(),
            })
    }
}

/// Narrowing type hypothesis for a single column.
#[derive(Debug, Clone)]
pub struct TypeClassifier {
    possible: [bool; 4],
    saw_empty: bool,
    saw_non_empty: bool,
}

impl Default for TypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeClassifier {
    pub fn new() -> Self {
        Self {
            possible: [true; 4],
            saw_empty: false,
            saw_non_empty: false,
        }
    }

    pub fn still_possible(&self, tag: TypeTag) -> bool {
        self.possible[tag.index()]
    }

    /// Surviving tags, highest precedence first.
    pub fn possible_tags(&self) -> Vec<TypeTag> {
        TypeTag::PRECEDENCE
            .into_iter()
            .filter(|tag| self.still_possible(*tag))
            .collect()
    }

    pub fn saw_empty(&self) -> bool {
        self.saw_empty
    }

    pub fn saw_non_empty(&self) -> bool {
        self.saw_non_empty
    }

    pub fn observe(&mut self, raw: &str) {
        let value = normalize_sentinel(raw);
        if value.is_empty() {
            self.saw_empty = true;
            return;
        }
        self.saw_non_empty = true;
        for tag in TypeTag::PRECEDENCE {
            if self.still_possible(tag) && tag.parse(value).is_err() {
                debug!("'{value}' rules out {tag:?}");
                self.possible[tag.index()] = false;
            }
        }
    }

    /// Pass-2 rendering of `raw` under the type this column resolves to.
    pub fn normalize(&self, column: usize, raw: &str) -> ConvertResult<String> {
        self.resolve().normalize(column, raw)
    }

    pub fn resolve(&self) -> ResolvedColumnType {
        ResolvedColumnType {
            tag: TypeTag::PRECEDENCE
                .into_iter()
                .find(|tag| self.still_possible(*tag)),
            nullable: self.saw_empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(values: &[&str]) -> TypeClassifier {
        let mut classifier = TypeClassifier::new();
        for value in values {
            classifier.observe(value);
        }
        classifier
    }

    fn normalize_all(values: &[&str]) -> (ResolvedColumnType, Vec<String>) {
        let resolved = classify(values).resolve();
        let normalized = values
            .iter()
            .map(|value| resolved.normalize(0, value).expect("normalize"))
            .collect();
        (resolved, normalized)
    }

    #[test]
    fn integers_with_separators() {
        let (resolved, normalized) = normalize_all(&["1", "2,000", "3"]);
        assert_eq!(resolved.tag, Some(TypeTag::Integer));
        assert!(!resolved.nullable);
        assert_eq!(resolved.column_definition(), "integer not null");
        assert_eq!(normalized, vec!["1", "2000", "3"]);
    }

    #[test]
    fn floats_with_sentinel_are_nullable() {
        let (resolved, normalized) = normalize_all(&["1.5", "#DIV/0!", "2.25"]);
        assert_eq!(resolved.tag, Some(TypeTag::Float));
        assert!(resolved.nullable);
        assert_eq!(resolved.column_definition(), "float");
        assert_eq!(normalized, vec!["1.500000", "", "2.250000"]);
    }

    #[test]
    fn percentages_map_to_float() {
        let (resolved, normalized) = normalize_all(&["10%", "20%"]);
        assert_eq!(resolved.tag, Some(TypeTag::Percent));
        assert_eq!(resolved.sql_type(), SqlType::Float);
        assert_eq!(normalized, vec!["10.000000", "20.000000"]);
    }

    #[test]
    fn dates_map_to_timestamptz() {
        let (resolved, normalized) = normalize_all(&["2023-01-01", "2023-02-15"]);
        assert_eq!(resolved.sql_type(), SqlType::Timestamptz);
        assert_eq!(
            normalized,
            vec!["2023-01-01T00:00:00Z", "2023-02-15T00:00:00Z"]
        );
    }

    #[test]
    fn all_empty_column_resolves_to_timestamptz() {
        let classifier = classify(&["", "", ""]);
        assert!(!classifier.saw_non_empty());
        assert_eq!(classifier.possible_tags(), TypeTag::PRECEDENCE.to_vec());
        let resolved = classifier.resolve();
        assert_eq!(resolved.sql_type(), SqlType::Timestamptz);
        assert!(resolved.nullable);
    }

    #[test]
    fn mixed_values_fall_back_to_text() {
        let (resolved, normalized) = normalize_all(&["1", "apple", ""]);
        assert_eq!(resolved.tag, None);
        assert_eq!(resolved.column_definition(), "text");
        assert_eq!(normalized, vec!["1", "apple", ""]);
    }

    #[test]
    fn text_without_blanks_is_not_null() {
        let resolved = classify(&["a", "b"]).resolve();
        assert_eq!(resolved.column_definition(), "text not null");
    }

    #[test]
    fn integer_and_float_mix_resolves_to_float() {
        let (resolved, normalized) = normalize_all(&["1", "2.5"]);
        assert_eq!(resolved.tag, Some(TypeTag::Float));
        assert_eq!(normalized, vec!["1.000000", "2.500000"]);
    }

    #[test]
    fn percent_and_number_mix_is_text() {
        let resolved = classify(&["10%", "5"]).resolve();
        assert_eq!(resolved.tag, None);
    }

    #[test]
    fn tags_are_dropped_on_first_disproof() {
        let mut classifier = TypeClassifier::new();
        classifier.observe("42");
        assert_eq!(
            classifier.possible_tags(),
            vec![TypeTag::Integer, TypeTag::Float]
        );
        classifier.observe("4.2");
        assert_eq!(classifier.possible_tags(), vec![TypeTag::Float]);
        classifier.observe("");
        assert_eq!(classifier.possible_tags(), vec![TypeTag::Float]);
        assert!(classifier.saw_empty());
    }

    #[test]
    fn normalize_reports_invariant_violation() {
        let resolved = ResolvedColumnType {
            tag: Some(TypeTag::Integer),
            nullable: false,
        };
        let err = resolved.normalize(3, "abc").unwrap_err();
        assert!(err.is_fatal());
        match err {
            ConvertError::InternalInvariant { column, tag, value, .. } => {
                assert_eq!(column, 3);
                assert_eq!(tag, TypeTag::Integer);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
