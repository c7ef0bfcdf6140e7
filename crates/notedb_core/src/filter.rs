//! NIP-01 filters.
//!
//! ```json
//! {"ids": [..], "authors": [..], "kinds": [1, 7], "#e": [..],
//!  "since": 1700000000, "until": 1800000000, "limit": 20}
//! ```
//!
//! Every present condition must hold. Within a list any value may match.
//! Unknown keys are ignored.
//!
//! The engine indexes single-letter tags only. Constraints on longer tag
//! names are checked against each result after the engine query.

use crate::error::{StoreError, StoreResult};
use crate::note::{NoteRef, TagElem};
use crate::types::{NoteId, Pubkey};
use serde_json::{Map, Value};

/// Maximum number of filters in one query.
pub const MAX_FILTERS: usize = 16;

/// A parsed filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Note ids.
    pub ids: Option<Vec<NoteId>>,
    /// Author keys.
    pub authors: Option<Vec<Pubkey>>,
    /// Event kinds.
    pub kinds: Option<Vec<u32>>,
    /// Tag constraints from `#<name>` keys.
    pub tags: Vec<TagFilter>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<u64>,
    /// Inclusive upper bound on `created_at`.
    pub until: Option<u64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// A `#<name>: [values]` constraint: some tag named `name` must have one
/// of `values` as its second element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    /// Tag name without the `#`.
    pub name: String,
    /// Accepted values.
    pub values: Vec<TagValue>,
}

/// One accepted tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagValue {
    /// The value as written in the filter.
    pub text: String,
    /// The value as a packed id, when it is 64 lowercase hex characters.
    pub id: Option<[u8; 32]>,
}

impl TagValue {
    fn new(text: String) -> Self {
        let id = if text.len() == 64 && text.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            NoteId::from_hex(&text).map(|id| id.0)
        } else {
            None
        };
        Self { text, id }
    }

    fn matches(&self, elem: &TagElem<'_>) -> bool {
        match elem {
            TagElem::Str(s) => *s == self.text,
            TagElem::Id(raw) => self.id.as_ref() == Some(*raw),
        }
    }
}

impl TagFilter {
    /// Returns true if the name is a single letter, the only tags the
    /// engine indexes.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.name.chars().count() == 1
    }

    fn letter(&self) -> Option<char> {
        let mut chars = self.name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    fn ids(&self) -> StoreResult<Vec<[u8; 32]>> {
        self.values
            .iter()
            .map(|v| {
                v.id.ok_or_else(|| {
                    StoreError::query(format!("#{} values must be 64 hex chars", self.name))
                })
            })
            .collect()
    }
}

impl Filter {
    /// Creates an empty filter, which matches every note.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one filter object or an array of up to [`MAX_FILTERS`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for malformed JSON, a value of the
    /// wrong type, an empty or oversized array.
    pub fn parse_many(json: &str) -> StoreResult<Vec<Self>> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::query(format!("invalid filter JSON: {e}")))?;

        match value {
            Value::Object(obj) => Ok(vec![Self::from_object(&obj)?]),
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(StoreError::query("empty filter array"));
                }
                if items.len() > MAX_FILTERS {
                    return Err(StoreError::query(format!(
                        "{} filters given, at most {MAX_FILTERS} allowed",
                        items.len()
                    )));
                }
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(obj) => Self::from_object(obj),
                        _ => Err(StoreError::query("filter must be an object")),
                    })
                    .collect()
            }
            _ => Err(StoreError::query("filter must be an object or array")),
        }
    }

    /// Parses a single filter object.
    pub fn parse(json: &str) -> StoreResult<Self> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(obj)) => Self::from_object(&obj),
            Ok(_) => Err(StoreError::query("filter must be an object")),
            Err(e) => Err(StoreError::query(format!("invalid filter JSON: {e}"))),
        }
    }

    fn from_object(obj: &Map<String, Value>) -> StoreResult<Self> {
        let mut filter = Self::default();

        for (key, value) in obj {
            match key.as_str() {
                "ids" => {
                    filter.ids = Some(hex_list(key, value, NoteId::from_hex)?);
                }
                "authors" => {
                    filter.authors = Some(hex_list(key, value, Pubkey::from_hex)?);
                }
                "kinds" => {
                    let kinds = array(key, value)?
                        .iter()
                        .map(|v| {
                            v.as_u64()
                                .and_then(|k| u32::try_from(k).ok())
                                .ok_or_else(|| StoreError::query(format!("invalid kind: {v}")))
                        })
                        .collect::<StoreResult<_>>()?;
                    filter.kinds = Some(kinds);
                }
                "since" => filter.since = Some(integer(key, value)?),
                "until" => filter.until = Some(integer(key, value)?),
                "limit" => {
                    let limit = integer(key, value)?;
                    filter.limit = Some(usize::try_from(limit).unwrap_or(usize::MAX));
                }
                tag if tag.starts_with('#') && tag.len() > 1 => {
                    let values = array(key, value)?
                        .iter()
                        .map(|v| {
                            v.as_str()
                                .map(|s| TagValue::new(s.to_string()))
                                .ok_or_else(|| {
                                    StoreError::query(format!("{key} values must be strings"))
                                })
                        })
                        .collect::<StoreResult<_>>()?;
                    filter.tags.push(TagFilter {
                        name: tag[1..].to_string(),
                        values,
                    });
                }
                _ => {}
            }
        }

        Ok(filter)
    }

    /// Returns true if `note` satisfies every condition.
    ///
    /// `limit` is not a per-note condition and is ignored here.
    #[must_use]
    pub fn matches(&self, note: &NoteRef<'_>) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| &id.0 == note.id()) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|pk| &pk.0 == note.pubkey()) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&note.kind()) {
                return false;
            }
        }
        let created_at = note.created_at();
        if self.since.is_some_and(|since| created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| created_at > until) {
            return false;
        }

        self.tags.iter().all(|constraint| {
            note.tags().any(|tag| {
                tag.name() == Some(constraint.name.as_str())
                    && tag
                        .get(1)
                        .is_some_and(|elem| constraint.values.iter().any(|v| v.matches(&elem)))
            })
        })
    }

    /// Returns true if some constraint is not indexed by the engine and must
    /// be checked per result with [`Filter::matches`].
    #[must_use]
    pub fn needs_post_filter(&self) -> bool {
        self.tags.iter().any(|t| !t.is_indexed())
    }

    /// Builds the engine's form of this filter.
    ///
    /// `#e` and `#p` values are matched as packed ids and must be 64 hex
    /// characters. Multi-letter tag constraints are left out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for a non-hex `#e` or `#p` value.
    pub fn to_engine(&self) -> StoreResult<nostrdb::Filter> {
        let mut builder = nostrdb::Filter::new();

        if let Some(ids) = &self.ids {
            builder = builder.ids(ids.iter().map(|id| &id.0));
        }
        if let Some(authors) = &self.authors {
            builder = builder.authors(authors.iter().map(|pk| &pk.0));
        }
        if let Some(kinds) = &self.kinds {
            builder = builder.kinds(kinds.iter().map(|k| u64::from(*k)));
        }
        for constraint in &self.tags {
            match constraint.letter() {
                Some('e') => {
                    let ids = constraint.ids()?;
                    builder = builder.events(ids.iter());
                }
                Some('p') => {
                    let ids = constraint.ids()?;
                    builder = builder.pubkeys(ids.iter());
                }
                Some(letter) => {
                    let values: Vec<String> =
                        constraint.values.iter().map(|v| v.text.clone()).collect();
                    builder = builder.tags(values.iter().map(String::as_str), letter);
                }
                None => {}
            }
        }
        if let Some(since) = self.since {
            builder = builder.since(since);
        }
        if let Some(until) = self.until {
            builder = builder.until(until);
        }
        if let Some(limit) = self.limit {
            builder = builder.limit(limit as u64);
        }

        Ok(builder.build())
    }
}

fn array<'v>(key: &str, value: &'v Value) -> StoreResult<&'v Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| StoreError::query(format!("{key} must be an array")))
}

fn integer(key: &str, value: &Value) -> StoreResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| StoreError::query(format!("{key} must be a non-negative integer")))
}

fn hex_list<T>(key: &str, value: &Value, parse: fn(&str) -> Option<T>) -> StoreResult<Vec<T>> {
    array(key, value)?
        .iter()
        .map(|v| {
            v.as_str()
                .and_then(parse)
                .ok_or_else(|| StoreError::query(format!("{key} entries must be 64 hex chars")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_array() {
        assert_eq!(Filter::parse_many(r#"{"kinds":[1]}"#).unwrap().len(), 1);
        assert_eq!(
            Filter::parse_many(r#"[{"kinds":[1]},{"kinds":[7]}]"#)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn rejects_malformed_filters() {
        for bad in [
            "",
            "{",
            "[]",
            "42",
            r#"{"kinds":"1"}"#,
            r#"{"kinds":[-1]}"#,
            r#"{"authors":["abc"]}"#,
            r##"{"#e":[1]}"##,
            r#"{"limit":-5}"#,
        ] {
            assert!(
                matches!(Filter::parse_many(bad), Err(StoreError::Query { .. })),
                "{bad} should be rejected"
            );
        }
        let too_many = format!("[{}]", vec!["{}"; MAX_FILTERS + 1].join(","));
        assert!(Filter::parse_many(&too_many).is_err());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let filter = Filter::parse(r#"{"search":"gm","kinds":[1]}"#).unwrap();
        assert_eq!(filter.kinds, Some(vec![1]));
    }

    #[test]
    fn tag_values_pack_lowercase_hex_only() {
        let lower = "ab".repeat(32);
        let upper = lower.to_uppercase();
        let filter = Filter::parse(&format!(r##"{{"#e":["{lower}","{upper}","x"]}}"##)).unwrap();

        let values = &filter.tags[0].values;
        assert_eq!(values[0].id, Some([0xab; 32]));
        assert_eq!(values[1].id, None);
        assert_eq!(values[2].id, None);
    }

    #[test]
    fn multi_letter_tags_need_post_filter() {
        let single = Filter::parse(r##"{"#t":["nostr"]}"##).unwrap();
        assert!(!single.needs_post_filter());
        assert!(single.to_engine().is_ok());

        let long = Filter::parse(r##"{"#expiration":["10"],"kinds":[1]}"##).unwrap();
        assert!(long.needs_post_filter());
        assert!(long.to_engine().is_ok());
    }

    #[test]
    fn engine_filter_requires_hex_event_refs() {
        let ok = format!(r##"{{"#e":["{}"],"#p":["{}"]}}"##, "01".repeat(32), "02".repeat(32));
        assert!(Filter::parse(&ok).unwrap().to_engine().is_ok());

        for bad in [r##"{"#e":["nope"]}"##, r##"{"#p":["abc"]}"##] {
            assert!(matches!(
                Filter::parse(bad).unwrap().to_engine(),
                Err(StoreError::Query { .. })
            ));
        }
    }
}
