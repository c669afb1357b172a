//! Defensive parsing of generation-oracle extraction output.
//!
//! Generation models routinely wrap their JSON in markdown fences, prepend
//! prose, or sprinkle `//` comments into the payload. This module cleans the
//! raw reply, bounds it to the outermost JSON object (or array), and lifts the
//! result into typed assertions and definitions. A reply that still does not
//! parse yields `None` rather than an error: the caller skips the batch and
//! moves on.

use serde_json::Value;
use tracing::debug;

/// One extracted n-ary assertion.
///
/// Source and target sides each carry one or more entity mentions; assertions
/// with an empty side are dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Mentions on the source side.
    pub sources: Vec<String>,
    /// Relation phrase connecting the sides.
    pub relation: String,
    /// Mentions on the target side.
    pub targets: Vec<String>,
}

impl Assertion {
    /// The natural-language summary stored as the hyperedge description,
    /// e.g. "glucose is metabolized into pyruvate, atp".
    pub fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.sources.join(", "),
            self.relation,
            self.targets.join(", ")
        )
    }
}

/// The typed content of one extraction reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionPayload {
    /// Extracted assertions.
    pub assertions: Vec<Assertion>,
    /// Term definitions, as `(term, definition)` pairs.
    pub definitions: Vec<(String, String)>,
}

/// Strip markdown fences and `//` comment lines from a raw model reply.
fn strip_noise(raw: &str) -> String {
    raw.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with("```") && !trimmed.starts_with("//")
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Slice `text` between the first occurrence of `open` and the last
/// occurrence of `close`, inclusive.
fn bounded<'a>(text: &'a str, open: char, close: char) -> Option<&'a str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Lift a JSON value into a list of mentions.
///
/// A bare string counts as a single-element list; arrays keep their string
/// elements. Entries are trimmed and empties dropped.
fn string_list(value: &Value) -> Vec<String> {
    let raw: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    };
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn assertion_from_event(event: &Value) -> Option<Assertion> {
    let sources = string_list(event.get("source")?);
    let targets = string_list(event.get("target")?);
    let relation = event.get("relation")?.as_str()?.trim().to_string();
    if sources.is_empty() || targets.is_empty() || relation.is_empty() {
        return None;
    }
    Some(Assertion {
        sources,
        relation,
        targets,
    })
}

fn assertions_from_events(events: &Value) -> Vec<Assertion> {
    match events {
        Value::Array(items) => items.iter().filter_map(assertion_from_event).collect(),
        _ => Vec::new(),
    }
}

/// Parse a raw extraction reply into assertions and definitions.
///
/// Accepts either the full `{"events": [...], "definitions": {...}}` object
/// or a bare array of events. Returns `None` when no JSON can be recovered;
/// a valid reply with zero usable events yields an empty payload instead.
pub fn parse_extraction(raw: &str) -> Option<ExtractionPayload> {
    let cleaned = strip_noise(raw);

    let object = bounded(&cleaned, '{', '}')
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .filter(|v| v.is_object());

    if let Some(object) = object {
        let assertions = object
            .get("events")
            .map(assertions_from_events)
            .unwrap_or_default();
        let definitions = match object.get("definitions") {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(term, def)| {
                    let def = def.as_str()?.trim();
                    let term = term.trim();
                    if term.is_empty() || def.is_empty() {
                        None
                    } else {
                        Some((term.to_string(), def.to_string()))
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        return Some(ExtractionPayload {
            assertions,
            definitions,
        });
    }

    // Some models reply with a bare event array and no wrapper object.
    if let Some(array) = bounded(&cleaned, '[', ']') {
        if let Ok(events) = serde_json::from_str::<Value>(array) {
            if events.is_array() {
                return Some(ExtractionPayload {
                    assertions: assertions_from_events(&events),
                    definitions: Vec::new(),
                });
            }
        }
    }

    debug!(reply_len = raw.len(), "extraction reply contained no parseable JSON");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_clean_payload() {
        let raw = r#"{
            "events": [
                {"source": ["glucose"], "relation": "is metabolized into", "target": ["pyruvate", "ATP"]}
            ],
            "definitions": {"glucose": "A simple sugar."}
        }"#;
        let payload = parse_extraction(raw).unwrap();
        assert_eq!(payload.assertions.len(), 1);
        assert_eq!(payload.assertions[0].sources, vec!["glucose"]);
        assert_eq!(payload.assertions[0].targets, vec!["pyruvate", "ATP"]);
        assert_eq!(
            payload.definitions,
            vec![("glucose".to_string(), "A simple sugar.".to_string())]
        );
    }

    #[test]
    fn test_strips_fences_and_comments() {
        let raw = "```json\n// extracted events\n{\"events\": [{\"source\": [\"a\"], \"relation\": \"binds\", \"target\": [\"b\"]}]}\n```";
        let payload = parse_extraction(raw).unwrap();
        assert_eq!(payload.assertions.len(), 1);
        assert_eq!(payload.assertions[0].relation, "binds");
    }

    #[test]
    fn test_bounds_json_inside_prose() {
        let raw = "Sure! Here is the extraction you asked for:\n{\"events\": [{\"source\": [\"a\"], \"relation\": \"binds\", \"target\": [\"b\"]}]}\nLet me know if you need anything else.";
        let payload = parse_extraction(raw).unwrap();
        assert_eq!(payload.assertions.len(), 1);
    }

    #[test]
    fn test_accepts_bare_event_array() {
        let raw = r#"[{"source": "a", "relation": "binds", "target": "b"}]"#;
        let payload = parse_extraction(raw).unwrap();
        assert_eq!(payload.assertions.len(), 1);
        // Bare strings are lifted into single-element lists.
        assert_eq!(payload.assertions[0].sources, vec!["a"]);
        assert!(payload.definitions.is_empty());
    }

    #[test]
    fn test_drops_events_with_empty_sides() {
        let raw = r#"{"events": [
            {"source": [], "relation": "binds", "target": ["b"]},
            {"source": ["a"], "relation": "", "target": ["b"]},
            {"source": ["a"], "relation": "binds", "target": ["  "]},
            {"source": ["a"], "relation": "binds", "target": ["b"]}
        ]}"#;
        let payload = parse_extraction(raw).unwrap();
        assert_eq!(payload.assertions.len(), 1);
    }

    #[test]
    fn test_garbage_yields_none() {
        assert!(parse_extraction("I could not find any relations.").is_none());
        assert!(parse_extraction("{not json at all").is_none());
        assert!(parse_extraction("").is_none());
    }

    #[test]
    fn test_empty_events_is_not_a_failure() {
        let payload = parse_extraction(r#"{"events": []}"#).unwrap();
        assert!(payload.assertions.is_empty());
    }

    #[test]
    fn test_describe_joins_sides() {
        let assertion = Assertion {
            sources: vec!["glucose".to_string()],
            relation: "is metabolized into".to_string(),
            targets: vec!["pyruvate".to_string(), "atp".to_string()],
        };
        assert_eq!(
            assertion.describe(),
            "glucose is metabolized into pyruvate, atp"
        );
    }
}
