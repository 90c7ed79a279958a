//! Compiled, ordered pattern tables.

use regex_lite::Regex;

/// A configured regex failed to compile. Fatal at startup.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid pattern #{index} in '{table}': {pattern} ({reason})")]
pub struct PatternError {
    pub table: String,
    pub index: usize,
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// An ordered list of regexes; evaluation order is configuration order.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<CompiledPattern>,
}

impl PatternSet {
    /// Compile every pattern of a table, failing on the first bad one.
    pub fn compile(table: &str, sources: &[String]) -> Result<Self, PatternError> {
        let patterns = sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                Regex::new(source)
                    .map(|regex| CompiledPattern {
                        source: source.clone(),
                        regex,
                    })
                    .map_err(|e| PatternError {
                        table: table.to_string(),
                        index,
                        pattern: source.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The source of the first pattern matching `text`.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.regex.is_match(text))
            .map(|p| p.source.as_str())
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// Every match of every pattern. A named group `value` wins over the full match.
    pub fn extract<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut found = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let value = caps.name("value").or_else(|| caps.get(0));
                if let Some(m) = value {
                    let trimmed = m.as_str().trim();
                    if !trimmed.is_empty() {
                        found.push(trimmed);
                    }
                }
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> PatternSet {
        let sources: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        PatternSet::compile("test", &sources).unwrap()
    }

    #[test]
    fn first_match_respects_order() {
        let patterns = set(&[r"turno para", r"turno"]);
        assert_eq!(patterns.first_match("un turno para hoy"), Some("turno para"));
        assert_eq!(patterns.first_match("un turno"), Some("turno"));
        assert_eq!(patterns.first_match("hola"), None);
    }

    #[test]
    fn extract_prefers_named_value_group() {
        let patterns = set(&[r"doctor\s+(?P<value>[a-z]+)"]);
        assert_eq!(patterns.extract("con el doctor perez"), vec!["perez"]);
    }

    #[test]
    fn extract_collects_every_match() {
        let patterns = set(&[r"\d+"]);
        assert_eq!(patterns.extract("10 y 12"), vec!["10", "12"]);
    }

    #[test]
    fn malformed_pattern_reports_position() {
        let sources = vec!["ok".to_string(), "(unclosed".to_string()];
        let err = PatternSet::compile("fragments", &sources).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.table, "fragments");
        assert!(err.to_string().contains("(unclosed"));
    }
}
