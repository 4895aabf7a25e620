//! Ordered fallback matching over loosely formatted documents.

use regex::{Captures, Regex};

pub struct Matcher {
    pub name: &'static str,
    pattern: Regex,
}

/// Tries each strategy in order; the first one that matches anything wins.
pub struct MatcherCascade {
    matchers: Vec<Matcher>,
}

pub struct CascadeMatch<'t> {
    pub matcher: &'static str,
    pub captures: Vec<Captures<'t>>,
}

impl MatcherCascade {
    pub fn new(strategies: &[(&'static str, &str)]) -> Result<Self, regex::Error> {
        let matchers = strategies
            .iter()
            .map(|(name, pattern)| {
                Ok(Matcher {
                    name: *name,
                    pattern: Regex::new(pattern)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { matchers })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.matchers.iter().map(|m| m.name)
    }

    pub fn first_match<'t>(&self, text: &'t str) -> Option<CascadeMatch<'t>> {
        for matcher in &self.matchers {
            let captures: Vec<_> = matcher.pattern.captures_iter(text).collect();
            if !captures.is_empty() {
                tracing::debug!(matcher = matcher.name, hits = captures.len(), "cascade matched");
                return Some(CascadeMatch {
                    matcher: matcher.name,
                    captures,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_strategy_wins() {
        let cascade = MatcherCascade::new(&[
            ("heading", r"(?m)^#+\s*(\w+)$"),
            ("bold", r"\*\*(\w+)\*\*"),
        ])
        .unwrap();

        let m = cascade.first_match("**one** and\n## two\n").unwrap();
        assert_eq!(m.matcher, "heading");
        assert_eq!(&m.captures[0][1], "two");

        let m = cascade.first_match("**one** **three**").unwrap();
        assert_eq!(m.matcher, "bold");
        assert_eq!(m.captures.len(), 2);

        assert!(cascade.first_match("plain").is_none());
        assert_eq!(cascade.names().collect::<Vec<_>>(), vec!["heading", "bold"]);
    }
}
