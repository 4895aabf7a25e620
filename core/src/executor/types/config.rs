use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DEFAULT_CONCURRENCY: usize = 4;

/// Ceiling on simultaneously running pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimit", into = "RawLimit")]
pub enum ConcurrencyLimit {
    Unlimited,
    Bounded(NonZeroUsize),
}

impl ConcurrencyLimit {
    pub fn bounded(n: usize) -> Self {
        NonZeroUsize::new(n).map_or(Self::Unlimited, Self::Bounded)
    }

    /// Free launch slots given `running` pipelines.
    pub fn available(&self, running: usize) -> usize {
        match self {
            Self::Unlimited => usize::MAX,
            Self::Bounded(n) => n.get().saturating_sub(running),
        }
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::bounded(DEFAULT_CONCURRENCY)
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Bounded(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for ConcurrencyLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "unlimited" | "none" | "0" => Ok(Self::Unlimited),
            other => other
                .parse::<usize>()
                .map(Self::bounded)
                .map_err(|_| format!("expected a positive integer or \"unlimited\", got '{s}'")),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Count(u64),
    Word(String),
}

impl TryFrom<RawLimit> for ConcurrencyLimit {
    type Error = String;

    fn try_from(raw: RawLimit) -> Result<Self, Self::Error> {
        match raw {
            RawLimit::Count(n) => Ok(Self::bounded(n as usize)),
            RawLimit::Word(w) => w.parse(),
        }
    }
}

impl From<ConcurrencyLimit> for RawLimit {
    fn from(limit: ConcurrencyLimit) -> Self {
        match limit {
            ConcurrencyLimit::Unlimited => RawLimit::Word("unlimited".to_string()),
            ConcurrencyLimit::Bounded(n) => RawLimit::Count(n.get() as u64),
        }
    }
}

/// Per-run scheduler options.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOpts {
    pub concurrency: ConcurrencyLimit,
    /// Launch only these tasks; eligibility still uses the full graph.
    pub only: Option<Vec<String>>,
}

impl SchedulerOpts {
    pub fn allows(&self, task_id: &str) -> bool {
        self.only
            .as_ref()
            .map_or(true, |only| only.iter().any(|id| id.eq_ignore_ascii_case(task_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_limits() {
        assert_eq!("unlimited".parse::<ConcurrencyLimit>().unwrap(), ConcurrencyLimit::Unlimited);
        assert_eq!("0".parse::<ConcurrencyLimit>().unwrap(), ConcurrencyLimit::Unlimited);
        assert_eq!("3".parse::<ConcurrencyLimit>().unwrap(), ConcurrencyLimit::bounded(3));
        assert!("-1".parse::<ConcurrencyLimit>().is_err());
        assert!("many".parse::<ConcurrencyLimit>().is_err());
    }

    #[test]
    fn available_slots() {
        let limit = ConcurrencyLimit::bounded(2);
        assert_eq!(limit.available(0), 2);
        assert_eq!(limit.available(2), 0);
        assert_eq!(limit.available(5), 0);
        assert_eq!(ConcurrencyLimit::Unlimited.available(100), usize::MAX);
    }

    #[test]
    fn only_filter_is_case_insensitive() {
        let opts = SchedulerOpts {
            only: Some(vec!["task2".into()]),
            ..Default::default()
        };
        assert!(opts.allows("TASK2"));
        assert!(!opts.allows("TASK1"));
        assert!(SchedulerOpts::default().allows("TASK1"));
    }
}
