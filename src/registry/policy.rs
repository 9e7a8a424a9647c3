use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::models::ServiceInfo;
use crate::errors::AppError;

/// How `select_service` picks among the healthy instances of a service
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Earliest registered healthy instance
    #[default]
    First,
    Random,
    RoundRobin,
}

impl SelectionPolicy {
    /// Pick one of `candidates`, which are already filtered and ordered
    pub fn pick<'a>(
        &self,
        candidates: &'a [ServiceInfo],
        cursor: &AtomicUsize,
    ) -> Option<&'a ServiceInfo> {
        match self {
            SelectionPolicy::First => candidates.first(),
            SelectionPolicy::Random => candidates.choose(&mut rand::thread_rng()),
            SelectionPolicy::RoundRobin => {
                if candidates.is_empty() {
                    return None;
                }
                let next = cursor.fetch_add(1, Ordering::Relaxed);
                candidates.get(next % candidates.len())
            }
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionPolicy::First => "first",
            SelectionPolicy::Random => "random",
            SelectionPolicy::RoundRobin => "round_robin",
        };
        f.write_str(name)
    }
}

impl FromStr for SelectionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "first" => Ok(SelectionPolicy::First),
            "random" => Ok(SelectionPolicy::Random),
            "round_robin" => Ok(SelectionPolicy::RoundRobin),
            other => Err(AppError::config(format!("Unsupported selection policy: {}", other))),
        }
    }
}
