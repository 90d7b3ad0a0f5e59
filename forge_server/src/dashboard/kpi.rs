//! KPI aggregation over the build store.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::build::{format_duration, BuildStatus};
use crate::store::BuildStore;

static DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)m\s*(\d+)s").unwrap());

/// Aggregate build statistics.
#[derive(Debug, Serialize)]
pub struct BuildStats {
    pub total_builds: usize,
    /// Success percentage with one decimal, e.g. "66.7".
    pub success_rate: String,
    /// Mean duration over builds that recorded one, e.g. "3m 0s".
    pub avg_build_time: String,
    pub total_proofs: usize,
}

pub async fn query_stats(store: &BuildStore) -> BuildStats {
    let builds = store.list_all().await;

    let total_builds = builds.len();
    let success = builds
        .iter()
        .filter(|b| b.status == BuildStatus::Success)
        .count();
    let success_rate = if total_builds > 0 {
        format!("{:.1}", success as f64 / total_builds as f64 * 100.0)
    } else {
        "0.0".to_string()
    };

    let durations: Vec<i64> = builds
        .iter()
        .filter_map(|b| b.duration.as_deref().and_then(parse_duration_secs))
        .collect();
    let avg_secs = if durations.is_empty() {
        0
    } else {
        durations.iter().sum::<i64>() / durations.len() as i64
    };

    let total_proofs = builds.iter().map(|b| b.chain_proofs.len()).sum();

    BuildStats {
        total_builds,
        success_rate,
        avg_build_time: format_duration(avg_secs),
        total_proofs,
    }
}

/// Parse a display duration ("4m 28s") back into seconds.
fn parse_duration_secs(text: &str) -> Option<i64> {
    let caps = DURATION_REGEX.captures(text)?;
    let minutes: i64 = caps[1].parse().ok()?;
    let seconds: i64 = caps[2].parse().ok()?;
    Some(minutes * 60 + seconds)
}
