//! REST API response shapes for build history.

use serde::Serialize;

use crate::models::build::{BuildRecord, BuildStatus};
use crate::store::BuildStore;

/// JSON response for the build listing, with outcome counters.
#[derive(Debug, Serialize)]
pub struct BuildListJson {
    pub builds: Vec<BuildRecord>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub in_progress: usize,
}

/// List all builds, most recent first, with status counts.
pub async fn list_builds(store: &BuildStore) -> BuildListJson {
    let builds = store.list_all().await;
    let success = builds
        .iter()
        .filter(|b| b.status == BuildStatus::Success)
        .count();
    let failed = builds
        .iter()
        .filter(|b| b.status == BuildStatus::Failed)
        .count();
    let in_progress = builds
        .iter()
        .filter(|b| b.status == BuildStatus::InProgress)
        .count();

    BuildListJson {
        total: builds.len(),
        success,
        failed,
        in_progress,
        builds,
    }
}
