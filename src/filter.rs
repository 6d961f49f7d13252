//! Text/status filtering and date ordering of the fetched collection.

use crate::models::{ApplicationStatus, JobApplication};

/// True if `needle` (already lowercased) occurs in the title, company, or job type.
fn matches_query(job: &JobApplication, needle: &str) -> bool {
    needle.is_empty()
        || job.title.to_lowercase().contains(needle)
        || job.company.to_lowercase().contains(needle)
        || job.job_type.to_lowercase().contains(needle)
}

/// Derive the working set from the full collection.
///
/// Leading/trailing whitespace in `query` is ignored and matching is
/// case-insensitive. The result is ordered by `date_applied`, newest first;
/// records applied on the same day keep their collection order.
pub fn working_set<'a>(
    jobs: &'a [JobApplication],
    query: &str,
    status: Option<ApplicationStatus>,
) -> Vec<&'a JobApplication> {
    let needle = query.trim().to_lowercase();

    let mut matched: Vec<&JobApplication> = jobs
        .iter()
        .filter(|job| status.is_none_or(|s| job.application_status == s))
        .filter(|job| matches_query(job, &needle))
        .collect();

    // sort_by is stable
    matched.sort_by(|a, b| b.date_applied.cmp(&a.date_applied));
    matched
}
