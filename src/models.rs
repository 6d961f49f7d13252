use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Job types offered by the create/edit form.
pub const JOB_TYPES: &[&str] = &["SWE", "SDE", "Data Engineering", "Automation", "DevOps"];

/// Platforms a posting can come from.
pub const POSTING_SOURCES: &[&str] = &["LinkedIn", "Indeed", "Built-In", "HandShake"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[default]
    #[serde(rename = "Applied")]
    Applied,
    #[serde(rename = "OA Received")]
    OaReceived,
    #[serde(rename = "Tech Interview")]
    TechInterview,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "Accepted")]
    Accepted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::OaReceived,
        ApplicationStatus::TechInterview,
        ApplicationStatus::Rejected,
        ApplicationStatus::Accepted,
    ];

    /// The label used on the wire and in the UI.
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::OaReceived => "OA Received",
            ApplicationStatus::TechInterview => "Tech Interview",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Accepted => "Accepted",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown application status '{0}' (expected one of: Applied, OA Received, Tech Interview, Rejected, Accepted)")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    /// Accepts the wire labels in any case, plus short slugs for the CLI.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = s.trim().to_lowercase().replace([' ', '_'], "-");
        match slug.as_str() {
            "applied" => Ok(ApplicationStatus::Applied),
            "oa" | "oa-received" => Ok(ApplicationStatus::OaReceived),
            "tech" | "tech-interview" => Ok(ApplicationStatus::TechInterview),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "accepted" => Ok(ApplicationStatus::Accepted),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A job application as held by the list view.
///
/// The server has used both snake_case and camelCase keys (and `date` for
/// `date_applied`) across its endpoints; all of them are folded into this one
/// shape when a response is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireJob")]
pub struct JobApplication {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub job_type: String,
    pub job_posting_url: String,
    pub dashboard_url: String,
    pub job_posting_source: String,
    pub date_applied: NaiveDate,
    pub referral: bool,
    pub referrer_name: Option<String>,
    pub application_status: ApplicationStatus,
}

/// Every spelling the service uses for a record's keys. When a record carries
/// more than one spelling of a field, snake_case wins, then camelCase, then
/// the detail view's bare `date`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireJob {
    job_id: Option<String>,
    #[serde(rename = "jobId")]
    job_id_camel: Option<String>,
    title: Option<String>,
    company: Option<String>,
    job_type: Option<String>,
    #[serde(rename = "jobType")]
    job_type_camel: Option<String>,
    job_posting_url: Option<String>,
    #[serde(rename = "jobPostingUrl")]
    job_posting_url_camel: Option<String>,
    dashboard_url: Option<String>,
    #[serde(rename = "dashboardUrl")]
    dashboard_url_camel: Option<String>,
    job_posting_source: Option<String>,
    #[serde(rename = "jobPostingSource")]
    job_posting_source_camel: Option<String>,
    date_applied: Option<String>,
    #[serde(rename = "dateApplied")]
    date_applied_camel: Option<String>,
    date: Option<String>,
    referral: Option<bool>,
    referrer_name: Option<String>,
    #[serde(rename = "referrerName")]
    referrer_name_camel: Option<String>,
    application_status: Option<ApplicationStatus>,
    #[serde(rename = "applicationStatus")]
    application_status_camel: Option<ApplicationStatus>,
}

fn require(field: &str, value: Option<String>) -> Result<String, String> {
    value.ok_or_else(|| format!("missing field `{}`", field))
}

impl TryFrom<WireJob> for JobApplication {
    type Error = String;

    fn try_from(wire: WireJob) -> Result<Self, Self::Error> {
        let raw_date = wire
            .date_applied
            .or(wire.date_applied_camel)
            .or(wire.date);
        let date_applied = parse_date(&require("date_applied", raw_date)?)?;
        let referral = wire.referral.unwrap_or(false);
        let referrer_name = if referral {
            wire.referrer_name
                .or(wire.referrer_name_camel)
                .filter(|name| !name.trim().is_empty())
        } else {
            None
        };

        Ok(JobApplication {
            job_id: require("job_id", wire.job_id.or(wire.job_id_camel))?,
            title: require("title", wire.title)?,
            company: require("company", wire.company)?,
            job_type: require("job_type", wire.job_type.or(wire.job_type_camel))?,
            job_posting_url: require(
                "job_posting_url",
                wire.job_posting_url.or(wire.job_posting_url_camel),
            )?,
            dashboard_url: require(
                "dashboard_url",
                wire.dashboard_url.or(wire.dashboard_url_camel),
            )?,
            job_posting_source: require(
                "job_posting_source",
                wire.job_posting_source.or(wire.job_posting_source_camel),
            )?,
            date_applied,
            referral,
            referrer_name,
            application_status: wire
                .application_status
                .or(wire.application_status_camel)
                .unwrap_or_default(),
        })
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or a timestamp; only the date part is kept.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.date_naive());
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(ts.date());
    }
    Err(format!("invalid date '{}'", raw))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Analytics {
    pub total_jobs: u64,
    pub total_rejected_jobs: u64,
    pub total_accepted_jobs: u64,
    #[serde(rename = "totalOAReceived")]
    pub total_oa_received: u64,
    pub total_tech_interview_received: u64,
    pub daily_applications: Vec<DailyCount>,
}
