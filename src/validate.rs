use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::models::{ApplicationStatus, JobApplication, JOB_TYPES, POSTING_SOURCES};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(ftp|http|https)://[^ "]+$"#).expect("url regex should be valid")
});

/// First rule a draft fails, in the order the form checks them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Job ID is required")]
    MissingJobId,
    #[error("Job Title is required")]
    MissingTitle,
    #[error("Company Name is required")]
    MissingCompany,
    #[error("Job Type is required")]
    MissingJobType,
    #[error("Unknown job type '{0}' (expected one of: {types})", types = JOB_TYPES.join(", "))]
    UnknownJobType(String),
    #[error("Job Posting URL is required")]
    MissingPostingUrl,
    #[error("Dashboard URL is required")]
    MissingDashboardUrl,
    #[error("Job Posting Source is required")]
    MissingPostingSource,
    #[error("Unknown job posting source '{0}' (expected one of: {sources})", sources = POSTING_SOURCES.join(", "))]
    UnknownPostingSource(String),
    #[error("Date Applied is required")]
    MissingDateApplied,
    #[error("Referrer Name is required if referral is checked")]
    MissingReferrerName,
    #[error("Enter a valid Job Posting URL")]
    InvalidPostingUrl,
    #[error("Enter a valid Dashboard URL")]
    InvalidDashboardUrl,
}

/// Raw create/edit form fields, before any rule has been checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobDraft {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub job_type: String,
    pub job_posting_url: String,
    pub dashboard_url: String,
    pub job_posting_source: String,
    pub date_applied: Option<NaiveDate>,
    pub referral: bool,
    pub referrer_name: String,
    /// Only carried by edits; creation always starts at `Applied` server-side.
    pub application_status: Option<ApplicationStatus>,
}

/// A draft that passed every form rule. The API client only sends these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedJob {
    job_id: String,
    title: String,
    company: String,
    job_type: String,
    job_posting_url: String,
    dashboard_url: String,
    job_posting_source: String,
    date_applied: NaiveDate,
    referral: bool,
    referrer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_status: Option<ApplicationStatus>,
}

impl ValidatedJob {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn referrer_name(&self) -> Option<&str> {
        self.referrer_name.as_deref()
    }

    /// Body for `PUT update_job`, which keys fields differently from create.
    pub fn update_body(&self) -> UpdateBody<'_> {
        UpdateBody {
            job_id: &self.job_id,
            title: &self.title,
            company: &self.company,
            job_type: &self.job_type,
            job_posting_url: &self.job_posting_url,
            dashboard_url: &self.dashboard_url,
            job_posting_source: &self.job_posting_source,
            date: self.date_applied.format("%Y-%m-%dT00:00:00.000Z").to_string(),
            referral: self.referral,
            referrer_name: self.referrer_name.as_deref(),
            application_status: self.application_status,
        }
    }
}

/// The edit form's wire shape: ids and URLs in camelCase, everything else
/// snake_case, and the date as a UTC midnight timestamp.
#[derive(Debug, Serialize)]
pub struct UpdateBody<'a> {
    #[serde(rename = "jobId")]
    job_id: &'a str,
    title: &'a str,
    company: &'a str,
    job_type: &'a str,
    #[serde(rename = "jobPostingUrl")]
    job_posting_url: &'a str,
    #[serde(rename = "dashboardUrl")]
    dashboard_url: &'a str,
    job_posting_source: &'a str,
    date: String,
    referral: bool,
    referrer_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_status: Option<ApplicationStatus>,
}

impl JobDraft {
    /// Start an edit from a fetched record.
    pub fn from_job(job: &JobApplication) -> Self {
        Self {
            job_id: job.job_id.clone(),
            title: job.title.clone(),
            company: job.company.clone(),
            job_type: job.job_type.clone(),
            job_posting_url: job.job_posting_url.clone(),
            dashboard_url: job.dashboard_url.clone(),
            job_posting_source: job.job_posting_source.clone(),
            date_applied: Some(job.date_applied),
            referral: job.referral,
            referrer_name: job.referrer_name.clone().unwrap_or_default(),
            application_status: Some(job.application_status),
        }
    }

    pub fn validate(self) -> Result<ValidatedJob, ValidationError> {
        let job_id = required(&self.job_id, ValidationError::MissingJobId)?;
        let title = required(&self.title, ValidationError::MissingTitle)?;
        let company = required(&self.company, ValidationError::MissingCompany)?;

        let job_type = required(&self.job_type, ValidationError::MissingJobType)?;
        let job_type = canonical(JOB_TYPES, &job_type)
            .ok_or(ValidationError::UnknownJobType(job_type))?;

        let job_posting_url = required(&self.job_posting_url, ValidationError::MissingPostingUrl)?;
        let dashboard_url = required(&self.dashboard_url, ValidationError::MissingDashboardUrl)?;

        let source = required(&self.job_posting_source, ValidationError::MissingPostingSource)?;
        let job_posting_source = canonical(POSTING_SOURCES, &source)
            .ok_or(ValidationError::UnknownPostingSource(source))?;

        let date_applied = self.date_applied.ok_or(ValidationError::MissingDateApplied)?;

        let referrer_name = if self.referral {
            Some(required(&self.referrer_name, ValidationError::MissingReferrerName)?)
        } else {
            None
        };

        if !is_valid_url(&job_posting_url) {
            return Err(ValidationError::InvalidPostingUrl);
        }
        if !is_valid_url(&dashboard_url) {
            return Err(ValidationError::InvalidDashboardUrl);
        }

        Ok(ValidatedJob {
            job_id,
            title,
            company,
            job_type: job_type.to_string(),
            job_posting_url,
            dashboard_url,
            job_posting_source: job_posting_source.to_string(),
            date_applied,
            referral: self.referral,
            referrer_name,
            application_status: self.application_status,
        })
    }
}

pub fn is_valid_url(url: &str) -> bool {
    URL_RE.is_match(url)
}

fn required(value: &str, missing: ValidationError) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(missing)
    } else {
        Ok(trimmed.to_string())
    }
}

fn canonical(catalog: &'static [&'static str], value: &str) -> Option<&'static str> {
    catalog
        .iter()
        .copied()
        .find(|entry| entry.eq_ignore_ascii_case(value))
}
