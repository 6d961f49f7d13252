mod api;
mod config;
mod controller;
mod filter;
mod logging;
mod models;
mod notify;
mod paginate;
mod tui;
mod validate;

use std::num::NonZeroUsize;

use anyhow::{anyhow, Context, Result};
use api::{ApiError, HttpJobsApi, JobsApi};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::Config;
use models::{ApplicationStatus, JobApplication};
use tracing::info;
use validate::JobDraft;

#[derive(Parser)]
#[command(name = "jobtrack")]
#[command(about = "Track job applications against a job tracker service")]
struct Cli {
    /// Base URL of the job tracker API
    #[arg(long, global = true, env = "JOBTRACK_API_URL")]
    api_url: Option<String>,

    /// Rows per page
    #[arg(long, global = true, value_parser = config::parse_page_size)]
    page_size: Option<NonZeroUsize>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Global flags, keyed by the environment variable each one replaces.
    fn config_overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        if let Some(url) = &self.api_url {
            overrides.push(("JOBTRACK_API_URL", url.clone()));
        }
        if let Some(size) = self.page_size {
            overrides.push(("JOBTRACK_PAGE_SIZE", size.to_string()));
        }
        overrides
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive list view
    Browse {
        /// Initial search text
        #[arg(short, long)]
        search: Option<String>,

        /// Initial status filter (applied, oa, tech, rejected, accepted)
        #[arg(long)]
        status: Option<ApplicationStatus>,
    },

    /// Print one page of applications
    List {
        /// Match title, company or job type (case-insensitive)
        #[arg(short, long, default_value = "")]
        search: String,

        /// Filter by status (applied, oa, tech, rejected, accepted)
        #[arg(long)]
        status: Option<ApplicationStatus>,

        /// Page number, starting at 1
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Show one application
    Show {
        /// Job ID
        job_id: String,
    },

    /// Record a new application
    Add {
        /// Job ID (e.g. the posting's requisition number)
        job_id: String,

        #[command(flatten)]
        fields: JobFields,
    },

    /// Edit an application; only the given fields change
    Edit {
        /// Job ID
        job_id: String,

        #[command(flatten)]
        fields: JobFields,

        /// Set the application status
        #[arg(long)]
        status: Option<ApplicationStatus>,
    },

    /// Set the status of an application
    Status {
        /// Job ID
        job_id: String,

        /// New status (applied, oa, tech, rejected, accepted)
        status: ApplicationStatus,
    },

    /// Delete an application
    Delete {
        /// Job ID
        job_id: String,
    },

    /// List companies applied to
    Companies,

    /// Show application totals and the daily series
    Analytics,
}

#[derive(Args)]
struct JobFields {
    /// Job title
    #[arg(short, long)]
    title: Option<String>,

    /// Company name
    #[arg(short, long)]
    company: Option<String>,

    /// SWE, SDE, Data Engineering, Automation or DevOps
    #[arg(long = "type")]
    job_type: Option<String>,

    /// Link to the job posting
    #[arg(long)]
    posting_url: Option<String>,

    /// Link to the applicant dashboard
    #[arg(long)]
    dashboard_url: Option<String>,

    /// LinkedIn, Indeed, Built-In or HandShake
    #[arg(long)]
    source: Option<String>,

    /// Date applied (YYYY-MM-DD); `add` defaults to today
    #[arg(long, value_parser = models::parse_date)]
    date: Option<NaiveDate>,

    /// Whether the application came through a referral
    #[arg(long)]
    referral: Option<bool>,

    /// Name of the referrer (required when --referral true)
    #[arg(long)]
    referrer: Option<String>,
}

impl JobFields {
    /// Overwrite the draft's fields with whichever flags were given.
    fn apply_to(self, draft: &mut JobDraft) {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(company) = self.company {
            draft.company = company;
        }
        if let Some(job_type) = self.job_type {
            draft.job_type = job_type;
        }
        if let Some(url) = self.posting_url {
            draft.job_posting_url = url;
        }
        if let Some(url) = self.dashboard_url {
            draft.dashboard_url = url;
        }
        if let Some(source) = self.source {
            draft.job_posting_source = source;
        }
        if let Some(date) = self.date {
            draft.date_applied = Some(date);
        }
        // A referrer name alone implies a referral.
        match (self.referral, self.referrer) {
            (Some(referral), name) => {
                draft.referral = referral;
                if let Some(name) = name {
                    draft.referrer_name = name;
                }
            }
            (None, Some(name)) => {
                draft.referral = true;
                draft.referrer_name = name;
            }
            (None, None) => {}
        }
    }
}

fn user_facing(err: ApiError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_job(job: &JobApplication) {
    println!("Job {}", job.job_id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    println!("Status: {}", job.application_status);
    println!("Type: {}", job.job_type);
    println!("Source: {}", job.job_posting_source);
    println!("Applied: {}", job.date_applied.format("%Y-%m-%d"));
    match &job.referrer_name {
        Some(name) if job.referral => println!("Referral: Yes ({})", name),
        _ if job.referral => println!("Referral: Yes"),
        _ => println!("Referral: No"),
    }
    println!("Posting URL: {}", job.job_posting_url);
    println!("Dashboard URL: {}", job.dashboard_url);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(&cli.config_overrides()).context("invalid configuration")?;

    let log_file = logging::init(&config);

    let api = HttpJobsApi::new(&config.api_url, config.http_timeout)
        .map_err(user_facing)
        .with_context(|| format!("cannot use API URL '{}'", config.api_url))?;
    info!(api_url = %api.base_url(), log_file = ?log_file, "starting");

    match cli.command {
        Commands::Browse { search, status } => {
            tui::run_browse(api, &config, search.as_deref(), status)?;
        }

        Commands::List { search, status, page } => {
            let jobs = api.list_jobs(search.trim(), status).await.map_err(user_facing)?;
            let matches = filter::working_set(&jobs, &search, status);
            if matches.is_empty() {
                if search.trim().is_empty() && status.is_none() {
                    println!("No jobs available.");
                } else {
                    println!("No jobs match the search criteria.");
                }
                return Ok(());
            }

            let size = config.page_size;
            let pages = paginate::page_count(matches.len(), size);
            let index = page.saturating_sub(1).min(paginate::last_page(matches.len(), size));

            println!(
                "{:<12} {:<11} {:<30} {:<20} {:<14}",
                "JOB ID", "APPLIED", "TITLE", "COMPANY", "STATUS"
            );
            println!("{}", "-".repeat(91));
            for job in paginate::window(&matches, index, size) {
                println!(
                    "{:<12} {:<11} {:<30} {:<20} {:<14}",
                    truncate(&job.job_id, 12),
                    job.date_applied.format("%Y-%m-%d"),
                    truncate(&job.title, 28),
                    truncate(&job.company, 18),
                    job.application_status
                );
            }
            println!("\nPage {} of {} ({} matching)", index + 1, pages, matches.len());
        }

        Commands::Show { job_id } => {
            let job = api.job_details(&job_id).await.map_err(user_facing)?;
            print_job(&job);
        }

        Commands::Add { job_id, fields } => {
            let mut draft = JobDraft {
                job_id,
                date_applied: Some(chrono::Local::now().date_naive()),
                ..JobDraft::default()
            };
            fields.apply_to(&mut draft);
            let job = draft.validate()?;
            api.create_job(&job).await.map_err(user_facing)?;
            println!("Added job {}", job.job_id());
        }

        Commands::Edit { job_id, fields, status } => {
            let current = api
                .job_details(&job_id)
                .await
                .map_err(user_facing)
                .with_context(|| format!("loading job {}", job_id))?;
            let mut draft = JobDraft::from_job(&current);
            fields.apply_to(&mut draft);
            if status.is_some() {
                draft.application_status = status;
            }
            if !draft.referral {
                draft.referrer_name.clear();
            }
            let job = draft.validate()?;
            api.update_job(&job_id, &job).await.map_err(user_facing)?;
            println!("Updated job {}", job_id);
        }

        Commands::Status { job_id, status } => {
            api.update_status(&job_id, status).await.map_err(user_facing)?;
            println!("Status of job {} updated to {}", job_id, status);
        }

        Commands::Delete { job_id } => {
            api.delete_job(&job_id).await.map_err(user_facing)?;
            println!("Job with job id {} deleted successfully", job_id);
        }

        Commands::Companies => {
            let companies = api.list_companies().await.map_err(user_facing)?;
            if companies.is_empty() {
                println!("No companies yet.");
            }
            for company in companies {
                println!("{}", company);
            }
        }

        Commands::Analytics => {
            let stats = api.analytics().await.map_err(user_facing)?;
            println!("Total applications:   {}", stats.total_jobs);
            println!("OA received:          {}", stats.total_oa_received);
            println!("Tech interviews:      {}", stats.total_tech_interview_received);
            println!("Accepted:             {}", stats.total_accepted_jobs);
            println!("Rejected:             {}", stats.total_rejected_jobs);

            if !stats.daily_applications.is_empty() {
                println!("\n--- Applications per day ---");
                for day in &stats.daily_applications {
                    println!(
                        "{}  {:>3}  {}",
                        day.date.format("%Y-%m-%d"),
                        day.count,
                        "#".repeat(day.count.min(60) as usize)
                    );
                }
            }
        }
    }

    Ok(())
}

/// Shorten to `max` characters, marking the cut with "...".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
