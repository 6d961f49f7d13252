use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::api::HttpJobsApi;
use crate::config::Config;
use crate::controller::{ListController, ViewSnapshot};
use crate::models::{ApplicationStatus, JobApplication};
use crate::notify::Level;
use crate::truncate;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Browse,
    Search,
    ConfirmDelete(String),
}

struct BrowseState {
    controller: ListController<HttpJobsApi>,
    selected: usize,
    mode: Mode,
    search_input: String,
    /// One-line message for input the controller refused.
    flash: Option<String>,
}

impl BrowseState {
    fn new(controller: ListController<HttpJobsApi>) -> Self {
        let search_input = controller.query().to_string();
        Self {
            controller,
            selected: 0,
            mode: Mode::Browse,
            search_input,
            flash: None,
        }
    }

    fn current_job(&self) -> Option<JobApplication> {
        self.controller
            .visible_records()
            .get(self.selected)
            .map(|job| (*job).clone())
    }

    fn clamp_selection(&mut self) {
        let visible = self.controller.visible_records().len();
        if visible == 0 {
            self.selected = 0;
        } else if self.selected >= visible {
            self.selected = visible - 1;
        }
    }

    fn next(&mut self) {
        if self.selected + 1 < self.controller.visible_records().len() {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn next_page(&mut self) {
        let page = self.controller.page();
        if page + 1 < self.controller.page_count() {
            self.controller.set_page(page + 1);
            self.selected = 0;
        }
    }

    fn prev_page(&mut self) {
        let page = self.controller.page();
        if page > 0 {
            self.controller.set_page(page - 1);
            self.selected = 0;
        }
    }

    fn resize_page(&mut self, grow: bool) {
        let size = self.controller.page_size().get();
        let new_size = if grow { size + 5 } else { size.saturating_sub(5) };
        if let Err(err) = self.controller.set_page_size(new_size) {
            self.flash = Some(err.to_string());
        }
        self.selected = 0;
    }

    fn cycle_status_filter(&mut self) {
        let next = match self.controller.status_filter() {
            None => Some(ApplicationStatus::ALL[0]),
            Some(current) => ApplicationStatus::ALL
                .iter()
                .position(|s| *s == current)
                .and_then(|i| ApplicationStatus::ALL.get(i + 1).copied()),
        };
        self.controller.set_status_filter(next);
        self.selected = 0;
    }

    fn change_status(&mut self, status: ApplicationStatus) {
        let Some(job) = self.current_job() else { return };
        if job.application_status == status || self.controller.is_mutating(&job.job_id) {
            return;
        }
        if let Err(err) = self.controller.request_status_change(&job.job_id, status) {
            self.flash = Some(err.to_string());
        }
    }

    fn confirm_delete(&mut self, job_id: String) {
        if let Err(err) = self.controller.request_delete(&job_id) {
            self.flash = Some(err.to_string());
        }
    }
}

/// Interactive list view. Requires a tokio runtime: the controller spawns its
/// requests and timers onto it while this loop blocks on terminal input.
pub fn run_browse(
    api: HttpJobsApi,
    config: &Config,
    query: Option<&str>,
    status: Option<ApplicationStatus>,
) -> Result<()> {
    let mut controller = ListController::new(Arc::new(api), config);
    if let Some(q) = query {
        controller.set_query(q);
    }
    controller.set_status_filter(status);
    controller.initialize();

    let mut state = BrowseState::new(controller);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    state.controller.shutdown();
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BrowseState,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        state.controller.pump();
        state.clamp_selection();
        list_state.select(Some(state.selected));

        let snapshot = state.controller.snapshot();
        terminal.draw(|frame| draw(frame, state, &snapshot, &mut list_state))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match state.mode.clone() {
            Mode::Search => match key.code {
                KeyCode::Enter | KeyCode::Esc => state.mode = Mode::Browse,
                KeyCode::Backspace => {
                    state.search_input.pop();
                    state.controller.set_query(state.search_input.clone());
                    state.selected = 0;
                }
                KeyCode::Char(c) => {
                    state.search_input.push(c);
                    state.controller.set_query(state.search_input.clone());
                    state.selected = 0;
                }
                _ => {}
            },
            Mode::ConfirmDelete(job_id) => {
                if let KeyCode::Char('y') | KeyCode::Char('Y') = key.code {
                    state.confirm_delete(job_id);
                }
                state.mode = Mode::Browse;
            }
            Mode::Browse => {
                state.flash = None;
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Esc => {
                        if !state.controller.dismiss_latest_notification() {
                            break;
                        }
                    }
                    KeyCode::Down | KeyCode::Char('j') => state.next(),
                    KeyCode::Up | KeyCode::Char('k') => state.prev(),
                    KeyCode::Right | KeyCode::Char('n') => state.next_page(),
                    KeyCode::Left | KeyCode::Char('p') => state.prev_page(),
                    KeyCode::Char('+') => state.resize_page(true),
                    KeyCode::Char('-') => state.resize_page(false),
                    KeyCode::Char('/') => state.mode = Mode::Search,
                    KeyCode::Char('f') => state.cycle_status_filter(),
                    KeyCode::Char('r') => state.controller.refresh(),
                    KeyCode::Char('d') => {
                        if let Some(job) = state.current_job() {
                            if state.controller.is_mutating(&job.job_id) {
                                state.flash =
                                    Some(format!("Job {} is still being updated", job.job_id));
                            } else {
                                state.mode = Mode::ConfirmDelete(job.job_id);
                            }
                        }
                    }
                    KeyCode::Char(c @ '1'..='5') => {
                        let index = c as usize - '1' as usize;
                        state.change_status(ApplicationStatus::ALL[index]);
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn status_style(status: ApplicationStatus) -> Style {
    match status {
        ApplicationStatus::Applied => Style::default().fg(Color::Cyan),
        ApplicationStatus::OaReceived => Style::default().fg(Color::Yellow),
        ApplicationStatus::TechInterview => Style::default().fg(Color::Magenta),
        ApplicationStatus::Rejected => Style::default().fg(Color::Red),
        ApplicationStatus::Accepted => Style::default().fg(Color::Green),
    }
}

fn draw(frame: &mut Frame, state: &BrowseState, view: &ViewSnapshot, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);

    // Left panel: current page of the working set
    let items: Vec<ListItem> = view
        .visible
        .iter()
        .map(|job| {
            let busy = if view.busy.contains(&job.job_id) { "…" } else { " " };
            let line = Line::from(vec![
                Span::raw(format!(
                    "{} {} {:<26} {:<16} ",
                    busy,
                    job.date_applied.format("%Y-%m-%d"),
                    truncate(&job.title, 26),
                    truncate(&job.company, 16),
                )),
                Span::styled(job.application_status.label(), status_style(job.application_status)),
            ]);
            if view.busy.contains(&job.job_id) {
                ListItem::new(line).style(Style::default().fg(Color::DarkGray))
            } else {
                ListItem::new(line)
            }
        })
        .collect();

    let title = format!(
        " Jobs ({}) page {}/{} ",
        view.total_matches,
        if view.page_count == 0 { 0 } else { view.page + 1 },
        view.page_count
    );
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, panes[0], list_state);

    // Right panel: job detail
    let detail = Paragraph::new(build_detail(view.visible.get(state.selected), view))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, panes[1]);

    frame.render_widget(status_line(state, view), rows[1]);
    frame.render_widget(notification_line(state, view), rows[2]);

    let help = match &state.mode {
        Mode::Search => " type to search  Enter/Esc:done  Backspace:delete",
        Mode::ConfirmDelete(_) => " y:confirm delete  any other key:cancel",
        Mode::Browse => {
            " j/k:move  n/p:page  +/-:page size  /:search  f:status filter  1-5:set status  d:delete  r:refresh  q:quit"
        }
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[3],
    );
}

fn status_line<'a>(state: &'a BrowseState, view: &'a ViewSnapshot) -> Paragraph<'a> {
    let mut spans = Vec::new();

    if view.is_loading() {
        spans.push(Span::styled("Loading… ", Style::default().fg(Color::Yellow)));
    } else if let Some(err) = view.error_message() {
        spans.push(Span::styled(
            format!("Error: {} ", err),
            Style::default().fg(Color::Red),
        ));
    }

    let cursor = if state.mode == Mode::Search { "_" } else { "" };
    spans.push(Span::raw(format!("search: {}{}", state.search_input, cursor)));
    let filter = view
        .status_filter
        .map(|s| s.label())
        .unwrap_or("all");
    spans.push(Span::raw(format!("  status: {}  page size: {}", filter, view.page_size)));

    if let Mode::ConfirmDelete(job_id) = &state.mode {
        spans.push(Span::styled(
            format!("  delete job {}? (y/N)", job_id),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    Paragraph::new(Line::from(spans))
}

fn notification_line<'a>(state: &'a BrowseState, view: &'a ViewSnapshot) -> Paragraph<'a> {
    if let Some(flash) = &state.flash {
        return Paragraph::new(flash.as_str()).style(Style::default().fg(Color::Yellow));
    }
    match view.notifications.last() {
        Some(note) => {
            let style = match note.level {
                Level::Success => Style::default().fg(Color::Green),
                Level::Error => Style::default().fg(Color::Red),
            };
            let more = view.notifications.len().saturating_sub(1);
            let text = if more > 0 {
                format!("{} (+{} more, Esc to dismiss)", note.message, more)
            } else {
                format!("{} (Esc to dismiss)", note.message)
            };
            Paragraph::new(text).style(style)
        }
        None => Paragraph::new(""),
    }
}

fn build_detail<'a>(job: Option<&'a JobApplication>, view: &ViewSnapshot) -> Text<'a> {
    let Some(job) = job else {
        return if view.is_loading() {
            Text::raw("Loading ...")
        } else if view.query.trim().is_empty() && view.status_filter.is_none() {
            Text::raw("No jobs available.")
        } else {
            Text::raw("No jobs match the search criteria.")
        };
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        job.title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", job.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.application_status),
        status_style(job.application_status),
    )));
    if view.busy.contains(&job.job_id) {
        lines.push(Line::from(Span::styled(
            "(update in progress)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(format!("Job ID:     {}", job.job_id)));
    lines.push(Line::from(format!("Job Type:   {}", job.job_type)));
    lines.push(Line::from(format!("Source:     {}", job.job_posting_source)));
    lines.push(Line::from(format!("Applied On: {}", job.date_applied.format("%Y-%m-%d"))));
    let referral = match (&job.referral, &job.referrer_name) {
        (true, Some(name)) => format!("Yes ({})", name),
        (true, None) => "Yes".to_string(),
        (false, _) => "No".to_string(),
    };
    lines.push(Line::from(format!("Referral:   {}", referral)));
    lines.push(Line::from(""));
    lines.push(Line::from(format!("Posting:    {}", job.job_posting_url)));
    lines.push(Line::from(format!("Dashboard:  {}", job.dashboard_url)));

    Text::from(lines)
}
