// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::screens::CatalogEntry;
use anyhow::{Result, bail};
use koperasi_app::{
    FormMode, PageState, PageToken, Screen, ScreenCommand, ScreenEvent, Values, display_json,
    row_values,
};
use std::fmt::Write as _;

/// What to do once the requested page is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    List,
    Add,
    Update(String),
    Delete(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filters: Values,
    pub fields: Values,
    pub action: Action,
}

/// Commands that bring the list to the requested page. They are dispatched
/// back to back; only the last load's response is kept.
pub fn list_commands(request: &Request) -> Vec<ScreenCommand> {
    let mut commands = Vec::new();
    if let Some(size) = request.page_size {
        commands.push(ScreenCommand::ChangePageSize(size));
    }
    if request.filters.is_empty() {
        commands.push(ScreenCommand::Load);
    } else {
        commands.push(ScreenCommand::ApplyFilterValues(request.filters.clone()));
    }
    if let Some(page) = request.page.filter(|page| *page > 1) {
        commands.push(ScreenCommand::ChangePage(page));
    }
    commands
}

pub async fn run_request(screen: &mut Screen, request: &Request) -> Result<()> {
    let mut events = Vec::new();
    for command in list_commands(request) {
        events.extend(screen.dispatch(command));
    }
    events.extend(screen.settle().await);
    check_events(&events)?;

    let commands = match &request.action {
        Action::List => return Ok(()),
        Action::Add => vec![
            ScreenCommand::OpenForm {
                mode: FormMode::Add,
                initial: request.fields.clone(),
                record_id: None,
            },
            ScreenCommand::Submit,
        ],
        Action::Update(record_id) => vec![
            ScreenCommand::OpenForm {
                mode: FormMode::Update,
                initial: update_values(screen, record_id, &request.fields),
                record_id: Some(record_id.clone()),
            },
            ScreenCommand::Submit,
        ],
        Action::Delete(record_id) => vec![ScreenCommand::Delete {
            record_id: record_id.clone(),
        }],
    };

    let mut events = Vec::new();
    for command in commands {
        events.extend(screen.dispatch(command));
    }
    events.extend(screen.settle().await);
    check_events(&events)
}

/// The listed row's values when the record is on the loaded page, overlaid
/// with `fields`.
fn update_values(screen: &Screen, record_id: &str, fields: &Values) -> Values {
    let id_field = &screen.config().id_field;
    let mut values = screen
        .rows()
        .iter()
        .find(|row| row.get(id_field).and_then(display_json).as_deref() == Some(record_id))
        .map(row_values)
        .unwrap_or_default();
    values.extend(fields.iter().map(|(key, value)| (key.clone(), value.clone())));
    values
}

fn check_events(events: &[ScreenEvent]) -> Result<()> {
    for event in events {
        match event {
            ScreenEvent::Rejected(message)
            | ScreenEvent::LoadFailed(message)
            | ScreenEvent::SubmitFailed { message, .. }
            | ScreenEvent::DeleteFailed { message, .. } => bail!("{message}"),
            ScreenEvent::FormInvalid(errors) => {
                let details = errors
                    .iter()
                    .map(|(key, error)| format!("{key}: {error}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                bail!("form is invalid ({details}) -- pass the missing values with --set key=value");
            }
            _ => {}
        }
    }
    Ok(())
}

/// Page links with the current page in brackets.
pub fn page_links(state: &PageState) -> String {
    state
        .page_range()
        .into_iter()
        .map(|token| match token {
            PageToken::Page(page) if page == state.page => format!("[{page}]"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn render_page(entry: &CatalogEntry, screen: &Screen) -> String {
    let state = screen.page_state();
    let mut out = String::new();
    let _ = writeln!(out, "{}", entry.config.title);

    let mut header = vec!["No"];
    header.extend(entry.headers());
    let _ = writeln!(out, "{}", header.join(" | "));

    let first = u64::from(state.page.saturating_sub(1)) * u64::from(state.page_size);
    for (index, row) in screen.rows().iter().enumerate() {
        let mut cells = vec![(first + index as u64 + 1).to_string()];
        cells.extend(entry.cells(row));
        let _ = writeln!(out, "{}", cells.join(" | "));
    }

    for line in entry.summary_lines(screen.summary()) {
        let _ = writeln!(out, "{line}");
    }
    let _ = writeln!(out, "{}", state.summary_line());
    let _ = writeln!(out, "pages: {}", page_links(&state));
    out
}
