// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::Arc;

use anyhow::{Result, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;

use crate::{
    DeleteToken, DependentFetch, DynamicFormEngine, FetchResult, FetchToken, Fetcher, FieldErrors,
    FilterController, FormMessages, FormMode, ListOutcome, ListResponse, ListToken,
    MonthRangeParams, Notifier, PageRequest, PageState, PageToken, PaginatedListController,
    Resolved, Schema, SetFieldOutcome, SubmitBody, SubmitCompletion, SubmitOutcome, SubmitToken,
    Values, DEFAULT_PAGE_SIZE, display_json,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMethod {
    Post,
    Put,
}

impl SubmitMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPath {
    /// The collection itself, e.g. `/api/savings`.
    Collection,
    /// `collection/{record_id}`.
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTarget {
    pub method: SubmitMethod,
    pub path: SubmitPath,
}

impl SubmitTarget {
    pub const fn new(method: SubmitMethod, path: SubmitPath) -> Self {
        Self { method, path }
    }

    pub fn resolve(&self, collection: &str, record_id: Option<&str>) -> Result<String> {
        match self.path {
            SubmitPath::Collection => Ok(collection.to_owned()),
            SubmitPath::Record => match record_id.filter(|id| !id.trim().is_empty()) {
                Some(id) => Ok(record_path(collection, id)),
                None => bail!(
                    "{} {collection}/{{id}} needs a record id -- open the form from a row and retry",
                    self.method.as_str()
                ),
            },
        }
    }
}

/// Where add and update submissions go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPolicy {
    pub add: SubmitTarget,
    pub update: SubmitTarget,
}

impl Default for SubmitPolicy {
    fn default() -> Self {
        Self {
            add: SubmitTarget::new(SubmitMethod::Post, SubmitPath::Collection),
            update: SubmitTarget::new(SubmitMethod::Put, SubmitPath::Record),
        }
    }
}

impl SubmitPolicy {
    /// Updates are POSTed to `collection/{id}` (settlement approval).
    pub fn post_to_record() -> Self {
        Self {
            update: SubmitTarget::new(SubmitMethod::Post, SubmitPath::Record),
            ..Self::default()
        }
    }

    pub fn target(&self, mode: FormMode) -> SubmitTarget {
        match mode {
            FormMode::Add => self.add,
            FormMode::Update | FormMode::Detail => self.update,
        }
    }
}

pub fn record_path(collection: &str, record_id: &str) -> String {
    format!("{}/{}", collection.trim_end_matches('/'), record_id.trim())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenMessages {
    pub load_failed: String,
    pub form: FormMessages,
    pub deleted: String,
    pub delete_failed: String,
}

impl Default for ScreenMessages {
    fn default() -> Self {
        Self {
            load_failed: "failed to load data".to_owned(),
            form: FormMessages::default(),
            deleted: "record deleted".to_owned(),
            delete_failed: "failed to delete record".to_owned(),
        }
    }
}

/// Everything a data screen supplies: where its rows live, how they are
/// filtered and which inputs its modal form shows.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub name: String,
    pub title: String,
    pub list_path: String,
    pub collection_path: String,
    pub submit_policy: SubmitPolicy,
    pub filters: Schema,
    pub inputs: Schema,
    pub page_sizes: Vec<u32>,
    pub default_page_size: u32,
    pub initial_filters: Values,
    pub month_params: MonthRangeParams,
    pub id_field: String,
    pub messages: ScreenMessages,
}

impl ScreenConfig {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        collection_path: impl Into<String>,
        filters: Schema,
        inputs: Schema,
    ) -> Self {
        let collection_path = collection_path.into();
        Self {
            name: name.into(),
            title: title.into(),
            list_path: collection_path.clone(),
            collection_path,
            submit_policy: SubmitPolicy::default(),
            filters,
            inputs,
            page_sizes: Vec::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
            initial_filters: Values::new(),
            month_params: MonthRangeParams::default(),
            id_field: "id".to_owned(),
            messages: ScreenMessages::default(),
        }
    }

    pub fn with_list_path(mut self, list_path: impl Into<String>) -> Self {
        self.list_path = list_path.into();
        self
    }

    pub fn with_submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.submit_policy = policy;
        self
    }

    pub fn with_page_sizes(mut self, default_page_size: u32, page_sizes: &[u32]) -> Self {
        self.default_page_size = default_page_size;
        self.page_sizes = page_sizes.to_vec();
        self
    }

    pub fn with_initial_filters(mut self, initial: Values) -> Self {
        self.initial_filters = initial;
        self
    }

    pub fn with_month_params(mut self, month_params: MonthRangeParams) -> Self {
        self.month_params = month_params;
        self
    }

    pub fn with_messages(mut self, messages: ScreenMessages) -> Self {
        self.messages = messages;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenCommand {
    /// Loads page 1 with the applied filters.
    Load,
    UpdateFilterDraft { key: String, value: String },
    ApplyFilter,
    ApplyFilterValues(Values),
    ResetFilter,
    Reload,
    ChangePage(u32),
    NextPage,
    PrevPage,
    ChangePageSize(u32),
    OpenForm {
        mode: FormMode,
        initial: Values,
        record_id: Option<String>,
    },
    /// Opens the form seeded from a row of the current page.
    OpenRow { mode: FormMode, index: usize },
    SetField { key: String, value: String },
    Submit,
    CloseForm,
    Delete { record_id: String },
}

impl ScreenCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::UpdateFilterDraft { .. } => "update-filter-draft",
            Self::ApplyFilter => "apply-filter",
            Self::ApplyFilterValues(_) => "apply-filter-values",
            Self::ResetFilter => "reset-filter",
            Self::Reload => "reload",
            Self::ChangePage(_) => "change-page",
            Self::NextPage => "next-page",
            Self::PrevPage => "prev-page",
            Self::ChangePageSize(_) => "change-page-size",
            Self::OpenForm { .. } => "open-form",
            Self::OpenRow { .. } => "open-row",
            Self::SetField { .. } => "set-field",
            Self::Submit => "submit",
            Self::CloseForm => "close-form",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    List,
    Dependent,
    Submit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    FilterDraftUpdated { key: String },
    FilterApplied(Values),
    LoadIssued {
        token: ListToken,
        page: u32,
        page_size: u32,
    },
    ListUpdated(PageState),
    LoadFailed(String),
    StaleDiscarded(CompletionSource),
    FormOpened(FormMode),
    FieldUpdated { key: String },
    DependentIssued { field: String, token: FetchToken },
    DependentResolved { field: String, value: Resolved },
    FormInvalid(FieldErrors),
    SubmitIssued { token: SubmitToken, mode: FormMode },
    Submitted { mode: FormMode, message: String },
    SubmitFailed { mode: FormMode, message: String },
    FormClosed,
    DeleteIssued { token: DeleteToken, record_id: String },
    Deleted { record_id: String },
    DeleteFailed { record_id: String, message: String },
    Ignored(&'static str),
    Rejected(String),
}

enum Completion {
    List {
        token: ListToken,
        path: String,
        result: FetchResult,
    },
    Dependent {
        field: String,
        token: FetchToken,
        result: FetchResult,
    },
    Submit {
        token: SubmitToken,
        result: FetchResult,
    },
    Delete {
        token: DeleteToken,
        record_id: String,
        result: FetchResult,
    },
}

/// One data screen: filter, paginated list and modal form over a shared
/// fetch capability.
///
/// Commands run synchronously and queue their requests; the caller drives
/// completions with [`Screen::next_completion`] or [`Screen::settle`] on the
/// same task.
pub struct Screen {
    config: ScreenConfig,
    filter: FilterController,
    list: PaginatedListController<Value>,
    form: DynamicFormEngine,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    pending: FuturesUnordered<BoxFuture<'static, Completion>>,
    latest_delete: DeleteToken,
}

impl Screen {
    pub fn new(
        config: ScreenConfig,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        if config.list_path.trim().is_empty() {
            bail!("screen {:?} has no list path -- set one and retry", config.name);
        }
        let list = PaginatedListController::new(config.default_page_size, &config.page_sizes)?
            .with_load_failed_message(config.messages.load_failed.clone());
        let filter = FilterController::new(config.filters.clone(), &config.initial_filters)?
            .with_month_params(config.month_params.clone());
        let form =
            DynamicFormEngine::new(config.inputs.clone()).with_messages(config.messages.form.clone());

        Ok(Self {
            config,
            filter,
            list,
            form,
            fetcher,
            notifier,
            pending: FuturesUnordered::new(),
            latest_delete: DeleteToken::default(),
        })
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn filter(&self) -> &FilterController {
        &self.filter
    }

    pub fn list(&self) -> &PaginatedListController<Value> {
        &self.list
    }

    pub fn form(&self) -> &DynamicFormEngine {
        &self.form
    }

    pub fn rows(&self) -> &[Value] {
        self.list.rows()
    }

    /// Aggregates the last applied list response carried, if any.
    pub fn summary(&self) -> Option<&Value> {
        self.list.summary()
    }

    pub fn page_state(&self) -> PageState {
        self.list.state()
    }

    pub fn page_range(&self) -> Vec<PageToken> {
        self.list.state().page_range()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn dispatch(&mut self, command: ScreenCommand) -> Vec<ScreenEvent> {
        let name = command.name();
        match command {
            ScreenCommand::Load => {
                let request = self.list.reset_with_filter(self.filter.query_params());
                vec![self.queue_list(request)]
            }
            ScreenCommand::UpdateFilterDraft { key, value } => {
                match self.filter.update_draft(&key, value) {
                    Ok(()) => vec![ScreenEvent::FilterDraftUpdated { key }],
                    Err(error) => self.reject(name, &error),
                }
            }
            ScreenCommand::ApplyFilter => {
                let applied = self.filter.apply_draft();
                self.filter_changed(applied)
            }
            ScreenCommand::ApplyFilterValues(values) => {
                let applied = self.filter.apply_filter(&values);
                self.filter_changed(applied)
            }
            ScreenCommand::ResetFilter => {
                let applied = self.filter.reset_filter();
                self.filter_changed(applied)
            }
            ScreenCommand::Reload => {
                let request = self.list.reload();
                vec![self.queue_list(request)]
            }
            ScreenCommand::ChangePage(page) => {
                let request = self.list.on_page_change(page);
                vec![self.queue_list(request)]
            }
            ScreenCommand::NextPage => {
                let request = self.list.next_page();
                vec![self.queue_list(request)]
            }
            ScreenCommand::PrevPage => {
                let request = self.list.prev_page();
                vec![self.queue_list(request)]
            }
            ScreenCommand::ChangePageSize(page_size) => {
                match self.list.on_page_size_change(page_size) {
                    Ok(request) => vec![self.queue_list(request)],
                    Err(error) => self.reject(name, &error),
                }
            }
            ScreenCommand::OpenForm {
                mode,
                initial,
                record_id,
            } => self.open_form(mode, &initial, record_id),
            ScreenCommand::OpenRow { mode, index } => {
                let Some(row) = self.list.rows().get(index) else {
                    let error = anyhow::anyhow!(
                        "row {index} is not on the current page ({} rows)",
                        self.list.rows().len()
                    );
                    return self.reject(name, &error);
                };
                let initial = row_values(row);
                let record_id = row.get(&self.config.id_field).and_then(display_json);
                self.open_form(mode, &initial, record_id)
            }
            ScreenCommand::SetField { key, value } => match self.form.set_field(&key, value) {
                SetFieldOutcome::Ignored => vec![ScreenEvent::Ignored(name)],
                SetFieldOutcome::Updated(fetches) => {
                    let mut events = vec![ScreenEvent::FieldUpdated { key }];
                    events.extend(self.queue_dependents(fetches));
                    events
                }
            },
            ScreenCommand::Submit => self.submit(name),
            ScreenCommand::CloseForm => {
                self.form.close();
                vec![ScreenEvent::FormClosed]
            }
            ScreenCommand::Delete { record_id } => self.delete(record_id),
        }
    }

    /// Waits for the next in-flight request and applies it. `None` once
    /// nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<Vec<ScreenEvent>> {
        let completion = self.pending.next().await?;
        Some(self.apply(completion))
    }

    /// Drains every in-flight request, including ones queued by completions
    /// (e.g. the reload after a successful submit).
    pub async fn settle(&mut self) -> Vec<ScreenEvent> {
        let mut events = Vec::new();
        while let Some(batch) = self.next_completion().await {
            events.extend(batch);
        }
        events
    }

    fn reject(&self, command: &'static str, error: &anyhow::Error) -> Vec<ScreenEvent> {
        tracing::warn!(
            target: "koperasi::screen",
            screen = %self.config.name,
            command,
            error = %error,
            "command rejected"
        );
        vec![ScreenEvent::Rejected(error.to_string())]
    }

    fn filter_changed(&mut self, applied: Values) -> Vec<ScreenEvent> {
        let request = self.list.reset_with_filter(self.filter.query_params());
        vec![
            ScreenEvent::FilterApplied(applied),
            self.queue_list(request),
        ]
    }

    fn open_form(
        &mut self,
        mode: FormMode,
        initial: &Values,
        record_id: Option<String>,
    ) -> Vec<ScreenEvent> {
        let fetches = self.form.open(mode, initial, record_id);
        let mut events = vec![ScreenEvent::FormOpened(mode)];
        events.extend(self.queue_dependents(fetches));
        events
    }

    fn submit(&mut self, name: &'static str) -> Vec<ScreenEvent> {
        let Some(session) = self.form.session() else {
            return vec![ScreenEvent::Ignored(name)];
        };
        let target = self.config.submit_policy.target(session.mode);
        let path = if session.mode.is_read_only() {
            self.config.collection_path.clone()
        } else {
            match target.resolve(&self.config.collection_path, session.record_id.as_deref()) {
                Ok(path) => path,
                Err(error) => return self.reject(name, &error),
            }
        };

        match self.form.submit() {
            SubmitOutcome::Ignored => vec![ScreenEvent::Ignored(name)],
            SubmitOutcome::Invalid(errors) => vec![ScreenEvent::FormInvalid(errors)],
            SubmitOutcome::Ready(request) => {
                tracing::debug!(
                    target: "koperasi::screen",
                    method = target.method.as_str(),
                    path = %path,
                    token = %request.token,
                    multipart = request.body.multipart().is_some(),
                    "submit issued"
                );
                let fetcher = Arc::clone(&self.fetcher);
                let token = request.token;
                let body = request.body;
                self.pending.push(
                    async move {
                        // Multipart always goes out as POST.
                        let result = match (&body, target.method) {
                            (SubmitBody::Multipart(form), _) => {
                                fetcher.post_multipart(&path, form).await
                            }
                            (SubmitBody::Json(payload), SubmitMethod::Post) => {
                                fetcher.post(&path, payload).await
                            }
                            (SubmitBody::Json(payload), SubmitMethod::Put) => {
                                fetcher.put(&path, payload).await
                            }
                        };
                        Completion::Submit { token, result }
                    }
                    .boxed(),
                );
                vec![ScreenEvent::SubmitIssued {
                    token,
                    mode: request.mode,
                }]
            }
        }
    }

    fn delete(&mut self, record_id: String) -> Vec<ScreenEvent> {
        if record_id.trim().is_empty() {
            let error = anyhow::anyhow!("delete needs a record id -- pick a row and retry");
            return self.reject("delete", &error);
        }
        self.latest_delete = self.latest_delete.next();
        let token = self.latest_delete;
        let path = record_path(&self.config.collection_path, &record_id);
        let fetcher = Arc::clone(&self.fetcher);
        let id = record_id.clone();
        self.pending.push(
            async move {
                let result = fetcher.delete(&path).await;
                Completion::Delete {
                    token,
                    record_id: id,
                    result,
                }
            }
            .boxed(),
        );
        vec![ScreenEvent::DeleteIssued { token, record_id }]
    }

    fn queue_list(&mut self, request: PageRequest) -> ScreenEvent {
        let PageRequest {
            token,
            page,
            page_size,
            params,
        } = request;
        let fetcher = Arc::clone(&self.fetcher);
        let path = self.config.list_path.clone();
        self.pending.push(
            async move {
                let result = fetcher.get(&path, &params).await;
                Completion::List {
                    token,
                    path,
                    result,
                }
            }
            .boxed(),
        );
        ScreenEvent::LoadIssued {
            token,
            page,
            page_size,
        }
    }

    fn queue_dependents(&mut self, fetches: Vec<DependentFetch>) -> Vec<ScreenEvent> {
        fetches
            .into_iter()
            .map(|fetch| {
                let DependentFetch {
                    field,
                    token,
                    path,
                    params,
                } = fetch;
                let fetcher = Arc::clone(&self.fetcher);
                let event_field = field.clone();
                self.pending.push(
                    async move {
                        let result = fetcher.get(&path, &params).await;
                        Completion::Dependent {
                            field,
                            token,
                            result,
                        }
                    }
                    .boxed(),
                );
                ScreenEvent::DependentIssued {
                    field: event_field,
                    token,
                }
            })
            .collect()
    }

    fn apply(&mut self, completion: Completion) -> Vec<ScreenEvent> {
        match completion {
            Completion::List {
                token,
                path,
                result,
            } => {
                let decoded =
                    result.and_then(|value| ListResponse::<Value>::from_value(&path, value));
                match self.list.complete(token, decoded, self.notifier.as_ref()) {
                    ListOutcome::Applied(state) => vec![ScreenEvent::ListUpdated(state)],
                    ListOutcome::Failed(message) => vec![ScreenEvent::LoadFailed(message)],
                    ListOutcome::Stale => {
                        vec![ScreenEvent::StaleDiscarded(CompletionSource::List)]
                    }
                }
            }
            Completion::Dependent {
                field,
                token,
                result,
            } => match self.form.complete_dependent(&field, token, result) {
                Some(value) => vec![ScreenEvent::DependentResolved { field, value }],
                None => vec![ScreenEvent::StaleDiscarded(CompletionSource::Dependent)],
            },
            Completion::Submit { token, result } => {
                match self
                    .form
                    .complete_submit(token, result, self.notifier.as_ref())
                {
                    SubmitCompletion::Succeeded { mode, message } => {
                        let request = self.list.reload();
                        vec![
                            ScreenEvent::Submitted { mode, message },
                            ScreenEvent::FormClosed,
                            self.queue_list(request),
                        ]
                    }
                    SubmitCompletion::Failed { mode, message } => {
                        vec![ScreenEvent::SubmitFailed { mode, message }]
                    }
                    SubmitCompletion::Stale => {
                        vec![ScreenEvent::StaleDiscarded(CompletionSource::Submit)]
                    }
                }
            }
            Completion::Delete {
                token,
                record_id,
                result,
            } => match result {
                Ok(_) => {
                    self.notifier.notify_success(&self.config.messages.deleted);
                    let request = self.list.reload();
                    vec![ScreenEvent::Deleted { record_id }, self.queue_list(request)]
                }
                Err(error) => {
                    tracing::warn!(
                        target: "koperasi::screen",
                        token = %token,
                        record_id = %record_id,
                        %error,
                        "delete failed"
                    );
                    let message = self.config.messages.delete_failed.clone();
                    self.notifier.notify_error(&message);
                    vec![ScreenEvent::DeleteFailed { record_id, message }]
                }
            },
        }
    }
}

/// Flattens a row object into form values. Nulls are skipped; nested values
/// are kept as their JSON text.
pub fn row_values(row: &Value) -> Values {
    row.as_object()
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| display_json(value).map(|text| (key.clone(), text)))
                .collect()
        })
        .unwrap_or_default()
}
