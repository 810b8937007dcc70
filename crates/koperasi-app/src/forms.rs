// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::{
    DependentFetch, DependentFieldResolver, FetchError, FetchToken, FieldErrors, FieldKind,
    FieldSchema, MultipartForm, Notifier, Resolved, Schema, SubmitToken, Values, validate,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormMode {
    Add,
    Update,
    Detail,
}

impl FormMode {
    pub const ALL: [Self; 3] = [Self::Add, Self::Update, Self::Detail];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Detail => "detail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(Self::Add),
            "update" => Some(Self::Update),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }

    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Detail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Closed,
    Open,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSession {
    pub mode: FormMode,
    pub values: Values,
    pub errors: FieldErrors,
    pub record_id: Option<String>,
}

/// Toast text for submit outcomes, per mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessages {
    pub added: String,
    pub add_failed: String,
    pub updated: String,
    pub update_failed: String,
}

impl Default for FormMessages {
    fn default() -> Self {
        Self {
            added: "record added".to_owned(),
            add_failed: "failed to add record".to_owned(),
            updated: "record updated".to_owned(),
            update_failed: "failed to update record".to_owned(),
        }
    }
}

impl FormMessages {
    fn for_mode(&self, mode: FormMode) -> (&str, &str) {
        match mode {
            FormMode::Update => (&self.updated, &self.update_failed),
            FormMode::Add | FormMode::Detail => (&self.added, &self.add_failed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitBody {
    Json(Value),
    /// Sent when a file field holds a value.
    Multipart(MultipartForm),
}

impl SubmitBody {
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Multipart(_) => None,
        }
    }

    pub fn multipart(&self) -> Option<&MultipartForm> {
        match self {
            Self::Json(_) => None,
            Self::Multipart(form) => Some(form),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub token: SubmitToken,
    pub mode: FormMode,
    pub record_id: Option<String>,
    pub body: SubmitBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetFieldOutcome {
    Ignored,
    Updated(Vec<DependentFetch>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Ignored,
    Invalid(FieldErrors),
    Ready(SubmitRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitCompletion {
    Succeeded { mode: FormMode, message: String },
    Failed { mode: FormMode, message: String },
    Stale,
}

/// One active field as a form would render it.
#[derive(Debug, Clone)]
pub struct FieldView<'a> {
    pub field: &'a FieldSchema,
    pub value: String,
    pub disabled: bool,
    pub required_marker: bool,
    pub error: Option<&'a str>,
    /// Only set for fields with a dependent fetch.
    pub resolved: Option<&'a Resolved>,
    pub pending: bool,
}

/// Add/update/detail form lifecycle over one input schema.
///
/// `Closed -> Open -> Submitting -> Closed`; a failed submit returns to
/// `Open` with the entered values intact.
#[derive(Debug, Clone)]
pub struct DynamicFormEngine {
    schema: Schema,
    phase: FormPhase,
    session: Option<FormSession>,
    resolver: DependentFieldResolver,
    latest_submit: SubmitToken,
    messages: FormMessages,
}

impl DynamicFormEngine {
    pub fn new(schema: Schema) -> Self {
        Self {
            resolver: DependentFieldResolver::new(&schema),
            schema,
            phase: FormPhase::Closed,
            session: None,
            latest_submit: SubmitToken::default(),
            messages: FormMessages::default(),
        }
    }

    pub fn with_messages(mut self, messages: FormMessages) -> Self {
        self.messages = messages;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&FormSession> {
        self.session.as_ref()
    }

    pub fn mode(&self) -> Option<FormMode> {
        self.session.as_ref().map(|session| session.mode)
    }

    pub fn resolver(&self) -> &DependentFieldResolver {
        &self.resolver
    }

    /// Starts a session, replacing any current one. Keys of `initial` that
    /// are not in the schema are dropped. Dependent fields resolve in every
    /// mode so a detail view shows computed values too.
    pub fn open(
        &mut self,
        mode: FormMode,
        initial: &Values,
        record_id: Option<String>,
    ) -> Vec<DependentFetch> {
        let mut values = self.schema.blank_values();
        for (key, value) in initial {
            if let Some(slot) = values.get_mut(key) {
                slot.clone_from(value);
            }
        }

        self.latest_submit = self.latest_submit.next();
        self.resolver.reset();
        let fetches = self.resolver.refresh_all(&values);
        tracing::debug!(
            target: "koperasi::form",
            mode = mode.as_str(),
            record_id = record_id.as_deref().unwrap_or(""),
            lookups = fetches.len(),
            "form opened"
        );
        self.session = Some(FormSession {
            mode,
            values,
            errors: FieldErrors::new(),
            record_id,
        });
        self.phase = FormPhase::Open;
        fetches
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<String>) -> SetFieldOutcome {
        if self.phase != FormPhase::Open {
            return SetFieldOutcome::Ignored;
        }
        let Some(session) = self.session.as_mut() else {
            return SetFieldOutcome::Ignored;
        };
        if session.mode.is_read_only() {
            return SetFieldOutcome::Ignored;
        }
        match self.schema.field(key) {
            Some(field) if !field.readonly => {}
            _ => return SetFieldOutcome::Ignored,
        }

        session.values.insert(key.to_owned(), value.into());
        session.errors.remove(key);
        SetFieldOutcome::Updated(self.resolver.on_change(key, &session.values))
    }

    /// Validates and, when clean, moves to `Submitting` and hands back the
    /// request to send. The payload carries the active fields' entered values;
    /// resolved values are display-only and never submitted.
    pub fn submit(&mut self) -> SubmitOutcome {
        if self.phase != FormPhase::Open {
            return SubmitOutcome::Ignored;
        }
        let Some(session) = self.session.as_mut() else {
            return SubmitOutcome::Ignored;
        };
        if session.mode.is_read_only() {
            return SubmitOutcome::Ignored;
        }

        let errors = validate(&self.schema, &session.values);
        if !errors.is_empty() {
            tracing::debug!(
                target: "koperasi::form",
                invalid = errors.len(),
                "submit blocked by validation"
            );
            session.errors.clone_from(&errors);
            return SubmitOutcome::Invalid(errors);
        }
        session.errors.clear();

        let body = submit_body(&self.schema, &session.values);

        self.latest_submit = self.latest_submit.next();
        self.phase = FormPhase::Submitting;
        SubmitOutcome::Ready(SubmitRequest {
            token: self.latest_submit,
            mode: session.mode,
            record_id: session.record_id.clone(),
            body,
        })
    }

    pub fn complete_submit(
        &mut self,
        token: SubmitToken,
        result: Result<Value, FetchError>,
        notifier: &dyn Notifier,
    ) -> SubmitCompletion {
        if self.phase != FormPhase::Submitting || token != self.latest_submit {
            tracing::debug!(
                target: "koperasi::form",
                token = %token,
                latest = %self.latest_submit,
                "discarding stale submit result"
            );
            return SubmitCompletion::Stale;
        }
        let Some(mode) = self.mode() else {
            return SubmitCompletion::Stale;
        };
        let (succeeded, failed) = self.messages.for_mode(mode);

        match result {
            Ok(_) => {
                let message = succeeded.to_owned();
                notifier.notify_success(&message);
                self.close();
                SubmitCompletion::Succeeded { mode, message }
            }
            Err(error) => {
                tracing::warn!(target: "koperasi::form", token = %token, %error, "submit failed");
                let message = failed.to_owned();
                notifier.notify_error(&message);
                self.phase = FormPhase::Open;
                SubmitCompletion::Failed { mode, message }
            }
        }
    }

    /// `None` when the lookup was superseded or the form has closed.
    pub fn complete_dependent(
        &mut self,
        field: &str,
        token: FetchToken,
        result: Result<Value, FetchError>,
    ) -> Option<Resolved> {
        if self.session.is_none() {
            return None;
        }
        self.resolver.complete(field, token, result)
    }

    /// Discards the session from any phase. In-flight submits and lookups
    /// can no longer land.
    pub fn close(&mut self) {
        self.latest_submit = self.latest_submit.next();
        self.resolver.reset();
        self.session = None;
        self.phase = FormPhase::Closed;
        tracing::debug!(target: "koperasi::form", "form closed");
    }

    pub fn fields(&self) -> Vec<FieldView<'_>> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        self.schema
            .active_fields(&session.values)
            .filter(|field| field.kind.is_rendered())
            .map(|field| {
                let resolved = self.resolver.resolved(&field.key);
                let value = match resolved {
                    Some(resolved) => resolved.as_display().to_owned(),
                    None => session.values.get(&field.key).cloned().unwrap_or_default(),
                };
                FieldView {
                    field,
                    value,
                    disabled: session.mode.is_read_only()
                        || field.readonly
                        || self.phase == FormPhase::Submitting,
                    required_marker: field.shows_required_marker(),
                    error: session.errors.get(&field.key).map(String::as_str),
                    resolved,
                    pending: self.resolver.is_pending(&field.key),
                }
            })
            .collect()
    }
}

/// The active fields' entered values. Resolved values are display-only and
/// never submitted; a filled file field switches the body to multipart.
fn submit_body(schema: &Schema, values: &Values) -> SubmitBody {
    let mut text = Vec::new();
    let mut files = Vec::new();
    for field in schema.active_fields(values) {
        if field.dependent_fetch.is_some() {
            continue;
        }
        let Some(value) = values.get(&field.key) else {
            continue;
        };
        if field.kind == FieldKind::File {
            if !value.trim().is_empty() {
                files.push((field.key.clone(), PathBuf::from(value.trim())));
            }
            continue;
        }
        text.push((field.key.clone(), value.clone()));
    }

    if files.is_empty() {
        let payload: Map<String, Value> = text
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        SubmitBody::Json(Value::Object(payload))
    } else {
        SubmitBody::Multipart(MultipartForm { text, files })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DynamicFormEngine, FormMessages, FormMode, FormPhase, SetFieldOutcome, SubmitBody,
        SubmitCompletion, SubmitOutcome,
    };
    use crate::{
        DependentFetchSpec, FetchError, FieldSchema, Notifier, Resolved, Schema, SelectOption,
        Values, value_is_empty,
    };
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Toasts {
        errors: Mutex<Vec<String>>,
        successes: Mutex<Vec<String>>,
    }

    impl Notifier for Toasts {
        fn notify_error(&self, message: &str) {
            if let Ok(mut errors) = self.errors.lock() {
                errors.push(message.to_owned());
            }
        }

        fn notify_success(&self, message: &str) {
            if let Ok(mut successes) = self.successes.lock() {
                successes.push(message.to_owned());
            }
        }
    }

    fn savings_schema() -> Schema {
        Schema::new(vec![
            FieldSchema::hidden("id"),
            FieldSchema::select("user_id", "Karyawan", [SelectOption::new("1", "Ani")]).required(),
            FieldSchema::date("date", "Tanggal").required(),
            FieldSchema::number("value", "Besar Simpanan").required(),
            FieldSchema::select(
                "type",
                "Jenis Simpanan",
                [
                    SelectOption::new("wajib", "Simpanan Wajib"),
                    SelectOption::new("pokok", "Simpanan Pokok"),
                ],
            )
            .required(),
            FieldSchema::number("bagi_hasil", "Total Bagi Hasil Tahunan")
                .readonly()
                .with_dependent_fetch(DependentFetchSpec::new(
                    "/api/savings/calculate",
                    ["id", "user_id", "value", "date", "type"],
                    "bagi_hasil_tahunan",
                    |values: &Values| {
                        !value_is_empty(values, "user_id")
                            && !value_is_empty(values, "date")
                            && !value_is_empty(values, "value")
                            && values.get("type").is_some_and(|kind| kind == "wajib")
                    },
                )),
        ])
        .expect("valid savings schema")
    }

    fn filled() -> Values {
        [
            ("user_id", "1"),
            ("date", "2024-03-10"),
            ("value", "50000"),
            ("type", "wajib"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
    }

    fn failure() -> FetchError {
        FetchError::Status {
            path: "/api/savings".to_owned(),
            status: 422,
            message: "invalid".to_owned(),
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in FormMode::ALL {
            assert_eq!(FormMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(FormMode::parse("edit"), None);
    }

    #[test]
    fn detail_mode_ignores_edits_and_submit() {
        let mut form = DynamicFormEngine::new(savings_schema());
        form.open(FormMode::Detail, &filled(), Some("7".to_owned()));

        assert_eq!(form.set_field("value", "1"), SetFieldOutcome::Ignored);
        assert_eq!(form.submit(), SubmitOutcome::Ignored);
        assert_eq!(
            form.session().and_then(|session| session.values.get("value")).map(String::as_str),
            Some("50000")
        );
        assert_eq!(form.phase(), FormPhase::Open);
        assert!(form.fields().iter().all(|view| view.disabled));
    }

    #[test]
    fn readonly_unknown_and_closed_edits_are_ignored() {
        let mut form = DynamicFormEngine::new(savings_schema());
        assert_eq!(form.set_field("value", "1"), SetFieldOutcome::Ignored);

        form.open(FormMode::Add, &Values::new(), None);
        assert_eq!(form.set_field("bagi_hasil", "9"), SetFieldOutcome::Ignored);
        assert_eq!(form.set_field("nope", "9"), SetFieldOutcome::Ignored);
    }

    #[test]
    fn invalid_submit_stays_open_with_errors() {
        let mut form = DynamicFormEngine::new(savings_schema());
        form.open(FormMode::Add, &Values::new(), None);

        let SubmitOutcome::Invalid(errors) = form.submit() else {
            panic!("empty form must not submit");
        };
        assert_eq!(errors.len(), 4);
        assert_eq!(form.phase(), FormPhase::Open);

        form.set_field("value", "1000");
        let session = form.session().expect("open session");
        assert!(!session.errors.contains_key("value"));
        assert!(session.errors.contains_key("date"));
    }

    #[test]
    fn submit_payload_excludes_resolved_values() {
        let mut form = DynamicFormEngine::new(savings_schema());
        let fetches = form.open(FormMode::Update, &filled(), Some("7".to_owned()));
        form.complete_dependent(
            "bagi_hasil",
            fetches[0].token,
            Ok(json!({"bagi_hasil_tahunan": 1200})),
        );

        let SubmitOutcome::Ready(request) = form.submit() else {
            panic!("filled form should submit");
        };
        assert_eq!(request.mode, FormMode::Update);
        assert_eq!(request.record_id.as_deref(), Some("7"));
        let payload = request.body.json().expect("json body");
        assert_eq!(payload["value"], json!("50000"));
        assert!(payload.get("bagi_hasil").is_none());
        assert_eq!(form.phase(), FormPhase::Submitting);
        assert_eq!(form.set_field("value", "1"), SetFieldOutcome::Ignored);
        assert_eq!(form.submit(), SubmitOutcome::Ignored);
    }

    #[test]
    fn failed_submit_reopens_with_values_and_notifies() {
        let toasts = Toasts::default();
        let mut form = DynamicFormEngine::new(savings_schema()).with_messages(FormMessages {
            add_failed: "Gagal menambahkan data simpanan".to_owned(),
            ..FormMessages::default()
        });
        form.open(FormMode::Add, &filled(), None);
        let SubmitOutcome::Ready(request) = form.submit() else {
            panic!("filled form should submit");
        };

        let completion = form.complete_submit(request.token, Err(failure()), &toasts);
        assert_eq!(
            completion,
            SubmitCompletion::Failed {
                mode: FormMode::Add,
                message: "Gagal menambahkan data simpanan".to_owned(),
            }
        );
        assert_eq!(form.phase(), FormPhase::Open);
        assert_eq!(
            form.session()
                .and_then(|session| session.values.get("value"))
                .map(String::as_str),
            Some("50000")
        );
        assert_eq!(toasts.errors.lock().map(|errors| errors.len()).unwrap_or(0), 1);
    }

    #[test]
    fn successful_submit_closes_and_clears_session() {
        let toasts = Toasts::default();
        let mut form = DynamicFormEngine::new(savings_schema());
        form.open(FormMode::Add, &filled(), None);
        let SubmitOutcome::Ready(request) = form.submit() else {
            panic!("filled form should submit");
        };

        let completion = form.complete_submit(request.token, Ok(json!({"id": 9})), &toasts);
        assert!(matches!(completion, SubmitCompletion::Succeeded { .. }));
        assert_eq!(form.phase(), FormPhase::Closed);
        assert!(form.session().is_none());
        assert_eq!(
            toasts.successes.lock().map(|found| found.clone()).unwrap_or_default(),
            vec!["record added".to_owned()]
        );
    }

    #[test]
    fn close_supersedes_in_flight_submit_and_lookups() {
        let toasts = Toasts::default();
        let mut form = DynamicFormEngine::new(savings_schema());
        let fetches = form.open(FormMode::Add, &filled(), None);
        let SubmitOutcome::Ready(request) = form.submit() else {
            panic!("filled form should submit");
        };
        form.close();

        assert_eq!(
            form.complete_submit(request.token, Ok(json!({})), &toasts),
            SubmitCompletion::Stale
        );
        let late = form.complete_dependent(
            "bagi_hasil",
            fetches[0].token,
            Ok(json!({"bagi_hasil_tahunan": 1})),
        );
        assert_eq!(late, None);
        assert!(toasts.successes.lock().map(|found| found.is_empty()).unwrap_or(false));
    }

    #[test]
    fn fields_show_resolved_value_for_dependent_inputs() {
        let mut form = DynamicFormEngine::new(savings_schema());
        let fetches = form.open(FormMode::Add, &filled(), None);
        assert!(
            form.fields()
                .iter()
                .any(|view| view.field.key == "bagi_hasil" && view.pending)
        );

        form.complete_dependent(
            "bagi_hasil",
            fetches[0].token,
            Ok(json!({"bagi_hasil_tahunan": 1200})),
        );
        let views = form.fields();
        let bagi_hasil = views
            .iter()
            .find(|view| view.field.key == "bagi_hasil")
            .expect("rendered dependent field");
        assert_eq!(bagi_hasil.value, "1200");
        assert!(bagi_hasil.disabled);
        assert_eq!(bagi_hasil.resolved, Some(&Resolved::Value("1200".to_owned())));
        assert!(views.iter().all(|view| view.field.key != "id"));
    }

    #[test]
    fn switching_type_to_pokok_clears_resolution_without_fetch() {
        let mut form = DynamicFormEngine::new(savings_schema());
        form.open(FormMode::Add, &filled(), None);

        let SetFieldOutcome::Updated(fetches) = form.set_field("type", "pokok") else {
            panic!("editable field should update");
        };
        assert!(fetches.is_empty());
        assert_eq!(form.resolver().resolved("bagi_hasil"), Some(&Resolved::NotReady));
    }

    #[test]
    fn filled_file_field_submits_multipart() {
        let schema = Schema::new(vec![
            FieldSchema::hidden("loan_id").required(),
            FieldSchema::file("proof_path", "Bukti Transfer").required(),
        ])
        .expect("valid schema");
        let mut form = DynamicFormEngine::new(schema);
        let initial: Values = [("loan_id".to_owned(), "4".to_owned())].into_iter().collect();
        form.open(FormMode::Add, &initial, None);

        let SubmitOutcome::Invalid(errors) = form.submit() else {
            panic!("missing proof must not submit");
        };
        assert!(errors.contains_key("proof_path"));

        form.set_field("proof_path", " /tmp/bukti.jpg ");
        let SubmitOutcome::Ready(request) = form.submit() else {
            panic!("filled form should submit");
        };
        let SubmitBody::Multipart(upload) = &request.body else {
            panic!("file field should switch to multipart");
        };
        assert_eq!(upload.text_value("loan_id"), Some("4"));
        assert_eq!(upload.file("proof_path"), Some(Path::new("/tmp/bukti.jpg")));
        assert_eq!(request.body.json(), None);
    }
}
