// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use koperasi_app::{
    DependentFetchSpec, FetchError, FetchResult, Fetcher, FieldSchema, MonthRangeParams,
    MultipartForm, Notifier, PageState, QueryParams, ScreenConfig, ScreenMessages, Schema, SelectOption, Values,
    FormMessages, value_is_empty,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use time::{Date, Month};

const FIRST_NAMES: [&str; 12] = [
    "Ani", "Budi", "Citra", "Dewi", "Eko", "Fitri", "Gilang", "Hana", "Indra", "Joko", "Kartika",
    "Lestari",
];
const LAST_NAMES: [&str; 10] = [
    "Santoso",
    "Wijaya",
    "Pratama",
    "Saputra",
    "Hidayat",
    "Nugroho",
    "Kusuma",
    "Setiawan",
    "Wibowo",
    "Halim",
];
const SAVING_TYPES: [&str; 3] = ["wajib", "pokok", "sukarela"];
const LOAN_STATUSES: [&str; 3] = ["applied", "approved", "rejected"];

const REFERENCE_YEAR: i32 = 2024;

pub const SAVINGS_PATH: &str = "/api/savings";
pub const SAVINGS_CALCULATE_PATH: &str = "/api/savings/calculate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// One request seen by a [`ScriptedFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: QueryParams,
    pub body: Option<Value>,
    pub multipart: Option<MultipartForm>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// A canned reply, optionally delivered after a delay on the tokio clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Scripted {
    pub delay: Duration,
    pub result: FetchResult,
}

impl Scripted {
    pub fn ok(value: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(error: FetchError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn status(path: &str, status: u16, message: &str) -> Self {
        Self::err(FetchError::Status {
            path: path.to_owned(),
            status,
            message: message.to_owned(),
        })
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&RecordedCall) -> Scripted + Send + Sync;

/// Fetcher whose replies come from a closure over the incoming call.
pub struct ScriptedFetcher {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedFetcher {
    pub fn new(responder: impl Fn(&RecordedCall) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.path == path)
            .collect()
    }

    async fn respond(&self, call: RecordedCall) -> FetchResult {
        let scripted = (self.responder)(&call);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.result
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn get(&self, path: &str, query: &QueryParams) -> FetchResult {
        self.respond(RecordedCall {
            method: Method::Get,
            path: path.to_owned(),
            query: query.clone(),
            body: None,
            multipart: None,
        })
        .await
    }

    async fn post(&self, path: &str, body: &Value) -> FetchResult {
        self.respond(RecordedCall {
            method: Method::Post,
            path: path.to_owned(),
            query: QueryParams::new(),
            body: Some(body.clone()),
            multipart: None,
        })
        .await
    }

    async fn put(&self, path: &str, body: &Value) -> FetchResult {
        self.respond(RecordedCall {
            method: Method::Put,
            path: path.to_owned(),
            query: QueryParams::new(),
            body: Some(body.clone()),
            multipart: None,
        })
        .await
    }

    async fn post_multipart(&self, path: &str, form: &MultipartForm) -> FetchResult {
        self.respond(RecordedCall {
            method: Method::Post,
            path: path.to_owned(),
            query: QueryParams::new(),
            body: None,
            multipart: Some(form.clone()),
        })
        .await
    }

    async fn delete(&self, path: &str) -> FetchResult {
        self.respond(RecordedCall {
            method: Method::Delete,
            path: path.to_owned(),
            query: QueryParams::new(),
            body: None,
            multipart: None,
        })
        .await
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
    successes: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }

    fn notify_success(&self, message: &str) {
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_owned());
    }
}

/// A `ListResponse`-shaped payload with `last_page` derived from the totals.
pub fn list_page(rows: Vec<Value>, page: u32, per_page: u32, total: u64) -> Value {
    json!({
        "data": rows,
        "total": total,
        "current_page": page,
        "per_page": per_page,
        "last_page": PageState::last_page_for(total, per_page),
    })
}

pub fn values(pairs: &[(&str, &str)]) -> Values {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

/// Shared annual profit lookup is only meaningful for mandatory savings.
pub fn savings_lookup_ready(values: &Values) -> bool {
    !value_is_empty(values, "user_id")
        && !value_is_empty(values, "date")
        && !value_is_empty(values, "value")
        && values.get("type").is_some_and(|kind| kind == "wajib")
}

pub fn savings_filters() -> Result<Schema> {
    Schema::new(vec![
        FieldSchema::month("date", "Bulan"),
        FieldSchema::select(
            "type",
            "Jenis Simpanan",
            SAVING_TYPES.map(|kind| SelectOption::new(kind, kind)),
        ),
    ])
}

pub fn savings_inputs() -> Result<Schema> {
    Schema::new(vec![
        FieldSchema::hidden("id"),
        FieldSchema::select(
            "user_id",
            "Karyawan",
            [SelectOption::new("1", "Ani"), SelectOption::new("2", "Budi")],
        )
        .required(),
        FieldSchema::date("date", "Tanggal").required(),
        FieldSchema::number("value", "Besar Simpanan").required(),
        FieldSchema::select(
            "type",
            "Jenis Simpanan",
            SAVING_TYPES.map(|kind| SelectOption::new(kind, kind)),
        )
        .required(),
        FieldSchema::number("bagi_hasil", "Total Bagi Hasil Tahunan")
            .readonly()
            .with_dependent_fetch(DependentFetchSpec::new(
                SAVINGS_CALCULATE_PATH,
                ["user_id", "date", "value", "type"],
                "bagi_hasil_tahunan",
                savings_lookup_ready,
            )),
    ])
}

pub fn savings_screen() -> Result<ScreenConfig> {
    Ok(ScreenConfig::new(
        "savings",
        "Daftar Simpanan",
        SAVINGS_PATH,
        savings_filters()?,
        savings_inputs()?,
    )
    .with_month_params(MonthRangeParams::new("start_date", "end_date"))
    .with_messages(ScreenMessages {
        load_failed: "Gagal mengambil data simpanan".to_owned(),
        form: FormMessages {
            added: "Berhasil menambahkan data simpanan".to_owned(),
            add_failed: "Gagal menambahkan data simpanan".to_owned(),
            updated: "Berhasil mengubah data simpanan".to_owned(),
            update_failed: "Gagal mengubah data simpanan".to_owned(),
        },
        deleted: "Berhasil menghapus data simpanan".to_owned(),
        delete_failed: "Gagal menghapus data simpanan".to_owned(),
    }))
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of member rows as the listing endpoints return them.
#[derive(Debug, Clone)]
pub struct MemberFaker {
    rng: DeterministicRng,
}

impl MemberFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn member_name(&mut self) -> String {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        format!("{first} {last}")
    }

    pub fn date_in_month(&mut self, year: i32, month: Month) -> String {
        let last_day = month.length(year);
        let day = u8::try_from(self.int_range(1, i64::from(last_day))).unwrap_or(1);
        Date::from_calendar_date(year, month, day)
            .map(|date| {
                format!(
                    "{:04}-{:02}-{:02}",
                    date.year(),
                    u8::from(date.month()),
                    date.day()
                )
            })
            .unwrap_or_else(|_| format!("{year:04}-{:02}-01", u8::from(month)))
    }

    pub fn savings_row(&mut self, id: u64) -> Value {
        let month = Month::try_from(u8::try_from(self.int_range(1, 12)).unwrap_or(1))
            .unwrap_or(Month::January);
        let user_id = self.int_range(1, 40);
        json!({
            "id": id,
            "user_id": user_id,
            "user": { "id": user_id, "name": self.member_name() },
            "date": self.date_in_month(REFERENCE_YEAR, month),
            "type": self.pick(&SAVING_TYPES),
            "value": self.int_range(10, 500) * 1_000,
        })
    }

    pub fn loan_row(&mut self, id: u64) -> Value {
        json!({
            "id": id,
            "user": { "id": self.int_range(1, 40), "name": self.member_name() },
            "apply_date": self.date_in_month(REFERENCE_YEAR, Month::March),
            "amount": self.int_range(1, 50) * 1_000_000,
            "status": self.pick(&LOAN_STATUSES),
        })
    }

    /// Rows `first_id..first_id + count`.
    pub fn savings_rows(&mut self, first_id: u64, count: usize) -> Vec<Value> {
        (first_id..)
            .take(count)
            .map(|id| self.savings_row(id))
            .collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as u64;
        min + (self.rng.next_u64() % span) as i64
    }
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}
