// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::macros::format_description;
use time::Date;

use crate::{QueryParams, Schema, Values, parse_month, value_is_empty};

pub const DEFAULT_MONTH_START_PARAM: &str = "start_date";
pub const DEFAULT_MONTH_END_PARAM: &str = "end_date";

/// Query parameter names a `YYYY-MM` filter expands into. Endpoints disagree
/// (`start_date`/`end_date` vs `date_start`/`date_end`), so callers pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRangeParams {
    pub start: String,
    pub end: String,
}

impl MonthRangeParams {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl Default for MonthRangeParams {
    fn default() -> Self {
        Self::new(DEFAULT_MONTH_START_PARAM, DEFAULT_MONTH_END_PARAM)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateFilterValue {
    /// Inclusive first and last day of a `YYYY-MM` month.
    MonthRange { start: Date, end: Date },
    /// Anything else, passed through untouched.
    Exact(String),
}

impl DateFilterValue {
    pub fn formatted_range(&self) -> Option<(String, String)> {
        match self {
            Self::MonthRange { start, end } => Some((format_day(*start), format_day(*end))),
            Self::Exact(_) => None,
        }
    }
}

/// Expands a `YYYY-MM` value into its month range. Full dates and values that
/// are not a valid year-month are returned as-is.
pub fn expand_month(value: &str) -> DateFilterValue {
    match parse_month(value) {
        Ok((year, month)) => {
            let last_day = month.length(year);
            match (
                Date::from_calendar_date(year, month, 1),
                Date::from_calendar_date(year, month, last_day),
            ) {
                (Ok(start), Ok(end)) => DateFilterValue::MonthRange { start, end },
                _ => DateFilterValue::Exact(value.to_owned()),
            }
        }
        Err(_) => DateFilterValue::Exact(value.to_owned()),
    }
}

fn format_day(date: Date) -> String {
    date.format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// Draft and applied filter values for one screen.
///
/// Input edits only touch the draft; the applied set changes on apply or
/// reset and is the only state that drives a fetch.
#[derive(Debug, Clone)]
pub struct FilterController {
    schema: Schema,
    draft: Values,
    applied: Values,
    month_params: MonthRangeParams,
}

impl FilterController {
    /// A schema may hold at most one calendar filter: every calendar field
    /// expands into the same start/end parameter pair.
    pub fn new(schema: Schema, initial: &Values) -> Result<Self> {
        let calendar: Vec<&str> = schema
            .fields()
            .iter()
            .filter(|field| field.kind.is_calendar())
            .map(|field| field.key.as_str())
            .collect();
        if calendar.len() > 1 {
            bail!(
                "filters {calendar:?} would all expand into the same month range -- keep one date or month filter"
            );
        }

        let applied = overlay_known(&schema, initial);
        Ok(Self {
            draft: applied.clone(),
            applied,
            schema,
            month_params: MonthRangeParams::default(),
        })
    }

    pub fn with_month_params(mut self, month_params: MonthRangeParams) -> Self {
        self.month_params = month_params;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn draft(&self) -> &Values {
        &self.draft
    }

    pub fn applied(&self) -> &Values {
        &self.applied
    }

    pub fn month_params(&self) -> &MonthRangeParams {
        &self.month_params
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.applied
    }

    pub fn update_draft(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if self.schema.field(key).is_none() {
            bail!("unknown filter {key:?} -- filters are limited to the screen's filter schema");
        }
        self.draft.insert(key.to_owned(), value.into());
        Ok(())
    }

    /// Commits `candidate` as the applied set and re-syncs the draft to it.
    /// Keys outside the schema are dropped.
    pub fn apply_filter(&mut self, candidate: &Values) -> Values {
        self.applied = overlay_known(&self.schema, candidate);
        self.draft = self.applied.clone();
        tracing::debug!(
            target: "koperasi::filter",
            active = self.active_count(),
            "filter applied"
        );
        self.applied.clone()
    }

    pub fn apply_draft(&mut self) -> Values {
        let draft = self.draft.clone();
        self.apply_filter(&draft)
    }

    pub fn reset_filter(&mut self) -> Values {
        self.applied = self.schema.blank_values();
        self.draft = self.applied.clone();
        tracing::debug!(target: "koperasi::filter", "filter reset");
        self.applied.clone()
    }

    fn active_count(&self) -> usize {
        self.applied
            .keys()
            .filter(|key| !value_is_empty(&self.applied, key))
            .count()
    }

    /// Query parameters for the applied set, in schema order. Empty values are
    /// omitted and calendar filters holding `YYYY-MM` expand into a range.
    pub fn query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        for field in self.schema.fields() {
            if value_is_empty(&self.applied, &field.key) {
                continue;
            }
            let Some(value) = self.applied.get(&field.key) else {
                continue;
            };

            if field.kind.is_calendar()
                && let Some((start, end)) = expand_month(value).formatted_range()
            {
                params.push((self.month_params.start.clone(), start));
                params.push((self.month_params.end.clone(), end));
                continue;
            }
            params.push((field.key.clone(), value.clone()));
        }
        params
    }
}

fn overlay_known(schema: &Schema, values: &Values) -> Values {
    let mut merged = schema.blank_values();
    for (key, value) in values {
        if let Some(slot) = merged.get_mut(key) {
            slot.clone_from(value);
        } else {
            tracing::debug!(target: "koperasi::filter", key = %key, "dropping unknown filter key");
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{DateFilterValue, FilterController, MonthRangeParams, expand_month};
    use crate::{FieldSchema, Schema, SelectOption, Values};
    use anyhow::Result;
    use time::{Date, Month};

    fn schema() -> Schema {
        Schema::new(vec![
            FieldSchema::month("date", "Bulan"),
            FieldSchema::select(
                "type",
                "Jenis Simpanan",
                [
                    SelectOption::new("wajib", "Simpanan Wajib"),
                    SelectOption::new("pokok", "Simpanan Pokok"),
                ],
            ),
            FieldSchema::text("name", "Nama"),
        ])
        .expect("valid filter schema")
    }

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn leap_february_expands_to_29th() -> Result<()> {
        let expanded = expand_month("2024-02");
        assert_eq!(
            expanded,
            DateFilterValue::MonthRange {
                start: Date::from_calendar_date(2024, Month::February, 1)?,
                end: Date::from_calendar_date(2024, Month::February, 29)?,
            }
        );
        assert_eq!(
            expanded.formatted_range(),
            Some(("2024-02-01".to_owned(), "2024-02-29".to_owned()))
        );
        Ok(())
    }

    #[test]
    fn expansion_is_idempotent_and_full_dates_pass_through() {
        assert_eq!(expand_month("2023-11"), expand_month("2023-11"));
        assert_eq!(
            expand_month("2024-03-10"),
            DateFilterValue::Exact("2024-03-10".to_owned())
        );
        assert_eq!(
            expand_month("2024-13"),
            DateFilterValue::Exact("2024-13".to_owned())
        );
        assert_eq!(
            expand_month("24-01"),
            DateFilterValue::Exact("24-01".to_owned())
        );
    }

    #[test]
    fn draft_edits_do_not_touch_applied_values() -> Result<()> {
        let mut filter = FilterController::new(schema(), &values(&[("type", "wajib")]))?;
        filter.update_draft("type", "pokok")?;

        assert_eq!(filter.applied().get("type").map(String::as_str), Some("wajib"));
        assert_eq!(filter.draft().get("type").map(String::as_str), Some("pokok"));
        assert!(filter.is_dirty());
        assert_eq!(filter.query_params(), params(&[("type", "wajib")]));
        Ok(())
    }

    #[test]
    fn unknown_draft_key_is_rejected() -> Result<()> {
        let mut filter = FilterController::new(schema(), &Values::new())?;
        let error = filter
            .update_draft("bulan", "2024-01")
            .expect_err("unknown key should fail");
        assert!(error.to_string().contains("unknown filter"));
        Ok(())
    }

    #[test]
    fn apply_draft_commits_and_resyncs() -> Result<()> {
        let mut filter = FilterController::new(schema(), &Values::new())?;
        filter.update_draft("date", "2024-02")?;
        let applied = filter.apply_draft();

        assert_eq!(applied.get("date").map(String::as_str), Some("2024-02"));
        assert!(!filter.is_dirty());
        assert_eq!(
            filter.query_params(),
            params(&[("start_date", "2024-02-01"), ("end_date", "2024-02-29")])
        );
        Ok(())
    }

    #[test]
    fn month_param_names_are_configurable() -> Result<()> {
        let mut filter = FilterController::new(schema(), &Values::new())?
            .with_month_params(MonthRangeParams::new("date_start", "date_end"));
        filter.apply_filter(&values(&[("date", "2023-04"), ("name", "sari")]));
        assert_eq!(
            filter.query_params(),
            params(&[
                ("date_start", "2023-04-01"),
                ("date_end", "2023-04-30"),
                ("name", "sari"),
            ])
        );
        Ok(())
    }

    #[test]
    fn full_date_filter_is_sent_under_its_own_key() -> Result<()> {
        let schema = Schema::new(vec![FieldSchema::date("tanggal", "Tanggal")])?;
        let mut filter = FilterController::new(schema, &Values::new())?;
        filter.apply_filter(&values(&[("tanggal", "2024-03-10")]));
        assert_eq!(filter.query_params(), params(&[("tanggal", "2024-03-10")]));
        Ok(())
    }

    #[test]
    fn two_calendar_filters_are_rejected() -> Result<()> {
        let schema = Schema::new(vec![
            FieldSchema::month("date", "Bulan"),
            FieldSchema::date("settlement_date", "Tanggal Pelunasan"),
        ])?;
        let error = FilterController::new(schema, &Values::new())
            .expect_err("two calendar filters share one range");
        assert!(error.to_string().contains("same month range"));
        Ok(())
    }

    #[test]
    fn reset_empties_every_field() -> Result<()> {
        let mut filter =
            FilterController::new(schema(), &values(&[("date", "2024-01"), ("type", "wajib")]))?;
        let applied = filter.reset_filter();
        assert_eq!(applied.len(), 3);
        assert!(applied.values().all(String::is_empty));
        assert!(filter.query_params().is_empty());
        Ok(())
    }

    #[test]
    fn unknown_initial_keys_are_dropped() -> Result<()> {
        let filter = FilterController::new(schema(), &values(&[("bulan", "2024-01")]))?;
        assert!(!filter.applied().contains_key("bulan"));
        Ok(())
    }
}
