// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Field key to raw input value. An empty string is an empty value.
pub type Values = BTreeMap<String, String>;

/// Ordered query parameters as they go on the wire.
pub type QueryParams = Vec<(String, String)>;

/// Absent keys and whitespace-only values both count as empty.
pub fn value_is_empty(values: &Values, key: &str) -> bool {
    values.get(key).is_none_or(|value| value.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Date,
    Month,
    Number,
    Select,
    Hidden,
    File,
}

impl FieldKind {
    pub const ALL: [Self; 7] = [
        Self::Text,
        Self::Date,
        Self::Month,
        Self::Number,
        Self::Select,
        Self::Hidden,
        Self::File,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Month => "month",
            Self::Number => "number",
            Self::Select => "select",
            Self::Hidden => "hidden",
            Self::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "date" => Some(Self::Date),
            "month" => Some(Self::Month),
            "number" => Some(Self::Number),
            "select" => Some(Self::Select),
            "hidden" => Some(Self::Hidden),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// Kinds that hold a calendar value and take part in month-range expansion.
    pub const fn is_calendar(self) -> bool {
        matches!(self, Self::Date | Self::Month)
    }

    pub const fn is_rendered(self) -> bool {
        !matches!(self, Self::Hidden)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A predicate over the current values of a form or filter.
#[derive(Clone)]
pub struct ValuePredicate(Arc<dyn Fn(&Values) -> bool + Send + Sync>);

impl ValuePredicate {
    pub fn new(predicate: impl Fn(&Values) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn eval(&self, values: &Values) -> bool {
        (self.0)(values)
    }
}

impl fmt::Debug for ValuePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValuePredicate(..)")
    }
}

/// Describes how a readonly field's value is looked up from other fields.
#[derive(Debug, Clone)]
pub struct DependentFetchSpec {
    pub resource_path: String,
    pub trigger_keys: Vec<String>,
    pub result_field: String,
    pub is_ready: ValuePredicate,
}

impl DependentFetchSpec {
    pub fn new<I, S>(
        resource_path: impl Into<String>,
        trigger_keys: I,
        result_field: impl Into<String>,
        is_ready: impl Fn(&Values) -> bool + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_path: resource_path.into(),
            trigger_keys: trigger_keys.into_iter().map(Into::into).collect(),
            result_field: result_field.into(),
            is_ready: ValuePredicate::new(is_ready),
        }
    }

    pub fn is_triggered_by(&self, key: &str) -> bool {
        self.trigger_keys.iter().any(|trigger| trigger == key)
    }

    /// One parameter per trigger key, in trigger order. Keys missing from
    /// `values` are left out rather than sent empty.
    pub fn query_for(&self, values: &Values) -> QueryParams {
        self.trigger_keys
            .iter()
            .filter_map(|key| {
                values
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    pub options: Vec<SelectOption>,
    pub required: bool,
    pub required_if: Option<ValuePredicate>,
    pub readonly: bool,
    pub dependent_fetch: Option<DependentFetchSpec>,
    pub placeholder: Option<String>,
}

impl FieldSchema {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            options: Vec::new(),
            required: false,
            required_if: None,
            readonly: false,
            dependent_fetch: None,
            placeholder: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    pub fn date(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Date)
    }

    pub fn month(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Month)
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Number)
    }

    pub fn select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: impl IntoIterator<Item = SelectOption>,
    ) -> Self {
        let mut field = Self::new(key, label, FieldKind::Select);
        field.options = options.into_iter().collect();
        field
    }

    pub fn hidden(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(key.clone(), key, FieldKind::Hidden)
    }

    pub fn file(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::File)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn required_if(
        mut self,
        predicate: impl Fn(&Values) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.required_if = Some(ValuePredicate::new(predicate));
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn with_dependent_fetch(mut self, spec: DependentFetchSpec) -> Self {
        self.dependent_fetch = Some(spec);
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Conditional fields whose predicate is false are not part of the active
    /// field set: they are neither rendered nor validated.
    pub fn is_active(&self, values: &Values) -> bool {
        self.required_if
            .as_ref()
            .is_none_or(|predicate| predicate.eval(values))
    }

    pub fn is_required(&self, values: &Values) -> bool {
        self.required
            || self
                .required_if
                .as_ref()
                .is_some_and(|predicate| predicate.eval(values))
    }

    pub fn shows_required_marker(&self) -> bool {
        self.required || self.required_if.is_some()
    }

    pub fn option_label(&self, value: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.as_str())
    }
}

/// An ordered, validated set of field descriptors.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSchema>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if field.key.trim().is_empty() {
                bail!("field key must not be empty (label {:?})", field.label);
            }
            if !seen.insert(field.key.as_str()) {
                bail!(
                    "duplicate field key {:?} -- keys must be unique within a schema",
                    field.key
                );
            }
            if !field.options.is_empty() && field.kind != FieldKind::Select {
                bail!(
                    "field {:?} lists options but is a {} field",
                    field.key,
                    field.kind.as_str()
                );
            }
            if field.dependent_fetch.is_some() && !field.readonly {
                bail!(
                    "field {:?} has a dependent fetch but is not readonly -- mark it readonly",
                    field.key
                );
            }
        }

        for field in &fields {
            let Some(spec) = &field.dependent_fetch else {
                continue;
            };
            if spec.trigger_keys.is_empty() {
                bail!("field {:?} dependent fetch has no trigger keys", field.key);
            }
            if let Some(unknown) = spec
                .trigger_keys
                .iter()
                .find(|trigger| !seen.contains(trigger.as_str()))
            {
                bail!(
                    "field {:?} dependent fetch triggers on unknown field {:?}",
                    field.key,
                    unknown
                );
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn active_fields<'a>(
        &'a self,
        values: &'a Values,
    ) -> impl Iterator<Item = &'a FieldSchema> + 'a {
        self.fields.iter().filter(|field| field.is_active(values))
    }

    pub fn dependent_fields(&self) -> impl Iterator<Item = (&FieldSchema, &DependentFetchSpec)> {
        self.fields
            .iter()
            .filter_map(|field| field.dependent_fetch.as_ref().map(|spec| (field, spec)))
    }

    /// Every key mapped to an empty value.
    pub fn blank_values(&self) -> Values {
        self.fields
            .iter()
            .map(|field| (field.key.clone(), String::new()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{DependentFetchSpec, FieldKind, FieldSchema, Schema, SelectOption, Values};

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn field_kind_round_trips_through_str() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(FieldKind::parse("checkbox"), None);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let error = Schema::new(vec![
            FieldSchema::text("name", "Name"),
            FieldSchema::number("name", "Amount"),
        ])
        .expect_err("duplicate keys should fail");
        assert!(error.to_string().contains("duplicate field key"));
    }

    #[test]
    fn dependent_fetch_requires_readonly() {
        let error = Schema::new(vec![
            FieldSchema::number("value", "Value"),
            FieldSchema::number("share", "Share").with_dependent_fetch(DependentFetchSpec::new(
                "/api/share",
                ["value"],
                "share",
                |_| true,
            )),
        ])
        .expect_err("writable dependent field should fail");
        assert!(error.to_string().contains("not readonly"));
    }

    #[test]
    fn dependent_fetch_triggers_must_exist() {
        let error = Schema::new(vec![
            FieldSchema::number("share", "Share")
                .readonly()
                .with_dependent_fetch(DependentFetchSpec::new(
                    "/api/share",
                    ["missing"],
                    "share",
                    |_| true,
                )),
        ])
        .expect_err("unknown trigger should fail");
        assert!(error.to_string().contains("unknown field \"missing\""));
    }

    #[test]
    fn options_only_on_select_fields() {
        let mut field = FieldSchema::text("type", "Type");
        field.options = vec![SelectOption::new("a", "A")];
        assert!(Schema::new(vec![field]).is_err());
    }

    #[test]
    fn conditional_field_is_inactive_when_predicate_fails() {
        let field = FieldSchema::text("reason", "Reason")
            .required_if(|values| values.get("status").is_some_and(|status| status == "rejected"));

        assert!(!field.is_active(&values(&[("status", "approved")])));
        assert!(field.is_active(&values(&[("status", "rejected")])));
        assert!(field.is_required(&values(&[("status", "rejected")])));
        assert!(field.shows_required_marker());
    }

    #[test]
    fn query_for_skips_missing_trigger_values() {
        let spec = DependentFetchSpec::new("/api/x", ["id", "user_id", "value"], "out", |_| true);
        let params = spec.query_for(&values(&[("user_id", "7"), ("value", "")]));
        assert_eq!(
            params,
            vec![
                ("user_id".to_owned(), "7".to_owned()),
                ("value".to_owned(), String::new()),
            ]
        );
    }

    #[test]
    fn blank_values_cover_every_field() {
        let schema = Schema::new(vec![
            FieldSchema::hidden("id"),
            FieldSchema::text("name", "Name"),
        ])
        .expect("valid schema");
        let blank = schema.blank_values();
        assert_eq!(blank.len(), 2);
        assert!(blank.values().all(String::is_empty));
    }
}
