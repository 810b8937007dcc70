// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;

use crate::{DependentFetchSpec, FetchError, FetchToken, QueryParams, Schema, Values, display_json};

/// Resolved value of a dependent field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The readiness predicate is false; nothing was fetched.
    NotReady,
    /// The lookup ran but produced nothing usable (absent, null, or failed).
    Empty,
    Value(String),
}

impl Resolved {
    pub fn as_display(&self) -> &str {
        match self {
            Self::Value(value) => value,
            Self::NotReady | Self::Empty => "",
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value(value) => Some(value),
            Self::NotReady | Self::Empty => None,
        }
    }
}

/// A lookup the resolver wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentFetch {
    pub field: String,
    pub token: FetchToken,
    pub path: String,
    pub params: QueryParams,
}

#[derive(Debug, Clone)]
struct Slot {
    field: String,
    spec: DependentFetchSpec,
    latest: FetchToken,
    pending: bool,
    resolved: Resolved,
}

impl Slot {
    /// Re-evaluates readiness. Either way the issue token moves forward so a
    /// lookup still in flight can no longer land.
    fn evaluate(&mut self, values: &Values) -> Option<DependentFetch> {
        self.latest = self.latest.next();
        if !self.spec.is_ready.eval(values) {
            self.pending = false;
            self.resolved = Resolved::NotReady;
            return None;
        }

        self.pending = true;
        Some(DependentFetch {
            field: self.field.clone(),
            token: self.latest,
            path: self.spec.resource_path.clone(),
            params: self.spec.query_for(values),
        })
    }
}

/// Tracks every readonly field whose value is looked up from other fields.
///
/// Each slot registers its trigger keys; a change only re-evaluates the slots
/// that list the changed key.
#[derive(Debug, Clone, Default)]
pub struct DependentFieldResolver {
    slots: Vec<Slot>,
}

impl DependentFieldResolver {
    pub fn new(schema: &Schema) -> Self {
        let slots = schema
            .dependent_fields()
            .map(|(field, spec)| Slot {
                field: field.key.clone(),
                spec: spec.clone(),
                latest: FetchToken::default(),
                pending: false,
                resolved: Resolved::NotReady,
            })
            .collect();
        Self { slots }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Evaluates every dependent field, e.g. when a form session opens.
    pub fn refresh_all(&mut self, values: &Values) -> Vec<DependentFetch> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.evaluate(values))
            .collect()
    }

    /// Evaluates only the dependent fields triggered by `changed_key`.
    pub fn on_change(&mut self, changed_key: &str, values: &Values) -> Vec<DependentFetch> {
        self.slots
            .iter_mut()
            .filter(|slot| slot.spec.is_triggered_by(changed_key))
            .filter_map(|slot| slot.evaluate(values))
            .collect()
    }

    /// Supersedes every in-flight lookup and forgets resolved values.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.latest = slot.latest.next();
            slot.pending = false;
            slot.resolved = Resolved::NotReady;
        }
    }

    /// Applies a lookup result. Returns the new value, or `None` when the
    /// completion was superseded and discarded. Failures degrade to
    /// [`Resolved::Empty`] without surfacing an error.
    pub fn complete(
        &mut self,
        field: &str,
        token: FetchToken,
        result: Result<Value, FetchError>,
    ) -> Option<Resolved> {
        let slot = self.slots.iter_mut().find(|slot| slot.field == field)?;
        if token != slot.latest {
            tracing::debug!(
                target: "koperasi::resolver",
                field,
                token = %token,
                latest = %slot.latest,
                "discarding stale dependent value"
            );
            return None;
        }

        slot.pending = false;
        slot.resolved = match result {
            Ok(response) => response
                .get(&slot.spec.result_field)
                .and_then(display_json)
                .map_or(Resolved::Empty, Resolved::Value),
            Err(error) => {
                tracing::debug!(target: "koperasi::resolver", field, %error, "dependent lookup failed");
                Resolved::Empty
            }
        };
        Some(slot.resolved.clone())
    }

    /// `None` for fields without a dependent fetch.
    pub fn resolved(&self, field: &str) -> Option<&Resolved> {
        self.slots
            .iter()
            .find(|slot| slot.field == field)
            .map(|slot| &slot.resolved)
    }

    pub fn is_pending(&self, field: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.field == field && slot.pending)
    }
}
