// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde_json::Value;

use crate::{
    FetchError, ListResponse, ListToken, Notifier, PageToken, QueryParams, page_range, step_page,
};

pub const DEFAULT_PAGE_SIZES: [u32; 5] = [5, 10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub const PAGE_PARAM: &str = "page";
pub const PAGE_SIZE_PARAM: &str = "limit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub last_page: u32,
}

impl PageState {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            last_page: 1,
        }
    }

    /// `max(1, ceil(total / page_size))`.
    pub fn last_page_for(total: u64, page_size: u32) -> u32 {
        let pages = total.div_ceil(u64::from(page_size.max(1)));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// 1-based indexes of the first and last visible rows, or `None` when the
    /// list is empty.
    pub fn visible_span(&self) -> Option<(u64, u64)> {
        if self.total == 0 {
            return None;
        }
        let size = u64::from(self.page_size);
        let from = u64::from(self.page.saturating_sub(1)) * size + 1;
        let to = (u64::from(self.page) * size).min(self.total);
        (from <= to).then_some((from, to))
    }

    pub fn summary_line(&self) -> String {
        match self.visible_span() {
            Some((from, to)) => format!("showing {from} to {to} of {} results", self.total),
            None => "no results".to_owned(),
        }
    }

    pub fn page_range(&self) -> Vec<PageToken> {
        page_range(self.page, self.last_page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Idle,
    Loading,
}

/// One issued list fetch. Only the most recently issued token may change the
/// controller's state when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub token: ListToken,
    pub page: u32,
    pub page_size: u32,
    pub params: QueryParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Applied(PageState),
    Failed(String),
    Stale,
}

/// Page, page size, rows and server paging metadata for one listing.
#[derive(Debug, Clone)]
pub struct PaginatedListController<T> {
    state: PageState,
    rows: Vec<T>,
    summary: Option<Value>,
    page_sizes: Vec<u32>,
    requested_page: u32,
    requested_size: u32,
    filter_params: QueryParams,
    latest: ListToken,
    in_flight: Option<ListToken>,
    load_failed_message: String,
}

impl<T> PaginatedListController<T> {
    pub fn new(page_size: u32, page_sizes: &[u32]) -> Result<Self> {
        let page_sizes = if page_sizes.is_empty() {
            DEFAULT_PAGE_SIZES.to_vec()
        } else {
            page_sizes.to_vec()
        };
        if page_sizes.contains(&0) {
            bail!("page sizes must be positive, got {page_sizes:?}");
        }
        if !page_sizes.contains(&page_size) {
            bail!("default page size {page_size} is not one of the allowed sizes {page_sizes:?}");
        }

        Ok(Self {
            state: PageState::new(page_size),
            rows: Vec::new(),
            summary: None,
            page_sizes,
            requested_page: 1,
            requested_size: page_size,
            filter_params: QueryParams::new(),
            latest: ListToken::default(),
            in_flight: None,
            load_failed_message: "failed to load data".to_owned(),
        })
    }

    pub fn with_load_failed_message(mut self, message: impl Into<String>) -> Self {
        self.load_failed_message = message.into();
        self
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn summary(&self) -> Option<&Value> {
        self.summary.as_ref()
    }

    pub fn page_sizes(&self) -> &[u32] {
        &self.page_sizes
    }

    pub fn status(&self) -> ListStatus {
        if self.in_flight.is_some() {
            ListStatus::Loading
        } else {
            ListStatus::Idle
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status() == ListStatus::Loading
    }

    /// Issues a fetch for `page` with the current page size. The page is not
    /// clamped here: the server clamps and the response is authoritative.
    pub fn load(&mut self, page: u32, page_size: u32, filter_params: QueryParams) -> PageRequest {
        self.requested_page = page.max(1);
        self.requested_size = page_size.max(1);
        self.filter_params = filter_params;
        self.issue()
    }

    /// Re-issues the last request with new filter parameters at page 1.
    pub fn reset_with_filter(&mut self, filter_params: QueryParams) -> PageRequest {
        self.load(1, self.requested_size, filter_params)
    }

    pub fn reload(&mut self) -> PageRequest {
        self.issue()
    }

    pub fn on_page_change(&mut self, page: u32) -> PageRequest {
        self.requested_page = page.max(1);
        self.issue()
    }

    /// A new page size invalidates the old page index, so paging restarts at 1.
    pub fn on_page_size_change(&mut self, page_size: u32) -> Result<PageRequest> {
        if !self.page_sizes.contains(&page_size) {
            bail!(
                "unsupported page size {page_size}; choose one of {:?}",
                self.page_sizes
            );
        }
        self.requested_size = page_size;
        self.requested_page = 1;
        Ok(self.issue())
    }

    pub fn next_page(&mut self) -> PageRequest {
        self.on_page_change(step_page(self.state.page, self.state.last_page, 1))
    }

    pub fn prev_page(&mut self) -> PageRequest {
        self.on_page_change(step_page(self.state.page, self.state.last_page, -1))
    }

    fn issue(&mut self) -> PageRequest {
        self.latest = self.latest.next();
        self.in_flight = Some(self.latest);

        let mut params = vec![
            (PAGE_PARAM.to_owned(), self.requested_page.to_string()),
            (PAGE_SIZE_PARAM.to_owned(), self.requested_size.to_string()),
        ];
        params.extend(self.filter_params.iter().cloned());

        tracing::debug!(
            target: "koperasi::list",
            token = %self.latest,
            page = self.requested_page,
            page_size = self.requested_size,
            "list load issued"
        );

        PageRequest {
            token: self.latest,
            page: self.requested_page,
            page_size: self.requested_size,
            params,
        }
    }

    /// Applies a completed fetch. Completions for anything but the latest
    /// issued token are discarded, whether they succeeded or failed.
    pub fn complete(
        &mut self,
        token: ListToken,
        result: Result<ListResponse<T>, FetchError>,
        notifier: &dyn Notifier,
    ) -> ListOutcome {
        if token != self.latest {
            tracing::debug!(
                target: "koperasi::list",
                token = %token,
                latest = %self.latest,
                "discarding stale list response"
            );
            return ListOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(response) => {
                self.adopt(response);
                ListOutcome::Applied(self.state)
            }
            Err(error) => {
                tracing::warn!(target: "koperasi::list", token = %token, %error, "list load failed");
                // Later requests page from what is on screen, not from what failed.
                self.requested_page = self.state.page;
                self.requested_size = self.state.page_size;
                notifier.notify_error(&self.load_failed_message);
                ListOutcome::Failed(self.load_failed_message.clone())
            }
        }
    }

    /// Without a reported `total` the row count so far is a lower bound, and
    /// the server's page stands unless it also reports a `last_page`.
    fn adopt(&mut self, response: ListResponse<T>) {
        let page_size = response
            .per_page
            .filter(|size| *size > 0)
            .unwrap_or(self.requested_size);
        let reported_page = response.current_page.unwrap_or(self.requested_page).max(1);
        let (total, last_page) = match response.total {
            Some(total) => (
                total,
                response
                    .last_page
                    .unwrap_or_else(|| PageState::last_page_for(total, page_size)),
            ),
            None => {
                let seen = u64::from(reported_page - 1) * u64::from(page_size)
                    + response.data.len() as u64;
                (seen, response.last_page.unwrap_or(reported_page))
            }
        };
        let last_page = last_page.max(1);
        let page = reported_page.clamp(1, last_page);

        self.state = PageState {
            page,
            page_size,
            total,
            last_page,
        };
        self.requested_page = page;
        self.requested_size = page_size;
        self.rows = response.data;
        self.summary = response.summary;
    }
}
