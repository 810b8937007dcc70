// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

/// Lists with at most this many pages render every page link.
const FULL_RANGE_LIMIT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Page(u32),
    Ellipsis,
}

impl PageToken {
    pub const fn page(self) -> Option<u32> {
        match self {
            Self::Page(page) => Some(page),
            Self::Ellipsis => None,
        }
    }

    pub const fn is_selectable(self) -> bool {
        matches!(self, Self::Page(_))
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(page) => write!(f, "{page}"),
            Self::Ellipsis => f.write_str("..."),
        }
    }
}

/// Page links to render for `current_page` out of `last_page`.
///
/// Inputs outside `1 <= current_page <= last_page` are clamped first, so the
/// result always starts at page 1 and ends at the last page.
pub fn page_range(current_page: u32, last_page: u32) -> Vec<PageToken> {
    use PageToken::{Ellipsis, Page};

    let last = last_page.max(1);
    let current = current_page.clamp(1, last);

    if last <= FULL_RANGE_LIMIT {
        return (1..=last).map(Page).collect();
    }

    if current <= 3 {
        vec![Page(1), Page(2), Page(3), Page(4), Page(5), Ellipsis, Page(last)]
    } else if current >= last - 2 {
        vec![
            Page(1),
            Ellipsis,
            Page(last - 4),
            Page(last - 3),
            Page(last - 2),
            Page(last - 1),
            Page(last),
        ]
    } else {
        vec![
            Page(1),
            Ellipsis,
            Page(current - 1),
            Page(current),
            Page(current + 1),
            Ellipsis,
            Page(last),
        ]
    }
}

/// Previous/next navigation: moves by `delta` and clamps into `[1, last_page]`.
pub fn step_page(current_page: u32, last_page: u32, delta: i64) -> u32 {
    let last = i64::from(last_page.max(1));
    let next = (i64::from(current_page) + delta).clamp(1, last);
    u32::try_from(next).unwrap_or(1)
}
