//! Page-size normalisation and page resolution.

use crate::constants::{DEFAULT_PER_PAGE, PER_PAGE_CHOICES};
use crate::query::Window;

/// Row count per page from the raw `per_page` parameter.
///
/// Values in [`PER_PAGE_CHOICES`] are honoured exactly; anything else, including non-numeric
/// input and a missing parameter, yields [`DEFAULT_PER_PAGE`].
pub fn per_page_from_param(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| PER_PAGE_CHOICES.contains(n))
        .unwrap_or(DEFAULT_PER_PAGE)
}

/// A resolved page of a result set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub per_page: usize,
    pub num_pages: usize,
    pub total_count: usize,
}

impl Page {
    /// Resolves the requested page against `total_count` rows.
    ///
    /// A non-integer page falls back to the first page and a page past the end falls back to
    /// the last one. An empty result still has one (empty) page.
    pub fn resolve(total_count: usize, per_page: usize, requested: Option<&str>) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total_count.div_ceil(per_page).max(1);
        let number = requested
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n >= 1)
            .map(|n| n.min(num_pages))
            .unwrap_or(1);

        Self {
            number,
            per_page,
            num_pages,
            total_count,
        }
    }

    pub fn window(&self) -> Window {
        Window {
            limit: self.per_page,
            offset: (self.number - 1) * self.per_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_per_page_values_are_honoured() {
        for n in PER_PAGE_CHOICES {
            assert_eq!(per_page_from_param(Some(&n.to_string())), n);
        }
    }

    #[test]
    fn other_per_page_values_fall_back_to_default() {
        for raw in ["7", "0", "-5", "abc", "", "20.0", "1000"] {
            assert_eq!(per_page_from_param(Some(raw)), DEFAULT_PER_PAGE, "{raw}");
        }
        assert_eq!(per_page_from_param(None), DEFAULT_PER_PAGE);
    }

    #[test]
    fn page_resolution_clamps_and_defaults() {
        let page = Page::resolve(45, 20, Some("2"));
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.window(), Window { limit: 20, offset: 20 });
        assert!(page.has_next() && page.has_previous());

        assert_eq!(Page::resolve(45, 20, Some("99")).number, 3);
        assert_eq!(Page::resolve(45, 20, Some("x")).number, 1);
        assert_eq!(Page::resolve(45, 20, Some("0")).number, 1);
    }

    #[test]
    fn empty_result_has_one_page() {
        let page = Page::resolve(0, 20, None);
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.number, 1);
        assert!(!page.has_next());
    }
}
