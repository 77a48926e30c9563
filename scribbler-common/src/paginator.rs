use serde::Serialize;
use std::num::NonZeroU64;

pub const POSTS_PER_PAGE: NonZeroU64 = NonZeroU64::new(10).unwrap();

/// Splits `count` items into pages of `per_page`. There is always at least
/// one page, even when there are no items.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    count: u64,
    per_page: NonZeroU64,
}

/// The slice of a listing that makes up one page.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageWindow {
    pub number: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Paginator {
    #[must_use]
    pub fn new(count: u64, per_page: NonZeroU64) -> Self {
        Self { count, per_page }
    }

    #[must_use]
    pub fn num_pages(self) -> u64 {
        self.count.div_ceil(self.per_page.get()).max(1)
    }

    /// Resolves a raw `?page=` value leniently: anything that is not an
    /// integer selects the first page, an integer out of range the last.
    /// Integers of any magnitude count, even beyond `u64`.
    #[must_use]
    pub fn page_number(self, raw: Option<&str>) -> u64 {
        let Some(raw) = raw.map(str::trim) else {
            return 1;
        };

        let (negative, digits) = match raw.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return 1;
        }

        match digits.parse::<u64>() {
            Ok(number) if !negative && (1..=self.num_pages()).contains(&number) => number,
            _ => self.num_pages(),
        }
    }

    #[must_use]
    pub fn window(self, raw: Option<&str>) -> PageWindow {
        let number = self.page_number(raw);

        PageWindow {
            number,
            offset: (number - 1) * self.per_page.get(),
            limit: self.per_page.get(),
        }
    }

    #[must_use]
    pub fn page<T>(self, window: PageWindow, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number: window.number,
            num_pages: self.num_pages(),
            count: self.count,
            per_page: self.per_page.get(),
            has_previous: window.number > 1,
            has_next: window.number < self.num_pages(),
        }
    }
}
