//! Page-number pagination shared by the ledger list queries.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A requested page. Out-of-range input is clamped by [`PageRequest::new`],
/// never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl PageRequest {
  /// `page < 1` becomes 1; `page_size` outside `1..=100` becomes 10.
  pub fn new(page: i64, page_size: i64) -> Self {
    let page = if page < 1 { 1 } else { page.min(u32::MAX as i64) as u32 };
    let page_size = if (1..=MAX_PAGE_SIZE as i64).contains(&page_size) {
      page_size as u32
    } else {
      DEFAULT_PAGE_SIZE
    };
    Self { page, page_size }
  }

  pub fn offset(&self) -> u64 { (self.page as u64 - 1) * self.page_size as u64 }

  pub fn limit(&self) -> u64 { self.page_size as u64 }
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

/// One page of results plus the unpaginated total.
///
/// `total` and `items` come from separate reads; under concurrent writes they
/// can disagree by the number of rows written in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paged<T> {
  pub items:       Vec<T>,
  pub total:       u64,
  pub page:        u32,
  pub page_size:   u32,
  pub total_pages: u64,
}

impl<T> Paged<T> {
  pub fn new(items: Vec<T>, total: u64, req: PageRequest) -> Self {
    let total_pages = total.div_ceil(req.page_size as u64);
    Self { items, total, page: req.page, page_size: req.page_size, total_pages }
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
    Paged {
      items:       self.items.into_iter().map(f).collect(),
      total:       self.total,
      page:        self.page,
      page_size:   self.page_size,
      total_pages: self.total_pages,
    }
  }
}
