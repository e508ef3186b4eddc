//! axum handlers, one module per resource.

pub mod friends;
pub mod groups;
pub mod internal;
pub mod posts;
pub mod users;

use axum::Json;
use plaza_core::page::PageRequest;
use serde::Deserialize;
use serde_json::{Value, json};

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

/// `?page=&page_size=` on list endpoints. Out-of-range values are clamped.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<i64>,
  pub page_size: Option<i64>,
}

impl PageParams {
  pub fn request(&self) -> PageRequest {
    PageRequest::new(self.page.unwrap_or(1), self.page_size.unwrap_or(0))
  }
}
