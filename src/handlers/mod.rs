/// HTTP handlers for the discussion API
///
/// Handlers stay thin: normalize query input, call a service, shape the
/// response. All validation and transactional logic lives in the services.
pub mod comments;
pub mod posts;

use crate::config::PaginationConfig;
use serde::Deserialize;

/// Raw list query parameters, shared by both index endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order_by: Option<String>,
    pub order_type: Option<String>,
    pub post_id: Option<i64>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self, config: &PaginationConfig) -> u32 {
        self.per_page
            .unwrap_or(config.default_per_page)
            .clamp(1, config.max_per_page)
    }
}
