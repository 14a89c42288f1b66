//! Common response types and helpers for API handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::PagedResult;
use crate::models::order::OrderView;

/// Paginated order listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
    pub total_count: i64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl From<PagedResult<OrderView>> for OrderListResponse {
    fn from(page: PagedResult<OrderView>) -> Self {
        Self {
            has_more: page.has_more(),
            total_count: page.total,
            page: page.page,
            limit: page.per_page,
            orders: page.items,
        }
    }
}

/// Response helper for created resources
pub struct Created<T>(pub T);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

/// Response helper for no content
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Pagination;

    #[test]
    fn test_order_list_reports_has_more() {
        let page = PagedResult::<OrderView>::new(Vec::new(), 45, &Pagination::new(2, 20));
        let response = OrderListResponse::from(page);
        assert!(response.has_more);
        assert_eq!(response.total_count, 45);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["totalCount"], 45);
        assert_eq!(json["hasMore"], true);
    }

    #[test]
    fn test_created_sets_status() {
        let response = Created(serde_json::json!({ "ok": true })).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(NoContent.into_response().status(), StatusCode::NO_CONTENT);
    }
}
