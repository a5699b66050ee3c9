use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::models::OrderStatus;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl Pagination {
    /// Returns `(page, per_page, offset)`; `per_page` is clamped to 1..=100.
    pub fn normalize(&self) -> (u64, u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CartQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// When given, the listing carries a shipping quote for this CEP.
    pub postal_code: Option<String>,
}

impl CartQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Exact status match.
    pub status: Option<OrderStatus>,
    /// By creation time, newest first unless `asc`.
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
        let big = Pagination {
            page: Some(3),
            per_page: Some(500),
        };
        assert_eq!(big.normalize(), (3, 100, 200));
        let zero = Pagination {
            page: Some(0),
            per_page: Some(0),
        };
        assert_eq!(zero.normalize(), (1, 1, 0));
    }
}
