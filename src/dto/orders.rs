use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResult {
    pub order_id: Uuid,
    /// Cart items deleted by this call; items already gone are not listed.
    pub removed: Vec<Uuid>,
}
