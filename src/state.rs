use std::sync::Arc;

use crate::{
    config::AppConfig, db::DbPool, postal::PostalDirectory,
    services::checkout_service::CheckoutSessions, store::CommerceStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: DbPool,
    pub store: Arc<dyn CommerceStore>,
    pub postal: Arc<dyn PostalDirectory>,
    pub sessions: CheckoutSessions,
}
