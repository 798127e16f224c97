//! Shared application state.
//!
//! Built once in `main` and cloned into every handler. Holds handles only;
//! order and table state lives in the store, connection state in the hub.

use std::sync::Arc;

use bistro_db::Database;
use bistro_hub::Hub;

use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::services::{OrderEngine, OutboundQueue};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub hub: Arc<Hub>,
    pub engine: OrderEngine,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Database, hub: Arc<Hub>, outbound: OutboundQueue) -> Self {
        let engine = OrderEngine::new(db.clone(), hub.clone(), config.rates(), outbound);
        let jwt = Arc::new(JwtManager::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_lifetime_secs,
        ));
        AppState {
            db,
            hub,
            engine,
            jwt,
        }
    }
}
