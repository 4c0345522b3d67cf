//! Estado compartilhado entre os handlers

use std::sync::Arc;

use common_db::metricas::ConfigMetricas;
use sqlx::SqlitePool;

use crate::auth::ChavesJwt;

#[derive(Clone)]
pub struct Estado {
    pub pool: SqlitePool,
    pub jwt: Arc<ChavesJwt>,
    pub metricas: ConfigMetricas,
    /// Marca o cookie de sessão como `Secure`
    pub cookie_seguro: bool,
}

impl Estado {
    pub fn new(pool: SqlitePool, jwt: ChavesJwt, metricas: ConfigMetricas, cookie_seguro: bool) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            metricas,
            cookie_seguro,
        }
    }
}
