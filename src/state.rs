use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AdminService, AuthService, SeaOrmAdminService, SeaOrmAuthService, token::TokenGenerator,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Config,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub admin_service: Arc<dyn AdminService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Ok(Self::with_store(config, store))
    }

    #[must_use]
    pub fn with_store(config: Config, store: Store) -> Self {
        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            config.session.clone(),
        )) as Arc<dyn AuthService>;

        Self::assemble(config, store, auth_service)
    }

    /// Like [`SharedState::with_store`] with a custom session token source.
    #[must_use]
    pub fn with_token_generator(
        config: Config,
        store: Store,
        tokens: Arc<dyn TokenGenerator>,
    ) -> Self {
        let auth_service = Arc::new(SeaOrmAuthService::with_token_generator(
            store.clone(),
            config.security.clone(),
            config.session.clone(),
            tokens,
        )) as Arc<dyn AuthService>;

        Self::assemble(config, store, auth_service)
    }

    fn assemble(config: Config, store: Store, auth_service: Arc<dyn AuthService>) -> Self {
        let admin_service = Arc::new(SeaOrmAdminService::new(
            store.clone(),
            auth_service.clone(),
        )) as Arc<dyn AdminService>;

        Self {
            config,
            store,
            auth_service,
            admin_service,
        }
    }
}
