use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::Store;
use crate::media::MediaStore;
use crate::services::{AuthService, ItemService, UserService};

/// Shared handles cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub items: ItemService,
    pub users: UserService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, media: Arc<dyn MediaStore>) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenService::new(&config.security));
        Self {
            auth: AuthService::new(store.clone(), tokens.clone()),
            items: ItemService::new(config.clone(), store.clone(), media.clone()),
            users: UserService::new(config.clone(), store, media),
            config,
            tokens,
        }
    }
}
