use std::sync::Arc;

use crate::{config::AppConfig, hub::Hub};

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Arc<AppConfig>,
}
