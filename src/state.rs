use crate::config::Config;
use crate::models::AppData;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub data: Arc<Mutex<AppData>>,
    pub csrf_token: Arc<str>,
    pub jwt_secret: Arc<str>,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(config: &Config, data: AppData) -> Self {
        Self {
            data_path: config.data_path.clone(),
            data: Arc::new(Mutex::new(data)),
            csrf_token: Arc::from(config.csrf_token.as_str()),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}
