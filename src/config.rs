use rand::RngCore;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ADMIN_USER: &str = "admin";

/// Startup settings, read from the environment (and `.env` when `main` loads one).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub csrf_token: String,
    /// HS256 key for session tokens. A generated one ends every session on restart.
    pub jwt_secret: String,
    /// Owner account created when the store has no users.
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let csrf_token = non_blank("APP_CSRF_TOKEN").unwrap_or_else(random_token);
        let jwt_secret = non_blank("APP_JWT_SECRET").unwrap_or_else(random_token);
        let admin_username = non_blank("APP_ADMIN_USER").unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string());
        let bcrypt_cost = env::var("APP_BCRYPT_COST")
            .ok()
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|cost| (4..=31).contains(cost))
            .unwrap_or(bcrypt::DEFAULT_COST);

        Self {
            port,
            data_path: crate::storage::resolve_data_path(),
            csrf_token,
            jwt_secret,
            admin_username,
            admin_password: non_blank("APP_ADMIN_PASSWORD"),
            bcrypt_cost,
        }
    }
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 32 random bytes, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_are_hex_and_distinct() {
        let first = random_token();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, random_token());
    }
}
