use std::env;

use anyhow::Context;

const DEV_TOKEN_SECRET: &str = "change-me-to-a-random-32-char-string";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub sqlite_path: String,
    pub db_pool_size: u32,
    pub token_secret: String,
    pub token_previous_secrets: Vec<String>,
    pub upload_dir: String,
    pub upload_max_size: usize,
    pub thumb_max_side: u32,
    pub cors_origin: String,
    pub admin_name: Option<String>,
    pub admin_password: Option<String>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let token_secret = env::var("TOKEN_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEV_TOKEN_SECRET.to_string());

        Ok(Self {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            sqlite_path: env::var("SQLITE_PATH")
                .unwrap_or_else(|_| "./data/stockroom.db".to_string()),
            db_pool_size: env::var("DB_POOL_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DB_POOL_SIZE must be a positive integer")?,
            token_secret,
            token_previous_secrets: env::var("TOKEN_PREVIOUS_SECRETS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            upload_max_size: env::var("UPLOAD_MAX_SIZE")
                .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
                .parse()
                .context("UPLOAD_MAX_SIZE must be a byte count")?,
            thumb_max_side: env::var("THUMB_MAX_SIDE")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .context("THUMB_MAX_SIDE must be a pixel count")?,
            cors_origin: env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            admin_name: env::var("ADMIN_NAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn uses_dev_token_secret(&self) -> bool {
        self.token_secret == DEV_TOKEN_SECRET
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
impl Config {
    /// Config pointing at throwaway paths, used by router tests.
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            server_port: 0,
            sqlite_path: root.join("stockroom.db").to_string_lossy().into_owned(),
            db_pool_size: 4,
            token_secret: "test-secret".to_string(),
            token_previous_secrets: Vec::new(),
            upload_dir: root.join("uploads").to_string_lossy().into_owned(),
            upload_max_size: 64 * 1024,
            thumb_max_side: 200,
            cors_origin: "*".to_string(),
            admin_name: Some("admin".to_string()),
            admin_password: Some("admin-pass".to_string()),
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split_list;

    #[test]
    fn split_list_drops_blank_entries() {
        assert_eq!(split_list(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
        assert!(split_list("").is_empty());
    }
}
