/// Loads `.env` into the process environment; missing files are fine.
pub fn init() {
    let _ = dotenvy::dotenv();
}

/// Reads an environment variable with a fallback default.
pub fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
