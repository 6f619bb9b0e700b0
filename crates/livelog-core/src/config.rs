#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// DuckDB size string such as `"1GB"` or `"512MB"`.
    pub duckdb_memory_limit: String,
    /// IANA timezone given to the default site seeded at startup.
    pub default_timezone: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("LIVELOG_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("LIVELOG_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            duckdb_memory_limit: std::env::var("LIVELOG_DUCKDB_MEMORY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "1GB".to_string()),
            default_timezone: std::env::var("LIVELOG_DEFAULT_TIMEZONE")
                .ok()
                .filter(|v| v.parse::<chrono_tz::Tz>().is_ok())
                .unwrap_or_else(|| "UTC".to_string()),
        })
    }

    pub fn db_path(&self) -> String {
        format!("{}/livelog.db", self.data_dir)
    }
}
