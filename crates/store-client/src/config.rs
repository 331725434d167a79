/// Connection and bounding configuration for the time-series store adapter.
///
/// Mirrors the "store host/port/credentials/prefix/enabled" row of the
/// configuration table (§6); `position_history_cap`/`change_log_cap`
/// mirror "position/velocity history size" and "max velocity history size".
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Default `radar_sick`, per §4.3's key layout.
    pub namespace: String,
    /// Cap for `…:posN:history` / `…:velN:history` (default 1000).
    pub history_cap: usize,
    /// Cap for `…:velN:changes` and `…:velocity_changes` (default 100).
    pub change_log_cap: usize,
}

impl StoreConfig {
    #[must_use]
    pub fn redis_url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{password}@{}:{}", self.host, self.port),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_owned(),
            port: 6379,
            password: None,
            namespace: "radar_sick".to_owned(),
            history_cap: 1000,
            change_log_cap: 100,
        }
    }
}
