//! Run configuration: provider credentials and derived identities.

use std::path::PathBuf;

/// Default User-Agent presented to providers that reject unknown clients.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Default number of attempts per provider request.
pub const DEFAULT_RETRIES: u32 = 3;

/// Immutable credentials and connection settings for one run.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub server: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub retries: u32,
}

impl Credentials {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        Self {
            server: server.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retries: DEFAULT_RETRIES,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base URL with an `http://` scheme prepended when the server was given
    /// as a bare host.
    pub fn base_url(&self) -> String {
        if self.server.starts_with("http://") || self.server.starts_with("https://") {
            self.server.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.server.trim_end_matches('/'))
        }
    }

    /// Filesystem-safe server identity: scheme stripped, `/` replaced by `_`.
    /// Used for cache record names and the per-server snapshot directory.
    pub fn server_key(&self) -> String {
        self.host_part().replace('/', "_")
    }

    /// Live stream URL for a channel, per the provider convention
    /// `<base>/live/<user>/<password>/<stream_id>.<ext>`.
    pub fn live_stream_url(&self, stream_id: i64, extension: Option<&str>) -> String {
        format!(
            "{}/live/{}/{}/{}.{}",
            self.base_url(),
            self.username,
            self.password,
            stream_id,
            extension.unwrap_or("ts")
        )
    }

    /// Server name with its first DNS label hidden, for console banners.
    pub fn masked_server(&self) -> String {
        match self.host_part().split_once('.') {
            Some((_, rest)) => format!("xxxxx.{rest}"),
            None => "xxxxx".to_string(),
        }
    }

    fn host_part(&self) -> &str {
        let stripped = self
            .server
            .strip_prefix("http://")
            .or_else(|| self.server.strip_prefix("https://"))
            .unwrap_or(&self.server);
        stripped.trim_end_matches('/')
    }
}

/// Default directory for listing cache records.
pub fn default_cache_dir() -> PathBuf {
    let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("xtream-scout");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_prepends_scheme() {
        let creds = Credentials::new("tv.example.com", "u", "p");
        assert_eq!(creds.base_url(), "http://tv.example.com");

        let creds = Credentials::new("https://tv.example.com/", "u", "p");
        assert_eq!(creds.base_url(), "https://tv.example.com");
    }

    #[test]
    fn server_key_is_filesystem_safe() {
        let creds = Credentials::new("http://tv.example.com:8080/path", "u", "p");
        assert_eq!(creds.server_key(), "tv.example.com:8080_path");
    }

    #[test]
    fn live_stream_url_follows_convention() {
        let creds = Credentials::new("tv.example.com", "alice", "s3cret");
        assert_eq!(
            creds.live_stream_url(414142, None),
            "http://tv.example.com/live/alice/s3cret/414142.ts"
        );
        assert_eq!(
            creds.live_stream_url(7, Some("m3u8")),
            "http://tv.example.com/live/alice/s3cret/7.m3u8"
        );
    }

    #[test]
    fn masked_server_hides_first_label() {
        let creds = Credentials::new("http://tv.example.com", "u", "p");
        assert_eq!(creds.masked_server(), "xxxxx.example.com");

        let creds = Credentials::new("localhost", "u", "p");
        assert_eq!(creds.masked_server(), "xxxxx");
    }
}
