//! Timestamped snapshot archival with credential masking and retention
//! pruning.
//!
//! Layout: `<savedir>/<server_key>/<timestamp>/<artifact>`. The timestamp
//! format sorts chronologically, so pruning can order snapshots by name.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Credentials;

pub const MASKED_USERNAME: &str = "XXXXX";
pub const MASKED_PASSWORD: &str = "YYYYY";
pub const MASKED_HOST: &str = "UUUUU";

/// Snapshot directory name, local time, second resolution.
const TIMESTAMP_FORMAT: &str = "%y-%m-%d--%H-%M-%S";

/// Credential scrubbing applied uniformly to every persisted artifact.
#[derive(Debug, Clone)]
pub struct Masker {
    username: String,
    password: String,
    host: String,
}

impl Masker {
    pub fn new(creds: &Credentials) -> Self {
        let host = creds
            .server
            .strip_prefix("http://")
            .or_else(|| creds.server.strip_prefix("https://"))
            .unwrap_or(&creds.server)
            .split('/')
            .next()
            .unwrap_or("")
            .to_string();

        Self {
            username: creds.username.clone(),
            password: creds.password.clone(),
            host,
        }
    }

    /// Replace credential and server-identity literals anywhere in `content`.
    pub fn mask_text(&self, content: &str) -> String {
        let mut masked = content.to_string();
        if !self.username.is_empty() {
            masked = masked.replace(&self.username, MASKED_USERNAME);
        }
        if !self.password.is_empty() {
            masked = masked.replace(&self.password, MASKED_PASSWORD);
        }
        if !self.host.is_empty() {
            masked = masked.replace(&self.host, &mask_first_label(&self.host));
        }
        masked
    }

    /// Structured anonymization of the account payload: username, password
    /// and the first DNS label of the reported server URL.
    pub fn mask_account(&self, mut account: Value) -> Value {
        if let Some(user_info) = account.get_mut("user_info").and_then(Value::as_object_mut) {
            user_info.insert("username".to_string(), Value::String(MASKED_USERNAME.into()));
            user_info.insert("password".to_string(), Value::String(MASKED_PASSWORD.into()));
        }
        if let Some(url) = account.pointer_mut("/server_info/url") {
            if let Some(s) = url.as_str() {
                *url = Value::String(mask_first_label(s));
            }
        }
        account
    }
}

fn mask_first_label(host: &str) -> String {
    match host.split_once('.') {
        Some((_, rest)) => format!("{MASKED_HOST}.{rest}"),
        None => MASKED_HOST.to_string(),
    }
}

/// One timestamped acquisition directory. Created open, sealed after the
/// last artifact is written; a sealed snapshot accepts no further writes.
pub struct Snapshot {
    dir: PathBuf,
    sealed: bool,
}

impl Snapshot {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }
}

pub struct Archiver {
    root: PathBuf,
    server_key: String,
    masker: Masker,
    raw: bool,
}

impl Archiver {
    pub fn new(root: PathBuf, server_key: &str, masker: Masker, raw: bool) -> Self {
        Self {
            root,
            server_key: server_key.to_string(),
            masker,
            raw,
        }
    }

    /// Create the snapshot directory for this run.
    ///
    /// Two runs starting within the same second would collide on the
    /// timestamp name; the later one gets a numeric suffix instead of
    /// sharing or overwriting the directory.
    pub fn begin_snapshot(&self) -> std::io::Result<Snapshot> {
        let server_dir = self.root.join(&self.server_key);
        fs::create_dir_all(&server_dir)?;

        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut dir = server_dir.join(&stamp);
        let mut suffix = 2u32;
        loop {
            match fs::create_dir(&dir) {
                Ok(()) => {
                    return Ok(Snapshot {
                        dir,
                        sealed: false,
                    })
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    dir = server_dir.join(format!("{stamp}-{suffix}"));
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write one artifact into the snapshot. Unless raw mode is on, the
    /// credential mask is applied first. Failures are reported per artifact
    /// and never abort sibling writes.
    pub fn write_artifact(
        &self,
        snapshot: &Snapshot,
        name: &str,
        content: &[u8],
    ) -> Result<(), String> {
        if snapshot.sealed {
            return Err(format!(
                "snapshot {} is sealed, refusing to write {name}",
                snapshot.dir.display()
            ));
        }

        let data: Cow<[u8]> = if self.raw {
            Cow::Borrowed(content)
        } else {
            match std::str::from_utf8(content) {
                Ok(text) => Cow::Owned(self.masker.mask_text(text).into_bytes()),
                Err(_) => Cow::Borrowed(content),
            }
        };

        let path = snapshot.dir.join(name);
        fs::write(&path, data).map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    /// Delete all but the newest `keep_n` snapshots for this server.
    ///
    /// Directory names sort chronologically. Each deletion is attempted
    /// independently; failures come back as warnings, never as errors.
    pub fn prune(&self, keep_n: usize) -> Vec<String> {
        let server_dir = self.root.join(&self.server_key);
        let entries = match fs::read_dir(&server_dir) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![format!(
                    "cannot list snapshots under {}: {e}",
                    server_dir.display()
                )]
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.path())
            .collect();
        dirs.sort();

        if dirs.len() <= keep_n {
            info!(
                "nothing pruned, only {} snapshot(s) present for {}",
                dirs.len(),
                self.server_key
            );
            return Vec::new();
        }

        let excess = dirs.len() - keep_n;
        let mut warnings = Vec::new();
        for dir in dirs.into_iter().take(excess) {
            info!("pruning old snapshot {}", dir.display());
            if let Err(e) = fs::remove_dir_all(&dir) {
                warnings.push(format!("failed to prune {}: {e}", dir.display()));
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn masker() -> Masker {
        Masker::new(&Credentials::new("tv.example.com", "alice", "s3cret"))
    }

    fn archiver(root: &Path, raw: bool) -> Archiver {
        Archiver::new(root.to_path_buf(), "tv.example.com", masker(), raw)
    }

    #[test]
    fn artifacts_never_contain_credentials_by_default() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), false);
        let snapshot = archiver.begin_snapshot().expect("snapshot");

        let payload = r#"{"url": "http://tv.example.com/live/alice/s3cret/1.ts"}"#;
        archiver
            .write_artifact(&snapshot, "live_streams.json", payload.as_bytes())
            .expect("write");

        let written =
            fs::read_to_string(snapshot.dir().join("live_streams.json")).expect("read back");
        assert!(!written.contains("alice"));
        assert!(!written.contains("s3cret"));
        assert!(!written.contains("tv.example.com"));
        assert!(written.contains(MASKED_USERNAME));
        assert!(written.contains(MASKED_PASSWORD));
        assert!(written.contains(&format!("{MASKED_HOST}.example.com")));
    }

    #[test]
    fn raw_mode_keeps_credentials_verbatim() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), true);
        let snapshot = archiver.begin_snapshot().expect("snapshot");

        archiver
            .write_artifact(&snapshot, "user_info.json", br#"{"username":"alice"}"#)
            .expect("write");

        let written =
            fs::read_to_string(snapshot.dir().join("user_info.json")).expect("read back");
        assert!(written.contains("alice"));
    }

    #[test]
    fn account_payload_is_structurally_anonymized() {
        let account = json!({
            "user_info": {"username": "alice", "password": "s3cret", "status": "Active"},
            "server_info": {"url": "tv.example.com", "port": "8080"}
        });

        let masked = masker().mask_account(account);

        assert_eq!(masked["user_info"]["username"], MASKED_USERNAME);
        assert_eq!(masked["user_info"]["password"], MASKED_PASSWORD);
        assert_eq!(masked["user_info"]["status"], "Active");
        assert_eq!(
            masked["server_info"]["url"],
            format!("{MASKED_HOST}.example.com")
        );
        assert_eq!(masked["server_info"]["port"], "8080");
    }

    #[test]
    fn sealed_snapshots_refuse_writes() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), false);
        let mut snapshot = archiver.begin_snapshot().expect("snapshot");

        archiver
            .write_artifact(&snapshot, "a.json", b"{}")
            .expect("open snapshot accepts writes");
        snapshot.seal();
        assert!(archiver.write_artifact(&snapshot, "b.json", b"{}").is_err());
    }

    #[test]
    fn same_second_snapshots_get_distinct_directories() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), false);

        let first = archiver.begin_snapshot().expect("first");
        let second = archiver.begin_snapshot().expect("second");

        assert_ne!(first.dir(), second.dir());
        assert!(first.dir().is_dir());
        assert!(second.dir().is_dir());
    }

    #[test]
    fn prune_keeps_the_newest_snapshots() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), false);
        let server_dir = root.path().join("tv.example.com");

        // timestamp-style names; lexicographic order == chronological order
        let names = [
            "24-01-01--10-00-00",
            "24-01-02--10-00-00",
            "24-01-03--10-00-00",
            "24-01-04--10-00-00",
            "24-01-05--10-00-00",
        ];
        for name in &names {
            fs::create_dir_all(server_dir.join(name)).expect("seed snapshot");
        }

        let warnings = archiver.prune(2);
        assert!(warnings.is_empty());

        let mut remaining: Vec<String> = fs::read_dir(&server_dir)
            .expect("list")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["24-01-04--10-00-00", "24-01-05--10-00-00"]);
    }

    #[test]
    fn prune_is_a_noop_below_the_retention_count() {
        let root = tempfile::tempdir().expect("tempdir");
        let archiver = archiver(root.path(), false);
        let server_dir = root.path().join("tv.example.com");
        fs::create_dir_all(server_dir.join("24-01-01--10-00-00")).expect("seed");

        assert!(archiver.prune(3).is_empty());
        assert!(server_dir.join("24-01-01--10-00-00").is_dir());
    }
}
