use std::path::PathBuf;
use std::time::Duration;

use crate::model::RoomId;

/// Process configuration, read once from `INNKEEP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Prometheus exporter port; disabled when unset.
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction that trigger another one.
    pub compact_threshold: u64,
    pub store_timeout: Duration,
    pub dedupe_blocks: bool,
    /// Rooms created at startup if the store doesn't have them yet.
    pub rooms: Vec<(RoomId, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.var, self.reason)
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_ROOMS: &str = "1=General's Quarters;2=Major's Suite";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("INNKEEP_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "INNKEEP_PORT", 8080)?;
        let data_dir = PathBuf::from(lookup("INNKEEP_DATA_DIR").unwrap_or_else(|| "./data".into()));
        let metrics_port = match lookup("INNKEEP_METRICS_PORT") {
            None => None,
            Some(s) if s.trim().is_empty() => None,
            Some(s) => Some(s.trim().parse().map_err(|_| ConfigError {
                var: "INNKEEP_METRICS_PORT",
                reason: format!("not a port: {s:?}"),
            })?),
        };
        let compact_threshold = parse_or(&lookup, "INNKEEP_COMPACT_THRESHOLD", 1000)?;
        let timeout_ms: u64 = parse_or(&lookup, "INNKEEP_STORE_TIMEOUT_MS", 3000)?;
        let dedupe_blocks = match lookup("INNKEEP_DEDUPE_BLOCKS").as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => {
                return Err(ConfigError {
                    var: "INNKEEP_DEDUPE_BLOCKS",
                    reason: format!("expected true or false, got {other:?}"),
                });
            }
        };
        let rooms = parse_rooms(&lookup("INNKEEP_ROOMS").unwrap_or_else(|| DEFAULT_ROOMS.into()))?;

        Ok(Self {
            bind,
            port,
            data_dir,
            metrics_port,
            compact_threshold,
            store_timeout: Duration::from_millis(timeout_ms),
            dedupe_blocks,
            rooms,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|_| ConfigError {
            var,
            reason: format!("cannot parse {s:?}"),
        }),
    }
}

/// `id=name;id=name`
fn parse_rooms(list: &str) -> Result<Vec<(RoomId, String)>, ConfigError> {
    let invalid = |reason: String| ConfigError {
        var: "INNKEEP_ROOMS",
        reason,
    };
    let mut rooms: Vec<(RoomId, String)> = Vec::new();
    for entry in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, name) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected id=name, got {entry:?}")))?;
        let id: RoomId = id
            .trim()
            .parse()
            .map_err(|_| invalid(format!("bad room id in {entry:?}")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid(format!("room {id} has no name")));
        }
        if rooms.iter().any(|(existing, _)| *existing == id) {
            return Err(invalid(format!("room {id} listed twice")));
        }
        rooms.push((id, name.to_string()));
    }
    Ok(rooms)
}
