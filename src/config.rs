//! Configuration types for the partition index.

use crate::error::{Error, Result};
use crate::partitioning::bitmap::BITS_PER_WORD;
use crate::partitioning::hash::DEFAULT_MAX_NAME_LEN;
use crate::partitioning::split::{SplitPolicy, DEFAULT_MAX_BUCKETS_PER_SERVER};
use crate::types::ServerId;
use std::path::Path;

/// Default number of directories whose mappings are cached.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// Address used by the single-server default list.
pub const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:9000";

/// Main configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GigaConfig {
    /// Rule deciding whether a partition may split.
    pub split_policy: SplitPolicy,

    /// Number of partitions created up front under `NeverSplit`.
    pub initial_partitions: Option<u32>,

    /// Partitions per server allowed under `BoundedByServerCount`.
    pub max_buckets_per_server: u32,

    /// Longest accepted name or path, in bytes.
    pub max_name_len: usize,

    /// Maximum number of cached directory mappings.
    pub cache_capacity: u64,

    /// Servers sharing the directory partitions.
    pub servers: ServerList,
}

impl Default for GigaConfig {
    fn default() -> Self {
        Self {
            split_policy: SplitPolicy::default(),
            initial_partitions: None,
            max_buckets_per_server: DEFAULT_MAX_BUCKETS_PER_SERVER,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            servers: ServerList::single(DEFAULT_LOCAL_ADDR),
        }
    }
}

impl GigaConfig {
    /// Create a configuration for the given server list.
    pub fn new(servers: ServerList) -> Self {
        Self {
            servers,
            ..Default::default()
        }
    }

    /// Set the split policy.
    pub fn with_split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }

    /// Use `NeverSplit` with a fixed number of partitions.
    pub fn with_never_split(mut self, partitions: u32) -> Self {
        self.split_policy = SplitPolicy::NeverSplit;
        self.initial_partitions = Some(partitions);
        self
    }

    /// Set the number of partitions created up front.
    ///
    /// Only valid together with `NeverSplit`.
    pub fn with_initial_partitions(mut self, partitions: u32) -> Self {
        self.initial_partitions = Some(partitions);
        self
    }

    /// Set the per-server partition bound.
    pub fn with_max_buckets_per_server(mut self, max: u32) -> Self {
        self.max_buckets_per_server = max;
        self
    }

    /// Set the maximum name length.
    pub fn with_max_name_len(mut self, max: usize) -> Self {
        self.max_name_len = max;
        self
    }

    /// Set the mapping cache capacity.
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the server list.
    pub fn with_servers(mut self, servers: ServerList) -> Self {
        self.servers = servers;
        self
    }

    /// Number of servers, as stored in new mappings.
    pub fn server_count(&self) -> u32 {
        self.servers.server_count()
    }

    /// Check the configuration for illegal combinations.
    pub fn validate(&self) -> Result<()> {
        if self.max_buckets_per_server == 0 {
            return Err(Error::Config("max_buckets_per_server must be at least 1".into()));
        }
        if self.max_name_len == 0 {
            return Err(Error::Config("max_name_len must be at least 1".into()));
        }
        if self.servers.is_empty() {
            return Err(Error::Config("server list is empty".into()));
        }
        if u32::try_from(self.servers.len()).is_err() {
            return Err(Error::Config(format!(
                "too many servers: {}",
                self.servers.len()
            )));
        }

        match (self.split_policy, self.initial_partitions) {
            (SplitPolicy::NeverSplit, None) => Err(Error::Config(
                "never_split requires initial_partitions".into(),
            )),
            (SplitPolicy::NeverSplit, Some(n)) if n == 0 || n > BITS_PER_WORD => {
                Err(Error::Config(format!(
                    "initial_partitions must be in 1..={}, got {}",
                    BITS_PER_WORD, n
                )))
            }
            (policy, Some(n)) if policy != SplitPolicy::NeverSplit => Err(Error::Config(format!(
                "initial_partitions ({}) only applies to never_split, policy is {}",
                n, policy
            ))),
            _ => Ok(()),
        }
    }
}

/// Ordered list of server addresses.
///
/// The position of an address is its [`ServerId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerList {
    servers: Vec<String>,
    self_id: Option<ServerId>,
}

impl ServerList {
    /// Build a list from addresses, with no local server.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            self_id: None,
        }
    }

    /// A list holding only the local server.
    pub fn single(addr: impl Into<String>) -> Self {
        Self {
            servers: vec![addr.into()],
            self_id: Some(0),
        }
    }

    /// Parse one address per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. If `local_addr`
    /// is given, the matching entry becomes this server's id.
    pub fn parse(text: &str, local_addr: Option<&str>) -> Self {
        let servers: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect();

        let self_id = local_addr.and_then(|local| {
            let local = local.trim();
            servers
                .iter()
                .position(|s| s == local)
                .and_then(|pos| ServerId::try_from(pos).ok())
        });

        tracing::debug!(servers = servers.len(), ?self_id, "parsed server list");
        Self { servers, self_id }
    }

    /// Read and parse a server-list file.
    pub fn from_file(path: impl AsRef<Path>, local_addr: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let list = Self::parse(&text, local_addr);
        tracing::info!(path = %path.display(), servers = list.len(), "loaded server list");
        Ok(list)
    }

    /// Number of servers, saturated to `u32`.
    pub fn server_count(&self) -> u32 {
        u32::try_from(self.servers.len()).unwrap_or(u32::MAX)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Check if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Id of the local server, if it appears in the list.
    pub fn self_id(&self) -> Option<ServerId> {
        self.self_id
    }

    /// Address of server `id`.
    pub fn address(&self, id: ServerId) -> Option<&str> {
        self.servers.get(id as usize).map(String::as_str)
    }

    /// All addresses in id order.
    pub fn addresses(&self) -> &[String] {
        &self.servers
    }
}
