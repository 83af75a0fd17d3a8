//! Frontend declaration, discovery metadata and resolved configuration types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::{Fingerprint, LbsyncResult};

/// Operator supplied binding of a routing domain to a backend service port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendDeclaration {
    /// Backend service this frontend routes to
    pub service: ServiceRef,
    /// Frontend settings
    pub frontend: FrontendSpec,
}

impl FrontendDeclaration {
    /// Create a declaration without a health check
    pub fn new(service_id: &str, port: &str, domain: &str) -> Self {
        Self {
            service: ServiceRef {
                id: service_id.to_string(),
                port: port.to_string(),
            },
            frontend: FrontendSpec {
                domain: domain.to_string(),
                healthcheck: serde_json::Value::Null,
            },
        }
    }

    /// Stable identifier of this declaration, independent of the instances behind it
    pub fn fingerprint(&self) -> LbsyncResult<Fingerprint> {
        Fingerprint::of(self)
    }
}

/// Reference to a discovered service port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Service link name
    pub id: String,
    /// Exposed container port
    #[serde(deserialize_with = "port_from_string_or_number")]
    pub port: String,
}

/// Frontend settings handed to the load balancer template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontendSpec {
    /// Domain routed to the service
    pub domain: String,
    /// Free-form health check settings
    #[serde(default)]
    pub healthcheck: serde_json::Value,
}

fn port_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(port) => port,
        Port::Number(port) => port.to_string(),
    })
}

/// Raw document returned by the discovery backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    /// Services linked to this load balancer
    pub linked_to_service: Vec<ServiceLink>,
    /// Environment variables injected for the links
    pub calculated_envvars: Vec<EnvVar>,
}

impl RawMetadata {
    /// Build metadata from link names and `(key, value)` pairs
    pub fn new<L, K, V>(
        links: impl IntoIterator<Item = L>,
        envvars: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        L: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            linked_to_service: links
                .into_iter()
                .map(|name| ServiceLink { name: name.into() })
                .collect(),
            calculated_envvars: envvars
                .into_iter()
                .map(|(key, value)| EnvVar {
                    key: key.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLink {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Network endpoint of a service instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// `host:port` form of the endpoint
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Instances of one service port, keyed by instance id
pub type InstanceMap = BTreeMap<String, Endpoint>;

/// Ports of one service, keyed by exposed port
pub type PortMap = BTreeMap<String, InstanceMap>;

/// Resolved topology: service id → port → instance id → endpoint
pub type ServiceMap = BTreeMap<String, PortMap>;

/// Backend server of a resolved frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Instance id
    pub id: String,
    pub host: String,
    pub port: u16,
}

/// Frontend whose service port is present in the service map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFrontend {
    /// Fingerprint of the declaration this frontend was built from
    pub id: Fingerprint,
    pub domain: String,
    pub healthcheck: serde_json::Value,
    pub servers: Vec<Server>,
}

/// One position of the resolved configuration
///
/// Serializes as the frontend object, or `null` when the declared service port is not
/// currently discovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Option<ResolvedFrontend>",
    into = "Option<ResolvedFrontend>"
)]
pub enum FrontendEntry {
    Resolved(ResolvedFrontend),
    Unresolved,
}

impl FrontendEntry {
    pub fn as_resolved(&self) -> Option<&ResolvedFrontend> {
        match self {
            FrontendEntry::Resolved(frontend) => Some(frontend),
            FrontendEntry::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, FrontendEntry::Resolved(_))
    }
}

impl From<Option<ResolvedFrontend>> for FrontendEntry {
    fn from(entry: Option<ResolvedFrontend>) -> Self {
        match entry {
            Some(frontend) => FrontendEntry::Resolved(frontend),
            None => FrontendEntry::Unresolved,
        }
    }
}

impl From<FrontendEntry> for Option<ResolvedFrontend> {
    fn from(entry: FrontendEntry) -> Self {
        match entry {
            FrontendEntry::Resolved(frontend) => Some(frontend),
            FrontendEntry::Unresolved => None,
        }
    }
}

/// Resolved configuration together with its change-detection fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub entries: Vec<FrontendEntry>,
    /// Fingerprint of the serialized entries
    pub fingerprint: Fingerprint,
}

impl ResolvedConfig {
    pub fn new(entries: Vec<FrontendEntry>) -> LbsyncResult<Self> {
        let fingerprint = Fingerprint::of(&entries)?;
        Ok(Self {
            entries,
            fingerprint,
        })
    }

    /// Number of entries whose service port was found
    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_resolved()).count()
    }
}

/// Last configuration handed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedConfig {
    #[serde(flatten)]
    pub config: ResolvedConfig,
    /// Commit timestamp
    pub committed_at: DateTime<Utc>,
}

impl CommittedConfig {
    pub fn new(config: ResolvedConfig) -> Self {
        Self {
            config,
            committed_at: Utc::now(),
        }
    }

    pub fn entries(&self) -> &[FrontendEntry] {
        &self.config.entries
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.config.fingerprint
    }
}
