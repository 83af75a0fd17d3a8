//! Resolution of link environment variables into a service map
//!
//! Every linked service contributes environment variables named after the link. A key is
//! used when it fits the grammar
//!
//! ```text
//! <LINK>_<INSTANCE>_PORT_<N>_<TCP|UDP>_<ADDR|PORT>
//! ```
//!
//! where `<LINK>` is the link name in environment form (upper-case, every character other
//! than `A-Z0-9` replaced by `_`) and `<INSTANCE>` is `[A-Z0-9]+`. `ADDR` keys carry the
//! instance host, `PORT` keys its port. Keys are matched in three stages: link prefix (the
//! longest matching link wins), port index, then instance id. A key failing the link or port
//! stage is ignored. A key passing the port stage registers the port even when its instance
//! stage fails, so a port without usable instances resolves to an empty instance map.

use lbsync_core::{Endpoint, RawMetadata, ServiceMap};
use regex::Regex;
use std::collections::BTreeMap;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

static PORT_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"PORT_(\d+)_(?:TCP|UDP)_").expect("valid port index pattern"));

static FIELD_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PORT_\d+_(?:TCP|UDP)_(ADDR|PORT)$").expect("valid field suffix pattern")
});

/// Exposed port named by a key, the port index stage
pub fn port_index(key: &str) -> Option<&str> {
    PORT_INDEX.captures(key)?.get(1).map(|m| m.as_str())
}

/// Environment form of a link name
pub fn env_prefix(link: &str) -> String {
    link.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Which part of an instance endpoint a key describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Addr,
    Port,
    Other,
}

/// A key that passed every matching stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkKey {
    /// Exposed port
    pub port: String,
    /// Instance id
    pub instance: String,
    pub field: KeyField,
}

/// Key matcher for one declared link
#[derive(Debug, Clone)]
pub struct LinkPattern {
    name: String,
    prefix: String,
    instance: Regex,
}

impl LinkPattern {
    pub fn new(name: &str) -> Option<Self> {
        let prefix = env_prefix(name);
        if prefix.is_empty() {
            return None;
        }

        match Regex::new(&format!("^{}_([A-Z0-9]+)_PORT", regex::escape(&prefix))) {
            Ok(instance) => Some(Self {
                name: name.to_string(),
                prefix,
                instance,
            }),
            Err(e) => {
                warn!(link = %name, error = %e, "Ignoring link with unusable name");
                None
            }
        }
    }

    /// Link name as declared by the discovery backend
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether the key belongs to this link's variables
    pub fn owns(&self, key: &str) -> bool {
        key.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Apply the port index and instance stages to a key owned by this link
    pub fn parse(&self, key: &str) -> Option<LinkKey> {
        let port = port_index(key)?.to_string();
        let instance = self.instance.captures(key)?.get(1)?.as_str().to_string();

        let field = match FIELD_SUFFIX
            .captures(key)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        {
            Some("ADDR") => KeyField::Addr,
            Some("PORT") => KeyField::Port,
            _ => KeyField::Other,
        };

        Some(LinkKey {
            port,
            instance,
            field,
        })
    }
}

#[derive(Debug, Default)]
struct PartialEndpoint {
    host: Option<String>,
    port: Option<u16>,
}

type PartialMap = BTreeMap<String, BTreeMap<String, BTreeMap<String, PartialEndpoint>>>;

/// Resolve raw discovery metadata into a service map
///
/// Pure and total: unusable entries are skipped, never reported as errors. Instances only
/// appear in the result once both their host and port are known; a port seen on the link
/// stays in the result with no instances when none are complete.
pub fn resolve(raw: &RawMetadata) -> ServiceMap {
    let links: Vec<LinkPattern> = raw
        .linked_to_service
        .iter()
        .filter_map(|link| LinkPattern::new(&link.name))
        .collect();

    let mut partial = PartialMap::new();

    for env in &raw.calculated_envvars {
        let Some(link) = owning_link(&links, &env.key) else {
            continue;
        };
        let Some(port) = port_index(&env.key) else {
            continue;
        };

        let instances = partial
            .entry(link.name().to_string())
            .or_default()
            .entry(port.to_string())
            .or_default();

        let Some(key) = link.parse(&env.key) else {
            continue;
        };
        let slot = instances.entry(key.instance).or_default();

        match key.field {
            KeyField::Addr => slot.host = Some(env.value.clone()),
            KeyField::Port => match env.value.trim().parse::<u16>() {
                Ok(port) => slot.port = Some(port),
                Err(_) => debug!(key = %env.key, value = %env.value, "Ignoring invalid port value"),
            },
            KeyField::Other => {}
        }
    }

    finish(partial)
}

fn owning_link<'a>(links: &'a [LinkPattern], key: &str) -> Option<&'a LinkPattern> {
    links
        .iter()
        .filter(|link| link.owns(key))
        .fold(None, |best: Option<&LinkPattern>, link| match best {
            Some(b) if b.prefix.len() >= link.prefix.len() => Some(b),
            _ => Some(link),
        })
}

fn finish(partial: PartialMap) -> ServiceMap {
    let mut services = ServiceMap::new();

    for (service, ports) in partial {
        for (port, instances) in ports {
            let complete: BTreeMap<String, Endpoint> = instances
                .into_iter()
                .filter_map(|(instance, endpoint)| match endpoint {
                    PartialEndpoint {
                        host: Some(host),
                        port: Some(p),
                    } => Some((instance, Endpoint::new(host, p))),
                    _ => {
                        debug!(
                            service = %service,
                            port = %port,
                            instance = %instance,
                            "Dropping incomplete instance"
                        );
                        None
                    }
                })
                .collect();

            services
                .entry(service.clone())
                .or_default()
                .insert(port, complete);
        }
    }

    services
}
