use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

use crate::error::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Key of the service in the compose file.
    #[serde(skip)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,

    #[serde(default)]
    pub restart: Restart,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<Port>,

    #[serde(
        default,
        deserialize_with = "map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub environment: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<ServiceVolume>,

    #[serde(
        default,
        deserialize_with = "network_map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub networks: IndexMap<String, ServiceNetwork>,

    #[serde(
        default,
        deserialize_with = "map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub labels: IndexMap<String, String>,

    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl Service {
    pub fn new<S: Into<String>>(name: S) -> Service {
        Service {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_image<S: Into<String>>(mut self, image: S) -> Service {
        self.image = Some(image.into());
        self
    }

    pub fn add_port(&mut self, port: Port) -> &mut Self {
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }

    pub fn add_volume(&mut self, volume: ServiceVolume) -> &mut Self {
        if !self.volumes.contains(&volume) {
            self.volumes.push(volume);
        }
        self
    }

    /// Attaches the service to a network, merging aliases when it is
    /// already attached.
    pub fn add_network<S: Into<String>>(&mut self, name: S, alias: Option<&str>) -> &mut Self {
        let network = self.networks.entry(name.into()).or_default();
        if let Some(alias) = alias {
            if !network.aliases.iter().any(|existing| existing == alias) {
                network.aliases.push(alias.to_string());
            }
        }
        self
    }

    pub fn add_secret<S: Into<String>>(&mut self, name: S) -> &mut Self {
        let name = name.into();
        if !self.secrets.contains(&name) {
            self.secrets.push(name);
        }
        self
    }

    pub fn add_environment<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn add_label<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn add_deploy_label<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.deploy
            .get_or_insert_with(Deploy::default)
            .labels
            .insert(key.into(), value.into());
        self
    }

    pub fn add_command<S: Into<String>>(&mut self, argument: S) -> &mut Self {
        let argument = argument.into();
        if !self.command.contains(&argument) {
            self.command.push(argument);
        }
        self
    }

    /// Replaces the command with the whitespace separated words of `line`.
    pub fn set_command_line(&mut self, line: &str) -> &mut Self {
        self.command = line.split_whitespace().map(String::from).collect();
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Restart {
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

impl Default for Restart {
    fn default() -> Self {
        Restart::UnlessStopped
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Build {
    Short(String),
    Extended {
        context: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        dockerfile: Option<String>,
    },
}

impl Build {
    pub fn context<S: Into<String>>(context: S) -> Build {
        Build::Extended {
            context: context.into(),
            dockerfile: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNetwork {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deploy {
    #[serde(
        default,
        deserialize_with = "map_or_list",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub labels: IndexMap<String, String>,
}

/// A single port or an inclusive range such as `8000-8010`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl From<u16> for PortRange {
    fn from(port: u16) -> PortRange {
        PortRange { start: port, end: port }
    }
}

impl FromStr for PortRange {
    type Err = Error;

    fn from_str(value: &str) -> Result<PortRange, Error> {
        let (start, end) = match value.split_once('-') {
            Some((start, end)) => (parse_port(start)?, parse_port(end)?),
            None => {
                let port = parse_port(value)?;
                (port, port)
            }
        };

        if end < start {
            return Err(Error::format(format!("port range {:?} is reversed", value)));
        }

        Ok(PortRange { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A container port, optionally published on the host. Serialized in the
/// short `[ip:][published:]target[/protocol]` form unless a mode is set,
/// which only the long form can carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPort", into = "RawPort")]
pub struct Port {
    pub target: PortRange,
    /// `None` lets the engine pick a host port.
    pub published: Option<PortRange>,
    pub host_ip: Option<String>,
    pub protocol: Option<String>,
    pub mode: Option<String>,
}

impl Port {
    pub fn new(published: u16, target: u16) -> Port {
        Port {
            target: target.into(),
            published: Some(published.into()),
            host_ip: None,
            protocol: None,
            mode: None,
        }
    }

    /// Long form with `tcp` in host mode, which bypasses the swarm
    /// routing mesh.
    pub fn host(published: u16, target: u16) -> Port {
        Port {
            protocol: Some("tcp".into()),
            mode: Some("host".into()),
            ..Port::new(published, target)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(u16),
    Short(String),
    Long {
        target: Scalar,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        published: Option<Scalar>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host_ip: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        protocol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
}

fn parse_port(value: &str) -> Result<u16, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::format(format!("invalid port number {:?}", value)))
}

fn parse_short_port(short: &str) -> Result<Port, Error> {
    let (mapping, protocol) = match short.split_once('/') {
        Some((mapping, protocol)) => (mapping, Some(protocol.to_string())),
        None => (short, None),
    };

    // The host ip comes first and may itself contain colons (`[::1]`).
    let mut parts = mapping.rsplitn(3, ':');
    let target = parts.next().unwrap_or_default().parse()?;
    let published = match parts.next() {
        Some("") | None => None,
        Some(published) => Some(published.parse()?),
    };
    let host_ip = parts.next().filter(|ip| !ip.is_empty()).map(String::from);

    Ok(Port {
        target,
        published,
        host_ip,
        protocol,
        mode: None,
    })
}

impl TryFrom<RawPort> for Port {
    type Error = Error;

    fn try_from(raw: RawPort) -> Result<Port, Error> {
        match raw {
            RawPort::Number(target) => Ok(Port {
                target: target.into(),
                published: None,
                host_ip: None,
                protocol: None,
                mode: None,
            }),
            RawPort::Short(short) => parse_short_port(&short)
                .map_err(|err| Error::format(format!("port {:?}: {}", short, err))),
            RawPort::Long {
                target,
                published,
                host_ip,
                protocol,
                mode,
            } => Ok(Port {
                target: target.to_string().parse()?,
                published: published.map(|published| published.to_string().parse()).transpose()?,
                host_ip,
                protocol,
                mode,
            }),
        }
    }
}

fn range_scalar(range: PortRange) -> Scalar {
    if range.start == range.end {
        Scalar::Int(range.start.into())
    } else {
        Scalar::String(range.to_string())
    }
}

impl From<Port> for RawPort {
    fn from(port: Port) -> RawPort {
        if port.mode.is_some() {
            return RawPort::Long {
                target: range_scalar(port.target),
                published: port.published.map(range_scalar),
                host_ip: port.host_ip,
                protocol: port.protocol,
                mode: port.mode,
            };
        }

        let mut short = String::new();
        if let Some(ip) = &port.host_ip {
            short.push_str(ip);
            short.push(':');
        }
        match port.published {
            Some(published) => short.push_str(&format!("{}:", published)),
            None if port.host_ip.is_some() => short.push(':'),
            None => (),
        }
        short.push_str(&port.target.to_string());
        if let Some(protocol) = &port.protocol {
            short.push('/');
            short.push_str(protocol);
        }

        RawPort::Short(short)
    }
}

/// A volume mount. Writable mounts serialize as `"source:target"`,
/// read-only mounts use the long form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVolume", into = "RawVolume")]
pub struct ServiceVolume {
    /// Host path or named volume; empty for an anonymous volume.
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl ServiceVolume {
    pub fn new<S: Into<String>, T: Into<String>>(source: S, target: T) -> ServiceVolume {
        ServiceVolume {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only<S: Into<String>, T: Into<String>>(source: S, target: T) -> ServiceVolume {
        ServiceVolume {
            read_only: true,
            ..ServiceVolume::new(source, target)
        }
    }

    pub fn is_bind(&self) -> bool {
        self.source.contains('/') || self.source.starts_with('.') || self.source.starts_with('~')
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RawVolume {
    Short(String),
    Long {
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        target: String,
        #[serde(default)]
        read_only: bool,
    },
}

impl TryFrom<RawVolume> for ServiceVolume {
    type Error = Error;

    fn try_from(raw: RawVolume) -> Result<ServiceVolume, Error> {
        match raw {
            RawVolume::Short(short) => {
                let parts = short.split(':').collect::<Vec<_>>();
                match parts.as_slice() {
                    [target] => Ok(ServiceVolume::new("", *target)),
                    [source, target] => Ok(ServiceVolume::new(*source, *target)),
                    [source, target, "ro"] => Ok(ServiceVolume::read_only(*source, *target)),
                    [source, target, "rw"] => Ok(ServiceVolume::new(*source, *target)),
                    _ => Err(Error::format(format!(
                        "volume {:?} must look like source:target[:ro]",
                        short
                    ))),
                }
            }
            RawVolume::Long {
                source,
                target,
                read_only,
                ..
            } => Ok(ServiceVolume {
                source: source.unwrap_or_default(),
                target,
                read_only,
            }),
        }
    }
}

impl From<ServiceVolume> for RawVolume {
    fn from(volume: ServiceVolume) -> RawVolume {
        if volume.read_only {
            let kind = if volume.is_bind() { "bind" } else { "volume" };
            RawVolume::Long {
                kind: Some(kind.to_string()),
                source: Some(volume.source),
                target: volume.target,
                read_only: true,
            }
        } else if volume.source.is_empty() {
            RawVolume::Short(volume.target)
        } else {
            RawVolume::Short(format!("{}:{}", volume.source, volume.target))
        }
    }
}

/// A YAML scalar we want as text, `PMA_ARBITRARY: 1` and the like.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Float(value) => write!(f, "{}", value),
            Scalar::String(value) => f.write_str(value),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapList {
    Map(IndexMap<String, Option<Scalar>>),
    List(Vec<String>),
}

impl MapList {
    fn into_map(self) -> IndexMap<String, String> {
        match self {
            MapList::Map(map) => map
                .into_iter()
                .map(|(key, value)| (key, value.map(|value| value.to_string()).unwrap_or_default()))
                .collect(),
            MapList::List(list) => list.into_iter().map(MapList::split_value).collect(),
        }
    }

    fn split_value(value: String) -> (String, String) {
        match value.split_once('=') {
            Some((key, value)) => (key.into(), value.into()),
            None => (value, String::new()),
        }
    }
}

fn map_or_list<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<MapList> = Option::deserialize(deserializer)?;
    Ok(value.map(MapList::into_map).unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NetworkList {
    Map(IndexMap<String, Option<ServiceNetwork>>),
    List(Vec<String>),
}

fn network_map_or_list<'de, D>(deserializer: D) -> Result<IndexMap<String, ServiceNetwork>, D::Error>
where
    D: Deserializer<'de>,
{
    let networks = match Option::<NetworkList>::deserialize(deserializer)? {
        Some(NetworkList::Map(map)) => map
            .into_iter()
            .map(|(name, network)| (name, network.unwrap_or_default()))
            .collect(),
        Some(NetworkList::List(list)) => list
            .into_iter()
            .map(|name| (name, ServiceNetwork::default()))
            .collect(),
        None => IndexMap::new(),
    };

    Ok(networks)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringList {
    String(String),
    List(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let command = match Option::<StringList>::deserialize(deserializer)? {
        Some(StringList::String(line)) => line.split_whitespace().map(String::from).collect(),
        Some(StringList::List(list)) => list,
        None => Vec::new(),
    };

    Ok(command)
}
