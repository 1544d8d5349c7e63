use anyhow::{Context, bail};
use contact_scheduler::plan::NodeId;
use contact_scheduler::port::ConfigError;
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Deserialize, Clone)]
pub struct TopologyJson {
    nodes: Vec<TopologyNodeJson>,
    links: Vec<TopologyLinkJson>,
}

#[derive(Deserialize, Clone)]
struct TopologyNodeJson {
    id: u32,
    name: String,
    /// The network namespace in which the node's devices live (the root namespace if missing)
    #[serde(default)]
    namespace: Option<String>,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct TopologyLinkJson {
    #[serde_as(as = "[DisplayFromStr; 2]")]
    nodes: [NodeId; 2],
    /// The device backing the link on each of the nodes, in the same order as `nodes`
    devices: [String; 2],
}

/// The nodes and links of an emulated network, as needed to find the devices behind a link
#[derive(Debug)]
pub struct Topology {
    nodes: Vec<TopologyNode>,
    links: HashMap<(usize, usize), [DeviceRef; 2]>,
}

#[derive(Debug)]
struct TopologyNode {
    id: u32,
    name: String,
    namespace: Option<String>,
}

/// A network device, in the namespace of the node it belongs to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRef {
    pub namespace: Option<String>,
    pub device: String,
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} (namespace {namespace})", self.device),
            None => write!(f, "{}", self.device),
        }
    }
}

impl Topology {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read topology file at `{}`", path.display()))?;
        let topology: TopologyJson = serde_json::from_str(&json)
            .with_context(|| format!("invalid topology JSON at `{}`", path.display()))?;
        Topology::try_from(topology)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    fn node_index(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| match id {
            NodeId::Numeric(id) => node.id == *id,
            NodeId::Named(name) => node.name == **name,
        })
    }

    /// Returns the devices at both ends of the link between `a` and `b`
    pub fn link_devices(&self, a: &NodeId, b: &NodeId) -> Result<&[DeviceRef; 2], ConfigError> {
        let a_index = self
            .node_index(a)
            .ok_or_else(|| ConfigError::NodeNotFound(a.clone()))?;
        let b_index = self
            .node_index(b)
            .ok_or_else(|| ConfigError::NodeNotFound(b.clone()))?;

        self.links
            .get(&link_slot(a_index, b_index))
            .ok_or_else(|| ConfigError::LinkNotFound(a.clone(), b.clone()))
    }
}

impl TryFrom<TopologyJson> for Topology {
    type Error = anyhow::Error;

    fn try_from(json: TopologyJson) -> anyhow::Result<Self> {
        let mut topology = Topology {
            nodes: Vec::with_capacity(json.nodes.len()),
            links: HashMap::new(),
        };

        for node in json.nodes {
            let numeric = NodeId::Numeric(node.id);
            let named = match node.name.parse::<NodeId>() {
                Ok(named @ NodeId::Named(_)) => named,
                _ => bail!(
                    "node {} has an invalid name `{}` (names must not be purely numeric)",
                    node.id,
                    node.name
                ),
            };
            if topology.node_index(&numeric).is_some() || topology.node_index(&named).is_some() {
                bail!("duplicate node in topology: {} ({})", node.id, node.name);
            }

            topology.nodes.push(TopologyNode {
                id: node.id,
                name: node.name,
                namespace: node.namespace,
            });
        }

        for link in json.links {
            let [a, b] = &link.nodes;
            let Some(a_index) = topology.node_index(a) else {
                bail!("link {a}-{b} references unknown node {a}");
            };
            let Some(b_index) = topology.node_index(b) else {
                bail!("link {a}-{b} references unknown node {b}");
            };
            if a_index == b_index {
                bail!("link {a}-{b} connects a node to itself");
            }

            let [a_device, b_device] = link.devices;
            let mut devices = [
                DeviceRef {
                    namespace: topology.nodes[a_index].namespace.clone(),
                    device: a_device,
                },
                DeviceRef {
                    namespace: topology.nodes[b_index].namespace.clone(),
                    device: b_device,
                },
            ];
            if a_index > b_index {
                devices.swap(0, 1);
            }

            let previous = topology
                .links
                .insert(link_slot(a_index, b_index), devices);
            if previous.is_some() {
                bail!("duplicate link in topology: {a}-{b}");
            }
        }

        Ok(topology)
    }
}

fn link_slot(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}
