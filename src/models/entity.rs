// Entity identity and the tagged snapshot shared by both entity kinds

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ContainerSnapshot, ServiceSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Service,
    Container,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Service => "service",
            EntityKind::Container => "container",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Service => "services",
            EntityKind::Container => "containers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity key: service name or container id, assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityId {
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Service,
            id: name.into(),
        }
    }

    pub fn container(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Container,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntitySnapshot {
    Service(ServiceSnapshot),
    Container(ContainerSnapshot),
}

impl EntitySnapshot {
    pub fn id(&self) -> EntityId {
        match self {
            EntitySnapshot::Service(s) => EntityId::service(&s.name),
            EntitySnapshot::Container(c) => EntityId::container(&c.id),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntitySnapshot::Service(_) => EntityKind::Service,
            EntitySnapshot::Container(_) => EntityKind::Container,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntitySnapshot::Service(s) => &s.name,
            EntitySnapshot::Container(c) => &c.name,
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            EntitySnapshot::Service(s) => s.is_running(),
            EntitySnapshot::Container(c) => c.is_running(),
        }
    }

    pub fn cpu_usage(&self) -> Option<f64> {
        match self {
            EntitySnapshot::Service(s) => s.cpu_usage,
            EntitySnapshot::Container(c) => c.cpu_usage,
        }
    }

    pub fn memory_usage(&self) -> Option<u64> {
        match self {
            EntitySnapshot::Service(s) => s.memory_usage,
            EntitySnapshot::Container(c) => c.memory_usage,
        }
    }
}

impl From<ServiceSnapshot> for EntitySnapshot {
    fn from(s: ServiceSnapshot) -> Self {
        EntitySnapshot::Service(s)
    }
}

impl From<ContainerSnapshot> for EntitySnapshot {
    fn from(c: ContainerSnapshot) -> Self {
        EntitySnapshot::Container(c)
    }
}
