// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, PortMapping, and VolumeMount.

/// Configuration for creating a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    /// `NAME=VALUE` strings, passed through verbatim.
    pub env: Vec<String>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    pub working_dir: Option<String>,
    /// Port mappings (host:container).
    pub ports: Vec<PortMapping>,
    /// Bind mounts. Sources are host paths.
    pub volumes: Vec<VolumeMount>,
    /// Let the runtime delete the container once it exits.
    pub auto_remove: bool,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
    pub host_ip: Option<String>,
}

impl PortMapping {
    /// Parse an image's `8080/tcp` exposed-port key into a 1:1 host binding.
    pub fn from_exposed(exposed: &str) -> Option<Self> {
        let (port, proto) = match exposed.split_once('/') {
            Some((port, proto)) => (port, proto),
            None => (exposed, "tcp"),
        };
        let container_port = port.trim().parse().ok()?;
        let protocol = match proto.trim() {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => return None,
        };
        Some(Self {
            host_port: Some(container_port),
            container_port,
            protocol,
            host_ip: None,
        })
    }

    /// Runtime key for this port, e.g. `8080/tcp`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Network protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// Bind mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }
}
