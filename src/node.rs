use std::fmt;
use std::str::FromStr;

use crate::error::MonitorError;

/// One monitored Redis instance, identified by host and port.
/// Built once at startup from `--host-port` input or cluster discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for Node {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .split_once(':')
            .ok_or_else(|| MonitorError::BadAddress(s.to_string()))?;

        if host.is_empty() {
            return Err(MonitorError::BadAddress(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| MonitorError::BadAddress(s.to_string()))?;

        Ok(Node::new(host, port))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let node: Node = "10.0.0.5:6379".parse().unwrap();
        assert_eq!(node, Node::new("10.0.0.5", 6379));
    }

    #[test]
    fn display_round_trips() {
        let node = Node::new("cache-1.internal", 7000);
        assert_eq!(node.to_string().parse::<Node>().unwrap(), node);
    }

    #[test]
    fn rejects_missing_port() {
        assert!("localhost".parse::<Node>().is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!("localhost:redis".parse::<Node>().is_err());
        assert!("localhost:99999".parse::<Node>().is_err());
    }

    #[test]
    fn rejects_empty_host() {
        assert!(":6379".parse::<Node>().is_err());
    }
}
