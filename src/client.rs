use redis::aio::ConnectionManager;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::error::MonitorError;
use crate::node::Node;

/// Builds a client for one node, forwarding the optional password.
pub fn open(node: &Node, password: Option<&str>) -> redis::RedisResult<redis::Client> {
    redis::Client::open(ConnectionInfo {
        addr: ConnectionAddr::Tcp(node.host.clone(), node.port),
        redis: RedisConnectionInfo {
            password: password.map(str::to_owned),
            ..Default::default()
        },
    })
}

/// Creates the long-lived `ConnectionManager` for one node.
///
/// `ConnectionManager` is cheaply cloneable — every clone shares the same
/// underlying multiplexed TCP connection and reconnects on failure, so each
/// node gets exactly one of these for the lifetime of the process.
pub async fn connect(node: &Node, password: Option<&str>) -> Result<ConnectionManager, MonitorError> {
    let client = open(node, password)?;
    Ok(ConnectionManager::new(client).await?)
}
