use redis::aio::ConnectionManager;
use tracing::error;

use crate::client;
use crate::error::MonitorError;
use crate::node::Node;

/// Replaces the user-supplied node list with every master in the cluster
/// the seed node belongs to.
///
/// On any error this logs one line and returns an empty list; the caller
/// refuses to start the loop with nothing to monitor.
pub async fn discover_master_nodes(seed: &Node, password: Option<&str>) -> Vec<Node> {
    match fetch_topology(seed, password).await {
        Ok(nodes) => nodes,
        Err(err) => {
            error!(seed = %seed, %err, "cluster topology query failed");
            Vec::new()
        }
    }
}

async fn fetch_topology(seed: &Node, password: Option<&str>) -> Result<Vec<Node>, MonitorError> {
    let client = client::open(seed, password)?;
    let mut conn = ConnectionManager::new(client).await?;
    let raw: String = redis::cmd("CLUSTER")
        .arg("NODES")
        .query_async(&mut conn)
        .await?;
    Ok(parse_cluster_nodes(&raw))
}

/// Parses `CLUSTER NODES` output into the master nodes, sorted by node id.
///
/// Each line is `<id> <ip:port@cport> <flags> ...`; only lines whose flags
/// field is exactly `master` or `myself,master` qualify, so failing or
/// migrating masters are left out. Malformed lines are skipped.
pub fn parse_cluster_nodes(raw: &str) -> Vec<Node> {
    let mut masters: Vec<(String, Node)> = raw
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            let addr = fields.next()?;
            let flags = fields.next()?;

            if flags != "master" && flags != "myself,master" {
                return None;
            }

            // `ip:port@cport` — the cluster bus suffix is irrelevant here.
            let addr = addr.replace('@', ":");
            let mut parts = addr.split(':');
            let host = parts.next()?.to_string();
            let port = parts.next()?.parse().ok()?;

            Some((id.to_string(), Node::new(host, port)))
        })
        .collect();

    masters.sort_by(|a, b| a.0.cmp(&b.0));
    masters.into_iter().map(|(_, node)| node).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGY: &str = "\
07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30004@31004 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected
67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30002@31002 master - 0 1426238316232 2 connected 5461-10922
824fe116063bc5fcf9f4ffd895bc17aee7731ac3 127.0.0.1:30006@31006 slave 292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 0 1426238317741 6 connected
e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 127.0.0.1:30001@31001 myself,master - 0 0 1 connected 0-5460
292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30003@31003 master - 0 1426238318243 3 connected 10923-16383
11111111111111111111111111111111111111aa 127.0.0.1:30007@31007 master,fail - 0 1426238318243 7 disconnected
";

    #[test]
    fn keeps_only_clean_masters() {
        let nodes = parse_cluster_nodes(TOPOLOGY);
        assert_eq!(
            nodes,
            vec![
                Node::new("127.0.0.1", 30003),
                Node::new("127.0.0.1", 30002),
                Node::new("127.0.0.1", 30001),
            ]
        );
    }

    #[test]
    fn sorts_by_node_id_not_by_address() {
        let nodes = parse_cluster_nodes(TOPOLOGY);
        // 292f... < 67ed... < e7d1... lexicographically, so 30003 leads
        // even though its port is the highest of the three.
        assert_eq!(nodes[0].port, 30003);
        assert_eq!(nodes[2].port, 30001);
    }

    #[test]
    fn skips_malformed_lines() {
        let raw = "not-enough-fields\n\
                   abc 127.0.0.1:7000@17000 master - 0 0 1 connected\n";
        assert_eq!(parse_cluster_nodes(raw), vec![Node::new("127.0.0.1", 7000)]);
    }

    #[test]
    fn empty_input_yields_no_nodes() {
        assert!(parse_cluster_nodes("").is_empty());
    }
}
