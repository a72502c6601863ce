use std::time::Instant;

use clap::ValueEnum;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::error::MonitorError;
use crate::metrics::{LatencyRecorder, LatencySummary};

/// Shape of the synthetic values written by the seeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    /// Plain string value of `--value-size` random bytes.
    String,
    /// Small hash: random payload field plus sequence and timestamp.
    Hash,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Hash => "hash",
        }
    }
}

pub struct SeedConfig {
    pub keys: u64,
    pub value_kind: ValueKind,
    pub value_size: usize,
}

/// Everything the seed run learned, ready for the text block or `--json`.
#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub keys: u64,
    pub value_kind: &'static str,
    pub value_size: usize,
    pub total_secs: f64,
    pub write_secs: f64,
    pub latency: LatencySummary,
    pub memory_before: u64,
    pub memory_after: u64,
    pub memory_growth: u64,
    pub bytes_per_key: u64,
}

impl SeedReport {
    pub fn print_human(&self) {
        println!("-----------------------------------");
        println!("* Keys written: {}", self.keys);
        println!(
            "* Value type: {} ({} payload bytes)",
            self.value_kind, self.value_size
        );
        println!(
            "* Wall time: {:.2}s ({:.2}s inside Redis writes)",
            self.total_secs, self.write_secs
        );
        println!(
            "* Write latency (us): avg={:.1} min={} max={} p50={} p95={} p99={}",
            self.latency.mean_us,
            self.latency.min_us,
            self.latency.max_us,
            self.latency.p50_us,
            self.latency.p95_us,
            self.latency.p99_us,
        );
        println!(
            "* Memory: {} -> {} bytes (+{}, {} bytes/key)",
            self.memory_before, self.memory_after, self.memory_growth, self.bytes_per_key
        );
        println!("-----------------------------------");
    }
}

/// Writes `cfg.keys` synthetic keys one at a time, timing each write, and
/// measures `used_memory` growth across the whole run.
///
/// Key names carry a fresh run id so repeated runs never collide; payloads
/// come from a fixed-seed RNG, so two runs of the same size cost the same.
pub async fn run(mut conn: ConnectionManager, cfg: SeedConfig) -> Result<SeedReport, MonitorError> {
    let run_id = short_run_id();
    let mut rng = StdRng::seed_from_u64(42);
    let mut recorder = LatencyRecorder::new();

    let memory_before = used_memory(&mut conn).await?;
    let started = Instant::now();

    for seq in 0..cfg.keys {
        let key = format!("bench:{run_id}:{seq:08}");
        let payload = random_payload(&mut rng, cfg.value_size);

        let t0 = Instant::now();
        match cfg.value_kind {
            ValueKind::String => {
                let _: () = redis::cmd("SET")
                    .arg(&key)
                    .arg(&payload)
                    .query_async(&mut conn)
                    .await?;
            }
            ValueKind::Hash => {
                let _: () = redis::cmd("HSET")
                    .arg(&key)
                    .arg("payload")
                    .arg(&payload)
                    .arg("seq")
                    .arg(seq)
                    .arg("created_at")
                    .arg(chrono::Utc::now().to_rfc3339())
                    .query_async(&mut conn)
                    .await?;
            }
        }
        recorder.record(t0.elapsed().as_micros() as u64);
    }

    let total_secs = started.elapsed().as_secs_f64();
    let memory_after = used_memory(&mut conn).await?;
    let (memory_growth, bytes_per_key) = memory_growth(memory_before, memory_after, cfg.keys);

    Ok(SeedReport {
        keys: cfg.keys,
        value_kind: cfg.value_kind.label(),
        value_size: cfg.value_size,
        total_secs,
        write_secs: recorder.total_us() as f64 / 1_000_000.0,
        latency: recorder.summary(),
        memory_before,
        memory_after,
        memory_growth,
        bytes_per_key,
    })
}

async fn used_memory(conn: &mut ConnectionManager) -> redis::RedisResult<u64> {
    let raw: String = redis::cmd("INFO").arg("memory").query_async(conn).await?;
    Ok(parse_used_memory(&raw).unwrap_or(0))
}

/// Pulls `used_memory:<bytes>` out of an `INFO memory` payload.
/// The match is on the exact field, not the `used_memory_*` family.
fn parse_used_memory(raw: &str) -> Option<u64> {
    raw.lines().find_map(|line| {
        line.trim()
            .strip_prefix("used_memory:")
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Server shrinking mid-run (expiry, eviction) reports zero growth rather
/// than wrapping.
fn memory_growth(before: u64, after: u64, keys: u64) -> (u64, u64) {
    let growth = after.saturating_sub(before);
    let per_key = if keys == 0 { 0 } else { growth / keys };
    (growth, per_key)
}

fn random_payload(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn short_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn used_memory_field_is_matched_exactly() {
        let info = "# Memory\r\n\
                    used_memory:1048576\r\n\
                    used_memory_human:1.00M\r\n\
                    used_memory_rss:2097152\r\n";
        assert_eq!(parse_used_memory(info), Some(1_048_576));
    }

    #[test]
    fn missing_used_memory_yields_none() {
        assert_eq!(parse_used_memory("# Memory\r\nmaxmemory:0\r\n"), None);
    }

    #[test]
    fn growth_saturates_when_server_shrank() {
        assert_eq!(memory_growth(2000, 1500, 10), (0, 0));
    }

    #[test]
    fn growth_is_divided_per_key() {
        assert_eq!(memory_growth(1000, 2000, 10), (1000, 100));
        assert_eq!(memory_growth(1000, 2000, 0), (1000, 0));
    }

    #[test]
    fn payload_has_requested_size_and_charset() {
        let mut rng = StdRng::seed_from_u64(1);
        let payload = random_payload(&mut rng, 64);
        assert_eq!(payload.len(), 64);
        assert!(payload.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn fixed_seed_reproduces_payloads() {
        let a = random_payload(&mut StdRng::seed_from_u64(42), 32);
        let b = random_payload(&mut StdRng::seed_from_u64(42), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn run_ids_are_short_and_distinct() {
        let a = short_run_id();
        let b = short_run_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
