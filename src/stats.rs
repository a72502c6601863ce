use std::collections::{BTreeMap, BTreeSet, HashMap};

// ─── Constants ───────────────────────────────────────────────────

/// Catch-all bucket for commands that are not tracked by name.
pub const CMD_ETC: &str = "ETC";
/// Sum of every call seen, tracked or not.
pub const CMD_TOTAL: &str = "TOTAL";

/// Administrative / replication / pubsub commands excluded by default.
/// Only consulted when the allow-list is empty.
pub const IGNORE_CMDS: &[&str] = &[
    "PSYNC", "REPLCONF", "COMMAND",
    "SLOWLOG", "CLUSTER", "INFO",
    "AUTH", "PING", "CONFIG",
    "MONITOR", "CLIENT", "SLAVEOF",
    "PUBLISH", "SUBSCRIBE", "UNSUBSCRIBE",
    "PSUBSCRIBE", "DBSIZE", "SELECT",
];

/// One sample: command name → cumulative call count, plus the `ETC` and
/// `TOTAL` buckets. `BTreeMap` so iteration order matches output order.
pub type Sample = BTreeMap<String, u64>;

// ─── CSV parsing ─────────────────────────────────────────────────

/// Splits a user-supplied command list: trimmed, upper-cased, empties dropped.
pub fn parse_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

// ─── Classification ──────────────────────────────────────────────

/// Decides whether a command keeps its own key or folds into `ETC`.
///
/// A non-empty allow-list wins outright: anything not on it folds into
/// `ETC` and the deny-list is never consulted.
#[derive(Debug, Clone, Default)]
pub struct CommandFilter {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl CommandFilter {
    pub fn new(
        allow: impl IntoIterator<Item = String>,
        deny: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            allow: allow.into_iter().collect(),
            deny: deny.into_iter().collect(),
        }
    }

    pub fn is_tracked(&self, command: &str) -> bool {
        if self.allow.is_empty() {
            !self.deny.contains(command)
        } else {
            self.allow.contains(command)
        }
    }
}

// ─── INFO commandstats parsing ───────────────────────────────────

/// Parses the raw `INFO commandstats` payload into `(NAME, calls)` pairs.
///
/// Lines look like `cmdstat_get:calls=21,usec=175,usec_per_call=8.33`.
/// The `cmdstat_` prefix is stripped and the name upper-cased; section
/// headers, blanks, and anything malformed are skipped.
pub fn parse_command_stats(raw: &str) -> Vec<(String, u64)> {
    raw.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("cmdstat_")?;
            let (name, fields) = rest.split_once(':')?;
            let calls = fields
                .split(',')
                .find_map(|f| f.strip_prefix("calls="))?
                .parse()
                .ok()?;
            Some((name.to_uppercase(), calls))
        })
        .collect()
}

// ─── Aggregation ─────────────────────────────────────────────────

/// Folds one node's raw counters into a sample.
///
/// Tracked commands keep their own key, everything else adds to `ETC`,
/// and every count adds to `TOTAL`. The two buckets are always present,
/// so a successful fetch never yields an empty sample.
pub fn summarize(raw: &[(String, u64)], filter: &CommandFilter) -> Sample {
    let mut sample = Sample::new();
    sample.insert(CMD_ETC.to_string(), 0);
    sample.insert(CMD_TOTAL.to_string(), 0);

    for (name, calls) in raw {
        if filter.is_tracked(name) {
            *sample.entry(name.clone()).or_insert(0) += calls;
        } else if let Some(etc) = sample.get_mut(CMD_ETC) {
            *etc += calls;
        }
        if let Some(total) = sample.get_mut(CMD_TOTAL) {
            *total += calls;
        }
    }

    sample
}

/// Sums per-node samples into the aggregated sample for one iteration.
/// With zero successful nodes the aggregate is `{ETC: 0, TOTAL: 0}`.
pub fn merge(parts: impl IntoIterator<Item = Sample>) -> Sample {
    let mut merged = Sample::new();
    merged.insert(CMD_ETC.to_string(), 0);
    merged.insert(CMD_TOTAL.to_string(), 0);

    for part in parts {
        for (name, calls) in part {
            *merged.entry(name).or_insert(0) += calls;
        }
    }

    merged
}

// ─── Delta tracking ──────────────────────────────────────────────

/// Holds the previous iteration's aggregated sample and turns cumulative
/// counts into per-interval rates.
///
/// A key that was never observed before reports a delta of 0 for its first
/// iteration; presence is tracked separately from value, so a counter that
/// was genuinely at zero still yields a true delta once it moves. Deltas
/// are signed: a counter regression (node restart between iterations)
/// shows up as a negative rate.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    prev: HashMap<String, u64>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, current: &Sample) -> BTreeMap<String, i64> {
        let mut deltas = BTreeMap::new();
        for (name, &value) in current {
            let delta = match self.prev.get(name) {
                Some(&prev) => value as i64 - prev as i64,
                None => 0,
            };
            deltas.insert(name.clone(), delta);
            self.prev.insert(name.clone(), value);
        }
        deltas
    }
}

// ─── Output formatting ───────────────────────────────────────────

/// Renders one summary line:
///
/// `[YYYY-MM-DD HH:MM:SS] (<success>) KEY1=d1, KEY2=d2, ..., ETC=d, TOTAL=d`
///
/// Non-synthetic keys come out lexicographically sorted; `ETC` and `TOTAL`
/// always close the line.
pub fn format_line(timestamp: &str, success: usize, deltas: &BTreeMap<String, i64>) -> String {
    let mut fields: Vec<String> = deltas
        .iter()
        .filter(|(name, _)| name.as_str() != CMD_ETC && name.as_str() != CMD_TOTAL)
        .map(|(name, delta)| format!("{name}={delta}"))
        .collect();

    for bucket in [CMD_ETC, CMD_TOTAL] {
        let delta = deltas.get(bucket).copied().unwrap_or(0);
        fields.push(format!("{bucket}={delta}"));
    }

    format!("[{timestamp}] ({success}) {}", fields.join(", "))
}
