//! Process configuration for the `controller-manager` binary (§6: "configuration is
//! supplied via environment and flags"). Kept minimal since the concrete cloud/HTTP
//! clients that would need most of a real configuration surface are out of scope here.

use std::time::Duration;

fn env_duration_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(default)
}

/// Process-wide knobs, read once at startup. Every field has a conservative default so
/// the binary runs standalone with no environment configured at all.
#[derive(Debug, Clone)]
pub struct Config {
    /// §4.3/§4.4: how long an `ExpiringWatcher` runs before forcing a relist.
    pub relist_period: Duration,
    /// §4.4: how often the informer checks whether any handler's resync is due.
    pub resync_check_period: Duration,
    /// §4.7: the `TimeBasedCooldown` quiet period between syncs of the same key.
    pub cooldown_period: Duration,
    /// §4.8: worker tasks per controller.
    pub worker_count: usize,
    /// §4.8: how often the safety-net full-cluster-list runs.
    pub cluster_relist_period: Duration,
    /// §4.11: how often the orphan sweep and mismatch detector run.
    pub sweep_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relist_period: Duration::from_secs(10 * 60),
            resync_check_period: Duration::from_secs(60),
            cooldown_period: Duration::from_secs(30),
            worker_count: 4,
            cluster_relist_period: Duration::from_secs(5 * 60),
            sweep_period: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to [`Config::default`]'s
    /// values for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            relist_period: env_duration_secs("RP_RELIST_PERIOD_SECS", defaults.relist_period),
            resync_check_period: env_duration_secs("RP_RESYNC_CHECK_PERIOD_SECS", defaults.resync_check_period),
            cooldown_period: env_duration_secs("RP_COOLDOWN_PERIOD_SECS", defaults.cooldown_period),
            worker_count: env_usize("RP_WORKER_COUNT", defaults.worker_count),
            cluster_relist_period: env_duration_secs("RP_CLUSTER_RELIST_PERIOD_SECS", defaults.cluster_relist_period),
            sweep_period: env_duration_secs("RP_SWEEP_PERIOD_SECS", defaults.sweep_period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_when_env_unset() {
        let cfg = Config::default();
        assert_eq!(cfg.worker_count, 4);
    }
}
