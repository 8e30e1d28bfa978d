//! The GCRA (Generic Cell Rate Algorithm) rate-limit engine (§4.3).
//!
//! Each `(limit, bucket key)` pair is tracked as a single theoretical arrival
//! time (TAT) in nanoseconds since the Unix epoch. `Check` peeks without
//! committing and fails open on store error; `Spend` commits and fails
//! closed; `Refund` relaxes a bucket after a downstream step undoes work
//! that had already been charged (§9: best-effort, not guaranteed to survive
//! a process restart — see the design ledger).

pub mod store;

pub use store::{LimiterStore, MemoryLimiterStore};
#[cfg(feature = "redis-cache")]
pub use store::RedisLimiterStore;

use crate::error::{RaError, Result};
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// The fixed set of limits this engine tracks (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitName {
    /// Per (registration, identifier domain) new-order attempts.
    NewOrdersPerAccountPerDomain,
    /// Per registered-domain certificates issued, across all accounts.
    CertificatesPerDomain,
    /// Per exact FQDN set, across renewals.
    CertificatesPerFqdnSet,
    /// Per source IP, new-registration creation.
    NewRegistrationsPerIp,
    /// Per source /48 IPv6 range, new-registration creation — a single
    /// client can be handed an effectively unlimited number of /128s out of
    /// one /48, so the per-address limit alone doesn't bound it.
    NewRegistrationsPerIpv6Range,
    /// Per (registration, identifier) failed validation attempts, feeding
    /// zombie-client auto-pause.
    FailedAuthorizationsPerAccountPerDomain,
    /// Per account, pending authorizations outstanding at once.
    PendingAuthorizationsPerAccount,
}

/// Whether a limit fails open (allow) or closed (deny) when its backing
/// store is unreachable. `Check` calls are always fail-open by default;
/// `Spend` calls the configured mode, since an unspent charge is safer to
/// lose than to silently skip (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Open,
    Closed,
}

/// Derived GCRA parameters for one limit: `count` events allowed per
/// `period`, with up to `burst` additional events permitted instantly.
#[derive(Debug, Clone, Copy)]
pub struct LimitConfig {
    pub count: u64,
    pub burst: u64,
    pub period: Duration,
    pub failure_mode: FailureMode,
}

impl LimitConfig {
    /// Nanoseconds between each permitted event at steady state
    /// (`emissionIntervalNs = period/count`, §4.3).
    fn emission_interval_nanos(&self) -> i128 {
        (self.period.as_nanos() / self.count.max(1) as u128).max(1) as i128
    }

    fn burst_offset_nanos(&self) -> i128 {
        self.emission_interval_nanos() * self.burst as i128
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed,
    Denied { retry_after: Duration },
}

/// A per-bucket override record (§4.3/§6), taking precedence over a limit's
/// default `LimitConfig` for one exact `(limit, bucket_key)` pair.
#[derive(Debug, Clone, serde::Deserialize)]
struct OverrideEntry {
    limit: LimitName,
    bucket_key: String,
    count: u64,
    burst: u64,
    period_nanos: u64,
    #[serde(default = "default_override_enabled")]
    enabled: bool,
}

fn default_override_enabled() -> bool {
    true
}

/// The limiter engine: per-limit configuration plus a pluggable backing
/// store for TAT state.
pub struct Limiter {
    configs: HashMap<LimitName, LimitConfig>,
    overrides: RwLock<HashMap<(LimitName, String), LimitConfig>>,
    store: Arc<dyn LimiterStore>,
}

impl Limiter {
    pub fn new(configs: HashMap<LimitName, LimitConfig>, store: Arc<dyn LimiterStore>) -> Self {
        Self {
            configs,
            overrides: RwLock::new(HashMap::new()),
            store,
        }
    }

    /// Builds a limiter from its static per-name defaults plus whatever
    /// override document `limiter_config.overrides_path` names, if any
    /// (§4.3/§6).
    pub fn from_config(
        configs: HashMap<LimitName, LimitConfig>,
        store: Arc<dyn LimiterStore>,
        limiter_config: &crate::config::LimiterConfig,
    ) -> Result<Self> {
        let limiter = Self::new(configs, store);
        if let Some(path) = &limiter_config.overrides_path {
            limiter.load_overrides_file(path)?;
        }
        Ok(limiter)
    }

    /// Installs a single override, taking precedence over `limit`'s default
    /// `LimitConfig` for this exact bucket key until the next reload.
    pub fn set_override(&self, limit: LimitName, bucket_key: impl Into<String>, cfg: LimitConfig) {
        self.overrides
            .write()
            .expect("limiter overrides lock poisoned")
            .insert((limit, bucket_key.into()), cfg);
    }

    /// `LoadOverrides(path contents)`: parses the override YAML document
    /// (a list of `{limit, bucketKey, count, burst, periodNanos, enabled}`
    /// entries) and atomically replaces the whole override table, mirroring
    /// `PolicyAuthority::load_ident_policy_file`'s whole-snapshot swap.
    pub fn load_overrides_from_str(&self, yaml: &str) -> Result<()> {
        let entries: Vec<OverrideEntry> =
            serde_yaml::from_str(yaml).map_err(|e| RaError::internal(format!("bad rate-limit override file: {e}")))?;

        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            if !entry.enabled {
                continue;
            }
            let failure_mode = self
                .configs
                .get(&entry.limit)
                .map(|c| c.failure_mode)
                .unwrap_or(FailureMode::Closed);
            table.insert(
                (entry.limit, entry.bucket_key),
                LimitConfig {
                    count: entry.count,
                    burst: entry.burst,
                    period: Duration::from_nanos(entry.period_nanos),
                    failure_mode,
                },
            );
        }

        *self.overrides.write().expect("limiter overrides lock poisoned") = table;
        Ok(())
    }

    /// `LoadOverridesFile(path)`: reads and applies the override document at
    /// `path`.
    pub fn load_overrides_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.load_overrides_from_str(&content)
    }

    fn config_for(&self, limit: LimitName, bucket_key: &str) -> Result<LimitConfig> {
        if let Some(cfg) = self
            .overrides
            .read()
            .expect("limiter overrides lock poisoned")
            .get(&(limit, bucket_key.to_string()))
        {
            return Ok(*cfg);
        }
        self.configs
            .get(&limit)
            .copied()
            .ok_or_else(|| RaError::internal(format!("no configuration for limit {limit:?}")))
    }

    /// `Check(limit, bucketKey)`: evaluates without committing. Fails open —
    /// a store error is treated as `Allowed` rather than blocking issuance
    /// on a rate-limiter outage.
    pub async fn check(&self, limit: LimitName, bucket_key: &str, now: Timestamp) -> Result<RateLimitOutcome> {
        let cfg = self.config_for(limit, bucket_key)?;
        match self.store.get_tat(limit, bucket_key).await {
            Ok(tat) => Ok(Self::evaluate(&cfg, tat, now)),
            Err(_) => Ok(RateLimitOutcome::Allowed),
        }
    }

    /// `Spend(limit, bucketKey)`: evaluates and, if allowed, commits the new
    /// TAT. Honors the limit's configured failure mode on store error.
    pub async fn spend(&self, limit: LimitName, bucket_key: &str, now: Timestamp) -> Result<RateLimitOutcome> {
        let cfg = self.config_for(limit, bucket_key)?;
        let tat = match self.store.get_tat(limit, bucket_key).await {
            Ok(tat) => tat,
            Err(e) => {
                return match cfg.failure_mode {
                    FailureMode::Open => Ok(RateLimitOutcome::Allowed),
                    FailureMode::Closed => Err(e),
                };
            }
        };

        let outcome = Self::evaluate(&cfg, tat, now);
        if let RateLimitOutcome::Allowed = outcome {
            let new_tat = Self::advance(&cfg, tat, now);
            if let Err(e) = self.store.set_tat(limit, bucket_key, new_tat).await {
                return match cfg.failure_mode {
                    FailureMode::Open => Ok(RateLimitOutcome::Allowed),
                    FailureMode::Closed => Err(e),
                };
            }
        }
        Ok(outcome)
    }

    /// `BatchCheckAndSpend(limit, bucketKeys)`: all-or-nothing across several
    /// bucket keys sharing one limit (e.g. every FQDN on a multi-name
    /// order).
    pub async fn batch_check_and_spend(&self, limit: LimitName, bucket_keys: &[String], now: Timestamp) -> Result<RateLimitOutcome> {
        let items: Vec<(LimitName, String)> = bucket_keys.iter().map(|k| (limit, k.clone())).collect();
        self.check_and_spend_many(&items, now).await
    }

    /// `CheckAndSpendMany(items)`: all-or-nothing across several
    /// `(limit, bucketKey)` pairs, possibly spanning more than one
    /// `LimitName` (e.g. `NewOrdersPerAccountPerDomain` alongside
    /// `CertificatesPerDomain` for one `NewOrder` call, §4.6 step 4). Every
    /// item is checked before any is spent; if a later spend loses a race or
    /// errors, every bucket already spent in this call is refunded so a
    /// partial spend never lingers.
    pub async fn check_and_spend_many(&self, items: &[(LimitName, String)], now: Timestamp) -> Result<RateLimitOutcome> {
        for (limit, key) in items {
            if let RateLimitOutcome::Denied { retry_after } = self.check(*limit, key, now).await? {
                return Ok(RateLimitOutcome::Denied { retry_after });
            }
        }

        let mut spent = Vec::with_capacity(items.len());
        for (limit, key) in items {
            match self.spend(*limit, key, now).await {
                Ok(RateLimitOutcome::Allowed) => spent.push((*limit, key.clone())),
                Ok(RateLimitOutcome::Denied { retry_after }) => {
                    for (l, k) in &spent {
                        self.refund(*l, k, now).await;
                    }
                    return Ok(RateLimitOutcome::Denied { retry_after });
                }
                Err(e) => {
                    for (l, k) in &spent {
                        self.refund(*l, k, now).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(RateLimitOutcome::Allowed)
    }

    /// `Refund(limit, bucketKey)`: relaxes a bucket by one emission interval,
    /// undoing a prior spend, floored at `now - burstOffset` so a refund on a
    /// near-empty bucket can't relax it past wide-open. Best-effort: a store
    /// error here is always swallowed, since failing to refund only makes
    /// the caller's next request slightly more conservative, never incorrect.
    pub async fn refund(&self, limit: LimitName, bucket_key: &str, now: Timestamp) {
        let Ok(cfg) = self.config_for(limit, bucket_key) else { return };
        if let Ok(tat) = self.store.get_tat(limit, bucket_key).await {
            let floor_nanos = now.as_nanosecond() - cfg.burst_offset_nanos();
            let relaxed_nanos = (tat.as_nanosecond() - cfg.emission_interval_nanos()).max(floor_nanos);
            let relaxed = Timestamp::from_nanosecond(relaxed_nanos).unwrap_or(now);
            let _ = self.store.set_tat(limit, bucket_key, relaxed).await;
        }
    }

    fn evaluate(cfg: &LimitConfig, tat: Timestamp, now: Timestamp) -> RateLimitOutcome {
        let allow_at_nanos = tat.as_nanosecond() - cfg.burst_offset_nanos();
        let now_nanos = now.as_nanosecond();

        if now_nanos >= allow_at_nanos {
            RateLimitOutcome::Allowed
        } else {
            let wait_nanos = (allow_at_nanos - now_nanos).max(0);
            let wait_nanos = u64::try_from(wait_nanos).unwrap_or(u64::MAX);
            RateLimitOutcome::Denied {
                retry_after: Duration::from_nanos(wait_nanos),
            }
        }
    }

    fn advance(cfg: &LimitConfig, tat: Timestamp, now: Timestamp) -> Timestamp {
        let base_nanos = tat.as_nanosecond().max(now.as_nanosecond());
        let new_nanos = base_nanos + cfg.emission_interval_nanos();
        Timestamp::from_nanosecond(new_nanos).unwrap_or(tat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn cfg(count: u64, burst: u64, period_secs: u64, mode: FailureMode) -> LimitConfig {
        LimitConfig {
            count,
            burst,
            period: Duration::from_secs(period_secs),
            failure_mode: mode,
        }
    }

    fn limiter(cfg: LimitConfig) -> Limiter {
        let mut configs = HashMap::new();
        configs.insert(LimitName::NewOrdersPerAccountPerDomain, cfg);
        Limiter::new(configs, Arc::new(MemoryLimiterStore::new()))
    }

    #[tokio::test]
    async fn allows_requests_within_burst() {
        let l = limiter(cfg(1, 5, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        for _ in 0..5 {
            let outcome = l
                .spend(LimitName::NewOrdersPerAccountPerDomain, "acct:1/example.com", now)
                .await
                .unwrap();
            assert_eq!(outcome, RateLimitOutcome::Allowed);
        }
    }

    #[tokio::test]
    async fn denies_once_burst_is_exhausted() {
        let l = limiter(cfg(1, 0, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let first = l
            .spend(LimitName::NewOrdersPerAccountPerDomain, "acct:1/example.com", now)
            .await
            .unwrap();
        assert_eq!(first, RateLimitOutcome::Allowed);
        let second = l
            .spend(LimitName::NewOrdersPerAccountPerDomain, "acct:1/example.com", now)
            .await
            .unwrap();
        assert!(matches!(second, RateLimitOutcome::Denied { .. }));
    }

    #[tokio::test]
    async fn refund_relaxes_a_spent_bucket() {
        let l = limiter(cfg(1, 0, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let key = "acct:1/example.com";
        l.spend(LimitName::NewOrdersPerAccountPerDomain, key, now).await.unwrap();
        l.refund(LimitName::NewOrdersPerAccountPerDomain, key, now).await;
        let outcome = l.spend(LimitName::NewOrdersPerAccountPerDomain, key, now).await.unwrap();
        assert_eq!(outcome, RateLimitOutcome::Allowed);
    }

    #[tokio::test]
    async fn batch_check_and_spend_denies_whole_batch_on_first_failure() {
        let l = limiter(cfg(1, 0, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let keys = vec!["a.example.com".to_string(), "b.example.com".to_string()];

        l.spend(LimitName::NewOrdersPerAccountPerDomain, &keys[0], now).await.unwrap();

        let outcome = l
            .batch_check_and_spend(LimitName::NewOrdersPerAccountPerDomain, &keys, now)
            .await
            .unwrap();
        assert!(matches!(outcome, RateLimitOutcome::Denied { .. }));

        // b.example.com must not have been spent, since check failed before spend.
        let check_b = l
            .check(LimitName::NewOrdersPerAccountPerDomain, &keys[1], now)
            .await
            .unwrap();
        assert_eq!(check_b, RateLimitOutcome::Allowed);
    }

    #[tokio::test]
    async fn override_replaces_the_default_config_for_one_bucket_only() {
        let l = limiter(cfg(1, 0, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        l.set_override(
            LimitName::NewOrdersPerAccountPerDomain,
            "vip:example.com",
            cfg(10, 10, 3600, FailureMode::Closed),
        );

        for _ in 0..5 {
            let outcome = l.spend(LimitName::NewOrdersPerAccountPerDomain, "vip:example.com", now).await.unwrap();
            assert_eq!(outcome, RateLimitOutcome::Allowed);
        }

        // A bucket with no override still sees the tight default.
        l.spend(LimitName::NewOrdersPerAccountPerDomain, "plain:example.com", now).await.unwrap();
        let denied = l.spend(LimitName::NewOrdersPerAccountPerDomain, "plain:example.com", now).await.unwrap();
        assert!(matches!(denied, RateLimitOutcome::Denied { .. }));
    }

    #[tokio::test]
    async fn load_overrides_from_str_parses_and_swaps_the_table() {
        let l = limiter(cfg(1, 0, 3600, FailureMode::Closed));
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let yaml = r#"
- limit: newOrdersPerAccountPerDomain
  bucketKey: "vip:example.com"
  count: 10
  burst: 10
  periodNanos: 3600000000000
  enabled: true
"#;
        l.load_overrides_from_str(yaml).unwrap();
        for _ in 0..5 {
            let outcome = l.spend(LimitName::NewOrdersPerAccountPerDomain, "vip:example.com", now).await.unwrap();
            assert_eq!(outcome, RateLimitOutcome::Allowed);
        }
    }

    #[tokio::test]
    async fn check_and_spend_many_denies_across_limits_without_partial_spend() {
        let mut configs = HashMap::new();
        configs.insert(LimitName::NewOrdersPerAccountPerDomain, cfg(100, 100, 3600, FailureMode::Closed));
        configs.insert(LimitName::CertificatesPerDomain, cfg(1, 0, 3600, FailureMode::Closed));
        let l = Limiter::new(configs, Arc::new(MemoryLimiterStore::new()));
        let now = Timestamp::from_second(1_700_000_000).unwrap();

        // Exhaust CertificatesPerDomain for example.com ahead of time.
        l.spend(LimitName::CertificatesPerDomain, "example.com", now).await.unwrap();

        let items = vec![
            (LimitName::NewOrdersPerAccountPerDomain, "1:example.com".to_string()),
            (LimitName::CertificatesPerDomain, "example.com".to_string()),
        ];
        let outcome = l.check_and_spend_many(&items, now).await.unwrap();
        assert!(matches!(outcome, RateLimitOutcome::Denied { .. }));

        // NewOrdersPerAccountPerDomain must not have been left spent: a fresh
        // account should still be able to spend its own full burst.
        let check = l
            .check(LimitName::NewOrdersPerAccountPerDomain, "1:example.com", now)
            .await
            .unwrap();
        assert_eq!(check, RateLimitOutcome::Allowed);
    }
}
