//! Blocklist tables and the `PolicyAuthority` handle that owns them.
//!
//! Grounded in the teacher's directory-cache idiom: a whole blocklist
//! snapshot lives behind an `RwLock` and is replaced atomically on reload,
//! never mutated table-by-table, so readers never observe a half-applied
//! update.

use crate::error::{RaError, Result};
use crate::types::{ChallengeType, Identifier, IdentifierType};
use ipnet::IpNet;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// On-disk shape of a blocklist policy file (§4.2), loaded via `serde_yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
struct BlockListsFile {
    #[serde(default)]
    high_risk_blocked_names: Vec<String>,
    #[serde(default)]
    admin_blocked_names: Vec<String>,
    #[serde(default)]
    exact_blocked_names: Vec<String>,
    #[serde(default)]
    admin_blocked_prefixes: Vec<String>,
}

/// The loaded, queryable form of a blocklist snapshot.
#[derive(Debug, Clone, Default)]
pub struct BlockLists {
    /// Suffix-matched: blocks the name and all of its subdomains.
    high_risk_blocked_names: HashSet<String>,
    /// Suffix-matched, same semantics as `high_risk_blocked_names` but
    /// administratively curated rather than threat-intel sourced.
    admin_blocked_names: HashSet<String>,
    /// Exact-matched only; a wildcard entry `*.example.com` blocks exactly
    /// that wildcard name, not `example.com` itself or other subdomains.
    exact_blocked_names: HashSet<String>,
    admin_blocked_prefixes: Vec<IpNet>,
}

impl BlockLists {
    fn from_file(file: BlockListsFile) -> Result<Self> {
        let admin_blocked_prefixes = file
            .admin_blocked_prefixes
            .iter()
            .map(|s| s.parse::<IpNet>().map_err(|e| RaError::internal(format!("bad CIDR '{s}': {e}"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            high_risk_blocked_names: file.high_risk_blocked_names.into_iter().map(|s| s.to_lowercase()).collect(),
            admin_blocked_names: file.admin_blocked_names.into_iter().map(|s| s.to_lowercase()).collect(),
            exact_blocked_names: file.exact_blocked_names.into_iter().map(|s| s.to_lowercase()).collect(),
            admin_blocked_prefixes,
        })
    }

    fn suffix_blocked(set: &HashSet<String>, name: &str) -> bool {
        set.iter().any(|blocked| name == blocked || name.ends_with(&format!(".{blocked}")))
    }

    fn check_name(&self, ident: &Identifier) -> Result<()> {
        let name = &ident.value;

        if self.exact_blocked_names.contains(name) {
            return Err(RaError::rejected_identifier(
                format!("{name} is exactly blocked by policy"),
                vec![],
            ));
        }

        if Self::suffix_blocked(&self.high_risk_blocked_names, ident.base_domain()) {
            return Err(RaError::rejected_identifier(
                format!("{name} matches a high-risk blocked name"),
                vec![],
            ));
        }

        if Self::suffix_blocked(&self.admin_blocked_names, ident.base_domain()) {
            return Err(RaError::rejected_identifier(
                format!("{name} matches an administratively blocked name"),
                vec![],
            ));
        }

        Ok(())
    }

    fn check_ip(&self, addr: IpAddr) -> Result<()> {
        if self.admin_blocked_prefixes.iter().any(|net| net.contains(&addr)) {
            return Err(RaError::rejected_identifier(
                format!("{addr} falls within an administratively blocked prefix"),
                vec![],
            ));
        }
        Ok(())
    }
}

/// Owns the current blocklist snapshot and the set of globally enabled
/// identifier/challenge types. Cheap to clone (`Arc` internally); reload
/// swaps the whole snapshot under a write lock so concurrent readers never
/// see a partially-updated table set.
#[derive(Clone)]
pub struct PolicyAuthority {
    lists: Arc<RwLock<BlockLists>>,
    pub(super) enabled_identifier_types: HashSet<IdentifierType>,
    pub(super) enabled_challenge_types: HashSet<ChallengeType>,
}

impl PolicyAuthority {
    pub fn new(lists: BlockLists, identifier_types: HashSet<IdentifierType>, challenge_types: HashSet<ChallengeType>) -> Self {
        Self {
            lists: Arc::new(RwLock::new(lists)),
            enabled_identifier_types: identifier_types,
            enabled_challenge_types: challenge_types,
        }
    }

    /// A policy authority with empty blocklists and every identifier/
    /// challenge type enabled — used in tests and as a safe starting point
    /// before the first `load_ident_policy_file` call.
    pub fn new_unblocked() -> Self {
        Self::new(
            BlockLists::default(),
            HashSet::from([IdentifierType::Dns, IdentifierType::Ip]),
            HashSet::from([
                ChallengeType::Http01,
                ChallengeType::Dns01,
                ChallengeType::TlsAlpn01,
                ChallengeType::DnsAccount01,
            ]),
        )
    }

    /// `LoadIdentPolicyFile(path)`: parses a YAML blocklist document and
    /// atomically replaces the current snapshot.
    pub fn load_ident_policy_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let file: BlockListsFile =
            serde_yaml::from_str(&content).map_err(|e| RaError::internal(format!("bad policy file: {e}")))?;
        let lists = BlockLists::from_file(file)?;
        let mut guard = self.lists.write().expect("policy lock poisoned");
        *guard = lists;
        Ok(())
    }

    pub(super) fn check_blocklists(&self, ident: &Identifier) -> Result<()> {
        let guard = self.lists.read().expect("policy lock poisoned");
        guard.check_name(ident)?;
        if let Ok(addr) = ident.value.parse::<IpAddr>() {
            guard.check_ip(addr)?;
        }
        Ok(())
    }
}
