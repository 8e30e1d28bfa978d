//! Policy Authority (PA): identifier well-formedness, blocklists, and
//! challenge-type selection (§4.2).

pub mod blocklist;
pub mod validation;

pub use blocklist::{BlockLists, PolicyAuthority};
pub use validation::{is_valid_dns_identifier, is_valid_ip_identifier};

use crate::error::{RaError, Result, SubProblem};
use crate::types::{ChallengeType, Identifier, IdentifierType};

impl PolicyAuthority {
    /// `WellFormedIdentifiers(idents)`.
    pub fn well_formed_identifiers(&self, idents: &[Identifier]) -> Result<()> {
        let mut subproblems = Vec::new();
        for ident in idents {
            if let Err(e) = self.well_formed_one(ident) {
                subproblems.push(SubProblem {
                    identifier: ident.value.clone(),
                    kind: e.kind,
                    detail: e.detail,
                });
            }
        }
        if subproblems.is_empty() {
            Ok(())
        } else {
            Err(RaError::rejected_identifier(
                format!("{} identifier(s) rejected", subproblems.len()),
                subproblems,
            ))
        }
    }

    fn well_formed_one(&self, ident: &Identifier) -> Result<()> {
        match ident.id_type {
            IdentifierType::Dns => is_valid_dns_identifier(&ident.value),
            IdentifierType::Ip => is_valid_ip_identifier(&ident.value),
        }
    }

    /// `WillingToIssue(idents)`: well-formedness plus blocklist checks.
    pub fn willing_to_issue(&self, idents: &[Identifier]) -> Result<()> {
        self.well_formed_identifiers(idents)?;

        let mut subproblems = Vec::new();
        for ident in idents {
            if ident.id_type != IdentifierType::Dns {
                continue;
            }
            if let Err(e) = self.check_blocklists(ident) {
                subproblems.push(SubProblem {
                    identifier: ident.value.clone(),
                    kind: e.kind,
                    detail: e.detail,
                });
            }
        }
        if subproblems.is_empty() {
            Ok(())
        } else {
            Err(RaError::rejected_identifier(
                format!("{} identifier(s) blocked by policy", subproblems.len()),
                subproblems,
            ))
        }
    }

    /// `ChallengeTypesFor(ident)` (§4.2).
    pub fn challenge_types_for(&self, ident: &Identifier) -> Vec<ChallengeType> {
        match ident.id_type {
            IdentifierType::Dns if ident.is_wildcard() => vec![ChallengeType::Dns01],
            IdentifierType::Dns => vec![ChallengeType::Http01, ChallengeType::Dns01, ChallengeType::TlsAlpn01],
            IdentifierType::Ip => vec![ChallengeType::Http01, ChallengeType::TlsAlpn01],
        }
    }

    pub fn challenge_type_enabled(&self, t: ChallengeType) -> bool {
        self.enabled_challenge_types.contains(&t)
    }

    pub fn identifier_type_enabled(&self, t: IdentifierType) -> bool {
        self.enabled_identifier_types.contains(&t)
    }

    /// `CheckAuthzChallenges(authz)`: the authorization must have been solved
    /// by a currently-enabled challenge type that is in
    /// `ChallengeTypesFor(authz.identifier)`.
    pub fn check_authz_challenges(&self, authz: &crate::model::Authorization) -> Result<()> {
        let attempt = authz
            .attempt
            .as_ref()
            .ok_or_else(|| RaError::internal("authorization has no attempted challenge"))?;

        if !self.challenge_type_enabled(attempt.challenge_type) {
            return Err(RaError::unauthorized(format!(
                "challenge type {} is not currently enabled",
                attempt.challenge_type
            )));
        }

        let allowed = self.challenge_types_for(&authz.identifier);
        if !allowed.contains(&attempt.challenge_type) {
            return Err(RaError::unauthorized(format!(
                "challenge type {} is not permitted for identifier {}",
                attempt.challenge_type, authz.identifier
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_identifiers_only_offer_dns01() {
        let pa = PolicyAuthority::new_unblocked();
        let types = pa.challenge_types_for(&Identifier::dns("*.example.com"));
        assert_eq!(types, vec![ChallengeType::Dns01]);
    }

    #[test]
    fn plain_dns_identifiers_offer_three_challenge_types() {
        let pa = PolicyAuthority::new_unblocked();
        let types = pa.challenge_types_for(&Identifier::dns("example.com"));
        assert_eq!(
            types,
            vec![ChallengeType::Http01, ChallengeType::Dns01, ChallengeType::TlsAlpn01]
        );
    }

    #[test]
    fn ip_identifiers_offer_http01_and_tls_alpn01_only() {
        let pa = PolicyAuthority::new_unblocked();
        let types = pa.challenge_types_for(&Identifier::ip("203.0.113.5".parse().unwrap()));
        assert_eq!(types, vec![ChallengeType::Http01, ChallengeType::TlsAlpn01]);
    }
}
