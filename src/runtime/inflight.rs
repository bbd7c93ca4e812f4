//! Per-participant claim set.
//!
//! A participant is processed by at most one fetch at a time. Claims are
//! released when the guard drops, including when a cycle abandons the fetch.

use std::sync::Arc;

use dashmap::DashSet;

use crate::domain::ParticipantAddress;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    claims: Arc<DashSet<ParticipantAddress>>,
}

impl InFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `address`, or `None` if it is already being processed.
    #[must_use]
    pub fn claim(&self, address: &ParticipantAddress) -> Option<Claim> {
        if self.claims.insert(address.clone()) {
            Some(Claim {
                claims: Arc::clone(&self.claims),
                address: address.clone(),
            })
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_claimed(&self, address: &ParticipantAddress) -> bool {
        self.claims.contains(address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Guard for one claimed participant.
#[derive(Debug)]
pub struct Claim {
    claims: Arc<DashSet<ParticipantAddress>>,
    address: ParticipantAddress,
}

impl Claim {
    #[must_use]
    pub fn address(&self) -> &ParticipantAddress {
        &self.address
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims.remove(&self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_until_release() {
        let inflight = InFlight::new();
        let addr = ParticipantAddress::from("0xabc");

        let claim = inflight.claim(&addr).unwrap();
        assert!(inflight.claim(&addr).is_none());
        assert!(inflight.is_claimed(&addr));

        drop(claim);
        assert!(!inflight.is_claimed(&addr));
        assert!(inflight.claim(&addr).is_some());
    }

    #[test]
    fn distinct_participants_do_not_conflict() {
        let inflight = InFlight::new();
        let _a = inflight.claim(&ParticipantAddress::from("0xa")).unwrap();
        let _b = inflight.claim(&ParticipantAddress::from("0xb")).unwrap();
        assert_eq!(inflight.len(), 2);
    }
}
