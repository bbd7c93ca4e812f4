//! Tracked participant record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::id::ParticipantAddress;

/// A venue address whose performance is monitored.
///
/// Created on first observation and never deleted; prolonged absence from
/// snapshots (or a permanent fetch failure) only clears `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    address: ParticipantAddress,
    first_seen: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    active: bool,
}

impl Participant {
    /// Register a participant first observed at `now`.
    #[must_use]
    pub fn new(address: ParticipantAddress, now: DateTime<Utc>) -> Self {
        Self {
            address,
            first_seen: now,
            last_updated: now,
            active: true,
        }
    }

    #[must_use]
    pub fn address(&self) -> &ParticipantAddress {
        &self.address
    }

    #[must_use]
    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record a successful snapshot. Reactivates a dormant participant.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
        self.active = true;
    }

    /// Clear the active flag.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// True when the participant has gone `max_idle` without a snapshot.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        now - self.last_updated > max_idle
    }
}
