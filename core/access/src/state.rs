//! Authentication session state and its tamper-check digest.

use chrono::{DateTime, Utc};
use serde::Serialize;

use phantomvault_common::ProfileId;
use phantomvault_crypto::blake2b_256;

/// Snapshot of the dual-layer authentication session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuthenticationState {
    pub has_admin_privileges: bool,
    pub has_profile_authentication: bool,
    pub authenticated_profile_id: Option<ProfileId>,
    pub admin_elevation_time: Option<DateTime<Utc>>,
    pub profile_auth_time: Option<DateTime<Utc>>,
    pub session_expiry: Option<DateTime<Utc>>,
    pub is_tamper_resistant: bool,
}

fn stamp(time: &Option<DateTime<Utc>>) -> Vec<u8> {
    time.map(|t| t.timestamp_micros().to_le_bytes().to_vec())
        .unwrap_or_default()
}

impl AuthenticationState {
    /// Both layers passed and the session has not expired at `now`.
    pub fn is_fully_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        self.has_admin_privileges && self.has_profile_authentication && !self.is_expired_at(now)
    }

    /// Both layers passed and the session has not expired.
    pub fn is_fully_authenticated(&self) -> bool {
        self.is_fully_authenticated_at(Utc::now())
    }

    /// True when there is no expiry or it is not after `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.session_expiry {
            Some(expiry) => now >= expiry,
            None => true,
        }
    }

    /// Digest over every field of the state.
    ///
    /// Covers both layer flags, the profile id, the three timestamps and
    /// the tamper-resistance flag itself.
    pub fn tamper_hash(&self) -> [u8; 32] {
        let profile = self
            .authenticated_profile_id
            .as_ref()
            .map(|p| p.as_str().as_bytes().to_vec())
            .unwrap_or_default();
        let flags = [
            self.has_admin_privileges as u8,
            self.has_profile_authentication as u8,
            self.is_tamper_resistant as u8,
            self.authenticated_profile_id.is_some() as u8,
        ];
        blake2b_256(&[
            &b"phantomvault.session.v1"[..],
            &flags[..],
            profile.as_slice(),
            stamp(&self.admin_elevation_time).as_slice(),
            stamp(&self.profile_auth_time).as_slice(),
            stamp(&self.session_expiry).as_slice(),
        ])
    }
}
