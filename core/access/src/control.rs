//! Dual-layer access control.
//!
//! A session exists only after both layers pass: the process holds admin
//! privilege (directly or through an [`Elevator`]) and the caller proved a
//! profile secret to the [`ProfileAuthenticator`]. The session state is
//! fingerprinted when it is written through this API; every check
//! recomputes the fingerprint, and a mismatch clears the session.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AccessConfig;
use crate::privilege::{
    Elevator, PrivilegeLevel, PrivilegeProbe, PrivilegedOperation, ProcessPrivilege,
    RestartElevator,
};
use crate::state::AuthenticationState;
use crate::store::ProfileAuthenticator;
use phantomvault_common::{Error, ProfileId, Result};
use phantomvault_crypto::constant_time_compare;

/// Identifier of one established session.
pub type SessionHandle = Uuid;

/// Invoked with the new level when privilege is lost or the session is
/// invalidated by tampering.
pub type PrivilegeLossCallback = Arc<dyn Fn(PrivilegeLevel) + Send + Sync>;

/// Notifications published by [`AccessControl::sweep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccessEvent {
    PrivilegeChanged {
        from: PrivilegeLevel,
        to: PrivilegeLevel,
    },
    SessionExpired {
        profile: Option<ProfileId>,
    },
    TamperDetected,
}

const EVENT_CAPACITY: usize = 64;

struct Session {
    state: AuthenticationState,
    tamper_hash: [u8; 32],
    handle: Option<SessionHandle>,
    observed_level: PrivilegeLevel,
}

impl Session {
    fn cleared(observed_level: PrivilegeLevel) -> Self {
        let state = AuthenticationState::default();
        Self {
            tamper_hash: state.tamper_hash(),
            state,
            handle: None,
            observed_level,
        }
    }

    fn seal(&mut self) {
        self.tamper_hash = self.state.tamper_hash();
    }

    fn is_intact(&self) -> bool {
        constant_time_compare(&self.state.tamper_hash(), &self.tamper_hash)
    }

    fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    fn clear(&mut self) {
        let level = self.observed_level;
        *self = Self::cleared(level);
    }
}

/// Gatekeeper for privileged vault operations.
///
/// Holds a single session; establishing, validating, refreshing and
/// clearing it are serialized by one lock.
pub struct AccessControl {
    config: AccessConfig,
    probe: Arc<dyn PrivilegeProbe>,
    elevator: Arc<dyn Elevator>,
    authenticator: Arc<dyn ProfileAuthenticator>,
    session: Mutex<Session>,
    events: broadcast::Sender<AccessEvent>,
    on_privilege_lost: Option<PrivilegeLossCallback>,
}

impl AccessControl {
    /// Create access control over explicit capabilities.
    pub fn new(
        config: AccessConfig,
        probe: Arc<dyn PrivilegeProbe>,
        elevator: Arc<dyn Elevator>,
        authenticator: Arc<dyn ProfileAuthenticator>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let level = probe.detect();
        Self {
            config,
            probe,
            elevator,
            authenticator,
            session: Mutex::new(Session::cleared(level)),
            events,
            on_privilege_lost: None,
        }
    }

    /// Access control for the running process, using its real credentials.
    pub fn for_process(config: AccessConfig, authenticator: Arc<dyn ProfileAuthenticator>) -> Self {
        Self::new(
            config,
            Arc::new(ProcessPrivilege),
            Arc::new(RestartElevator),
            authenticator,
        )
    }

    /// Register the privilege-loss callback.
    pub fn with_privilege_loss_callback(mut self, callback: PrivilegeLossCallback) -> Self {
        self.on_privilege_lost = Some(callback);
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Receive monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<AccessEvent> {
        self.events.subscribe()
    }

    /// Current host privilege of the process.
    pub fn current_privilege_level(&self) -> PrivilegeLevel {
        self.probe.detect()
    }

    fn publish(&self, event: AccessEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn notify_loss(&self, level: PrivilegeLevel) {
        if let Some(callback) = &self.on_privilege_lost {
            callback(level);
        }
    }

    fn ensure_admin(&self, operation: PrivilegedOperation) -> Result<PrivilegeLevel> {
        let level = self.probe.detect();
        if level.is_admin() {
            return Ok(level);
        }
        debug!(level = %level, operation = %operation, "Requesting elevation");
        let granted = self.elevator.request(&operation.to_string())?;
        if !granted.is_admin() {
            return Err(Error::AccessDenied(format!(
                "Elevation granted only {} privilege",
                granted
            )));
        }
        Ok(granted)
    }

    /// Establish a session for `profile_id`.
    ///
    /// # Postconditions
    /// - On success the session is fully authenticated until
    ///   `now + session_timeout` and a new handle is issued
    /// - On failure of either layer no session exists
    ///
    /// # Errors
    /// - `NotPermitted` / `AccessDenied` if admin privilege is unavailable
    /// - `AccessDenied` if profile authentication fails
    pub async fn request_dual_layer_authentication(
        &self,
        profile_id: &ProfileId,
        master_key: &[u8],
        operation: PrivilegedOperation,
    ) -> Result<SessionHandle> {
        let mut session = self.session.lock().await;
        session.clear();

        let level = match self.ensure_admin(operation) {
            Ok(level) => level,
            Err(e) => {
                warn!(operation = %operation, error = %e, "Admin layer failed");
                return Err(e);
            }
        };
        let admin_time = Utc::now();

        if let Err(e) = self.authenticator.authenticate(profile_id, master_key).await {
            warn!(profile = %profile_id, operation = %operation, "Profile layer failed");
            return Err(match e {
                Error::AccessDenied(_) => e,
                _ => Error::AccessDenied("Profile authentication failed".to_string()),
            });
        }

        let now = Utc::now();
        let timeout = ChronoDuration::from_std(self.config.session_timeout)
            .map_err(|_| Error::InvalidInput("Session timeout out of range".to_string()))?;
        let handle = Uuid::new_v4();

        session.state = AuthenticationState {
            has_admin_privileges: true,
            has_profile_authentication: true,
            authenticated_profile_id: Some(profile_id.clone()),
            admin_elevation_time: Some(admin_time),
            profile_auth_time: Some(now),
            session_expiry: Some(now + timeout),
            is_tamper_resistant: true,
        };
        session.handle = Some(handle);
        session.observed_level = level;
        session.seal();

        info!(profile = %profile_id, operation = %operation, "Dual-layer session established");
        Ok(handle)
    }

    /// Whether the current session authorizes `operation`.
    ///
    /// Fails on a fingerprint mismatch (and clears the session), on expiry,
    /// or when either layer flag is unset.
    pub async fn validate_dual_layer_access(&self, operation: PrivilegedOperation) -> bool {
        let mut session = self.session.lock().await;

        if !session.is_intact() {
            warn!(operation = %operation, "Session state tampered, clearing");
            session.clear();
            drop(session);
            self.publish(AccessEvent::TamperDetected);
            self.notify_loss(PrivilegeLevel::User);
            return false;
        }

        let now = Utc::now();
        if session.state.is_expired_at(now) {
            debug!(operation = %operation, "No valid session");
            return false;
        }
        let allowed = session.state.is_fully_authenticated_at(now);
        debug!(operation = %operation, allowed, "Dual-layer access check");
        allowed
    }

    /// Whether `operation` may proceed under the configured mode.
    ///
    /// With dual-layer mode on this is exactly
    /// [`validate_dual_layer_access`](Self::validate_dual_layer_access).
    /// Otherwise the single-layer privilege table applies.
    pub async fn has_privilege_for_operation(&self, operation: PrivilegedOperation) -> bool {
        if self.config.require_dual_layer {
            return self.validate_dual_layer_access(operation).await;
        }
        if !operation.requires_admin(self.config.require_elevation_for_vault) {
            return true;
        }
        self.probe.detect().is_admin()
    }

    /// Re-authenticate the session's own profile and extend its expiry.
    ///
    /// # Errors
    /// - `NotPermitted` if there is no session or it belongs to another profile
    /// - `AccessDenied` if the session was tampered with, admin privilege is
    ///   gone, or the secret is wrong. A wrong secret leaves the session as
    ///   it was.
    pub async fn refresh_authentication_session(
        &self,
        profile_id: &ProfileId,
        master_key: &[u8],
    ) -> Result<()> {
        let mut session = self.session.lock().await;

        if !session.is_intact() {
            session.clear();
            drop(session);
            self.publish(AccessEvent::TamperDetected);
            self.notify_loss(PrivilegeLevel::User);
            return Err(Error::AccessDenied("Session state tampered".to_string()));
        }
        if !session.is_active() || !session.state.has_profile_authentication {
            return Err(Error::NotPermitted("No session to refresh".to_string()));
        }
        if session.state.authenticated_profile_id.as_ref() != Some(profile_id) {
            return Err(Error::NotPermitted(
                "Session belongs to a different profile".to_string(),
            ));
        }
        if !self.probe.detect().is_admin() {
            session.clear();
            return Err(Error::AccessDenied(
                "Administrator privileges no longer held".to_string(),
            ));
        }

        self.authenticator.authenticate(profile_id, master_key).await?;

        let now = Utc::now();
        let timeout = ChronoDuration::from_std(self.config.session_timeout)
            .map_err(|_| Error::InvalidInput("Session timeout out of range".to_string()))?;
        session.state.profile_auth_time = Some(now);
        session.state.session_expiry = Some(now + timeout);
        session.seal();

        info!(profile = %profile_id, "Session refreshed");
        Ok(())
    }

    /// Drop the session.
    pub async fn clear_authentication_session(&self) {
        let mut session = self.session.lock().await;
        if session.is_active() {
            info!("Session cleared");
        }
        session.clear();
    }

    /// Snapshot of the session state.
    pub async fn current_authentication_state(&self) -> AuthenticationState {
        self.session.lock().await.state.clone()
    }

    /// True if the session state still matches its fingerprint.
    pub async fn validate_authentication_integrity(&self) -> bool {
        self.session.lock().await.is_intact()
    }

    /// Handle of the current session, if one exists.
    pub async fn session_handle(&self) -> Option<SessionHandle> {
        self.session.lock().await.handle
    }

    /// One monitoring pass.
    ///
    /// Re-detects host privilege, then clears the session on tampering or
    /// expiry. Never re-authenticates. Returns the events it published.
    pub async fn sweep(&self) -> Vec<AccessEvent> {
        let mut events = Vec::new();
        let mut lost: Option<PrivilegeLevel> = None;

        let level = self.probe.detect();
        {
            let mut session = self.session.lock().await;

            if level != session.observed_level {
                let from = session.observed_level;
                info!(from = %from, to = %level, "Privilege level changed");
                events.push(AccessEvent::PrivilegeChanged { from, to: level });
                if level < from {
                    lost = Some(level);
                }
                session.observed_level = level;
            }

            if !session.is_intact() {
                warn!("Session state tampered, clearing");
                session.clear();
                events.push(AccessEvent::TamperDetected);
                lost = Some(PrivilegeLevel::User);
            } else if session.is_active() && session.state.is_expired_at(Utc::now()) {
                let profile = session.state.authenticated_profile_id.clone();
                info!(profile = ?profile.as_ref().map(|p| p.as_str()), "Session expired");
                session.clear();
                events.push(AccessEvent::SessionExpired { profile });
            }
        }

        for event in &events {
            self.publish(event.clone());
        }
        if let Some(level) = lost {
            self.notify_loss(level);
        }
        events
    }
}
