//! Session Types and Structures

use chrono::{DateTime, Duration, Utc};
use learnex_core::{Role, SessionSettings};
use serde::{Deserialize, Serialize};

/// Who a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub identifier: String,
    pub role: Role,
    pub display_name: String,
}

/// Time-boxed proof of authentication bound to one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token
    pub token: String,
    pub user: Principal,
    pub issued_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Why a session stopped being valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Idle,
    Absolute,
}

impl Session {
    /// Fresh session with both timestamps at `now`
    pub fn new(token: String, user: Principal, now: DateTime<Utc>) -> Self {
        Self {
            token,
            user,
            issued_at: now,
            last_activity_at: now,
        }
    }

    /// `Ok` while both timeouts hold at `now`. Reaching a limit exactly is still valid.
    pub fn check(&self, now: DateTime<Utc>, config: &SessionConfig) -> Result<(), Expiry> {
        if now - self.issued_at > config.absolute_timeout {
            return Err(Expiry::Absolute);
        }
        if now - self.last_activity_at > config.idle_timeout {
            return Err(Expiry::Idle);
        }
        Ok(())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>, config: &SessionConfig) -> bool {
        self.check(now, config).is_ok()
    }

    /// The earlier of the idle and absolute deadlines. Saturates at the
    /// latest representable instant.
    pub fn expires_at(&self, config: &SessionConfig) -> DateTime<Utc> {
        let deadline = |from: DateTime<Utc>, timeout: Duration| {
            from.checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };
        deadline(self.last_activity_at, config.idle_timeout)
            .min(deadline(self.issued_at, config.absolute_timeout))
    }

    /// Bump `last_activity_at` to `now`, or one microsecond past its current
    /// value when the clock has not moved.
    pub fn bump(&mut self, now: DateTime<Utc>) {
        let floor = self.last_activity_at + Duration::microseconds(1);
        self.last_activity_at = now.max(floor);
    }
}

/// Timeouts applied by a [`SessionManager`](super::SessionManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
    pub absolute_timeout: Duration,
    /// Period of the background expiry watcher; none when unset
    pub watch_interval: Option<std::time::Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl SessionConfig {
    /// Same idle and absolute timeout, no watcher
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            idle_timeout: timeout,
            absolute_timeout: timeout,
            watch_interval: None,
        }
    }

    pub fn with_absolute_timeout(mut self, timeout: Duration) -> Self {
        self.absolute_timeout = timeout;
        self
    }

    pub fn with_watch_interval(mut self, interval: Option<std::time::Duration>) -> Self {
        self.watch_interval = interval;
        self
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        let absolute = settings
            .absolute_timeout_secs
            .unwrap_or(settings.timeout_secs);

        Self {
            idle_timeout: seconds_saturating(settings.timeout_secs),
            absolute_timeout: seconds_saturating(absolute),
            watch_interval: settings.watch_interval(),
        }
    }
}

/// Seconds as a signed duration, clamped to the largest one chrono can hold
fn seconds_saturating(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Lifecycle notifications broadcast by a session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Issued { identifier: String, role: Role },
    Expired { identifier: String },
    LoggedOut { identifier: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            identifier: "teacher".to_string(),
            role: Role::Teacher,
            display_name: "Demo Teacher".to_string(),
        }
    }

    #[test]
    fn timeout_boundary_is_inclusive() {
        let config = SessionConfig::with_timeout(Duration::minutes(30));
        let t0 = Utc::now();
        let session = Session::new("tok".to_string(), principal(), t0);

        assert!(session.is_valid_at(t0 + Duration::minutes(30), &config));
        assert_eq!(
            session.check(t0 + Duration::minutes(30) + Duration::milliseconds(1), &config),
            Err(Expiry::Absolute)
        );
    }

    #[test]
    fn idle_expiry_within_absolute_window() {
        let config = SessionConfig::with_timeout(Duration::minutes(10))
            .with_absolute_timeout(Duration::hours(8));
        let t0 = Utc::now();
        let mut session = Session::new("tok".to_string(), principal(), t0);

        session.bump(t0 + Duration::minutes(9));
        assert!(session.is_valid_at(t0 + Duration::minutes(19), &config));
        assert_eq!(
            session.check(t0 + Duration::minutes(20), &config),
            Err(Expiry::Idle)
        );
        assert_eq!(session.expires_at(&config), t0 + Duration::minutes(19));
    }

    #[test]
    fn bump_strictly_increases() {
        let t0 = Utc::now();
        let mut session = Session::new("tok".to_string(), principal(), t0);

        session.bump(t0);
        let first = session.last_activity_at;
        session.bump(t0);
        assert!(first > t0);
        assert!(session.last_activity_at > first);
        assert_eq!(session.issued_at, t0);
    }

    #[test]
    fn serializes_camel_case() {
        let session = Session::new("tok".to_string(), principal(), Utc::now());
        let json = serde_json::to_value(&session).unwrap();

        assert!(json.get("issuedAt").is_some());
        assert!(json.get("lastActivityAt").is_some());
        assert_eq!(json["user"]["displayName"], "Demo Teacher");
        assert_eq!(json["user"]["role"], "teacher");
    }

    #[test]
    fn config_from_settings() {
        let settings = SessionSettings {
            timeout_secs: 600,
            absolute_timeout_secs: None,
            watch_interval_secs: Some(15),
            sweep_interval_secs: 60,
        };
        let config = SessionConfig::from(&settings);

        assert_eq!(config.idle_timeout, Duration::minutes(10));
        assert_eq!(config.absolute_timeout, Duration::minutes(10));
        assert_eq!(
            config.watch_interval,
            Some(std::time::Duration::from_secs(15))
        );
    }

    #[test]
    fn oversized_settings_saturate() {
        let settings = SessionSettings {
            timeout_secs: u64::MAX,
            absolute_timeout_secs: Some(10_000_000_000_000),
            watch_interval_secs: None,
            sweep_interval_secs: 60,
        };
        let config = SessionConfig::from(&settings);
        assert!(config.idle_timeout > Duration::zero());
        assert!(config.absolute_timeout > Duration::zero());

        let t0 = Utc::now();
        let session = Session::new("tok".to_string(), principal(), t0);
        assert!(session.is_valid_at(t0 + Duration::days(3650), &config));
        assert_eq!(session.expires_at(&config), DateTime::<Utc>::MAX_UTC);
    }
}
