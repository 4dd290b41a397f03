//! Per-session throttle for `patient_viewed` audit events.
//!
//! The session stores, per patient, the time of the last recorded view
//! as Unix milliseconds. A view is recorded when no timestamp exists or
//! the window has fully elapsed.

use chrono::{DateTime, Duration, Utc};
use clinicore_core::session::SessionStore;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct ViewThrottle {
    window: Duration,
}

impl ViewThrottle {
    pub fn new(window_secs: u64) -> Self {
        let secs = i64::try_from(window_secs).unwrap_or(i64::MAX);
        Self {
            window: Duration::try_seconds(secs).unwrap_or(Duration::MAX),
        }
    }

    /// Session key holding the last view time of `patient_id`.
    pub fn session_key(patient_id: Uuid) -> String {
        format!("audit.patient_viewed_at.{patient_id}")
    }

    /// Whether a view of `patient_id` at `now` should be audited.
    pub fn should_record(
        &self,
        session: &dyn SessionStore,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> bool {
        let last = session
            .get(&Self::session_key(patient_id))
            .and_then(|v| v.as_i64())
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        match last {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.window,
        }
    }

    /// Remember that a view of `patient_id` was recorded at `now`.
    pub fn mark(&self, session: &dyn SessionStore, patient_id: Uuid, now: DateTime<Utc>) {
        session.set(
            &Self::session_key(patient_id),
            serde_json::Value::from(now.timestamp_millis()),
        );
    }
}
