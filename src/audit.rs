//! Scan-to-confirm state machine for field audits.
//!
//! ```text
//! Idle --decode--> Reviewing --confirm/cancel--> CoolingDown --timeout--> Idle
//! ```
//!
//! Decode events outside `Idle`, or while a sync is in flight, are dropped:
//! the camera keeps running and would otherwise re-prompt for the code that
//! is still in front of it. The guard lives here rather than in the
//! scanner's own pause flag because pausing can fail silently.

use log::{debug, info};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::camera::{CameraStatus, Scanner, ScannerGuard};
use crate::columns::SCAN_LOOKUP_FIELDS;
use crate::error::{AppError, CameraError, Result};
use crate::record::AuditMark;
use crate::store::{RowStore, StoreMutation};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1500);

/// Code currently shown on the review surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub scanned: String,
    /// Row index of the match; `None` shows the not-found surface.
    pub matched: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditState {
    Idle,
    Reviewing(Review),
    CoolingDown { until: Instant },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecodeOutcome {
    /// Ignored because a review, cooldown or sync was in progress.
    Dropped,
    Matched { scanned: String, index: usize },
    NotFound { scanned: String },
}

pub struct AuditSession<S: Scanner> {
    camera: ScannerGuard<S>,
    camera_status: CameraStatus,
    state: AuditState,
    cooldown: Duration,
    syncing: bool,
}

impl<S: Scanner> AuditSession<S> {
    pub fn new(scanner: S, cooldown: Duration) -> Self {
        AuditSession {
            camera: ScannerGuard::new(scanner),
            camera_status: CameraStatus::Loading,
            state: AuditState::Idle,
            cooldown,
            syncing: false,
        }
    }

    pub fn state(&self) -> &AuditState {
        &self.state
    }

    pub fn review(&self) -> Option<&Review> {
        match &self.state {
            AuditState::Reviewing(review) => Some(review),
            _ => None,
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        matches!(self.state, AuditState::CoolingDown { .. })
    }

    pub fn camera_status(&self) -> &CameraStatus {
        &self.camera_status
    }

    pub fn scanner(&self) -> &S {
        self.camera.scanner()
    }

    pub fn scanner_mut(&mut self) -> &mut S {
        self.camera.scanner_mut()
    }

    /// Acquire (or re-acquire) the camera. Also the manual retry action.
    pub fn start_camera(&mut self) -> std::result::Result<(), CameraError> {
        self.camera_status = CameraStatus::Loading;
        match self.camera.open() {
            Ok(()) => {
                self.camera_status = CameraStatus::Ready;
                if !matches!(self.state, AuditState::Idle) {
                    self.camera.pause();
                }
                Ok(())
            }
            Err(e) => {
                self.camera_failed(e.clone());
                Err(e)
            }
        }
    }

    /// Record a failure reported by the capture pipeline after start.
    pub fn camera_failed(&mut self, err: CameraError) {
        info!("camera unavailable: {}", err);
        self.camera.close();
        self.camera_status = CameraStatus::Error(err.to_string());
    }

    pub fn camera_ready(&mut self) {
        self.camera_status = CameraStatus::Ready;
    }

    pub fn stop_camera(&mut self) {
        self.camera.close();
        self.camera_status = CameraStatus::Loading;
    }

    /// Leave the cooldown once it has elapsed and resume decoding.
    pub fn tick(&mut self, now: Instant) {
        if let AuditState::CoolingDown { until } = self.state {
            if now >= until {
                self.state = AuditState::Idle;
                self.camera.resume();
            }
        }
    }

    pub fn on_decode(&mut self, text: &str, store: &RowStore, now: Instant) -> DecodeOutcome {
        self.tick(now);
        if self.syncing || !matches!(self.state, AuditState::Idle) {
            debug!("dropping decode while busy");
            return DecodeOutcome::Dropped;
        }
        let scanned = text.trim();
        if scanned.is_empty() {
            return DecodeOutcome::Dropped;
        }

        let matched = store
            .find_by_identifier(scanned, SCAN_LOOKUP_FIELDS)
            .map(|(index, _)| index);
        self.state = AuditState::Reviewing(Review {
            scanned: scanned.to_string(),
            matched,
        });
        self.camera.pause();

        match matched {
            Some(index) => DecodeOutcome::Matched {
                scanned: scanned.to_string(),
                index,
            },
            None => DecodeOutcome::NotFound {
                scanned: scanned.to_string(),
            },
        }
    }

    /// Apply the audit mark to the reviewed row and start the cooldown.
    pub fn confirm(&mut self, store: &mut RowStore, mark: AuditMark, now: Instant) -> Result<usize> {
        let index = match &self.state {
            AuditState::Reviewing(Review { matched: Some(index), .. }) => *index,
            AuditState::Reviewing(_) => return Err(AppError::NoMatchToConfirm),
            _ => return Err(AppError::NotReviewing),
        };
        store.apply(StoreMutation::Mark { index, mark });
        self.begin_cooldown(now);
        Ok(index)
    }

    /// Close the review surface without touching the store.
    pub fn cancel(&mut self, now: Instant) {
        if matches!(self.state, AuditState::Reviewing(_)) {
            self.begin_cooldown(now);
        }
    }

    /// Abandon any open review or cooldown, e.g. when the rows are replaced.
    pub fn reset(&mut self) {
        if !matches!(self.state, AuditState::Idle) {
            self.state = AuditState::Idle;
            self.camera.resume();
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    /// Claim the single sync slot.
    pub fn begin_sync(&mut self) -> Result<()> {
        if self.syncing {
            return Err(AppError::SyncInProgress);
        }
        self.syncing = true;
        Ok(())
    }

    pub fn end_sync(&mut self) {
        self.syncing = false;
    }

    fn begin_cooldown(&mut self, now: Instant) {
        self.state = AuditState::CoolingDown {
            until: now + self.cooldown,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::BrowserScanner;
    use crate::record::AssetRecord;
    use chrono::NaiveDate;

    fn store() -> RowStore {
        RowStore::from_rows(
            Vec::new(),
            vec![AssetRecord::from_pairs([("관리번호", "A1"), ("자산번호", "900")])],
        )
    }

    fn session() -> AuditSession<BrowserScanner> {
        let mut session = AuditSession::new(BrowserScanner::default(), DEFAULT_COOLDOWN);
        session.start_camera().unwrap();
        session
    }

    #[test]
    fn decode_pauses_scanner_and_opens_review() {
        let mut session = session();
        let now = Instant::now();
        let outcome = session.on_decode(" A1 ", &store(), now);

        assert_eq!(outcome, DecodeOutcome::Matched { scanned: "A1".into(), index: 0 });
        assert!(session.scanner().paused);
        assert_eq!(session.review().unwrap().matched, Some(0));
    }

    #[test]
    fn cooldown_expires_and_resumes() {
        let mut session = session();
        let store = store();
        let now = Instant::now();
        session.on_decode("A1", &store, now);
        session.cancel(now);

        assert_eq!(session.on_decode("A1", &store, now + Duration::from_millis(1000)), DecodeOutcome::Dropped);
        assert!(session.scanner().paused);

        let later = now + Duration::from_millis(1500);
        assert!(matches!(session.on_decode("900", &store, later), DecodeOutcome::Matched { index: 0, .. }));
    }

    #[test]
    fn confirm_requires_a_match() {
        let mut session = session();
        let mut store = store();
        let now = Instant::now();
        let mark = AuditMark::on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        assert!(matches!(session.confirm(&mut store, mark.clone(), now), Err(AppError::NotReviewing)));

        assert_eq!(
            session.on_decode(" Z9 ", &store, now),
            DecodeOutcome::NotFound { scanned: "Z9".into() }
        );
        let review = session.review().unwrap();
        assert_eq!(review.scanned, "Z9");
        assert_eq!(review.matched, None);
        assert!(matches!(session.confirm(&mut store, mark, now), Err(AppError::NoMatchToConfirm)));
        assert!(store.pending_audit().is_empty());
    }

    #[test]
    fn decode_dropped_while_syncing() {
        let mut session = session();
        session.begin_sync().unwrap();
        assert!(matches!(session.begin_sync(), Err(AppError::SyncInProgress)));
        assert_eq!(session.on_decode("A1", &store(), Instant::now()), DecodeOutcome::Dropped);
        session.end_sync();
        assert!(matches!(session.on_decode("A1", &store(), Instant::now()), DecodeOutcome::Matched { .. }));
    }

    #[test]
    fn camera_failure_is_reported_and_retry_recovers() {
        let mut session = session();
        session.camera_failed(CameraError::DeviceNotFound);
        assert!(matches!(session.camera_status(), CameraStatus::Error(_)));
        assert!(!session.scanner().scanning);

        session.start_camera().unwrap();
        assert_eq!(session.camera_status(), &CameraStatus::Ready);
    }
}
