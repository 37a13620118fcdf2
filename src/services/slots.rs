use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::config::AppConfig;
use crate::db::{BookingStore, SlotRemoval};
use crate::errors::BookingError;
use crate::models::slot::{parse_date, parse_time};
use crate::models::{timestamp_now, DoctorProfile, NewSlot, Slot};
use crate::services::ids::IdGenerator;

#[derive(Debug, Clone)]
pub struct SlotPolicy {
    pub min_duration_minutes: i64,
    /// Off by default: overlapping and duplicate slots are accepted.
    pub reject_overlaps: bool,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: 5,
            reject_overlaps: false,
        }
    }
}

impl From<&AppConfig> for SlotPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_duration_minutes: config.min_slot_duration_minutes,
            reject_overlaps: config.reject_overlapping_slots,
        }
    }
}

struct SlotWindow {
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    duration: i64,
}

/// Owns availability slots. Validates data shape only; authorization is the
/// caller's job.
pub struct SlotLedger {
    store: Arc<dyn BookingStore>,
    ids: Arc<dyn IdGenerator>,
    policy: SlotPolicy,
}

impl SlotLedger {
    pub fn new(store: Arc<dyn BookingStore>, ids: Arc<dyn IdGenerator>, policy: SlotPolicy) -> Self {
        Self { store, ids, policy }
    }

    pub fn create_slot(&self, new: &NewSlot) -> Result<Slot, BookingError> {
        let window = self.validate(new)?;
        self.require_doctor(&new.doctor_id)?;

        let slot = self.build_slot(&new.doctor_id, &window, window.start, window.end);
        self.check_overlaps(&new.doctor_id, window.date, std::slice::from_ref(&slot))?;
        self.store.insert_slots(std::slice::from_ref(&slot))?;

        tracing::info!(
            slot_id = %slot.id,
            doctor_id = %slot.doctor_id,
            date = %slot.date,
            "slot created"
        );
        Ok(slot)
    }

    /// Splits `[start, end)` into back-to-back slots of `duration` minutes.
    /// A trailing remainder shorter than one slot is dropped.
    pub fn generate_slots(&self, new: &NewSlot) -> Result<Vec<Slot>, BookingError> {
        let window = self.validate(new)?;
        self.require_doctor(&new.doctor_id)?;

        let window_start = minutes_of(window.start);
        let window_end = minutes_of(window.end);
        let mut slots = vec![];
        let mut cursor = window_start;
        while cursor + window.duration <= window_end {
            let start = time_of(cursor)?;
            let end = time_of(cursor + window.duration)?;
            slots.push(self.build_slot(&new.doctor_id, &window, start, end));
            cursor += window.duration;
        }

        self.check_overlaps(&new.doctor_id, window.date, &slots)?;
        self.store.insert_slots(&slots)?;

        tracing::info!(
            doctor_id = %new.doctor_id,
            date = %window.date,
            count = slots.len(),
            "slots generated"
        );
        Ok(slots)
    }

    pub fn get_slot(&self, slot_id: &str) -> Result<Slot, BookingError> {
        self.store
            .get_slot(slot_id)?
            .ok_or_else(|| BookingError::NotFound(format!("slot {slot_id}")))
    }

    pub fn delete_slot(&self, slot_id: &str) -> Result<(), BookingError> {
        match self.store.remove_slot(slot_id)? {
            SlotRemoval::Removed => {
                tracing::info!(slot_id, "slot deleted");
                Ok(())
            }
            SlotRemoval::Booked => {
                tracing::warn!(slot_id, "refused to delete booked slot");
                Err(BookingError::SlotBooked(slot_id.to_string()))
            }
            SlotRemoval::Missing => Err(BookingError::NotFound(format!("slot {slot_id}"))),
        }
    }

    pub fn mark_booked(&self, slot_id: &str) -> Result<(), BookingError> {
        self.set_booked(slot_id, true)
    }

    pub fn mark_unbooked(&self, slot_id: &str) -> Result<(), BookingError> {
        self.set_booked(slot_id, false)
    }

    /// Repair path: sets the flag from the appointments holding the slot in a
    /// single store write. Returns true when it changed.
    pub fn resync_booked(&self, slot_id: &str) -> Result<bool, BookingError> {
        let changed = self.store.resync_slot_flag(slot_id)?;
        if changed {
            tracing::info!(slot_id, "slot flag re-derived from appointments");
        }
        Ok(changed)
    }

    /// Patient-facing: free slots of an approved doctor, earliest first.
    pub fn list_available(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, BookingError> {
        let doctor = self.require_doctor(doctor_id)?;
        if !doctor.is_approved() {
            tracing::debug!(doctor_id, status = doctor.status.as_str(), "hiding slots of unapproved doctor");
            return Ok(vec![]);
        }
        Ok(self.store.list_slots(doctor_id, date, true)?)
    }

    /// Doctor-facing: every slot regardless of booking or approval state.
    pub fn list_all(&self, doctor_id: &str) -> Result<Vec<Slot>, BookingError> {
        Ok(self.store.list_slots(doctor_id, None, false)?)
    }

    fn set_booked(&self, slot_id: &str, booked: bool) -> Result<(), BookingError> {
        if self.store.set_slot_booked(slot_id, booked)? {
            Ok(())
        } else {
            Err(BookingError::NotFound(format!("slot {slot_id}")))
        }
    }

    fn require_doctor(&self, doctor_id: &str) -> Result<DoctorProfile, BookingError> {
        self.store
            .get_doctor(doctor_id)?
            .ok_or_else(|| BookingError::NotFound(format!("doctor {doctor_id}")))
    }

    fn validate(&self, new: &NewSlot) -> Result<SlotWindow, BookingError> {
        let date = parse_date(&new.date).map_err(|e| BookingError::Validation(e.to_string()))?;
        let start =
            parse_time(&new.start_time).map_err(|e| BookingError::Validation(e.to_string()))?;
        let end = parse_time(&new.end_time).map_err(|e| BookingError::Validation(e.to_string()))?;

        let min = self.policy.min_duration_minutes.max(1);
        if new.duration_minutes < min {
            return Err(BookingError::Validation(format!(
                "duration must be at least {min} minutes, got {}",
                new.duration_minutes
            )));
        }
        if end <= start {
            return Err(BookingError::Validation(format!(
                "end time {} must be after start time {}",
                new.end_time, new.start_time
            )));
        }
        let span = minutes_of(end) - minutes_of(start);
        if new.duration_minutes > span {
            return Err(BookingError::Validation(format!(
                "duration of {} minutes exceeds the {span}-minute window {}-{}",
                new.duration_minutes, new.start_time, new.end_time
            )));
        }

        Ok(SlotWindow {
            date,
            start,
            end,
            duration: new.duration_minutes,
        })
    }

    fn check_overlaps(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        candidates: &[Slot],
    ) -> Result<(), BookingError> {
        if !self.policy.reject_overlaps {
            return Ok(());
        }
        let existing = self.store.list_slots(doctor_id, Some(date), false)?;
        for candidate in candidates {
            if let Some(clash) = existing
                .iter()
                .find(|s| s.overlaps(candidate.date, candidate.start_time, candidate.end_time))
            {
                return Err(BookingError::Validation(format!(
                    "slot {}-{} overlaps existing slot {}",
                    candidate.start_time.format("%H:%M"),
                    candidate.end_time.format("%H:%M"),
                    clash.id
                )));
            }
        }
        Ok(())
    }

    fn build_slot(&self, doctor_id: &str, window: &SlotWindow, start: NaiveTime, end: NaiveTime) -> Slot {
        Slot {
            id: self.ids.next_id(),
            doctor_id: doctor_id.to_string(),
            date: window.date,
            start_time: start,
            end_time: end,
            duration_minutes: window.duration,
            is_booked: false,
            created_at: timestamp_now(),
        }
    }
}

fn minutes_of(t: NaiveTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

fn time_of(minutes: i64) -> Result<NaiveTime, BookingError> {
    u32::try_from(minutes)
        .ok()
        .and_then(|m| NaiveTime::from_hms_opt(m / 60, m % 60, 0))
        .ok_or_else(|| BookingError::Validation(format!("minute offset out of range: {minutes}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, SqliteStore};
    use crate::models::{DoctorStatus, DoctorProfile};
    use crate::services::ids::SequentialIds;

    fn setup(policy: SlotPolicy) -> (Arc<SqliteStore>, SlotLedger) {
        let store = Arc::new(SqliteStore::new(db::init_db(":memory:").unwrap()));
        let ledger = SlotLedger::new(store.clone(), Arc::new(SequentialIds::new("slot")), policy);
        (store, ledger)
    }

    fn add_doctor(store: &SqliteStore, id: &str, status: DoctorStatus) {
        let now = timestamp_now();
        store
            .insert_doctor(&DoctorProfile {
                id: id.to_string(),
                name: format!("Dr. {id}"),
                specialty: None,
                status,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    fn new_slot(date: &str, start: &str, end: &str, duration: i64) -> NewSlot {
        NewSlot {
            doctor_id: "doc-1".to_string(),
            date: date.to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            duration_minutes: duration,
        }
    }

    #[test]
    fn test_create_slot_starts_unbooked() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        let slot = ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();
        assert_eq!(slot.id, "slot-1");
        assert!(!slot.is_booked);
        assert_eq!(ledger.get_slot("slot-1").unwrap(), slot);
    }

    #[test]
    fn test_create_slot_rejects_bad_shapes() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        let cases = [
            new_slot("03/01/2025", "09:00", "09:30", 30),
            new_slot("2025-03-01", "9am", "09:30", 30),
            new_slot("2025-03-01", "09:00", "25:00", 30),
            new_slot("2025-03-01", "09:00", "09:30", 4),
            new_slot("2025-03-01", "09:00", "09:30", 0),
            new_slot("2025-03-01", "09:30", "09:00", 30),
        ];
        for case in &cases {
            let err = ledger.create_slot(case).unwrap_err();
            assert!(matches!(err, BookingError::Validation(_)), "{case:?} gave {err:?}");
        }
    }

    #[test]
    fn test_create_slot_respects_configured_minimum() {
        let (store, ledger) = setup(SlotPolicy {
            min_duration_minutes: 15,
            reject_overlaps: false,
        });
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        assert!(ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:10", 10)).is_err());
        assert!(ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:15", 15)).is_ok());
    }

    #[test]
    fn test_create_slot_unknown_doctor() {
        let (_store, ledger) = setup(SlotPolicy::default());
        let err = ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[test]
    fn test_overlaps_allowed_by_default() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();
        ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();
        ledger.create_slot(&new_slot("2025-03-01", "09:15", "09:45", 30)).unwrap();
        assert_eq!(ledger.list_all("doc-1").unwrap().len(), 3);
    }

    #[test]
    fn test_overlaps_rejected_when_hardened() {
        let (store, ledger) = setup(SlotPolicy {
            min_duration_minutes: 5,
            reject_overlaps: true,
        });
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();
        let err = ledger
            .create_slot(&new_slot("2025-03-01", "09:15", "09:45", 30))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        // Adjacent is fine.
        ledger.create_slot(&new_slot("2025-03-01", "09:30", "10:00", 30)).unwrap();
    }

    #[test]
    fn test_generate_slots_enumerates_window() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        let slots = ledger
            .generate_slots(&new_slot("2025-03-01", "09:00", "10:40", 30))
            .unwrap();
        let starts: Vec<String> = slots
            .iter()
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect();
        assert_eq!(starts, vec!["09:00", "09:30", "10:00"]);
        assert_eq!(slots[2].end_time.format("%H:%M").to_string(), "10:30");
        assert_eq!(ledger.list_all("doc-1").unwrap().len(), 3);
    }

    #[test]
    fn test_generate_slots_window_too_short() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        let err = ledger
            .generate_slots(&new_slot("2025-03-01", "09:00", "09:20", 30))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_huge_duration_is_rejected() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        let err = ledger
            .generate_slots(&new_slot("2025-03-01", "09:00", "10:00", i64::MAX))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        let err = ledger
            .create_slot(&new_slot("2025-03-01", "09:00", "10:00", i64::MAX))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        let err = ledger
            .create_slot(&new_slot("2025-03-01", "09:00", "09:30", 45))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert!(ledger.list_all("doc-1").unwrap().is_empty());
    }

    #[test]
    fn test_list_available_hides_unapproved_doctor() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Pending);
        ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();

        assert!(ledger.list_available("doc-1", None).unwrap().is_empty());
        assert_eq!(ledger.list_all("doc-1").unwrap().len(), 1);

        store.set_doctor_status("doc-1", DoctorStatus::Approved).unwrap();
        assert_eq!(ledger.list_available("doc-1", None).unwrap().len(), 1);
    }

    #[test]
    fn test_list_available_filters_booked_and_orders() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);

        ledger.create_slot(&new_slot("2025-03-02", "08:00", "08:30", 30)).unwrap();
        ledger.create_slot(&new_slot("2025-03-01", "11:00", "11:30", 30)).unwrap();
        ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();
        ledger.mark_booked("slot-2").unwrap();

        let ids: Vec<String> = ledger
            .list_available("doc-1", None)
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["slot-3", "slot-1"]);

        let day = parse_date("2025-03-01").unwrap();
        let on_day = ledger.list_available("doc-1", Some(day)).unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].id, "slot-3");
    }

    #[test]
    fn test_delete_slot_guard() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);
        let slot = ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();

        ledger.mark_booked(&slot.id).unwrap();
        let err = ledger.delete_slot(&slot.id).unwrap_err();
        assert!(matches!(err, BookingError::SlotBooked(_)));
        assert!(ledger.get_slot(&slot.id).is_ok());

        ledger.mark_unbooked(&slot.id).unwrap();
        ledger.delete_slot(&slot.id).unwrap();
        assert!(matches!(ledger.get_slot(&slot.id), Err(BookingError::NotFound(_))));
        assert!(matches!(ledger.delete_slot(&slot.id), Err(BookingError::NotFound(_))));
    }

    #[test]
    fn test_mark_flips_are_idempotent() {
        let (store, ledger) = setup(SlotPolicy::default());
        add_doctor(&store, "doc-1", DoctorStatus::Approved);
        let slot = ledger.create_slot(&new_slot("2025-03-01", "09:00", "09:30", 30)).unwrap();

        ledger.mark_booked(&slot.id).unwrap();
        ledger.mark_booked(&slot.id).unwrap();
        assert!(ledger.get_slot(&slot.id).unwrap().is_booked);
        ledger.mark_unbooked(&slot.id).unwrap();
        ledger.mark_unbooked(&slot.id).unwrap();
        assert!(!ledger.get_slot(&slot.id).unwrap().is_booked);

        assert!(matches!(ledger.mark_booked("missing"), Err(BookingError::NotFound(_))));
    }
}
