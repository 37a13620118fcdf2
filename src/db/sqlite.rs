use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};

use super::queries::{self, AppointmentFilter, DashboardStats, SlotOccupancy};
use super::{BookOutcome, BookingStore, DoctorRemoval, SlotRemoval};
use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, DoctorProfile, DoctorStatus, Slot,
};

/// SQLite-backed store. One connection behind a mutex; every call holds the
/// lock for a single short transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(super::init_db(path)?))
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }
}

impl BookingStore for SqliteStore {
    fn insert_doctor(&self, doctor: &DoctorProfile) -> anyhow::Result<()> {
        let conn = self.lock()?;
        queries::insert_doctor(&conn, doctor)
    }

    fn get_doctor(&self, id: &str) -> anyhow::Result<Option<DoctorProfile>> {
        let conn = self.lock()?;
        queries::get_doctor(&conn, id)
    }

    fn set_doctor_status(&self, id: &str, status: DoctorStatus) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        queries::update_doctor_status(&conn, id, status)
    }

    fn remove_doctor(&self, id: &str) -> anyhow::Result<DoctorRemoval> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if queries::get_doctor(&tx, id)?.is_none() {
            return Ok(DoctorRemoval::Missing);
        }
        let booked = queries::count_booked_slots_for_doctor(&tx, id)?;
        if booked > 0 {
            return Ok(DoctorRemoval::HasBookedSlots(booked));
        }
        let slots_removed = queries::delete_unbooked_slots_for_doctor(&tx, id)?;
        queries::delete_doctor(&tx, id)?;
        tx.commit()?;

        Ok(DoctorRemoval::Removed { slots_removed })
    }

    fn insert_slots(&self, slots: &[Slot]) -> anyhow::Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for slot in slots {
            queries::insert_slot(&tx, slot)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_slot(&self, id: &str) -> anyhow::Result<Option<Slot>> {
        let conn = self.lock()?;
        queries::get_slot(&conn, id)
    }

    fn list_slots(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
        unbooked_only: bool,
    ) -> anyhow::Result<Vec<Slot>> {
        let conn = self.lock()?;
        queries::list_slots(&conn, doctor_id, date, unbooked_only)
    }

    fn remove_slot(&self, id: &str) -> anyhow::Result<SlotRemoval> {
        let conn = self.lock()?;
        if queries::delete_unbooked_slot(&conn, id)? {
            return Ok(SlotRemoval::Removed);
        }
        match queries::get_slot(&conn, id)? {
            Some(_) => Ok(SlotRemoval::Booked),
            None => Ok(SlotRemoval::Missing),
        }
    }

    fn set_slot_booked(&self, id: &str, booked: bool) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        queries::set_slot_booked(&conn, id, booked)
    }

    fn resync_slot_flag(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        queries::resync_slot_flag(&conn, id)
    }

    fn book_slot(&self, appointment: &Appointment) -> anyhow::Result<BookOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if queries::get_slot(&tx, &appointment.slot_id)?.is_none() {
            return Ok(BookOutcome::SlotMissing);
        }
        // Dropping the transaction without commit rolls back.
        if !queries::claim_slot(&tx, &appointment.slot_id)? {
            return Ok(BookOutcome::SlotTaken);
        }
        queries::insert_appointment(&tx, appointment)?;
        tx.commit()?;

        Ok(BookOutcome::Booked)
    }

    fn transition_appointment(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: NaiveDateTime,
    ) -> anyhow::Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = queries::get_appointment(&tx, id)? else {
            return Ok(false);
        };
        if !queries::update_appointment_status_if(&tx, id, from, to, &at)? {
            return Ok(false);
        }
        if from.holds_slot() && !to.holds_slot() {
            queries::set_slot_booked(&tx, &current.slot_id, false)?;
        }
        tx.commit()?;

        Ok(true)
    }

    fn get_appointment(&self, id: &str) -> anyhow::Result<Option<Appointment>> {
        let conn = self.lock()?;
        queries::get_appointment(&conn, id)
    }

    fn list_appointments(&self, filter: &AppointmentFilter) -> anyhow::Result<Vec<AppointmentView>> {
        let conn = self.lock()?;
        queries::list_appointments(&conn, filter)
    }

    fn slot_occupancy(&self) -> anyhow::Result<Vec<SlotOccupancy>> {
        let conn = self.lock()?;
        queries::slot_occupancy(&conn)
    }

    fn dashboard_stats(&self, today: NaiveDate) -> anyhow::Result<DashboardStats> {
        let conn = self.lock()?;
        queries::get_dashboard_stats(&conn, today)
    }
}
