pub mod migrations;
pub mod queries;
pub mod sqlite;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, DoctorProfile, DoctorStatus, Slot,
};

pub use queries::{AppointmentFilter, DashboardStats, SlotOccupancy};
pub use sqlite::SqliteStore;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookOutcome {
    Booked,
    SlotMissing,
    SlotTaken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRemoval {
    Removed,
    Booked,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorRemoval {
    Removed { slots_removed: usize },
    HasBookedSlots(i64),
    Missing,
}

/// Persistence port for the booking core. Implementations must make
/// `book_slot`, `transition_appointment`, `remove_slot` and `remove_doctor`
/// atomic with respect to each other.
pub trait BookingStore: Send + Sync {
    fn insert_doctor(&self, doctor: &DoctorProfile) -> anyhow::Result<()>;
    fn get_doctor(&self, id: &str) -> anyhow::Result<Option<DoctorProfile>>;
    fn set_doctor_status(&self, id: &str, status: DoctorStatus) -> anyhow::Result<bool>;
    /// Refuses while the doctor holds booked slots; otherwise drops the
    /// profile together with its free slots.
    fn remove_doctor(&self, id: &str) -> anyhow::Result<DoctorRemoval>;

    fn insert_slots(&self, slots: &[Slot]) -> anyhow::Result<()>;
    fn get_slot(&self, id: &str) -> anyhow::Result<Option<Slot>>;
    fn list_slots(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
        unbooked_only: bool,
    ) -> anyhow::Result<Vec<Slot>>;
    fn remove_slot(&self, id: &str) -> anyhow::Result<SlotRemoval>;
    /// Unconditional flip. Returns false when the slot does not exist.
    fn set_slot_booked(&self, id: &str, booked: bool) -> anyhow::Result<bool>;
    /// Re-derives the flag from live appointments atomically. Returns true
    /// when the flag changed.
    fn resync_slot_flag(&self, id: &str) -> anyhow::Result<bool>;

    /// Claims `appointment.slot_id` and inserts the appointment as one unit.
    fn book_slot(&self, appointment: &Appointment) -> anyhow::Result<BookOutcome>;
    /// Compare-and-set on status; leaving a slot-holding status for
    /// `cancelled` frees the slot in the same unit.
    fn transition_appointment(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: NaiveDateTime,
    ) -> anyhow::Result<bool>;
    fn get_appointment(&self, id: &str) -> anyhow::Result<Option<Appointment>>;
    fn list_appointments(&self, filter: &AppointmentFilter) -> anyhow::Result<Vec<AppointmentView>>;

    fn slot_occupancy(&self) -> anyhow::Result<Vec<SlotOccupancy>>;
    /// `today` is the clinic's calendar date; appointments on or after it are upcoming.
    fn dashboard_stats(&self, today: NaiveDate) -> anyhow::Result<DashboardStats>;
}
