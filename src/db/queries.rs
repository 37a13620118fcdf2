use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::slot::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{
    Appointment, AppointmentStatus, AppointmentView, DoctorProfile, DoctorStatus, Slot,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SLOT_COLUMNS: &str =
    "id, doctor_id, date, start_time, end_time, duration_minutes, is_booked, created_at";

const APPOINTMENT_COLUMNS: &str = "a.id, a.patient_id, a.doctor_id, a.slot_id, a.date, a.start_time, a.end_time, \
     a.status, a.reason, a.created_at, a.updated_at";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn day(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn hhmm(t: &NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

// ── Doctors ──

pub fn insert_doctor(conn: &Connection, doctor: &DoctorProfile) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO doctors (id, name, specialty, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            doctor.id,
            doctor.name,
            doctor.specialty,
            doctor.status.as_str(),
            ts(&doctor.created_at),
            ts(&doctor.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_doctor(conn: &Connection, id: &str) -> anyhow::Result<Option<DoctorProfile>> {
    let row = conn
        .query_row(
            "SELECT id, name, specialty, status, created_at, updated_at FROM doctors WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, name, specialty, status, created_at, updated_at)) => Ok(Some(DoctorProfile {
            id,
            name,
            specialty,
            status: DoctorStatus::from_str(&status),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })),
        None => Ok(None),
    }
}

pub fn update_doctor_status(
    conn: &Connection,
    id: &str,
    status: DoctorStatus,
) -> anyhow::Result<bool> {
    let now = ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE doctors SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn delete_doctor(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Slots ──

pub fn insert_slot(conn: &Connection, slot: &Slot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO slots (id, doctor_id, date, start_time, end_time, duration_minutes, is_booked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            slot.id,
            slot.doctor_id,
            day(&slot.date),
            hhmm(&slot.start_time),
            hhmm(&slot.end_time),
            slot.duration_minutes,
            slot.is_booked,
            ts(&slot.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_slot(conn: &Connection, id: &str) -> anyhow::Result<Option<Slot>> {
    let sql = format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_slot_row(row)))
        .optional()?;

    match result {
        Some(slot) => Ok(Some(slot?)),
        None => Ok(None),
    }
}

/// Slots of one doctor ordered by date, then start time, then insertion order.
pub fn list_slots(
    conn: &Connection,
    doctor_id: &str,
    date: Option<NaiveDate>,
    unbooked_only: bool,
) -> anyhow::Result<Vec<Slot>> {
    let mut sql = format!("SELECT {SLOT_COLUMNS} FROM slots WHERE doctor_id = ?1");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(doctor_id.to_string())];

    if let Some(date) = date {
        params_vec.push(Box::new(day(&date)));
        sql.push_str(&format!(" AND date = ?{}", params_vec.len()));
    }
    if unbooked_only {
        sql.push_str(" AND is_booked = 0");
    }
    sql.push_str(" ORDER BY date ASC, start_time ASC, rowid ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_slot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

/// Deletes only an unbooked slot. Returns false when nothing matched.
pub fn delete_unbooked_slot(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM slots WHERE id = ?1 AND is_booked = 0",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn set_slot_booked(conn: &Connection, id: &str, booked: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE slots SET is_booked = ?1 WHERE id = ?2",
        params![booked, id],
    )?;
    Ok(count > 0)
}

/// Sets the flag from the appointments currently holding the slot, in one
/// statement. Returns true when the stored flag changed.
pub fn resync_slot_flag(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE slots
         SET is_booked = EXISTS (SELECT 1 FROM appointments a WHERE a.slot_id = slots.id AND a.status <> 'cancelled')
         WHERE id = ?1
           AND is_booked <> EXISTS (SELECT 1 FROM appointments a WHERE a.slot_id = slots.id AND a.status <> 'cancelled')",
        params![id],
    )?;
    Ok(count > 0)
}

/// Conditional write: flips the flag only if the slot is currently free.
pub fn claim_slot(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE slots SET is_booked = 1 WHERE id = ?1 AND is_booked = 0",
        params![id],
    )?;
    Ok(count == 1)
}

pub fn count_booked_slots_for_doctor(conn: &Connection, doctor_id: &str) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM slots WHERE doctor_id = ?1 AND is_booked = 1",
        params![doctor_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_unbooked_slots_for_doctor(conn: &Connection, doctor_id: &str) -> anyhow::Result<usize> {
    let count = conn.execute(
        "DELETE FROM slots WHERE doctor_id = ?1 AND is_booked = 0",
        params![doctor_id],
    )?;
    Ok(count)
}

fn parse_slot_row(row: &rusqlite::Row) -> anyhow::Result<Slot> {
    let id: String = row.get(0)?;
    let doctor_id: String = row.get(1)?;
    let date_str: String = row.get(2)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let duration_minutes: i64 = row.get(5)?;
    let is_booked: bool = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(Slot {
        date: parse_day(&date_str)?,
        start_time: parse_hhmm(&start_str)?,
        end_time: parse_hhmm(&end_str)?,
        created_at: parse_timestamp(&created_at_str)?,
        id,
        doctor_id,
        duration_minutes,
        is_booked,
    })
}

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, slot_id, date, start_time, end_time, status, reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            appt.id,
            appt.patient_id,
            appt.doctor_id,
            appt.slot_id,
            day(&appt.date),
            hhmm(&appt.start_time),
            hhmm(&appt.end_time),
            appt.status.as_str(),
            appt.reason,
            ts(&appt.created_at),
            ts(&appt.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)))
        .optional()?;

    match result {
        Some(appt) => Ok(Some(appt?)),
        None => Ok(None),
    }
}

/// Compare-and-set on status. Returns false when the row is missing or its
/// status is no longer `from`.
pub fn update_appointment_status_if(
    conn: &Connection,
    id: &str,
    from: AppointmentStatus,
    to: AppointmentStatus,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), ts(at), id, from.as_str()],
    )?;
    Ok(count == 1)
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<AppointmentStatus>,
}

/// Ordered by date, then start time, then creation.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
) -> anyhow::Result<Vec<AppointmentView>> {
    let mut sql = format!(
        "SELECT {APPOINTMENT_COLUMNS}, d.name, d.specialty
         FROM appointments a LEFT JOIN doctors d ON d.id = a.doctor_id WHERE 1 = 1"
    );
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(patient_id) = &filter.patient_id {
        params_vec.push(Box::new(patient_id.clone()));
        sql.push_str(&format!(" AND a.patient_id = ?{}", params_vec.len()));
    }
    if let Some(doctor_id) = &filter.doctor_id {
        params_vec.push(Box::new(doctor_id.clone()));
        sql.push_str(&format!(" AND a.doctor_id = ?{}", params_vec.len()));
    }
    if let Some(status) = filter.status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND a.status = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY a.date ASC, a.start_time ASC, a.created_at ASC, a.rowid ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let doctor_name: Option<String> = row.get(11)?;
        let doctor_specialty: Option<String> = row.get(12)?;
        Ok(parse_appointment_row(row).map(|appointment| AppointmentView {
            appointment,
            doctor_name,
            doctor_specialty,
        }))
    })?;

    let mut views = vec![];
    for row in rows {
        views.push(row??);
    }
    Ok(views)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let patient_id: String = row.get(1)?;
    let doctor_id: String = row.get(2)?;
    let slot_id: String = row.get(3)?;
    let date_str: String = row.get(4)?;
    let start_str: String = row.get(5)?;
    let end_str: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let reason: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    let status = AppointmentStatus::parse(&status_str)
        .with_context(|| format!("unknown appointment status in store: {status_str}"))?;

    Ok(Appointment {
        date: parse_day(&date_str)?,
        start_time: parse_hhmm(&start_str)?,
        end_time: parse_hhmm(&end_str)?,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
        id,
        patient_id,
        doctor_id,
        slot_id,
        status,
        reason,
    })
}

// ── Consistency ──

/// A slot's flag next to the number of appointments currently holding it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotOccupancy {
    pub slot_id: String,
    pub is_booked: bool,
    pub active_appointments: i64,
}

pub fn slot_occupancy(conn: &Connection) -> anyhow::Result<Vec<SlotOccupancy>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.is_booked,
                (SELECT COUNT(*) FROM appointments a WHERE a.slot_id = s.id AND a.status <> 'cancelled')
         FROM slots s ORDER BY s.date ASC, s.start_time ASC, s.rowid ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(SlotOccupancy {
            slot_id: row.get(0)?,
            is_booked: row.get(1)?,
            active_appointments: row.get(2)?,
        })
    })?;

    let mut occupancy = vec![];
    for row in rows {
        occupancy.push(row?);
    }
    Ok(occupancy)
}

// ── Dashboard ──

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending_doctors: i64,
    pub open_slots: i64,
    pub booked_slots: i64,
    pub upcoming_appointments: i64,
}

pub fn get_dashboard_stats(conn: &Connection, today: NaiveDate) -> anyhow::Result<DashboardStats> {
    let today = day(&today);

    let pending_doctors: i64 = conn.query_row(
        "SELECT COUNT(*) FROM doctors WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )?;

    let open_slots: i64 = conn.query_row(
        "SELECT COUNT(*) FROM slots WHERE is_booked = 0",
        [],
        |row| row.get(0),
    )?;

    let booked_slots: i64 = conn.query_row(
        "SELECT COUNT(*) FROM slots WHERE is_booked = 1",
        [],
        |row| row.get(0),
    )?;

    let upcoming_appointments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE date >= ?1 AND status IN ('pending', 'confirmed', 'checked_in')",
        params![today],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        pending_doctors,
        open_slots,
        booked_slots,
        upcoming_appointments,
    })
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp in store: {s}"))
}

fn parse_day(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid date in store: {s}"))
}

fn parse_hhmm(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FORMAT).with_context(|| format!("invalid time in store: {s}"))
}
