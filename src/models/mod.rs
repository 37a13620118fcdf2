pub mod actor;
pub mod appointment;
pub mod doctor;
pub mod slot;

pub use actor::{Actor, Role};
pub use appointment::{Appointment, AppointmentStatus, AppointmentView, NewAppointment};
pub use doctor::{DoctorProfile, DoctorStatus, NewDoctor};
pub use slot::{NewSlot, Slot};

use chrono::{NaiveDateTime, SubsecRound, Utc};

/// Current UTC time at the precision timestamps are stored with, so a value
/// handed back on create equals every later read.
pub fn timestamp_now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}
