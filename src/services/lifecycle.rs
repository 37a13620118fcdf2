use std::sync::Arc;

use serde::Serialize;

use crate::db::{AppointmentFilter, BookOutcome, BookingStore};
use crate::errors::BookingError;
use crate::models::{timestamp_now, Actor, Appointment, AppointmentStatus, AppointmentView, Role};
use crate::services::ids::IdGenerator;
use crate::services::slots::SlotLedger;

use AppointmentStatus::{Cancelled, CheckedIn, Completed, Confirmed, Pending};

/// Valid status changes and the roles allowed to make them. Admin appears on
/// every row. Anything not listed is an invalid transition.
const TRANSITIONS: &[(AppointmentStatus, AppointmentStatus, &[Role])] = &[
    (Pending, Confirmed, &[Role::Doctor, Role::Admin]),
    (Pending, Cancelled, &[Role::Patient, Role::Doctor, Role::Admin]),
    (Confirmed, Cancelled, &[Role::Patient, Role::Doctor, Role::Admin]),
    (Confirmed, CheckedIn, &[Role::Doctor, Role::Admin]),
    (Confirmed, Completed, &[Role::Doctor, Role::Admin]),
    (CheckedIn, Completed, &[Role::Doctor, Role::Admin]),
];

const MAX_TRANSITION_ATTEMPTS: usize = 5;

pub fn allowed_roles(from: AppointmentStatus, to: AppointmentStatus) -> Option<&'static [Role]> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, roles)| *roles)
}

pub fn check_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
    role: Role,
) -> Result<(), BookingError> {
    let roles = allowed_roles(from, to).ok_or(BookingError::InvalidTransition { from, to })?;
    if roles.contains(&role) {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!(
            "a {} may not move an appointment from {from} to {to}",
            role.as_str()
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    BookedWithoutAppointment,
    AppointmentOnFreeSlot,
    MultipleAppointments,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotViolation {
    pub slot_id: String,
    pub is_booked: bool,
    pub active_appointments: i64,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub slots_checked: usize,
    pub violations: Vec<SlotViolation>,
    pub repaired: usize,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Owns appointments and their status machine, keeping slot occupancy in
/// step with it.
pub struct AppointmentLifecycle {
    store: Arc<dyn BookingStore>,
    ledger: Arc<SlotLedger>,
    ids: Arc<dyn IdGenerator>,
    initial_status: AppointmentStatus,
}

impl AppointmentLifecycle {
    pub fn new(
        store: Arc<dyn BookingStore>,
        ledger: Arc<SlotLedger>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            store,
            ledger,
            ids,
            initial_status: Pending,
        }
    }

    /// Book straight into `confirmed` instead of `pending`.
    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.initial_status = if auto_confirm { Confirmed } else { Pending };
        self
    }

    pub fn create(
        &self,
        patient_id: &str,
        doctor_id: &str,
        slot_id: &str,
        reason: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let slot = self.ledger.get_slot(slot_id)?;
        if slot.doctor_id != doctor_id {
            return Err(BookingError::Validation(format!(
                "slot {slot_id} does not belong to doctor {doctor_id}"
            )));
        }

        let doctor = self
            .store
            .get_doctor(doctor_id)?
            .ok_or_else(|| BookingError::NotFound(format!("doctor {doctor_id}")))?;
        if !doctor.is_approved() {
            return Err(BookingError::DoctorNotApproved(doctor_id.to_string()));
        }
        if slot.is_booked {
            return Err(BookingError::SlotAlreadyBooked(slot_id.to_string()));
        }

        let now = timestamp_now();
        let appointment = Appointment {
            id: self.ids.next_id(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            slot_id: slot_id.to_string(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: self.initial_status,
            reason: reason.filter(|r| !r.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };

        match self.store.book_slot(&appointment)? {
            BookOutcome::Booked => {
                tracing::info!(
                    appointment_id = %appointment.id,
                    slot_id,
                    patient_id,
                    doctor_id,
                    status = appointment.status.as_str(),
                    "appointment booked"
                );
                Ok(appointment)
            }
            BookOutcome::SlotTaken => {
                tracing::warn!(slot_id, patient_id, "lost booking race for slot");
                Err(BookingError::SlotAlreadyBooked(slot_id.to_string()))
            }
            BookOutcome::SlotMissing => Err(BookingError::NotFound(format!("slot {slot_id}"))),
        }
    }

    /// Applies one transition. The status write is compare-and-set; when a
    /// concurrent writer got there first the new state is re-checked.
    pub fn set_status(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        actor: &Actor,
    ) -> Result<Appointment, BookingError> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.get(appointment_id)?;
            check_transition(current.status, new_status, actor.role)?;

            let now = timestamp_now();
            if self
                .store
                .transition_appointment(appointment_id, current.status, new_status, now)?
            {
                tracing::info!(
                    appointment_id,
                    from = current.status.as_str(),
                    to = new_status.as_str(),
                    actor_id = %actor.id,
                    actor_role = actor.role.as_str(),
                    "appointment status changed"
                );
                return Ok(Appointment {
                    status: new_status,
                    updated_at: now,
                    ..current
                });
            }
            tracing::debug!(appointment_id, "status changed underneath, retrying");
        }

        Err(BookingError::Storage(anyhow::anyhow!(
            "appointment {appointment_id} kept changing during update"
        )))
    }

    pub fn get(&self, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.store
            .get_appointment(appointment_id)?
            .ok_or_else(|| BookingError::NotFound(format!("appointment {appointment_id}")))
    }

    pub fn list_for_patient(
        &self,
        patient_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        Ok(self.store.list_appointments(&AppointmentFilter {
            patient_id: Some(patient_id.to_string()),
            doctor_id: None,
            status,
        })?)
    }

    pub fn list_for_doctor(
        &self,
        doctor_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        Ok(self.store.list_appointments(&AppointmentFilter {
            patient_id: None,
            doctor_id: Some(doctor_id.to_string()),
            status,
        })?)
    }

    pub fn list_all(
        &self,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        Ok(self.store.list_appointments(&AppointmentFilter {
            status,
            ..Default::default()
        })?)
    }

    /// Slots whose booked flag disagrees with the appointments holding them.
    pub fn check_consistency(&self) -> Result<ConsistencyReport, BookingError> {
        let occupancy = self.store.slot_occupancy()?;
        let violations = occupancy
            .iter()
            .filter_map(|o| {
                let kind = match (o.is_booked, o.active_appointments) {
                    (true, 0) => ViolationKind::BookedWithoutAppointment,
                    (false, n) if n > 0 => ViolationKind::AppointmentOnFreeSlot,
                    (_, n) if n > 1 => ViolationKind::MultipleAppointments,
                    _ => return None,
                };
                Some(SlotViolation {
                    slot_id: o.slot_id.clone(),
                    is_booked: o.is_booked,
                    active_appointments: o.active_appointments,
                    kind,
                })
            })
            .collect();

        Ok(ConsistencyReport {
            slots_checked: occupancy.len(),
            violations,
            repaired: 0,
        })
    }

    /// Re-derives every inconsistent slot flag from its appointments. The
    /// report only picks candidates; each flag is recomputed at write time,
    /// so a booking or cancellation landing in between is respected. Slots
    /// held by several appointments cannot be fixed by a flag and are left
    /// in the report.
    pub fn repair_consistency(&self) -> Result<ConsistencyReport, BookingError> {
        let mut report = self.check_consistency()?;
        for violation in &report.violations {
            match violation.kind {
                ViolationKind::BookedWithoutAppointment | ViolationKind::AppointmentOnFreeSlot => {
                    if self.ledger.resync_booked(&violation.slot_id)? {
                        report.repaired += 1;
                    }
                }
                ViolationKind::MultipleAppointments => {
                    tracing::warn!(
                        slot_id = %violation.slot_id,
                        active = violation.active_appointments,
                        "slot held by several appointments, needs manual review"
                    );
                }
            }
        }
        if report.repaired > 0 {
            tracing::info!(repaired = report.repaired, "slot flags repaired");
        }
        Ok(report)
    }
}
