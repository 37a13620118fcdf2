use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::AppConfig;
use crate::db::{BookingStore, DashboardStats, DoctorRemoval};
use crate::errors::BookingError;
use crate::models::slot::parse_date;
use crate::models::{
    timestamp_now, Actor, Appointment, AppointmentStatus, AppointmentView, DoctorProfile, DoctorStatus,
    NewAppointment, NewDoctor, NewSlot, Role, Slot,
};
use crate::services::calendar::generate_ics;
use crate::services::ids::{IdGenerator, UuidIds};
use crate::services::lifecycle::{AppointmentLifecycle, ConsistencyReport};
use crate::services::slots::{SlotLedger, SlotPolicy};

/// Public operation surface. Checks who may do what, then delegates to the
/// slot ledger and the appointment lifecycle.
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    ledger: Arc<SlotLedger>,
    lifecycle: AppointmentLifecycle,
    today: fn() -> NaiveDate,
}

fn clinic_today() -> NaiveDate {
    Local::now().date_naive()
}

impl BookingService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        ids: Arc<dyn IdGenerator>,
        policy: SlotPolicy,
        auto_confirm: bool,
    ) -> Self {
        let ledger = Arc::new(SlotLedger::new(store.clone(), ids.clone(), policy));
        let lifecycle = AppointmentLifecycle::new(store.clone(), ledger.clone(), ids)
            .with_auto_confirm(auto_confirm);
        Self {
            store,
            ledger,
            lifecycle,
            today: clinic_today,
        }
    }

    pub fn from_config(store: Arc<dyn BookingStore>, config: &AppConfig) -> Self {
        Self::new(
            store,
            Arc::new(UuidIds),
            SlotPolicy::from(config),
            config.auto_confirm_bookings,
        )
    }

    /// Overrides the clinic calendar used to reject slots in the past.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    // ── Doctors ──

    pub fn register_doctor(
        &self,
        actor: &Actor,
        new: &NewDoctor,
    ) -> Result<DoctorProfile, BookingError> {
        require_doctor_or_admin(actor, &new.id, "register this doctor")?;
        if new.id.trim().is_empty() || new.name.trim().is_empty() {
            return Err(BookingError::Validation(
                "doctor id and name are required".to_string(),
            ));
        }
        if self.store.get_doctor(&new.id)?.is_some() {
            return Err(BookingError::Validation(format!(
                "doctor {} is already registered",
                new.id
            )));
        }

        let now = timestamp_now();
        let doctor = DoctorProfile {
            id: new.id.clone(),
            name: new.name.trim().to_string(),
            specialty: new.specialty.clone(),
            status: DoctorStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_doctor(&doctor)?;
        tracing::info!(doctor_id = %doctor.id, "doctor registered, awaiting approval");
        Ok(doctor)
    }

    pub fn get_doctor(&self, doctor_id: &str) -> Result<DoctorProfile, BookingError> {
        self.store
            .get_doctor(doctor_id)?
            .ok_or_else(|| BookingError::NotFound(format!("doctor {doctor_id}")))
    }

    pub fn approve_doctor(&self, actor: &Actor, doctor_id: &str) -> Result<DoctorProfile, BookingError> {
        self.review_doctor(actor, doctor_id, DoctorStatus::Approved)
    }

    pub fn reject_doctor(&self, actor: &Actor, doctor_id: &str) -> Result<DoctorProfile, BookingError> {
        self.review_doctor(actor, doctor_id, DoctorStatus::Rejected)
    }

    /// Refused while the doctor has booked slots. Free slots go with the
    /// profile; appointment history stays.
    pub fn remove_doctor(&self, actor: &Actor, doctor_id: &str) -> Result<usize, BookingError> {
        require_admin(actor, "remove doctors")?;
        match self.store.remove_doctor(doctor_id)? {
            DoctorRemoval::Removed { slots_removed } => {
                tracing::info!(doctor_id, slots_removed, "doctor removed");
                Ok(slots_removed)
            }
            DoctorRemoval::HasBookedSlots(count) => {
                tracing::warn!(doctor_id, booked = count, "refused to remove doctor with booked slots");
                Err(BookingError::DoctorHasBookedSlots(doctor_id.to_string()))
            }
            DoctorRemoval::Missing => Err(BookingError::NotFound(format!("doctor {doctor_id}"))),
        }
    }

    fn review_doctor(
        &self,
        actor: &Actor,
        doctor_id: &str,
        status: DoctorStatus,
    ) -> Result<DoctorProfile, BookingError> {
        require_admin(actor, "review doctor registrations")?;
        if !self.store.set_doctor_status(doctor_id, status)? {
            return Err(BookingError::NotFound(format!("doctor {doctor_id}")));
        }
        tracing::info!(doctor_id, status = status.as_str(), reviewer = %actor.id, "doctor reviewed");
        self.get_doctor(doctor_id)
    }

    // ── Slots ──

    pub fn create_slot(&self, actor: &Actor, new: &NewSlot) -> Result<Slot, BookingError> {
        require_doctor_or_admin(actor, &new.doctor_id, "publish slots for this doctor")?;
        self.reject_past_date(&new.date)?;
        self.ledger.create_slot(new)
    }

    pub fn generate_slots(&self, actor: &Actor, new: &NewSlot) -> Result<Vec<Slot>, BookingError> {
        require_doctor_or_admin(actor, &new.doctor_id, "publish slots for this doctor")?;
        self.reject_past_date(&new.date)?;
        self.ledger.generate_slots(new)
    }

    pub fn delete_slot(&self, actor: &Actor, slot_id: &str) -> Result<(), BookingError> {
        let slot = self.ledger.get_slot(slot_id)?;
        require_doctor_or_admin(actor, &slot.doctor_id, "delete this slot")?;
        self.ledger.delete_slot(slot_id)
    }

    /// Doctor's own view: every slot, booked or not.
    pub fn doctor_schedule(&self, actor: &Actor, doctor_id: &str) -> Result<Vec<Slot>, BookingError> {
        require_doctor_or_admin(actor, doctor_id, "view this schedule")?;
        self.ledger.list_all(doctor_id)
    }

    pub fn available_slots(
        &self,
        doctor_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, BookingError> {
        self.ledger.list_available(doctor_id, date)
    }

    fn reject_past_date(&self, raw: &str) -> Result<(), BookingError> {
        let date = parse_date(raw).map_err(|e| BookingError::Validation(e.to_string()))?;
        let today = (self.today)();
        if date < today {
            return Err(BookingError::Validation(format!(
                "slot date {date} is in the past (today is {today})"
            )));
        }
        Ok(())
    }

    // ── Appointments ──

    pub fn book(&self, actor: &Actor, req: &NewAppointment) -> Result<Appointment, BookingError> {
        let allowed = actor.is_admin()
            || actor.is_patient(&req.patient_id)
            || actor.is_doctor(&req.doctor_id);
        if !allowed {
            return Err(BookingError::Forbidden(
                "only the patient, the slot's doctor or an admin may book".to_string(),
            ));
        }
        self.lifecycle
            .create(&req.patient_id, &req.doctor_id, &req.slot_id, req.reason.clone())
    }

    pub fn set_status(
        &self,
        actor: &Actor,
        appointment_id: &str,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let current = self.lifecycle.get(appointment_id)?;
        require_party(actor, &current, "change this appointment")?;
        self.lifecycle.set_status(appointment_id, status, actor)
    }

    pub fn cancel(&self, actor: &Actor, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.set_status(actor, appointment_id, AppointmentStatus::Cancelled)
    }

    pub fn confirm(&self, actor: &Actor, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.set_status(actor, appointment_id, AppointmentStatus::Confirmed)
    }

    pub fn check_in(&self, actor: &Actor, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.set_status(actor, appointment_id, AppointmentStatus::CheckedIn)
    }

    pub fn complete(&self, actor: &Actor, appointment_id: &str) -> Result<Appointment, BookingError> {
        self.set_status(actor, appointment_id, AppointmentStatus::Completed)
    }

    pub fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.lifecycle.get(appointment_id)?;
        require_party(actor, &appointment, "view this appointment")?;
        Ok(appointment)
    }

    pub fn patient_appointments(
        &self,
        actor: &Actor,
        patient_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        if !(actor.is_admin() || actor.is_patient(patient_id)) {
            return Err(BookingError::Forbidden(
                "patients may only list their own appointments".to_string(),
            ));
        }
        self.lifecycle.list_for_patient(patient_id, status)
    }

    pub fn doctor_appointments(
        &self,
        actor: &Actor,
        doctor_id: &str,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        require_doctor_or_admin(actor, doctor_id, "list this doctor's appointments")?;
        self.lifecycle.list_for_doctor(doctor_id, status)
    }

    pub fn all_appointments(
        &self,
        actor: &Actor,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        require_admin(actor, "list all appointments")?;
        self.lifecycle.list_all(status)
    }

    /// iCalendar export for one appointment.
    pub fn appointment_calendar(
        &self,
        actor: &Actor,
        appointment_id: &str,
    ) -> Result<String, BookingError> {
        let appointment = self.get_appointment(actor, appointment_id)?;
        let doctor_name = self
            .store
            .get_doctor(&appointment.doctor_id)?
            .map(|d| d.name)
            .unwrap_or_else(|| "your doctor".to_string());
        Ok(generate_ics(&appointment, &doctor_name))
    }

    // ── Admin ──

    pub fn dashboard_stats(&self, actor: &Actor) -> Result<DashboardStats, BookingError> {
        require_admin(actor, "view clinic stats")?;
        Ok(self.store.dashboard_stats((self.today)())?)
    }

    pub fn consistency_report(&self, actor: &Actor) -> Result<ConsistencyReport, BookingError> {
        require_admin(actor, "audit slot consistency")?;
        self.lifecycle.check_consistency()
    }

    pub fn repair_consistency(&self, actor: &Actor) -> Result<ConsistencyReport, BookingError> {
        require_admin(actor, "repair slot consistency")?;
        self.lifecycle.repair_consistency()
    }
}

// ── Authorization predicates ──

fn require_admin(actor: &Actor, action: &str) -> Result<(), BookingError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!("only an admin may {action}")))
    }
}

fn require_doctor_or_admin(actor: &Actor, doctor_id: &str, action: &str) -> Result<(), BookingError> {
    if actor.is_admin() || actor.is_doctor(doctor_id) {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!(
            "only doctor {doctor_id} or an admin may {action}"
        )))
    }
}

/// Admins, the appointment's patient and the appointment's doctor.
fn require_party(actor: &Actor, appointment: &Appointment, action: &str) -> Result<(), BookingError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Patient => actor.id == appointment.patient_id,
        Role::Doctor => actor.id == appointment.doctor_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(BookingError::Forbidden(format!(
            "{} {} may not {action}",
            actor.role.as_str(),
            actor.id
        )))
    }
}
