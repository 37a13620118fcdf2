use crate::models::{Appointment, AppointmentStatus};

pub fn generate_ics(appointment: &Appointment, doctor_name: &str) -> String {
    let dtstart = appointment
        .date
        .and_time(appointment.start_time)
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtend = appointment
        .date
        .and_time(appointment.end_time)
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = appointment.created_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@clinicbook", appointment.id);

    let summary = format!("Appointment with {doctor_name}");
    let description = appointment
        .reason
        .as_deref()
        .map(escape_text)
        .unwrap_or_else(|| "No reason given".to_string());
    let status = match appointment.status {
        AppointmentStatus::Cancelled => "CANCELLED",
        AppointmentStatus::Pending => "TENTATIVE",
        _ => "CONFIRMED",
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Clinicbook//Appointments//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{}\r\n\
         DESCRIPTION:{description}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        escape_text(&summary)
    )
}

// RFC 5545 TEXT escaping. Any line break, CRLF or bare CR included, becomes `\n`.
fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace("\r\n", "\\n")
        .replace('\r', "\\n")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::slot::{parse_date, parse_time};
    use chrono::NaiveDateTime;

    fn appointment(status: AppointmentStatus, reason: Option<&str>) -> Appointment {
        let created =
            NaiveDateTime::parse_from_str("2025-02-10 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Appointment {
            id: "appt-123".to_string(),
            patient_id: "pat-1".to_string(),
            doctor_id: "doc-1".to_string(),
            slot_id: "slot-1".to_string(),
            date: parse_date("2025-03-15").unwrap(),
            start_time: parse_time("14:00").unwrap(),
            end_time: parse_time("14:30").unwrap(),
            status,
            reason: reason.map(str::to_string),
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(
            &appointment(AppointmentStatus::Confirmed, Some("Annual checkup")),
            "Dr. House",
        );
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("BEGIN:VEVENT"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T143000"));
        assert!(ics.contains("DTSTAMP:20250210T100000Z"));
        assert!(ics.contains("SUMMARY:Appointment with Dr. House"));
        assert!(ics.contains("DESCRIPTION:Annual checkup"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.contains("UID:appt-123@clinicbook"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_generate_ics_no_reason_and_escaping() {
        let ics = generate_ics(&appointment(AppointmentStatus::Pending, None), "Smith, Jane");
        assert!(ics.contains("DESCRIPTION:No reason given"));
        assert!(ics.contains("SUMMARY:Appointment with Smith\\, Jane"));
        assert!(ics.contains("STATUS:TENTATIVE"));
    }

    #[test]
    fn test_generate_ics_folds_line_breaks() {
        let ics = generate_ics(
            &appointment(AppointmentStatus::Confirmed, Some("fever\r\ncough\rrash\nache")),
            "Dr. A",
        );
        assert!(ics.contains("DESCRIPTION:fever\\ncough\\nrash\\nache\r\n"));
        for line in ics.split("\r\n") {
            assert!(!line.contains('\r') && !line.contains('\n'), "{line:?}");
        }
    }

    #[test]
    fn test_generate_ics_cancelled() {
        let ics = generate_ics(&appointment(AppointmentStatus::Cancelled, Some("x")), "Dr. A");
        assert!(ics.contains("STATUS:CANCELLED"));
    }
}
