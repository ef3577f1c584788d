use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::specialist::{specialist_from_row, specialist_row_from_rusqlite};
use crate::db::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

/// Outcome of [`ensure_active_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Confirmed,
}

pub fn get_active_link(
    conn: &Connection,
    patient_id: &str,
    specialist_id: &Uuid,
) -> Result<Option<PatientSpecialistLink>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, specialist_id, assigned_at, active
         FROM patient_specialist_links
         WHERE patient_id = ?1 AND specialist_id = ?2 AND active = 1",
        params![patient_id, specialist_id.to_string()],
        link_row_from_rusqlite,
    );

    match result {
        Ok(row) => Ok(Some(link_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Create a new active relation for the pair, superseding any prior active one.
/// Superseded rows stay in the table with `active = 0`.
pub fn create_link(
    conn: &Connection,
    patient_id: &str,
    specialist_id: &Uuid,
    at: &DateTime<Utc>,
) -> Result<PatientSpecialistLink, DatabaseError> {
    conn.execute(
        "UPDATE patient_specialist_links SET active = 0
         WHERE patient_id = ?1 AND specialist_id = ?2 AND active = 1",
        params![patient_id, specialist_id.to_string()],
    )?;

    let link = PatientSpecialistLink {
        id: Uuid::new_v4(),
        patient_id: patient_id.to_string(),
        specialist_id: *specialist_id,
        assigned_at: *at,
        active: true,
    };
    conn.execute(
        "INSERT INTO patient_specialist_links (id, patient_id, specialist_id, assigned_at, active)
         VALUES (?1, ?2, ?3, ?4, 1)",
        params![
            link.id.to_string(),
            link.patient_id,
            link.specialist_id.to_string(),
            to_db_timestamp(&link.assigned_at),
        ],
    )?;
    Ok(link)
}

/// Confirm the active relation for the pair, creating it if absent.
pub fn ensure_active_link(
    conn: &Connection,
    patient_id: &str,
    specialist_id: &Uuid,
    at: &DateTime<Utc>,
) -> Result<LinkOutcome, DatabaseError> {
    if get_active_link(conn, patient_id, specialist_id)?.is_some() {
        return Ok(LinkOutcome::Confirmed);
    }
    create_link(conn, patient_id, specialist_id, at)?;
    Ok(LinkOutcome::Created)
}

/// Patients with an active relation to the specialist.
pub fn patients_for_specialist(
    conn: &Connection,
    specialist_id: &Uuid,
) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT patient_id FROM patient_specialist_links
         WHERE specialist_id = ?1 AND active = 1 ORDER BY patient_id ASC",
    )?;
    let rows = stmt.query_map(params![specialist_id.to_string()], |row| row.get::<_, String>(0))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?);
    }
    Ok(patients)
}

/// Specialists with an active relation to the patient.
pub fn specialists_for_patient(
    conn: &Connection,
    patient_id: &str,
) -> Result<Vec<Specialist>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.specialization, s.license_number, s.contact_number,
                s.hospital_affiliation, s.available, s.last_assigned_at, s.created_at
         FROM specialists s
         JOIN patient_specialist_links l ON l.specialist_id = s.id
         WHERE l.patient_id = ?1 AND l.active = 1
         ORDER BY l.assigned_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id], |row| Ok(specialist_row_from_rusqlite(row)))?;

    let mut specialists = Vec::new();
    for row in rows {
        specialists.push(specialist_from_row(row??)?);
    }
    Ok(specialists)
}

struct LinkRow {
    id: String,
    patient_id: String,
    specialist_id: String,
    assigned_at: String,
    active: bool,
}

fn link_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<LinkRow, rusqlite::Error> {
    Ok(LinkRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        specialist_id: row.get(2)?,
        assigned_at: row.get(3)?,
        active: row.get(4)?,
    })
}

fn link_from_row(row: LinkRow) -> Result<PatientSpecialistLink, DatabaseError> {
    Ok(PatientSpecialistLink {
        id: parse_db_uuid("patient_specialist_links.id", &row.id)?,
        patient_id: row.patient_id,
        specialist_id: parse_db_uuid("patient_specialist_links.specialist_id", &row.specialist_id)?,
        assigned_at: parse_db_timestamp("patient_specialist_links.assigned_at", &row.assigned_at)?,
        active: row.active,
    })
}
