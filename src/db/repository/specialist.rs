use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DatabaseError};
use crate::models::*;

const SPECIALIST_COLUMNS: &str = "id, name, specialization, license_number, contact_number,
     hospital_affiliation, available, last_assigned_at, created_at";

/// Register a practitioner. License numbers are unique.
pub fn register_specialist(
    conn: &Connection,
    new: &NewSpecialist,
) -> Result<Specialist, DatabaseError> {
    let license = new.license_number.trim();
    if license.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "license number is required".into(),
        ));
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM specialists WHERE license_number = ?1)",
        params![license],
        |row| row.get(0),
    )?;
    if exists {
        return Err(DatabaseError::ConstraintViolation(format!(
            "license number {license} is already registered"
        )));
    }

    let specialist = Specialist {
        id: Uuid::new_v4(),
        name: new.name.trim().to_string(),
        specialization: new.specialization.trim().to_string(),
        license_number: license.to_string(),
        contact_number: new.contact_number.clone(),
        hospital_affiliation: new.hospital_affiliation.clone(),
        available: true,
        last_assigned_at: None,
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO specialists (id, name, specialization, license_number, contact_number,
         hospital_affiliation, available, last_assigned_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            specialist.id.to_string(),
            specialist.name,
            specialist.specialization,
            specialist.license_number,
            specialist.contact_number,
            specialist.hospital_affiliation,
            specialist.available,
            specialist.last_assigned_at.as_ref().map(to_db_timestamp),
            to_db_timestamp(&specialist.created_at),
        ],
    )?;

    Ok(specialist)
}

pub fn get_specialist(conn: &Connection, id: &Uuid) -> Result<Option<Specialist>, DatabaseError> {
    let sql = format!("SELECT {SPECIALIST_COLUMNS} FROM specialists WHERE id = ?1");
    let result = conn.query_row(&sql, params![id.to_string()], specialist_row_from_rusqlite);

    match result {
        Ok(row) => Ok(Some(specialist_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Availability is toggled from outside the pipeline (rota, leave, etc).
pub fn set_availability(conn: &Connection, id: &Uuid, available: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE specialists SET available = ?1 WHERE id = ?2",
        params![available, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Specialist".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_specialists_by_specialization(
    conn: &Connection,
    specialization: &str,
) -> Result<Vec<Specialist>, DatabaseError> {
    let sql = format!(
        "SELECT {SPECIALIST_COLUMNS} FROM specialists
         WHERE specialization = ?1 COLLATE NOCASE ORDER BY name ASC"
    );
    query_specialists(conn, &sql, params![specialization])
}

/// Available specialists for a specialization, least recently assigned first.
/// Never-assigned practitioners (NULL timestamp) lead; ties fall back to
/// registration order so the choice is deterministic.
pub fn available_specialists_by_workload(
    conn: &Connection,
    specialization: &str,
) -> Result<Vec<Specialist>, DatabaseError> {
    let sql = format!(
        "SELECT {SPECIALIST_COLUMNS} FROM specialists
         WHERE specialization = ?1 COLLATE NOCASE AND available = 1
         ORDER BY last_assigned_at ASC NULLS FIRST, created_at ASC, id ASC"
    );
    query_specialists(conn, &sql, params![specialization])
}

pub fn touch_last_assigned(
    conn: &Connection,
    id: &Uuid,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE specialists SET last_assigned_at = ?1 WHERE id = ?2",
        params![to_db_timestamp(at), id.to_string()],
    )?;
    Ok(())
}

fn query_specialists(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Specialist>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(specialist_row_from_rusqlite(row)))?;

    let mut specialists = Vec::new();
    for row in rows {
        specialists.push(specialist_from_row(row??)?);
    }
    Ok(specialists)
}

pub(crate) struct SpecialistRow {
    id: String,
    name: String,
    specialization: String,
    license_number: String,
    contact_number: Option<String>,
    hospital_affiliation: Option<String>,
    available: bool,
    last_assigned_at: Option<String>,
    created_at: String,
}

pub(crate) fn specialist_row_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<SpecialistRow, rusqlite::Error> {
    Ok(SpecialistRow {
        id: row.get(0)?,
        name: row.get(1)?,
        specialization: row.get(2)?,
        license_number: row.get(3)?,
        contact_number: row.get(4)?,
        hospital_affiliation: row.get(5)?,
        available: row.get(6)?,
        last_assigned_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn specialist_from_row(row: SpecialistRow) -> Result<Specialist, DatabaseError> {
    Ok(Specialist {
        id: parse_db_uuid("specialists.id", &row.id)?,
        name: row.name,
        specialization: row.specialization,
        license_number: row.license_number,
        contact_number: row.contact_number,
        hospital_affiliation: row.hospital_affiliation,
        available: row.available,
        last_assigned_at: row
            .last_assigned_at
            .as_deref()
            .map(|s| parse_db_timestamp("specialists.last_assigned_at", s))
            .transpose()?,
        created_at: parse_db_timestamp("specialists.created_at", &row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn new_specialist(license: &str, specialization: &str) -> NewSpecialist {
        NewSpecialist {
            name: format!("Dr. {license}"),
            specialization: specialization.into(),
            license_number: license.into(),
            contact_number: None,
            hospital_affiliation: Some("City Hospital".into()),
        }
    }

    #[test]
    fn register_and_fetch() {
        let conn = open_memory_database().unwrap();
        let spec = register_specialist(&conn, &new_specialist("RAD-1", "Radiologist")).unwrap();
        let loaded = get_specialist(&conn, &spec.id).unwrap().unwrap();
        assert_eq!(loaded.specialization, "Radiologist");
        assert!(loaded.available);
        assert!(loaded.last_assigned_at.is_none());
    }

    #[test]
    fn duplicate_license_rejected() {
        let conn = open_memory_database().unwrap();
        register_specialist(&conn, &new_specialist("GP-7", "General Physician")).unwrap();
        let err = register_specialist(&conn, &new_specialist("GP-7", "Cardiologist")).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn blank_license_rejected() {
        let conn = open_memory_database().unwrap();
        let err = register_specialist(&conn, &new_specialist("  ", "Cardiologist")).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn workload_order_puts_never_assigned_first() {
        let conn = open_memory_database().unwrap();
        let busy = register_specialist(&conn, &new_specialist("GP-1", "General Physician")).unwrap();
        let idle = register_specialist(&conn, &new_specialist("GP-2", "General Physician")).unwrap();
        touch_last_assigned(&conn, &busy.id, &Utc::now()).unwrap();

        let ordered = available_specialists_by_workload(&conn, "General Physician").unwrap();
        assert_eq!(ordered[0].id, idle.id);
        assert_eq!(ordered[1].id, busy.id);
    }

    #[test]
    fn workload_order_oldest_assignment_first() {
        let conn = open_memory_database().unwrap();
        let a = register_specialist(&conn, &new_specialist("GP-1", "General Physician")).unwrap();
        let b = register_specialist(&conn, &new_specialist("GP-2", "General Physician")).unwrap();
        let t1 = Utc::now();
        touch_last_assigned(&conn, &a.id, &(t1 + chrono::Duration::seconds(5))).unwrap();
        touch_last_assigned(&conn, &b.id, &t1).unwrap();

        let ordered = available_specialists_by_workload(&conn, "general physician").unwrap();
        assert_eq!(ordered[0].id, b.id);
    }

    #[test]
    fn unavailable_specialists_are_skipped() {
        let conn = open_memory_database().unwrap();
        let spec = register_specialist(&conn, &new_specialist("RAD-1", "Radiologist")).unwrap();
        set_availability(&conn, &spec.id, false).unwrap();
        assert!(available_specialists_by_workload(&conn, "Radiologist").unwrap().is_empty());
        assert_eq!(list_specialists_by_specialization(&conn, "Radiologist").unwrap().len(), 1);
    }

    #[test]
    fn availability_on_unknown_specialist_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = set_availability(&conn, &Uuid::new_v4(), true).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
