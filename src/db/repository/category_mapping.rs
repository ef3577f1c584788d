use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::CategoryMapping;

/// Add a category → specialization mapping. A category maps to one
/// specialization only; adding it twice is a constraint violation.
pub fn add_category_mapping(
    conn: &Connection,
    mapping: &CategoryMapping,
) -> Result<(), DatabaseError> {
    let category = mapping.category.trim();
    let specialization = mapping.specialization.trim();
    if category.is_empty() || specialization.is_empty() {
        return Err(DatabaseError::ConstraintViolation(
            "category and specialization are required".into(),
        ));
    }

    if get_specialization_for_category(conn, category)?.is_some() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "category '{category}' is already mapped"
        )));
    }

    conn.execute(
        "INSERT INTO category_mappings (category, specialization) VALUES (?1, ?2)",
        params![category, specialization],
    )?;
    Ok(())
}

/// Administrative override: insert or replace the mapping for a category.
pub fn upsert_category_mapping(
    conn: &Connection,
    mapping: &CategoryMapping,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO category_mappings (category, specialization) VALUES (?1, ?2)
         ON CONFLICT(category) DO UPDATE SET specialization = excluded.specialization",
        params![mapping.category.trim(), mapping.specialization.trim()],
    )?;
    Ok(())
}

/// Insert unless the category already has a mapping. Returns whether a row was added.
pub fn insert_category_mapping_if_absent(
    conn: &Connection,
    mapping: &CategoryMapping,
) -> Result<bool, DatabaseError> {
    if get_specialization_for_category(conn, &mapping.category)?.is_some() {
        return Ok(false);
    }
    let changed = conn.execute(
        "INSERT OR IGNORE INTO category_mappings (category, specialization) VALUES (?1, ?2)",
        params![mapping.category, mapping.specialization],
    )?;
    Ok(changed == 1)
}

/// Case-insensitive lookup; an exact-case match wins if several exist.
pub fn get_specialization_for_category(
    conn: &Connection,
    category: &str,
) -> Result<Option<String>, DatabaseError> {
    let result = conn.query_row(
        "SELECT specialization FROM category_mappings
         WHERE category = ?1 COLLATE NOCASE
         ORDER BY category = ?1 DESC LIMIT 1",
        params![category.trim()],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(spec) => Ok(Some(spec)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_category_mappings(conn: &Connection) -> Result<Vec<CategoryMapping>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT category, specialization FROM category_mappings ORDER BY category ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CategoryMapping {
            category: row.get(0)?,
            specialization: row.get(1)?,
        })
    })?;

    let mut mappings = Vec::new();
    for row in rows {
        mappings.push(row?);
    }
    Ok(mappings)
}
