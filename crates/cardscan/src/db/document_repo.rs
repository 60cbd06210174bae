//! SQL for the `documents` table.
//!
//! Status changes are compare-and-set on the current status so concurrent
//! writers cannot skip a transition.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw document row from the database.
#[derive(Debug, Clone, Default)]
pub struct DocumentRow {
    pub id: String,
    pub owner: String,
    pub original_name: String,
    pub source_path: String,
    pub status: String,
    pub id_number: Option<String>,
    pub name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub image_path: Option<String>,
    pub pdf_path: Option<String>,
    pub error: Option<String>,
    pub upload_time: String,
    pub processed_time: Option<String>,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner: row.get("owner")?,
            original_name: row.get("original_name")?,
            source_path: row.get("source_path")?,
            status: row.get("status")?,
            id_number: row.get("id_number")?,
            name: row.get("name")?,
            address1: row.get("address1")?,
            address2: row.get("address2")?,
            image_path: row.get("image_path")?,
            pdf_path: row.get("pdf_path")?,
            error: row.get("error")?,
            upload_time: row.get("upload_time")?,
            processed_time: row.get("processed_time")?,
        })
    }
}

/// The four field columns, written together.
#[derive(Debug, Clone, Default)]
pub struct FieldColumns<'a> {
    pub id_number: Option<&'a str>,
    pub name: Option<&'a str>,
    pub address1: Option<&'a str>,
    pub address2: Option<&'a str>,
}

/// Query filter parameters for document listing.
#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    pub owner: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, doc: &DocumentRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO documents (id, owner, original_name, source_path, status, id_number,
             name, address1, address2, image_path, pdf_path, error, upload_time, processed_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                doc.id,
                doc.owner,
                doc.original_name,
                doc.source_path,
                doc.status,
                doc.id_number,
                doc.name,
                doc.address1,
                doc.address2,
                doc.image_path,
                doc.pdf_path,
                doc.error,
                doc.upload_time,
                doc.processed_time,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM documents WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], DocumentRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Sets `status` (and optionally `processed_time` / `error`) if the row is
/// still in `expected`. Returns false when no row matched.
pub fn compare_and_set_status(
    db: &Database,
    id: &str,
    expected: &str,
    status: &str,
    processed_time: Option<&str>,
    error: Option<&str>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE documents
             SET status = ?3,
                 processed_time = COALESCE(?4, processed_time),
                 error = COALESCE(?5, error)
             WHERE id = ?1 AND status = ?2",
            params![id, expected, status, processed_time, error],
        )?;
        Ok(changed == 1)
    })
}

/// Writes the field columns (plus artifact paths and the new status when
/// given) if the row is still in `expected`. Returns false when no row matched.
pub fn compare_and_set_fields(
    db: &Database,
    id: &str,
    expected: &str,
    fields: &FieldColumns<'_>,
    artifacts: Option<(&str, &str)>,
    status: &str,
    processed_time: Option<&str>,
) -> Result<bool, DatabaseError> {
    let (image_path, pdf_path) = artifacts.unzip();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE documents
             SET id_number = ?3, name = ?4, address1 = ?5, address2 = ?6,
                 image_path = COALESCE(?7, image_path),
                 pdf_path = COALESCE(?8, pdf_path),
                 status = ?9,
                 processed_time = COALESCE(?10, processed_time)
             WHERE id = ?1 AND status = ?2",
            params![
                id,
                expected,
                fields.id_number,
                fields.name,
                fields.address1,
                fields.address2,
                image_path,
                pdf_path,
                status,
                processed_time,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Queries documents newest first, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &DocumentFilter,
) -> Result<(Vec<DocumentRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref owner) = filter.owner {
            conditions.push(format!("owner = ?{}", param_values.len() + 1));
            param_values.push(Box::new(owner.clone()));
        }
        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM documents {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        // rowid breaks ties between uploads within the same millisecond.
        let query_sql = format!(
            "SELECT * FROM documents {} ORDER BY upload_time DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<DocumentRow> = stmt
            .query_map(params_ref.as_slice(), DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, owner: &str, upload_time: &str) -> DocumentRow {
        DocumentRow {
            id: id.to_string(),
            owner: owner.to_string(),
            original_name: format!("{}.pdf", id),
            source_path: format!("/uploads/{}.pdf", id),
            status: "pending".to_string(),
            upload_time: upload_time.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("d1", "u1", "2026-01-01T00:00:00.000Z")).unwrap();

        let found = find_by_id(&db, "d1").unwrap().unwrap();
        assert_eq!(found.owner, "u1");
        assert_eq!(found.status, "pending");
        assert!(found.id_number.is_none());
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_compare_and_set_status_checks_expected() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("d1", "u1", "2026-01-01T00:00:00.000Z")).unwrap();

        assert!(!compare_and_set_status(&db, "d1", "processing", "error", None, None).unwrap());
        assert!(compare_and_set_status(&db, "d1", "pending", "processing", None, None).unwrap());
        assert!(compare_and_set_status(
            &db,
            "d1",
            "processing",
            "error",
            Some("2026-01-01T00:01:00.000Z"),
            Some("boom")
        )
        .unwrap());

        let found = find_by_id(&db, "d1").unwrap().unwrap();
        assert_eq!(found.status, "error");
        assert_eq!(found.error.as_deref(), Some("boom"));
        assert_eq!(found.processed_time.as_deref(), Some("2026-01-01T00:01:00.000Z"));
    }

    #[test]
    fn test_compare_and_set_fields_with_artifacts() {
        let db = Database::open_in_memory().unwrap();
        let mut doc = row("d1", "u1", "2026-01-01T00:00:00.000Z");
        doc.status = "processing".to_string();
        insert(&db, &doc).unwrap();

        let fields = FieldColumns {
            id_number: Some("1234567890123456"),
            name: Some("John Doe"),
            address1: Some(""),
            address2: None,
        };
        assert!(compare_and_set_fields(
            &db,
            "d1",
            "processing",
            &fields,
            Some(("/out/processed_a.png", "/out/processed_a.pdf")),
            "completed",
            Some("2026-01-02T00:00:00.000Z"),
        )
        .unwrap());

        let found = find_by_id(&db, "d1").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.name.as_deref(), Some("John Doe"));
        assert_eq!(found.address1.as_deref(), Some(""));
        assert!(found.address2.is_none());
        assert_eq!(found.pdf_path.as_deref(), Some("/out/processed_a.pdf"));

        // Completed rows no longer match.
        assert!(!compare_and_set_fields(
            &db,
            "d1",
            "processing",
            &FieldColumns::default(),
            None,
            "processing",
            None
        )
        .unwrap());
    }

    #[test]
    fn test_query_filters_and_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        insert(&db, &row("a", "u1", "2026-01-01T00:00:00.000Z")).unwrap();
        insert(&db, &row("b", "u2", "2026-01-02T00:00:00.000Z")).unwrap();
        insert(&db, &row("c", "u1", "2026-01-03T00:00:00.000Z")).unwrap();

        let (all, total) = query(&db, &DocumentFilter::default()).unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let (mine, total) = query(
            &db,
            &DocumentFilter {
                owner: Some("u1".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine[0].id, "c");

        let (page, total) = query(
            &db,
            &DocumentFilter {
                limit: Some(1),
                offset: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "b");

        let (none, total) = query(
            &db,
            &DocumentFilter {
                status: Some("completed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);
    }
}
