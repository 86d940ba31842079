//! Query functions for projects, services, and datapoints.
//!
//! Functions that may run inside a transaction are generic over the
//! database handle so they accept both `&dyn Database` and the transaction
//! returned by `begin_transaction()`.

use chrono::NaiveDate;
use haver_database_models::{DataPoint, Project, Service};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

const PROJECT_COLUMNS: &str = "p.id, p.name, p.title, p.date, p.sapnumber, p.notes,
     p.branchId AS branch_id, p.statusId AS status_id,
     s.id AS service_id, s.name AS service_name";

/// Lists all projects joined with their service.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn list_projects(db: &dyn Database) -> Result<Vec<Project>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN services s ON p.serviceId = s.id
                 ORDER BY p.id"
            ),
            &[],
        )
        .await?;

    rows.iter().map(row_to_project).collect()
}

/// Fetches a single project by ID, or `None` if it doesn't exist.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row cannot be converted.
pub async fn get_project(db: &dyn Database, id: i64) -> Result<Option<Project>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "SELECT {PROJECT_COLUMNS}
                 FROM projects p
                 JOIN services s ON p.serviceId = s.id
                 WHERE p.id = $1"
            ),
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    rows.first().map(row_to_project).transpose()
}

/// Inserts a batch of projects, upserting each project's service first.
///
/// The whole batch runs in one transaction: if any project fails, none of
/// them are stored.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn insert_projects(db: &dyn Database, projects: &[Project]) -> Result<(), DbError> {
    let tx = db.begin_transaction().await?;

    for project in projects {
        if let Err(e) = insert_project(&*tx, project).await {
            log::warn!("Rolling back project batch at project {}: {e}", project.id);
            tx.rollback().await?;
            return Err(e);
        }
    }

    tx.commit().await?;
    log::info!("Inserted {} projects", projects.len());
    Ok(())
}

async fn insert_project<D: Database + ?Sized>(db: &D, project: &Project) -> Result<(), DbError> {
    upsert_service(db, &project.service).await?;

    db.exec_raw_params(
        "INSERT INTO projects
            (id, name, title, date, sapnumber, notes, branchId, statusId, serviceId)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        &[
            DatabaseValue::Int64(project.id),
            DatabaseValue::String(project.name.clone()),
            DatabaseValue::String(project.title.clone()),
            DatabaseValue::String(project.date.to_string()),
            DatabaseValue::String(project.sap_number.clone()),
            DatabaseValue::String(project.notes.clone()),
            DatabaseValue::Int64(project.branch_id),
            DatabaseValue::Int64(project.status_id),
            DatabaseValue::Int64(project.service.id),
        ],
    )
    .await?;

    Ok(())
}

/// Updates the project with the given ID and upserts its service.
///
/// The `id` argument wins over `project.id`. Returns the number of project
/// rows updated (0 when the project doesn't exist).
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn update_project(db: &dyn Database, id: i64, project: &Project) -> Result<u64, DbError> {
    let tx = db.begin_transaction().await?;

    let result = update_project_inner(&*tx, id, project).await;

    match result {
        Ok(updated) => {
            tx.commit().await?;
            Ok(updated)
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

async fn update_project_inner<D: Database + ?Sized>(
    db: &D,
    id: i64,
    project: &Project,
) -> Result<u64, DbError> {
    upsert_service(db, &project.service).await?;

    let updated = db
        .exec_raw_params(
            "UPDATE projects
             SET name = $1, title = $2, date = $3, sapnumber = $4, notes = $5,
                 branchId = $6, statusId = $7, serviceId = $8
             WHERE id = $9",
            &[
                DatabaseValue::String(project.name.clone()),
                DatabaseValue::String(project.title.clone()),
                DatabaseValue::String(project.date.to_string()),
                DatabaseValue::String(project.sap_number.clone()),
                DatabaseValue::String(project.notes.clone()),
                DatabaseValue::Int64(project.branch_id),
                DatabaseValue::Int64(project.status_id),
                DatabaseValue::Int64(project.service.id),
                DatabaseValue::Int64(id),
            ],
        )
        .await?;

    Ok(updated)
}

/// Deletes a project. Returns `true` if a row was removed.
///
/// Datapoints belonging to the project are left in place.
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails.
pub async fn delete_project(db: &dyn Database, id: i64) -> Result<bool, DbError> {
    let deleted = db
        .exec_raw_params(
            "DELETE FROM projects WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?;

    Ok(deleted > 0)
}

async fn upsert_service<D: Database + ?Sized>(db: &D, service: &Service) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO services (id, name) VALUES ($1, $2)
         ON CONFLICT (id) DO UPDATE SET name = excluded.name",
        &[
            DatabaseValue::Int64(service.id),
            DatabaseValue::String(service.name.clone()),
        ],
    )
    .await?;

    Ok(())
}

/// Lists the datapoints of a project in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be converted.
pub async fn list_datapoints(db: &dyn Database, project_id: i64) -> Result<Vec<DataPoint>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, projectID AS project_id, EquipID AS equip_id, System AS system,
                    EquipType AS equip_type, Descriptor AS descriptor,
                    PointName AS point_name, PointType AS point_type
             FROM datapoints
             WHERE projectID = $1
             ORDER BY id",
            &[DatabaseValue::Int64(project_id)],
        )
        .await?;

    rows.iter().map(row_to_datapoint).collect()
}

/// Counts the datapoints stored for a project.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn count_datapoints(db: &dyn Database, project_id: i64) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS cnt FROM datapoints WHERE projectID = $1",
            &[DatabaseValue::Int64(project_id)],
        )
        .await?;

    let count: i64 = rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0));

    u64::try_from(count).map_err(|e| DbError::Conversion {
        message: format!("Negative datapoint count {count}: {e}"),
    })
}

/// Executes a prebuilt datapoint insert for one CSV row.
///
/// `sql` must have one placeholder for the project ID followed by one per
/// cell, in that order. Identifiers are never bound here; only values.
///
/// # Errors
///
/// Returns [`DbError`] if the statement fails (unknown column, constraint
/// violation, ...).
pub async fn insert_datapoint_row<D: Database + ?Sized>(
    db: &D,
    sql: &str,
    project_id: i64,
    cells: &[String],
) -> Result<u64, DbError> {
    let mut params = Vec::with_capacity(cells.len() + 1);
    params.push(DatabaseValue::Int64(project_id));
    params.extend(cells.iter().map(|c| DatabaseValue::String(c.clone())));

    Ok(db.exec_raw_params(sql, &params).await?)
}

fn row_to_project(row: &Row) -> Result<Project, DbError> {
    let conversion = |field: &str, e: &dyn std::fmt::Display| DbError::Conversion {
        message: format!("Failed to parse project {field}: {e}"),
    };

    let date: String = row.to_value("date").map_err(|e| conversion("date", &e))?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| conversion("date", &e))?;

    Ok(Project {
        id: row.to_value("id").map_err(|e| conversion("id", &e))?,
        name: row.to_value("name").unwrap_or_default(),
        title: row.to_value("title").unwrap_or_default(),
        date,
        sap_number: row.to_value("sapnumber").unwrap_or_default(),
        notes: row.to_value("notes").unwrap_or_default(),
        branch_id: row.to_value("branch_id").unwrap_or(0),
        status_id: row.to_value("status_id").unwrap_or(0),
        service: Service {
            id: row
                .to_value("service_id")
                .map_err(|e| conversion("service_id", &e))?,
            name: row.to_value("service_name").unwrap_or_default(),
        },
    })
}

fn row_to_datapoint(row: &Row) -> Result<DataPoint, DbError> {
    Ok(DataPoint {
        id: row.to_value("id").map_err(|e| DbError::Conversion {
            message: format!("Failed to parse datapoint id: {e}"),
        })?,
        project_id: row.to_value("project_id").map_err(|e| DbError::Conversion {
            message: format!("Failed to parse datapoint projectID: {e}"),
        })?,
        equip_id: row.to_value("equip_id").unwrap_or(None),
        system: row.to_value("system").unwrap_or(None),
        equip_type: row.to_value("equip_type").unwrap_or(None),
        point_name: row.to_value("point_name").unwrap_or(None),
        point_type: row.to_value("point_type").unwrap_or(None),
        descriptor: row.to_value("descriptor").unwrap_or(None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn project(id: i64, service_id: i64) -> Project {
        Project {
            id,
            name: format!("Project {id}"),
            title: format!("Title {id}"),
            date: NaiveDate::from_ymd_opt(2023, 6, 7).unwrap(),
            sap_number: format!("SAP{id}"),
            notes: String::new(),
            branch_id: 1,
            status_id: 2,
            service: Service {
                id: service_id,
                name: format!("Service {service_id}"),
            },
        }
    }

    #[tokio::test]
    async fn inserts_and_reads_back_projects() {
        let dir = tempfile::tempdir().unwrap();
        let db = db::open(&dir.path().join("haver.db")).await.unwrap();

        insert_projects(db.as_ref(), &[project(1, 10), project(2, 10)])
            .await
            .unwrap();

        let projects = list_projects(db.as_ref()).await.unwrap();
        assert_eq!(projects, vec![project(1, 10), project(2, 10)]);

        let found = get_project(db.as_ref(), 2).await.unwrap();
        assert_eq!(found, Some(project(2, 10)));
        assert_eq!(get_project(db.as_ref(), 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_project_batch_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = db::open(&dir.path().join("haver.db")).await.unwrap();

        // Second entry reuses the primary key of the first.
        let result = insert_projects(db.as_ref(), &[project(1, 10), project(1, 11)]).await;

        assert!(result.is_err());
        assert!(list_projects(db.as_ref()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn updates_and_deletes_project() {
        let dir = tempfile::tempdir().unwrap();
        let db = db::open(&dir.path().join("haver.db")).await.unwrap();
        insert_projects(db.as_ref(), &[project(5, 1)]).await.unwrap();

        let mut changed = project(5, 2);
        changed.title = "Renamed".to_string();
        assert_eq!(update_project(db.as_ref(), 5, &changed).await.unwrap(), 1);

        let stored = get_project(db.as_ref(), 5).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.service.name, "Service 2");

        assert_eq!(update_project(db.as_ref(), 6, &changed).await.unwrap(), 0);

        assert!(delete_project(db.as_ref(), 5).await.unwrap());
        assert!(!delete_project(db.as_ref(), 5).await.unwrap());
    }

    #[tokio::test]
    async fn inserts_datapoint_rows_and_lists_them_per_project() {
        let dir = tempfile::tempdir().unwrap();
        let db = db::open(&dir.path().join("haver.db")).await.unwrap();
        let sql = r#"INSERT INTO "datapoints" ("projectID", "EquipID", "System") VALUES ($1, $2, $3)"#;

        insert_datapoint_row(db.as_ref(), sql, 7, &["AC-1".into(), "HVAC".into()])
            .await
            .unwrap();
        insert_datapoint_row(db.as_ref(), sql, 8, &["AC-9".into(), "Power".into()])
            .await
            .unwrap();

        let points = list_datapoints(db.as_ref(), 7).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].project_id, 7);
        assert_eq!(points[0].equip_id.as_deref(), Some("AC-1"));
        assert_eq!(points[0].system.as_deref(), Some("HVAC"));
        assert_eq!(points[0].equip_type, None);

        assert_eq!(count_datapoints(db.as_ref(), 8).await.unwrap(), 1);
        assert_eq!(count_datapoints(db.as_ref(), 9).await.unwrap(), 0);
    }
}
