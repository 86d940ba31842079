//! HTTP handler functions for the haver API.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, http::StatusCode, web};
use futures::TryStreamExt as _;
use haver_database::queries;
use haver_database_models::Project;
use haver_ingest::{IngestError, ingest_upload};
use haver_server_models::{ApiHealth, ApiResponse};
use serde::Serialize;

use crate::AppState;

/// Multipart field carrying the CSV file.
pub const UPLOAD_FIELD: &str = "file";

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    ok(
        "OK",
        ApiHealth {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    )
}

/// `GET /api/projects`
pub async fn list_projects(state: web::Data<AppState>) -> HttpResponse {
    match queries::list_projects(state.db.as_ref()).await {
        Ok(projects) => ok("OK", projects),
        Err(e) => internal_error("Failed to list projects", &e),
    }
}

/// `POST /api/projects`
///
/// Inserts a JSON array of projects in one transaction.
pub async fn create_projects(
    state: web::Data<AppState>,
    body: web::Json<Vec<Project>>,
) -> HttpResponse {
    let projects = body.into_inner();

    match queries::insert_projects(state.db.as_ref(), &projects).await {
        Ok(()) => ok(format!("Inserted {} projects", projects.len()), projects.len()),
        Err(e) => internal_error("Failed to insert projects", &e),
    }
}

/// `GET /api/projects/{id}`
pub async fn get_project(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Some(id) = parse_id(&path) else {
        return invalid_id(&path);
    };

    match queries::get_project(state.db.as_ref(), id).await {
        Ok(Some(project)) => ok("OK", project),
        Ok(None) => message(StatusCode::NOT_FOUND, format!("Project {id} not found")),
        Err(e) => internal_error("Failed to fetch project", &e),
    }
}

/// `PUT /api/projects/{id}`
pub async fn update_project(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Project>,
) -> HttpResponse {
    let Some(id) = parse_id(&path) else {
        return invalid_id(&path);
    };

    match queries::update_project(state.db.as_ref(), id, &body).await {
        Ok(updated) => ok(format!("Updated project {id}"), updated),
        Err(e) => internal_error("Failed to update project", &e),
    }
}

/// `DELETE /api/projects/{id}`
pub async fn delete_project(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Some(id) = parse_id(&path) else {
        return invalid_id(&path);
    };

    match queries::delete_project(state.db.as_ref(), id).await {
        Ok(true) => message(StatusCode::OK, format!("Deleted project {id}")),
        Ok(false) => message(StatusCode::NOT_FOUND, format!("Project {id} not found")),
        Err(e) => internal_error("Failed to delete project", &e),
    }
}

/// `GET /api/data/{id}`
///
/// Lists a project's datapoints in insertion order.
pub async fn list_data(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let Some(project_id) = parse_id(&path) else {
        return invalid_id(&path);
    };

    match queries::list_datapoints(state.db.as_ref(), project_id).await {
        Ok(points) => ok("OK", points),
        Err(e) => internal_error("Failed to list datapoints", &e),
    }
}

/// `POST /api/upload/{id}`
///
/// Reads the multipart field named `file` and ingests it as CSV datapoints
/// for the project. The project id is validated before any of the body is
/// read.
pub async fn upload(
    state: web::Data<AppState>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> HttpResponse {
    let Some(project_id) = parse_id(&path) else {
        return invalid_id(&path);
    };

    loop {
        let field = match payload.try_next().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                log::warn!("Upload for project {project_id} has no {UPLOAD_FIELD:?} field");
                return message(
                    StatusCode::BAD_REQUEST,
                    format!("Missing multipart field {UPLOAD_FIELD:?}"),
                );
            }
            Err(e) => {
                log::warn!("Malformed multipart upload for project {project_id}: {e}");
                return message(StatusCode::BAD_REQUEST, format!("Malformed multipart body: {e}"));
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            // Unconsumed fields are skipped by the next `try_next`.
            continue;
        }

        return match ingest_upload(state.db.as_ref(), &state.uploads, project_id, field).await {
            Ok(summary) => ok(format!("Inserted {} rows", summary.rows_inserted), summary),
            Err(e) => message(ingest_status(&e), e.to_string()),
        };
    }
}

/// Maps an ingestion failure to the response status.
#[must_use]
pub const fn ingest_status(e: &IngestError) -> StatusCode {
    match e {
        IngestError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn invalid_id(raw: &str) -> HttpResponse {
    log::warn!("Rejected invalid project id {raw:?}");
    message(StatusCode::BAD_REQUEST, format!("Invalid project id {raw:?}"))
}

fn ok<T: Serialize>(text: impl Into<String>, data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::new(StatusCode::OK.as_u16(), text, data))
}

/// Builds a `data: null` envelope, used for errors and bodiless successes.
fn message(status: StatusCode, text: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ApiResponse::empty(status.as_u16(), text))
}

fn internal_error(context: &str, e: &dyn std::error::Error) -> HttpResponse {
    log::error!("{context}: {e}");
    message(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}
