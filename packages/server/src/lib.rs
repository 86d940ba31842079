#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for projects and their datapoints.
//!
//! Serves project CRUD, datapoint listing, and CSV uploads under `/api`.
//! Uploads are handed to [`haver_ingest::ingest_upload`], which stages the
//! file in the upload directory and inserts one datapoint per CSV row.

pub mod config;
pub mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error::InternalError, middleware, web};
use haver_database::db;
use haver_ingest_models::UploadSettings;
use haver_server_models::ApiResponse;
use switchy_database::Database;

pub use config::{ConfigError, ServerConfig};

/// Shared application state.
pub struct AppState {
    /// `SQLite` database holding projects and datapoints.
    pub db: Arc<dyn Database>,
    /// Upload directory, size limit, and commit policy.
    pub uploads: UploadSettings,
}

/// Registers the `/api` routes and the JSON body error handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected JSON body: {err}");
        let response = HttpResponse::BadRequest().json(ApiResponse::empty(400, err.to_string()));
        InternalError::from_response(err, response).into()
    });

    cfg.app_data(json_config).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/projects")
                    .route(web::get().to(handlers::list_projects))
                    .route(web::post().to(handlers::create_projects)),
            )
            .service(
                web::resource("/projects/{id}")
                    .route(web::get().to(handlers::get_project))
                    .route(web::put().to(handlers::update_project))
                    .route(web::delete().to(handlers::delete_project)),
            )
            .route("/data/{id}", web::get().to(handlers::list_data))
            .route("/upload/{id}", web::post().to(handlers::upload)),
    );
}

/// Starts the haver API server.
///
/// Reads [`ServerConfig`] from the environment, opens the database
/// (creating the schema if needed), and starts the Actix-Web HTTP server.
/// The caller provides the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration is invalid, the
/// database cannot be opened, or the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;

    log::info!("Opening database at {}...", config.database_path.display());
    let db_conn = db::open(&config.database_path)
        .await
        .map_err(std::io::Error::other)?;

    log::info!(
        "Staging uploads in {} (limit {} bytes, {} commits)",
        config.uploads.upload_dir.display(),
        config.uploads.max_upload_bytes,
        config.uploads.commit_policy
    );

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        uploads: config.uploads,
    });

    let ServerConfig {
        bind_addr, port, ..
    } = config;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, http::header, test};
    use haver_ingest_models::CommitPolicy;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    const BOUNDARY: &str = "haver-test-boundary";
    const CSV: &str = "EquipID,System,EquipType\nAC-1,HVAC,Chiller\nAC-2,HVAC,Boiler\n";

    struct Fixture {
        dir: TempDir,
        db: Arc<dyn Database>,
        state: web::Data<AppState>,
    }

    impl Fixture {
        fn upload_dir(&self) -> std::path::PathBuf {
            self.dir.path().join("uploads")
        }
    }

    async fn fixture(configure_uploads: impl FnOnce(&mut UploadSettings)) -> Fixture {
        let dir = TempDir::new().unwrap();
        let db: Arc<dyn Database> = Arc::from(db::open(&dir.path().join("haver.db")).await.unwrap());

        let mut uploads = UploadSettings {
            upload_dir: dir.path().join("uploads"),
            ..UploadSettings::default()
        };
        configure_uploads(&mut uploads);

        let state = web::Data::new(AppState {
            db: db.clone(),
            uploads,
        });

        Fixture { dir, db, state }
    }

    fn multipart_body(field: &str, content: &str) -> String {
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"points.csv\"\r\n\
             Content-Type: text/csv\r\n\
             \r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        )
    }

    fn upload_request(id: &str, field: &str, content: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri(&format!("/api/upload/{id}"))
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(field, content))
    }

    fn project_json(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "title": format!("{name} title"),
            "date": "2023-06-07",
            "sapNumber": "SAP12345",
            "branchId": 2,
            "statusId": 3,
            "services": { "serviceId": 4, "serviceName": "Service 1" }
        })
    }

    #[actix_web::test]
    async fn health_reports_version_in_envelope() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], 200);
        assert_eq!(body["data"]["healthy"], true);
        assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn upload_inserts_one_datapoint_per_row() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let resp = test::call_service(&app, upload_request("7", "file", CSV).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 200);
        assert_eq!(body["message"], "Inserted 2 rows");
        assert_eq!(body["data"]["rowsInserted"], 2);
        assert_eq!(body["data"]["projectId"], 7);

        let req = test::TestRequest::get().uri("/api/data/7").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let points = body["data"].as_array().unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0]["projectID"], 7);
        assert_eq!(points[0]["EquipID"], "AC-1");
        assert_eq!(points[0]["EquipType"], "Chiller");
        assert_eq!(points[1]["EquipID"], "AC-2");
        assert_eq!(points[1]["EquipType"], "Boiler");

        let leftover = std::fs::read_dir(f.upload_dir()).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[actix_web::test]
    async fn upload_rejects_non_numeric_id_before_reading_body() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let resp = test::call_service(&app, upload_request("abc", "file", CSV).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 400);
        assert!(body["data"].is_null());

        assert!(!f.upload_dir().exists());
    }

    #[actix_web::test]
    async fn upload_rejects_ragged_csv_without_inserting() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let csv = "EquipID,System\nAC-1,HVAC\nAC-2\n";
        let resp = test::call_service(&app, upload_request("7", "file", csv).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let count = haver_database::queries::count_datapoints(f.db.as_ref(), 7)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[actix_web::test]
    async fn upload_rejects_missing_file_field_and_non_multipart_body() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let resp = test::call_service(&app, upload_request("7", "attachment", CSV).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/upload/7")
            .insert_header((header::CONTENT_TYPE, "text/csv"))
            .set_payload(CSV)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn upload_over_limit_is_payload_too_large() {
        let f = fixture(|uploads| uploads.max_upload_bytes = 16).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let resp = test::call_service(&app, upload_request("7", "file", CSV).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 413);
    }

    #[actix_web::test]
    async fn row_failure_is_internal_error_and_keeps_committed_rows_per_row() {
        let f = fixture(|uploads| uploads.commit_policy = CommitPolicy::PerRow).await;
        f.db
            .exec_raw("CREATE UNIQUE INDEX idx_unique_equip ON datapoints (projectID, EquipID)")
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let csv = "EquipID,System\nAC-1,HVAC\nAC-1,HVAC\nAC-3,HVAC\n";
        let resp = test::call_service(&app, upload_request("7", "file", csv).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 500);

        let count = haver_database::queries::count_datapoints(f.db.as_ref(), 7)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[actix_web::test]
    async fn project_crud_round_trip() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/projects")
            .set_json(json!([project_json(1, "Project 1"), project_json(2, "Project 2")]))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/projects").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::put()
            .uri("/api/projects/1")
            .set_json(project_json(1, "Renamed"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/projects/1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["name"], "Renamed");
        assert_eq!(body["data"]["services"]["serviceName"], "Service 1");

        let req = test::TestRequest::delete().uri("/api/projects/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::delete().uri("/api/projects/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/projects/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 404);
    }

    #[actix_web::test]
    async fn malformed_json_gets_enveloped_bad_request() {
        let f = fixture(|_| {}).await;
        let app = test::init_service(App::new().app_data(f.state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/projects")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 400);
    }
}
