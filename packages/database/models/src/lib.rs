#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row types for projects, services, and datapoints.
//!
//! These types describe data as stored in and retrieved from the `SQLite`
//! database. The JSON field names match what API clients already send and
//! expect, so the same types are used directly as request and response
//! bodies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name of the table that uploaded CSV rows are inserted into.
pub const DATAPOINTS_TABLE: &str = "datapoints";

/// Column holding the owning project's identifier in [`DATAPOINTS_TABLE`].
pub const PROJECT_ID_COLUMN: &str = "projectID";

/// A service offered on a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service identifier.
    #[serde(rename = "serviceId")]
    pub id: i64,
    /// Display name of the service.
    #[serde(rename = "serviceName")]
    pub name: String,
}

/// A project, the grouping entity that owns a set of datapoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: i64,
    /// Short project name.
    pub name: String,
    /// Human readable title.
    pub title: String,
    /// Project date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// SAP reference number.
    #[serde(rename = "sapNumber")]
    pub sap_number: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Owning branch.
    pub branch_id: i64,
    /// Workflow status.
    pub status_id: i64,
    /// Service the project belongs to.
    #[serde(rename = "services")]
    pub service: Service,
}

/// One row of equipment/point metadata belonging to a project.
///
/// Columns not present in the uploaded CSV are stored as `NULL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Row identifier.
    pub id: i64,
    /// Owning project.
    #[serde(rename = "projectID")]
    pub project_id: i64,
    /// Equipment identifier.
    #[serde(rename = "EquipID")]
    pub equip_id: Option<String>,
    /// Building system (e.g. `HVAC`).
    #[serde(rename = "System")]
    pub system: Option<String>,
    /// Equipment type (e.g. `Chiller`).
    #[serde(rename = "EquipType")]
    pub equip_type: Option<String>,
    /// Point name.
    #[serde(rename = "point_name")]
    pub point_name: Option<String>,
    /// Point type.
    #[serde(rename = "point_type")]
    pub point_type: Option<String>,
    /// Point descriptor.
    pub descriptor: Option<String>,
}
