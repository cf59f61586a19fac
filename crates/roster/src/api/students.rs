//! Handlers for `/api/students`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{debug, info};

use super::error::{ApiError, ResultExt};
use super::AppState;
use crate::error::Error;
use crate::storage::{GroupCount, GroupField};
use crate::student::{Student, StudentId, StudentInput};

const FETCH_ALL_FAILED: &str = "Error fetching students";
const FETCH_ONE_FAILED: &str = "Error fetching student";
const CREATE_FAILED: &str = "Error creating student";
const UPDATE_FAILED: &str = "Error updating student";
const DELETE_FAILED: &str = "Error deleting student";
const STATS_FAILED: &str = "Error fetching statistics";

/// Body of a successful delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    message: &'static str,
    student: Student,
}

/// Aggregate counts over the whole collection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    total_students: u64,
    department_stats: Vec<GroupCount>,
    year_stats: Vec<GroupCount>,
}

type Body = Result<Json<StudentInput>, JsonRejection>;

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Student>>, ApiError> {
    let students = state.store.find_all().await.or_respond(FETCH_ALL_FAILED)?;
    debug!(count = students.len(), "Listed students");
    Ok(Json(students))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Student>, ApiError> {
    let id = raw_id.parse::<StudentId>().or_respond(FETCH_ONE_FAILED)?;
    state
        .store
        .find_by_id(&id)
        .await
        .or_respond(FETCH_ONE_FAILED)?
        .map(Json)
        .ok_or_else(ApiError::student_not_found)
}

pub(super) async fn create(
    State(state): State<AppState>,
    body: Body,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let Json(input) = body.map_err(|r| ApiError::rejected_body(CREATE_FAILED, &r))?;
    let fields = input.validate().or_respond(CREATE_FAILED)?;

    let taken = state
        .store
        .find_conflicting(fields.email(), fields.roll_number(), None)
        .await
        .or_respond(CREATE_FAILED)?;
    if taken.is_some() {
        return Err(ApiError::from_error(
            CREATE_FAILED,
            &Error::duplicate_student(),
        ));
    }

    let student = state.store.insert(fields).await.or_respond(CREATE_FAILED)?;
    info!(id = %student.id, roll_number = %student.roll_number, "Created student");
    Ok((StatusCode::CREATED, Json(student)))
}

pub(super) async fn update(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: Body,
) -> Result<Json<Student>, ApiError> {
    let Json(input) = body.map_err(|r| ApiError::rejected_body(UPDATE_FAILED, &r))?;
    let id = raw_id.parse::<StudentId>().or_respond(UPDATE_FAILED)?;

    let existing = state
        .store
        .find_by_id(&id)
        .await
        .or_respond(UPDATE_FAILED)?
        .ok_or_else(ApiError::student_not_found)?;
    let fields = input
        .merged_over(&existing)
        .validate()
        .or_respond(UPDATE_FAILED)?;

    let taken = state
        .store
        .find_conflicting(fields.email(), fields.roll_number(), Some(&id))
        .await
        .or_respond(UPDATE_FAILED)?;
    if taken.is_some() {
        return Err(ApiError::from_error(
            UPDATE_FAILED,
            &Error::duplicate_student(),
        ));
    }

    let student = state
        .store
        .update_by_id(&id, fields)
        .await
        .or_respond(UPDATE_FAILED)?;
    info!(id = %student.id, "Updated student");
    Ok(Json(student))
}

pub(super) async fn delete(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let id = raw_id.parse::<StudentId>().or_respond(DELETE_FAILED)?;
    let student = state.store.delete_by_id(&id).await.or_respond(DELETE_FAILED)?;
    info!(id = %student.id, "Deleted student");
    Ok(Json(Deleted {
        message: "Student deleted successfully",
        student,
    }))
}

pub(super) async fn stats(State(state): State<AppState>) -> Result<Json<StudentStats>, ApiError> {
    let total_students = state.store.count_all().await.or_respond(STATS_FAILED)?;
    let department_stats = state
        .store
        .count_by_group(GroupField::Department)
        .await
        .or_respond(STATS_FAILED)?;
    let year_stats = state
        .store
        .count_by_group(GroupField::Year)
        .await
        .or_respond(STATS_FAILED)?;

    Ok(Json(StudentStats {
        total_students,
        department_stats,
        year_stats,
    }))
}
