//! Student registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        student::{CreateStudent, UpdateStudent, VerifyStudent},
        Pagination, Student,
    },
};

use super::ApiJson;

/// Register a student
#[utoipa::path(
    post,
    path = "/student/create",
    tag = "students",
    request_body = CreateStudent,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "PRN, email or RFID already registered")
    )
)]
pub async fn create_student(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<CreateStudent>,
) -> AppResult<(StatusCode, Json<Student>)> {
    let student = state.services.students.create(request).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Look a student up by PRN (`id`) or RFID (`rfid`)
#[utoipa::path(
    post,
    path = "/student/verify",
    tag = "students",
    request_body = VerifyStudent,
    responses(
        (status = 200, description = "Student found", body = Student),
        (status = 400, description = "Neither PRN nor RFID given"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn verify_student(
    State(state): State<crate::AppState>,
    ApiJson(request): ApiJson<VerifyStudent>,
) -> AppResult<Json<Student>> {
    let student = state.services.students.verify(&request).await?;
    Ok(Json(student))
}

/// List students, newest first
#[utoipa::path(
    get,
    path = "/student",
    tag = "students",
    params(Pagination),
    responses(
        (status = 200, description = "Students", body = Vec<Student>)
    )
)]
pub async fn list_students(
    State(state): State<crate::AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<Student>>> {
    let students = state.services.students.list(&pagination).await?;
    Ok(Json(students))
}

/// Get a student by ID
#[utoipa::path(
    get,
    path = "/student/{id}",
    tag = "students",
    params(
        ("id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 200, description = "Student details", body = Student),
        (status = 404, description = "Student not found")
    )
)]
pub async fn get_student(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Student>> {
    let student = state.services.students.get(id).await?;
    Ok(Json(student))
}

/// Update a student's identity fields
#[utoipa::path(
    put,
    path = "/student/{id}",
    tag = "students",
    params(
        ("id" = Uuid, Path, description = "Student ID")
    ),
    request_body = UpdateStudent,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "Student not found"),
        (status = 409, description = "PRN or email already registered")
    )
)]
pub async fn update_student(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    ApiJson(update): ApiJson<UpdateStudent>,
) -> AppResult<Json<Student>> {
    let student = state.services.students.update(id, update).await?;
    Ok(Json(student))
}

/// Delete a student along with their requests, fines and scans
#[utoipa::path(
    delete,
    path = "/student/{id}",
    tag = "students",
    params(
        ("id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Student not found")
    )
)]
pub async fn delete_student(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.students.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
