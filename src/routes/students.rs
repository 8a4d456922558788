use crate::{
    data::{StudentStore, student::Student},
    error::{IdMismatchSnafu, MissingStudentSnafu, StudentsResult},
    routes::STUDENTS_PATH,
    state::StudentsState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use snafu::OptionExt;

/// A freshly stored student plus where to fetch it again.
#[derive(Debug)]
pub struct Created {
    pub student: Student,
    pub location: String,
}

impl IntoResponse for Created {
    fn into_response(self) -> Response {
        (
            StatusCode::CREATED,
            [(LOCATION, self.location)],
            Json(self.student),
        )
            .into_response()
    }
}

/// No uniqueness pre-check here: a clashing id surfaces from `save` as a duplicate.
pub async fn create_student(
    store: &mut impl StudentStore,
    student: Student,
) -> StudentsResult<Created> {
    let id = student.id;
    store.add(student.clone());
    store.save().await?;

    info!(id, "Created student");
    Ok(Created {
        student,
        location: format!("{STUDENTS_PATH}/{id}"),
    })
}

pub async fn update_student(
    store: &mut impl StudentStore,
    route_id: i32,
    student: Student,
) -> StudentsResult<StatusCode> {
    if route_id != student.id {
        return IdMismatchSnafu {
            route_id,
            body_id: student.id,
        }
        .fail();
    }

    store.update(student);
    store.save().await?;

    info!(id = route_id, "Updated student");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_student(store: &mut impl StudentStore, id: i32) -> StudentsResult<StatusCode> {
    let student = store.find(id).await?.context(MissingStudentSnafu { id })?;
    store.remove(student);
    store.save().await?;

    info!(id, "Deleted student");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn find_student(store: &mut impl StudentStore, id: i32) -> StudentsResult<Student> {
    store.find(id).await?.context(MissingStudentSnafu { id })
}

pub async fn get_students(
    State(state): State<StudentsState>,
) -> StudentsResult<Json<Vec<Student>>> {
    Ok(Json(state.context().all().await?))
}

pub async fn get_student(
    State(state): State<StudentsState>,
    Path(id): Path<i32>,
) -> StudentsResult<Json<Student>> {
    Ok(Json(find_student(&mut state.context(), id).await?))
}

pub async fn post_student(
    State(state): State<StudentsState>,
    Json(student): Json<Student>,
) -> StudentsResult<Created> {
    create_student(&mut state.context(), student).await
}

pub async fn put_student(
    State(state): State<StudentsState>,
    Path(id): Path<i32>,
    Json(student): Json<Student>,
) -> StudentsResult<StatusCode> {
    update_student(&mut state.context(), id, student).await
}

pub async fn delete_student(
    State(state): State<StudentsState>,
    Path(id): Path<i32>,
) -> StudentsResult<StatusCode> {
    remove_student(&mut state.context(), id).await
}
