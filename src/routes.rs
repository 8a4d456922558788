use crate::{
    routes::students::{delete_student, get_student, get_students, post_student, put_student},
    state::StudentsState,
};
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub mod students;

pub const STUDENTS_PATH: &str = "/api/students";

pub fn router(state: StudentsState) -> Router {
    Router::new()
        .route(STUDENTS_PATH, get(get_students).post(post_student))
        .route(
            &format!("{STUDENTS_PATH}/{{id}}"),
            get(get_student).put(put_student).delete(delete_student),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
