use crate::{data::student::Student, error::StudentsResult};

pub mod context;
pub mod student;

/// Unit-of-work over the student table: `add`, `update` and `remove` only stage changes, which
/// `save` then writes in one go.
pub trait StudentStore {
    async fn find(&mut self, id: i32) -> StudentsResult<Option<Student>>;
    async fn all(&mut self) -> StudentsResult<Vec<Student>>;
    fn add(&mut self, student: Student);
    fn update(&mut self, student: Student);
    fn remove(&mut self, student: Student);
    async fn save(&mut self) -> StudentsResult<u64>;
}
