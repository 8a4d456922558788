use crate::{
    data::{StudentStore, student::Student},
    error::{
        CommitTransactionSnafu, DuplicateStudentSnafu, GetDatabaseConnectionSnafu,
        MakeQuerySnafu, MissingStudentSnafu, StudentsResult,
    },
};
use snafu::{IntoError, ResultExt};
use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug)]
enum StagedChange {
    Add(Student),
    Update(Student),
    Remove(Student),
}

impl StagedChange {
    const fn id(&self) -> i32 {
        match self {
            Self::Add(student) | Self::Update(student) | Self::Remove(student) => student.id,
        }
    }

    /// What a lookup of this change's id should see before it is saved.
    const fn pending_view(&self) -> Option<&Student> {
        match self {
            Self::Add(student) | Self::Update(student) => Some(student),
            Self::Remove(_) => None,
        }
    }

    async fn apply(self, conn: &mut SqliteConnection) -> StudentsResult<u64> {
        match self {
            Self::Add(student) => {
                let id = student.id;
                sqlx::query(
                    "INSERT INTO students (id, first_name, last_name, age) VALUES (?, ?, ?, ?)",
                )
                .bind(student.id)
                .bind(student.first_name)
                .bind(student.last_name)
                .bind(student.age)
                .execute(conn)
                .await
                .map(|result| result.rows_affected())
                .map_err(|source| {
                    if source
                        .as_database_error()
                        .is_some_and(|db_error| db_error.is_unique_violation())
                    {
                        DuplicateStudentSnafu { id }.build()
                    } else {
                        MakeQuerySnafu.into_error(source)
                    }
                })
            }
            Self::Update(student) => {
                let id = student.id;
                let rows = sqlx::query(
                    "UPDATE students SET first_name = ?, last_name = ?, age = ? WHERE id = ?",
                )
                .bind(student.first_name)
                .bind(student.last_name)
                .bind(student.age)
                .bind(id)
                .execute(conn)
                .await
                .context(MakeQuerySnafu)?
                .rows_affected();

                if rows == 0 {
                    return MissingStudentSnafu { id }.fail();
                }
                Ok(rows)
            }
            Self::Remove(student) => {
                let id = student.id;
                let rows = sqlx::query("DELETE FROM students WHERE id = ?")
                    .bind(id)
                    .execute(conn)
                    .await
                    .context(MakeQuerySnafu)?
                    .rows_affected();

                if rows == 0 {
                    return MissingStudentSnafu { id }.fail();
                }
                Ok(rows)
            }
        }
    }
}

/// One request's view of the student table, with changes staged until [`StudentStore::save`].
#[derive(Debug)]
pub struct StudentContext {
    pool: SqlitePool,
    staged: Vec<StagedChange>,
}

impl StudentContext {
    pub const fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            staged: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}

impl StudentStore for StudentContext {
    async fn find(&mut self, id: i32) -> StudentsResult<Option<Student>> {
        if let Some(latest) = self.staged.iter().rev().find(|change| change.id() == id) {
            return Ok(latest.pending_view().cloned());
        }

        sqlx::query_as::<_, Student>(
            "SELECT id, first_name, last_name, age FROM students WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    async fn all(&mut self) -> StudentsResult<Vec<Student>> {
        sqlx::query_as::<_, Student>(
            "SELECT id, first_name, last_name, age FROM students ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    fn add(&mut self, student: Student) {
        self.staged.push(StagedChange::Add(student));
    }

    fn update(&mut self, student: Student) {
        self.staged.push(StagedChange::Update(student));
    }

    fn remove(&mut self, student: Student) {
        self.staged.push(StagedChange::Remove(student));
    }

    async fn save(&mut self) -> StudentsResult<u64> {
        if !self.has_changes() {
            return Ok(0);
        }
        let staged = std::mem::take(&mut self.staged);

        let mut transaction = self.pool.begin().await.context(GetDatabaseConnectionSnafu)?;
        let mut written = 0;
        for change in staged {
            trace!(?change, "applying staged change");
            //dropping the transaction on error rolls the whole batch back
            written += change.apply(&mut *transaction).await?;
        }
        transaction.commit().await.context(CommitTransactionSnafu)?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DbConfig, error::StudentsError, state::StudentsState};

    fn student(id: i32, first_name: &str, last_name: &str, age: u32) -> Student {
        Student {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
        }
    }

    async fn fresh_state() -> StudentsState {
        StudentsState::new(&DbConfig::in_memory())
            .await
            .expect("unable to open in-memory database")
    }

    #[tokio::test]
    async fn staged_changes_are_invisible_to_other_contexts_until_saved() {
        let state = fresh_state().await;
        let mut writer = state.context();
        writer.add(student(1, "Alice", "Smith", 25));

        assert!(writer.has_changes());
        assert_eq!(
            writer.find(1).await.unwrap(),
            Some(student(1, "Alice", "Smith", 25))
        );
        assert_eq!(state.context().find(1).await.unwrap(), None);

        assert_eq!(writer.save().await.unwrap(), 1);
        assert!(!writer.has_changes());
        assert_eq!(
            state.context().find(1).await.unwrap(),
            Some(student(1, "Alice", "Smith", 25))
        );
    }

    #[tokio::test]
    async fn staged_remove_hides_saved_row() {
        let state = fresh_state().await;
        let mut seed = state.context();
        seed.add(student(1, "Bob", "Brown", 28));
        seed.save().await.unwrap();

        let mut context = state.context();
        let bob = context.find(1).await.unwrap().unwrap();
        context.remove(bob);
        assert_eq!(context.find(1).await.unwrap(), None);
        assert!(state.context().find(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected_and_rolled_back() {
        let state = fresh_state().await;
        let mut seed = state.context();
        seed.add(student(1, "Alice", "Smith", 25));
        seed.save().await.unwrap();

        let mut context = state.context();
        context.add(student(2, "Carol", "White", 30));
        context.add(student(1, "Mallory", "Black", 40));
        let error = context.save().await.unwrap_err();

        assert!(matches!(error, StudentsError::DuplicateStudent { id: 1 }));
        assert!(!context.has_changes());
        let everyone = state.context().all().await.unwrap();
        assert_eq!(everyone, vec![student(1, "Alice", "Smith", 25)]);
    }

    #[tokio::test]
    async fn update_of_absent_row_is_missing() {
        let state = fresh_state().await;
        let mut context = state.context();
        context.update(student(5, "Nobody", "Here", 1));

        let error = context.save().await.unwrap_err();
        assert!(matches!(error, StudentsError::MissingStudent { id: 5 }));
        assert!(state.context().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_is_ordered_by_id() {
        let state = fresh_state().await;
        let mut context = state.context();
        context.add(student(3, "C", "C", 3));
        context.add(student(1, "A", "A", 1));
        context.add(student(2, "B", "B", 2));
        assert_eq!(context.save().await.unwrap(), 3);

        let ids: Vec<i32> = state
            .context()
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|student| student.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn saving_nothing_touches_nothing() {
        let state = fresh_state().await;
        assert_eq!(state.context().save().await.unwrap(), 0);
    }
}
