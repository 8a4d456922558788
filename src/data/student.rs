use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
}
