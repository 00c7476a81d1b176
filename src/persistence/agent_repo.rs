//! Agent repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::agent::Agent;
use crate::Result;

use super::db::Database;
use super::parse_timestamp;

/// Repository wrapper around `SQLite` for agent records.
#[derive(Clone)]
pub struct AgentRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    name: String,
    knowledge: String,
    link_expiry_hours: i64,
    created_at: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent> {
        Ok(Agent {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            name: self.name,
            knowledge: self.knowledge,
            link_expiry_hours: self.link_expiry_hours,
        })
    }
}

impl AgentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new agent record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the database insert fails.
    pub async fn create(&self, agent: &Agent) -> Result<Agent> {
        sqlx::query(
            "INSERT INTO agents (id, name, knowledge, link_expiry_hours, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.knowledge)
        .bind(agent.link_expiry_hours)
        .bind(agent.created_at.to_rfc3339())
        .execute(self.db.as_ref())
        .await?;

        Ok(agent.clone())
    }

    /// Retrieve an agent by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(AgentRow::into_agent).transpose()
    }

    /// Remove an agent along with its bookings and session records.
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?1")
            .bind(id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
