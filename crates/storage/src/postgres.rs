//! PostgreSQL storage backend.
//!
//! Runtime-checked sqlx queries against the host platform's Postgres
//! instance. Every query filters by org id (and user id where applicable)
//! explicitly; there is no session-level tenant state.

use async_trait::async_trait;
use repcoach_core::{
    ActivityRecord, Attempt, AttemptId, AttemptStatus, DimensionKind, DimensionResult, OrgId,
    ScenarioId, Time, Trend, UserId,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{
    AttemptStamp, LastAttempt, Member, NotificationPrefs, Result, Role, Storage, StorageError,
};

/// Postgres-backed storage.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect to Postgres and run pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Other(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (pool construction and migrations handled by
    /// the caller).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn trend_str(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "improving",
        Trend::Declining => "declining",
        Trend::Stable => "stable",
        Trend::New => "new",
    }
}

fn parse_trend(raw: &str) -> Trend {
    match raw {
        "improving" => Trend::Improving,
        "declining" => Trend::Declining,
        "stable" => Trend::Stable,
        _ => Trend::New,
    }
}

fn kind_str(kind: DimensionKind) -> &'static str {
    match kind {
        DimensionKind::Weakness => "weakness",
        DimensionKind::Skill => "skill",
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Trainee => "trainee",
        Role::Manager => "manager",
        Role::Admin => "admin",
    }
}

fn parse_role(raw: &str) -> Role {
    match raw {
        "manager" => Role::Manager,
        "admin" => Role::Admin,
        _ => Role::Trainee,
    }
}

fn parse_status(raw: &str) -> AttemptStatus {
    match raw {
        "completed" => AttemptStatus::Completed,
        "abandoned" => AttemptStatus::Abandoned,
        _ => AttemptStatus::InProgress,
    }
}

fn attempt_from_row(row: &sqlx::postgres::PgRow) -> Result<Attempt> {
    Ok(Attempt {
        id: AttemptId::new(row.try_get::<String, _>("id")?),
        org_id: OrgId::new(row.try_get::<String, _>("org_id")?),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        score: row.try_get("score")?,
        breakdown: row.try_get("breakdown")?,
        started_at: row.try_get("started_at")?,
        status: parse_status(&row.try_get::<String, _>("status")?),
    })
}

#[async_trait]
impl Storage for PgStorage {
    async fn recent_completed_attempts(
        &self,
        org: &OrgId,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<Attempt>> {
        let rows = sqlx::query(
            "SELECT id, org_id, user_id, score, breakdown, started_at, status \
             FROM repcoach.scenario_attempts \
             WHERE org_id = $1 AND user_id = $2 AND status = 'completed' \
             ORDER BY started_at DESC \
             LIMIT $3",
        )
        .bind(org.as_str())
        .bind(user.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(attempt_from_row).collect()
    }

    async fn completed_attempts_between(
        &self,
        org: &OrgId,
        user: &UserId,
        from: Time,
        to: Time,
    ) -> Result<Vec<Attempt>> {
        let rows = sqlx::query(
            "SELECT id, org_id, user_id, score, breakdown, started_at, status \
             FROM repcoach.scenario_attempts \
             WHERE org_id = $1 AND user_id = $2 AND status = 'completed' \
               AND started_at >= $3 AND started_at < $4 \
             ORDER BY started_at ASC",
        )
        .bind(org.as_str())
        .bind(user.as_str())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(attempt_from_row).collect()
    }

    async fn completed_attempt_stamps(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Vec<AttemptStamp>> {
        let rows = sqlx::query(
            "SELECT started_at, score \
             FROM repcoach.scenario_attempts \
             WHERE org_id = $1 AND user_id = $2 AND status = 'completed' \
             ORDER BY started_at DESC",
        )
        .bind(org.as_str())
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AttemptStamp {
                    started_at: row.try_get("started_at")?,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }

    async fn latest_attempts_by_user(&self) -> Result<Vec<LastAttempt>> {
        let rows = sqlx::query(
            "SELECT org_id, user_id, MAX(started_at) AS last_attempt_at \
             FROM repcoach.scenario_attempts \
             WHERE status = 'completed' \
             GROUP BY org_id, user_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(LastAttempt {
                    org_id: OrgId::new(row.try_get::<String, _>("org_id")?),
                    user_id: UserId::new(row.try_get::<String, _>("user_id")?),
                    last_attempt_at: row.try_get("last_attempt_at")?,
                })
            })
            .collect()
    }

    async fn active_trainees(&self, since: Time) -> Result<Vec<(OrgId, UserId)>> {
        let rows = sqlx::query(
            "SELECT DISTINCT org_id, user_id \
             FROM repcoach.scenario_attempts \
             WHERE status = 'completed' AND started_at >= $1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok((
                    OrgId::new(row.try_get::<String, _>("org_id")?),
                    UserId::new(row.try_get::<String, _>("user_id")?),
                ))
            })
            .collect()
    }

    async fn replace_dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        rows: &[(DimensionKind, DimensionResult)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM repcoach.dimension_rows WHERE org_id = $1 AND user_id = $2")
            .bind(org.as_str())
            .bind(user.as_str())
            .execute(&mut *tx)
            .await?;

        for (kind, result) in rows {
            sqlx::query(
                "INSERT INTO repcoach.dimension_rows \
                 (org_id, user_id, kind, key, score, trend, evidence_count, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
            )
            .bind(org.as_str())
            .bind(user.as_str())
            .bind(kind_str(*kind))
            .bind(&result.key)
            .bind(result.score)
            .bind(trend_str(result.trend))
            .bind(result.evidence_count as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn dimension_rows(
        &self,
        org: &OrgId,
        user: &UserId,
        kind: DimensionKind,
    ) -> Result<Vec<DimensionResult>> {
        let rows = sqlx::query(
            "SELECT key, score, trend, evidence_count \
             FROM repcoach.dimension_rows \
             WHERE org_id = $1 AND user_id = $2 AND kind = $3 \
             ORDER BY score ASC, evidence_count ASC, key ASC",
        )
        .bind(org.as_str())
        .bind(user.as_str())
        .bind(kind_str(kind))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DimensionResult {
                    key: row.try_get("key")?,
                    score: row.try_get("score")?,
                    trend: parse_trend(&row.try_get::<String, _>("trend")?),
                    evidence_count: row.try_get::<i64, _>("evidence_count")? as usize,
                })
            })
            .collect()
    }

    async fn list_orgs(&self) -> Result<Vec<OrgId>> {
        let rows = sqlx::query("SELECT id FROM repcoach.orgs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Ok(OrgId::new(row.try_get::<String, _>("id")?)))
            .collect()
    }

    async fn org_members(&self, org: &OrgId, roles: &[Role]) -> Result<Vec<Member>> {
        let role_names: Vec<String> = roles.iter().map(|r| role_str(*r).to_string()).collect();
        let rows = sqlx::query(
            "SELECT user_id, role, name, email \
             FROM repcoach.org_members \
             WHERE org_id = $1 AND role = ANY($2)",
        )
        .bind(org.as_str())
        .bind(role_names)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Member {
                    user_id: UserId::new(row.try_get::<String, _>("user_id")?),
                    role: parse_role(&row.try_get::<String, _>("role")?),
                    name: row.try_get("name")?,
                    email: row.try_get("email")?,
                })
            })
            .collect()
    }

    async fn notification_preference(
        &self,
        org: &OrgId,
        user: &UserId,
    ) -> Result<Option<NotificationPrefs>> {
        let row = sqlx::query(
            "SELECT low_priority_alerts \
             FROM repcoach.notification_preferences \
             WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(NotificationPrefs {
                low_priority_alerts: row.try_get("low_priority_alerts")?,
            }),
            None => None,
        })
    }

    async fn scenario_exists(&self, scenario: &ScenarioId) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM repcoach.scenarios WHERE id = $1")
            .bind(scenario.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn record_activity(&self, record: &ActivityRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO repcoach.agent_activity_log \
             (id, org_id, user_id, agent_id, event_type, action, details, at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id.to_string())
        .bind(record.org_id.as_str())
        .bind(record.user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(&record.agent_id)
        .bind(&record.event_type)
        .bind(&record.action)
        .bind(&record.details)
        .bind(record.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
