//! Session tracking operations.

use super::{parse_timestamp, LocalStore, Result};
use crate::tracking::SessionTracking;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

impl LocalStore {
    /// Insert or replace a session by `(plan, session)`.
    pub async fn upsert_session(&self, session: SessionTracking) -> Result<SessionTracking> {
        let mut state = self.state.lock().await;
        let plan = state.plan_mut(&session.plan_id);
        match plan
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            Some(existing) => *existing = session.clone(),
            None => plan.sessions.push(session.clone()),
        }

        let flushed = async {
            let mut conn = self.pool().acquire().await?;
            write_session(&mut conn, &session).await
        }
        .await;
        state.flushed(flushed)?;
        Ok(session)
    }

    pub async fn session(&self, plan_id: &str, session_id: &str) -> Option<SessionTracking> {
        let state = self.state.lock().await;
        state.plans.get(plan_id).and_then(|plan| {
            plan.sessions
                .iter()
                .find(|s| s.session_id == session_id)
                .cloned()
        })
    }

    /// Sessions of a plan, in insertion order.
    pub async fn sessions(&self, plan_id: &str) -> Vec<SessionTracking> {
        let state = self.state.lock().await;
        state
            .plans
            .get(plan_id)
            .map(|plan| plan.sessions.clone())
            .unwrap_or_default()
    }

    /// Replace a session's notes, creating the session if it is unknown.
    pub async fn update_session_notes(
        &self,
        plan_id: &str,
        session_id: &str,
        notes: &str,
    ) -> Result<SessionTracking> {
        let mut state = self.state.lock().await;
        let plan = state.plan_mut(plan_id);
        let index = match plan.sessions.iter().position(|s| s.session_id == session_id) {
            Some(index) => index,
            None => {
                plan.sessions.push(SessionTracking::new(plan_id, session_id, ""));
                plan.sessions.len() - 1
            }
        };
        let session = &mut plan.sessions[index];
        session.notes = notes.to_string();
        session.updated_at = Utc::now();
        let session = session.clone();

        let flushed = async {
            let mut conn = self.pool().acquire().await?;
            write_session(&mut conn, &session).await
        }
        .await;
        state.flushed(flushed)?;
        Ok(session)
    }
}

pub(crate) async fn write_session(
    conn: &mut SqliteConnection,
    session: &SessionTracking,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO session_tracking (plan_id, session_id, focus, notes, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(plan_id, session_id) DO UPDATE SET
            focus = excluded.focus,
            notes = excluded.notes,
            updated_at = excluded.updated_at",
    )
    .bind(&session.plan_id)
    .bind(&session.session_id)
    .bind(&session.focus)
    .bind(&session.notes)
    .bind(session.updated_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) fn session_from_row(row: &SqliteRow) -> Result<SessionTracking> {
    let updated_at: String = row.try_get("updated_at")?;
    Ok(SessionTracking {
        plan_id: row.try_get("plan_id")?,
        session_id: row.try_get("session_id")?,
        focus: row.try_get("focus")?,
        notes: row.try_get("notes")?,
        updated_at: parse_timestamp("session_tracking", &updated_at)?,
    })
}
