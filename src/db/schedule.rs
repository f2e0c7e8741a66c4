use super::client::{blob, int, opt_text, text, RowExt, SqliteClient};
use crate::types::{
    validate_importance, AppError, Appointment, NewAppointment, NewReminder, Reminder, Result,
};
use crate::utils::time::{days_ahead, now_timestamp, parse_datetime};
use libsql::Row;
use uuid::Uuid;

const APPOINTMENT_COLUMNS: &str = "appointment_id, timestamp_created, scheduled_datetime, title, \
     description, location, source_conversation_id";

const REMINDER_COLUMNS: &str = "reminder_id, timestamp_created, due_datetime, content, \
     priority_level, completed, source_conversation_id";

/// Appointments and reminders (`schedule.db`).
#[derive(Clone)]
pub struct ScheduleStore {
    db: SqliteClient,
}

impl ScheduleStore {
    pub async fn new(db: SqliteClient) -> Result<Self> {
        let store = Self { db };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn client(&self) -> &SqliteClient {
        &self.db
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS appointments (
                    appointment_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    scheduled_datetime TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    location TEXT,
                    source_conversation_id TEXT,
                    embedding BLOB
                );
                CREATE TABLE IF NOT EXISTS reminders (
                    reminder_id TEXT PRIMARY KEY,
                    timestamp_created TEXT NOT NULL,
                    due_datetime TEXT NOT NULL,
                    content TEXT NOT NULL,
                    priority_level INTEGER DEFAULT 5,
                    completed INTEGER DEFAULT 0,
                    source_conversation_id TEXT,
                    embedding BLOB
                );
                CREATE INDEX IF NOT EXISTS idx_appointments_scheduled ON appointments(scheduled_datetime);
                CREATE INDEX IF NOT EXISTS idx_reminders_due ON reminders(due_datetime);",
            )
            .await
    }

    /// Returns the new id and the normalized datetime.
    pub async fn create_appointment(&self, appointment: &NewAppointment) -> Result<(String, String)> {
        if appointment.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title must not be empty".to_string()));
        }
        let scheduled = parse_datetime(&appointment.scheduled_datetime)?;
        let appointment_id = Uuid::new_v4().to_string();

        self.db
            .execute(
                "INSERT INTO appointments
                 (appointment_id, timestamp_created, scheduled_datetime, title, description,
                  location, source_conversation_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                vec![
                    text(appointment_id.as_str()),
                    text(now_timestamp()),
                    text(scheduled.as_str()),
                    text(appointment.title.as_str()),
                    opt_text(appointment.description.as_deref()),
                    opt_text(appointment.location.as_deref()),
                    opt_text(appointment.source_conversation_id.as_deref()),
                ],
            )
            .await?;

        Ok((appointment_id, scheduled))
    }

    /// Returns the new id and the normalized due datetime.
    pub async fn create_reminder(&self, reminder: &NewReminder) -> Result<(String, String)> {
        if reminder.content.trim().is_empty() {
            return Err(AppError::InvalidInput("content must not be empty".to_string()));
        }
        validate_importance("priority_level", reminder.priority_level)?;
        let due = parse_datetime(&reminder.due_datetime)?;
        let reminder_id = Uuid::new_v4().to_string();

        self.db
            .execute(
                "INSERT INTO reminders
                 (reminder_id, timestamp_created, due_datetime, content, priority_level,
                  source_conversation_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                vec![
                    text(reminder_id.as_str()),
                    text(now_timestamp()),
                    text(due.as_str()),
                    text(reminder.content.as_str()),
                    int(reminder.priority_level),
                    opt_text(reminder.source_conversation_id.as_deref()),
                ],
            )
            .await?;

        Ok((reminder_id, due))
    }

    pub async fn complete_reminder(&self, reminder_id: &str) -> Result<()> {
        let changed = self
            .db
            .execute(
                "UPDATE reminders SET completed = 1 WHERE reminder_id = ?1",
                vec![text(reminder_id)],
            )
            .await?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("Reminder {} not found", reminder_id)));
        }
        Ok(())
    }

    /// Appointments between now and `days` days ahead, soonest first.
    pub async fn get_upcoming_appointments(&self, days: i64) -> Result<Vec<Appointment>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM appointments
                     WHERE scheduled_datetime >= ?1 AND scheduled_datetime <= ?2
                     ORDER BY scheduled_datetime ASC",
                    APPOINTMENT_COLUMNS
                ),
                vec![text(now_timestamp()), text(days_ahead(days)?)],
                map_appointment,
            )
            .await
    }

    /// Incomplete reminders, earliest due first.
    pub async fn get_active_reminders(&self) -> Result<Vec<Reminder>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {} FROM reminders WHERE completed = 0 ORDER BY due_datetime ASC",
                    REMINDER_COLUMNS
                ),
                vec![],
                map_reminder,
            )
            .await
    }

    pub async fn appointments_with_embeddings(&self) -> Result<Vec<(Appointment, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, embedding FROM appointments WHERE embedding IS NOT NULL",
                    APPOINTMENT_COLUMNS
                ),
                vec![],
                |row| Ok((map_appointment(row)?, row.embedding(7)?.unwrap_or_default())),
            )
            .await
    }

    pub async fn reminders_with_embeddings(&self) -> Result<Vec<(Reminder, Vec<f32>)>> {
        self.db
            .query_map(
                &format!(
                    "SELECT {}, embedding FROM reminders WHERE embedding IS NOT NULL",
                    REMINDER_COLUMNS
                ),
                vec![],
                |row| Ok((map_reminder(row)?, row.embedding(7)?.unwrap_or_default())),
            )
            .await
    }

    pub async fn set_appointment_embedding(&self, appointment_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE appointments SET embedding = ?1 WHERE appointment_id = ?2",
                vec![blob(embedding), text(appointment_id)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_reminder_embedding(&self, reminder_id: &str, embedding: Vec<u8>) -> Result<()> {
        self.db
            .execute(
                "UPDATE reminders SET embedding = ?1 WHERE reminder_id = ?2",
                vec![blob(embedding), text(reminder_id)],
            )
            .await?;
        Ok(())
    }

    pub async fn appointment_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM appointments", vec![]).await
    }

    pub async fn reminder_count(&self) -> Result<i64> {
        self.db.count("SELECT COUNT(*) FROM reminders", vec![]).await
    }
}

fn map_appointment(row: &Row) -> Result<Appointment> {
    Ok(Appointment {
        appointment_id: row.text(0)?,
        timestamp_created: row.text(1)?,
        scheduled_datetime: row.text(2)?,
        title: row.text(3)?,
        description: row.opt_text(4)?,
        location: row.opt_text(5)?,
        source_conversation_id: row.opt_text(6)?,
    })
}

fn map_reminder(row: &Row) -> Result<Reminder> {
    Ok(Reminder {
        reminder_id: row.text(0)?,
        timestamp_created: row.text(1)?,
        due_datetime: row.text(2)?,
        content: row.text(3)?,
        priority_level: row.opt_int(4)?.unwrap_or(crate::types::DEFAULT_IMPORTANCE),
        completed: row.opt_int(5)?.unwrap_or(0) != 0,
        source_conversation_id: row.opt_text(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::days_ago;

    async fn store() -> ScheduleStore {
        ScheduleStore::new(SqliteClient::new_memory().await.unwrap())
            .await
            .unwrap()
    }

    fn appointment(title: &str, when: String) -> NewAppointment {
        NewAppointment {
            title: title.to_string(),
            scheduled_datetime: when,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upcoming_window() {
        let store = store().await;
        store.create_appointment(&appointment("past", days_ago(1).unwrap())).await.unwrap();
        store.create_appointment(&appointment("in three days", days_ahead(3).unwrap())).await.unwrap();
        store.create_appointment(&appointment("tomorrow", days_ahead(1).unwrap())).await.unwrap();
        store.create_appointment(&appointment("next month", days_ahead(30).unwrap())).await.unwrap();

        let upcoming = store.get_upcoming_appointments(7).await.unwrap();
        let titles: Vec<_> = upcoming.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["tomorrow", "in three days"]);
    }

    #[tokio::test]
    async fn test_invalid_datetime_rejected() {
        let store = store().await;
        let result = store.create_appointment(&appointment("x", "soon".to_string())).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(store.appointment_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reminders_active_and_completed() {
        let store = store().await;
        let (later, _) = store
            .create_reminder(&NewReminder {
                content: "later".into(),
                due_datetime: days_ahead(2).unwrap(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create_reminder(&NewReminder {
                content: "sooner".into(),
                due_datetime: days_ahead(1).unwrap(),
                priority_level: 9,
                ..Default::default()
            })
            .await
            .unwrap();

        let active = store.get_active_reminders().await.unwrap();
        assert_eq!(active[0].content, "sooner");
        assert_eq!(active[0].priority_level, 9);

        store.complete_reminder(&later).await.unwrap();
        let active = store.get_active_reminders().await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(matches!(
            store.complete_reminder("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
