use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use flowgate_core::domain::booking::{BookingRecord, NewBooking};
use flowgate_core::domain::ids::TenantId;
use flowgate_core::errors::RepositoryError;
use flowgate_core::ports::BookingRepository;
use flowgate_core::scheduling::SLOT_ID_FORMAT;
use sqlx::Row;

use super::{db_error, decode_error};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for SqlBookingRepository {
    /// Slot ids sort chronologically as text, so the window is a string range.
    async fn busy_slot_ids(
        &self,
        tenant_id: &TenantId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<BTreeSet<String>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT slot_id
            FROM booking
            WHERE tenant_id = ? AND slot_id >= ? AND slot_id <= ?
            "#,
        )
        .bind(&tenant_id.0)
        .bind(from.format(SLOT_ID_FORMAT).to_string())
        .bind(to.format(SLOT_ID_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("slot_id").map_err(decode_error))
            .collect()
    }

    async fn save_booking(&self, booking: NewBooking) -> Result<BookingRecord, RepositoryError> {
        let record = BookingRecord::from_new(booking, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO booking (
                id, tenant_id, slot_id, subject_id, title, duration_minutes,
                attendee_email, external_event_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id.0)
        .bind(&record.tenant_id.0)
        .bind(&record.slot_id)
        .bind(&record.subject_id.0)
        .bind(&record.title)
        .bind(i64::from(record.duration_minutes))
        .bind(&record.attendee_email)
        .bind(&record.external_event_id)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use flowgate_core::domain::booking::NewBooking;
    use flowgate_core::domain::ids::{SubjectId, TenantId};
    use flowgate_core::ports::BookingRepository;
    use sqlx::Row;

    use super::SqlBookingRepository;
    use crate::repositories::test_support::setup_pool;

    fn booking(tenant: &str, slot: &str) -> NewBooking {
        NewBooking {
            tenant_id: TenantId(tenant.to_string()),
            slot_id: slot.to_string(),
            subject_id: SubjectId("5215550001".to_string()),
            title: "Consulta".to_string(),
            duration_minutes: 45,
            attendee_email: Some("ana@example.com".to_string()),
            external_event_id: Some("evt-1".to_string()),
        }
    }

    #[tokio::test]
    async fn busy_slots_are_limited_to_tenant_and_inclusive_window() {
        let pool = setup_pool().await;
        let repo = SqlBookingRepository::new(pool.clone());
        for new in [
            booking("acme", "2026-03-02 08:00"),
            booking("acme", "2026-03-03 17:00"),
            booking("acme", "2026-03-04 09:00"),
            booking("globex", "2026-03-02 09:00"),
        ] {
            repo.save_booking(new).await.expect("save booking");
        }

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let busy = repo
            .busy_slot_ids(
                &TenantId("acme".to_string()),
                day.and_hms_opt(8, 0, 0).unwrap(),
                day.succ_opt().unwrap().and_hms_opt(17, 0, 0).unwrap(),
            )
            .await
            .expect("busy slots");

        assert_eq!(
            busy.into_iter().collect::<Vec<_>>(),
            vec!["2026-03-02 08:00".to_string(), "2026-03-03 17:00".to_string()]
        );
    }

    #[tokio::test]
    async fn saved_booking_persists_every_column() {
        let pool = setup_pool().await;
        let repo = SqlBookingRepository::new(pool.clone());

        let record = repo.save_booking(booking("acme", "2026-03-02 08:00")).await.expect("save");

        let row = sqlx::query(
            "SELECT slot_id, duration_minutes, attendee_email, external_event_id FROM booking WHERE id = ?",
        )
        .bind(&record.id.0)
        .fetch_one(&pool)
        .await
        .expect("load booking row");

        assert!(record.id.0.starts_with("BK-"));
        assert_eq!(row.get::<String, _>("slot_id"), "2026-03-02 08:00");
        assert_eq!(row.get::<i64, _>("duration_minutes"), 45);
        assert_eq!(row.get::<Option<String>, _>("attendee_email").as_deref(), Some("ana@example.com"));
        assert_eq!(row.get::<Option<String>, _>("external_event_id").as_deref(), Some("evt-1"));
    }
}
