//! Appointment slot generation.
//!
//! Candidates are computed in the tenant's local time (a fixed UTC offset from
//! the availability config), filtered by lead time, breaks and already-booked
//! slot ids, and labelled for display in the flow's dropdown.

pub mod availability;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ids::TenantId;
use crate::errors::RepositoryError;
use crate::ports::BookingRepository;

pub use availability::{AvailabilityConfig, AvailabilityError, BreakTime, SlotLocale};

/// Slots starting sooner than this are never offered.
pub const SLOT_LEAD_TIME_HOURS: i64 = 2;
/// Upper bound on the number of calendar days scanned for qualifying weekdays.
pub const MAX_LOOKAHEAD_DAYS: i64 = 30;
pub const SLOT_ID_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub id: String,
    #[serde(rename = "title")]
    pub label: String,
}

pub fn parse_slot_id(slot_id: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(slot_id.trim(), SLOT_ID_FORMAT).ok()
}

/// Local-time window that can contain offered slots: `[now, now + lookahead]`.
pub fn busy_window(config: &AvailabilityConfig, now: DateTime<Utc>) -> (NaiveDateTime, NaiveDateTime) {
    let local_now = local_now(config, now);
    (local_now, local_now + Duration::days(MAX_LOOKAHEAD_DAYS + 1))
}

pub fn generate_candidates(
    config: &AvailabilityConfig,
    busy: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Vec<SlotCandidate> {
    let local_now = local_now(config, now);
    let earliest = local_now + Duration::hours(SLOT_LEAD_TIME_HOURS);
    let step = Duration::minutes(i64::from(config.interval_minutes));
    let limit = config.max_slots.unwrap_or(usize::MAX);

    let mut candidates = Vec::new();
    let mut qualifying_days = 0u32;

    for offset in 0..MAX_LOOKAHEAD_DAYS {
        if qualifying_days >= config.days_to_show || candidates.len() >= limit {
            break;
        }
        let Some(day) = local_now.date().checked_add_signed(Duration::days(offset)) else {
            break;
        };
        let weekday = day.weekday().num_days_from_sunday() as u8;
        if !config.days_available.contains(&weekday) {
            continue;
        }
        qualifying_days += 1;

        let mut time = config.start_time;
        while time < config.end_time && candidates.len() < limit {
            let slot = day.and_time(time);
            let id = slot.format(SLOT_ID_FORMAT).to_string();
            if slot >= earliest && !config.is_on_break(time) && !busy.contains(&id) {
                candidates.push(SlotCandidate { id, label: slot_label(config.locale, day, slot) });
            }
            let (next, wrapped) = time.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            time = next;
        }
    }

    candidates
}

fn local_now(config: &AvailabilityConfig, now: DateTime<Utc>) -> NaiveDateTime {
    match config.utc_offset() {
        Some(offset) => now.with_timezone(&offset).naive_local(),
        None => now.naive_utc(),
    }
}

fn slot_label(locale: SlotLocale, day: NaiveDate, slot: NaiveDateTime) -> String {
    let time = slot.format("%H:%M");
    match locale {
        SlotLocale::Es => format!(
            "{} {} de {} - {time}",
            weekday_es(day.weekday()),
            day.day(),
            MONTHS_ES[day.month0() as usize]
        ),
        SlotLocale::En => format!("{} - {time}", day.format("%A, %B %-d")),
    }
}

fn weekday_es(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Combines slot generation with the tenant's persisted bookings.
#[derive(Clone)]
pub struct SlotScheduler {
    bookings: Arc<dyn BookingRepository>,
}

impl SlotScheduler {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn available_slots(
        &self,
        tenant_id: &TenantId,
        config: &AvailabilityConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotCandidate>, RepositoryError> {
        let (from, to) = busy_window(config, now);
        let busy = self.bookings.busy_slot_ids(tenant_id, from, to).await?;
        let candidates = generate_candidates(config, &busy, now);
        debug!(
            event_name = "scheduling.slots.generated",
            tenant_id = %tenant_id,
            busy = busy.len(),
            offered = candidates.len(),
            "generated appointment slots"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

    use crate::domain::booking::NewBooking;
    use crate::domain::ids::{SubjectId, TenantId};
    use crate::ports::memory::InMemoryBookingRepository;
    use crate::ports::BookingRepository;
    use crate::scheduling::{
        generate_candidates, parse_slot_id, AvailabilityConfig, BreakTime, SlotLocale,
        SlotScheduler, SLOT_LEAD_TIME_HOURS,
    };

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn weekday_config() -> AvailabilityConfig {
        AvailabilityConfig {
            days_available: vec![1, 2, 3, 4, 5],
            start_time: hm(8, 0),
            end_time: hm(17, 0),
            interval_minutes: 60,
            break_times: vec![BreakTime { start: hm(13, 0), end: hm(14, 0) }],
            days_to_show: 7,
            max_slots: None,
            utc_offset_minutes: 0,
            locale: SlotLocale::Es,
        }
    }

    // 2026-03-02 is a Monday.
    fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn monday_morning_offers_working_hours_without_break() {
        let config = AvailabilityConfig { days_to_show: 1, ..weekday_config() };

        let slots = generate_candidates(&config, &BTreeSet::new(), monday_at(6, 0));
        let ids: Vec<&str> = slots.iter().map(|slot| slot.id.as_str()).collect();

        assert_eq!(
            ids,
            vec![
                "2026-03-02 08:00",
                "2026-03-02 09:00",
                "2026-03-02 10:00",
                "2026-03-02 11:00",
                "2026-03-02 12:00",
                "2026-03-02 14:00",
                "2026-03-02 15:00",
                "2026-03-02 16:00",
            ]
        );
        assert_eq!(slots[0].label, "Lunes 2 de marzo - 08:00");
    }

    #[test]
    fn every_candidate_respects_schedule_lead_time_and_busy_set() {
        let config = weekday_config();
        let now = monday_at(9, 30);
        let busy: BTreeSet<String> =
            ["2026-03-03 10:00".to_owned(), "2026-03-04 08:00".to_owned()].into_iter().collect();

        let slots = generate_candidates(&config, &busy, now);

        assert!(!slots.is_empty());
        let earliest = now.naive_utc() + Duration::hours(SLOT_LEAD_TIME_HOURS);
        for slot in &slots {
            let at = parse_slot_id(&slot.id).expect("slot id parses");
            assert!(at >= earliest, "{} is inside the lead time", slot.id);
            assert!(at.time() >= config.start_time && at.time() < config.end_time);
            assert!(!config.is_on_break(at.time()));
            assert!(!busy.contains(&slot.id));
            let weekday = chrono::Datelike::weekday(&at.date()).num_days_from_sunday() as u8;
            assert!(config.days_available.contains(&weekday));
        }
        assert_eq!(slots[0].id, "2026-03-02 12:00");
    }

    #[test]
    fn generation_is_deterministic() {
        let config = weekday_config();
        let busy = BTreeSet::from(["2026-03-05 09:00".to_owned()]);
        let now = monday_at(7, 15);

        assert_eq!(generate_candidates(&config, &busy, now), generate_candidates(&config, &busy, now));
    }

    #[test]
    fn weekend_start_skips_to_next_qualifying_day() {
        let config = AvailabilityConfig { days_to_show: 1, ..weekday_config() };
        let saturday = Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap();

        let slots = generate_candidates(&config, &BTreeSet::new(), saturday);

        assert!(slots.iter().all(|slot| slot.id.starts_with("2026-03-02")));
        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn lookahead_is_bounded_and_max_slots_caps_output() {
        let unbounded = AvailabilityConfig { days_to_show: 365, ..weekday_config() };
        let slots = generate_candidates(&unbounded, &BTreeSet::new(), monday_at(0, 0));
        let last = parse_slot_id(&slots[slots.len() - 1].id).unwrap();
        assert!(last.date() < monday_at(0, 0).date_naive() + Duration::days(30));

        let capped = AvailabilityConfig { max_slots: Some(3), ..weekday_config() };
        assert_eq!(generate_candidates(&capped, &BTreeSet::new(), monday_at(0, 0)).len(), 3);

        let closed = AvailabilityConfig { days_available: vec![], ..weekday_config() };
        assert!(generate_candidates(&closed, &BTreeSet::new(), monday_at(0, 0)).is_empty());
    }

    #[test]
    fn utc_offset_shifts_local_day_and_english_labels() {
        let config = AvailabilityConfig {
            days_to_show: 1,
            utc_offset_minutes: -300,
            locale: SlotLocale::En,
            ..weekday_config()
        };

        // 11:00 UTC is 06:00 at UTC-5.
        let slots = generate_candidates(&config, &BTreeSet::new(), monday_at(11, 0));

        assert_eq!(slots[0].id, "2026-03-02 08:00");
        assert_eq!(slots[0].label, "Monday, March 2 - 08:00");
    }

    #[tokio::test]
    async fn scheduler_excludes_persisted_bookings() {
        let bookings = Arc::new(InMemoryBookingRepository::default());
        let tenant = TenantId("acme".to_owned());
        bookings
            .save_booking(NewBooking {
                tenant_id: tenant.clone(),
                slot_id: "2026-03-02 08:00".to_owned(),
                subject_id: SubjectId("5215550001".to_owned()),
                title: "Consulta".to_owned(),
                duration_minutes: 30,
                attendee_email: None,
                external_event_id: None,
            })
            .await
            .expect("save booking");

        let scheduler = SlotScheduler::new(bookings);
        let config = AvailabilityConfig { days_to_show: 1, ..weekday_config() };
        let slots = scheduler.available_slots(&tenant, &config, monday_at(6, 0)).await.unwrap();

        assert_eq!(slots[0].id, "2026-03-02 09:00");
        assert_eq!(slots.len(), 7);
    }
}
