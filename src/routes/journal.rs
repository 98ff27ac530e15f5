use axum::{Extension, Json, Router, routing::get};
use chrono::{DateTime, Local, NaiveDate, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::QueryFragment;
use diesel_async::{AsyncPgConnection, RunQueryDsl, methods::LoadQuery};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::PgPool;
use crate::errors::AppError;
use crate::logging::AccountId;
use crate::models::journal::{EntryView, Goal, GoalChecklist, JournalEntry, Mood, NewJournalEntry};
use crate::schema::journal_entries::dsl::{
    entry_date as entries_date, journal_entries as entries_table, updated_at as entries_updated_at,
    user_id as entries_user_id,
};
use crate::security::auth::{AuthenticatedUser, load_account};
use crate::security::json::ValidatedJson;

const GREETINGS: [&str; 4] = [
    "Hello again, {}.",
    "Welcome back, {}.",
    "Good to see you, {}.",
    "Good day, {}.",
];

const PROMPTS: [&str; 6] = [
    "Let's see how you're doing.",
    "Hope your day is well.",
    "Let's check in with your self.",
    "Ready to log your day?",
    "Let's add to your journal.",
    "Time for a check-in.",
];

pub fn router() -> Router {
    Router::new()
        .route("/journal", get(list_entries))
        .route("/journal/today", get(today).put(record_today))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryPayload {
    #[serde(default)]
    mood: String,
    #[serde(default)]
    goals: Vec<String>,
}

impl EntryPayload {
    fn into_new_entry(
        self,
        user_id: Uuid,
        entry_date: NaiveDate,
    ) -> Result<NewJournalEntry, AppError> {
        let mood = self
            .mood
            .trim()
            .parse::<Mood>()
            .map_err(|err| AppError::Validation(err.to_string()))?;
        let goals = GoalChecklist::from_submitted(&self.goals);

        NewJournalEntry::new(user_id, entry_date, mood, goals)
            .map_err(|err| AppError::Validation(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GoalOption {
    key: Goal,
    label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TodayPage {
    date: NaiveDate,
    greeting: String,
    prompt: &'static str,
    moods: Vec<Mood>,
    goals: Vec<GoalOption>,
    entry: Option<EntryView>,
}

fn today_date() -> NaiveDate {
    Local::now().date_naive()
}

fn greeting_for(username: &str) -> (String, &'static str) {
    let mut rng = rand::thread_rng();
    let greeting = GREETINGS
        .choose(&mut rng)
        .copied()
        .unwrap_or(GREETINGS[0])
        .replace("{}", username);
    let prompt = PROMPTS.choose(&mut rng).copied().unwrap_or(PROMPTS[0]);
    (greeting, prompt)
}

#[tracing::instrument(name = "journal_today", skip(pool), fields(user_id = %AccountId(user_id)))]
pub async fn today(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<TodayPage>, AppError> {
    let date = today_date();

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let user = load_account(&mut conn, user_id).await?;

    let existing = entries_table
        .filter(entries_user_id.eq(user_id).and(entries_date.eq(date)))
        .first::<JournalEntry>(&mut conn)
        .await
        .optional()?;

    let entry = existing
        .map(EntryView::try_from)
        .transpose()
        .map_err(AppError::CorruptRecord)?;

    let (greeting, prompt) = greeting_for(&user.username);

    Ok(Json(TodayPage {
        date,
        greeting,
        prompt,
        moods: Mood::ALL.to_vec(),
        goals: Goal::ALL
            .into_iter()
            .map(|goal| GoalOption {
                key: goal,
                label: goal.label(),
            })
            .collect(),
        entry,
    }))
}

/// Insert that keeps one row per user and day: a second submission for the
/// same date overwrites the mood and goals and bumps `updated_at`.
fn upsert_entry<'a>(
    entry: &'a NewJournalEntry,
    now: DateTime<Utc>,
) -> impl LoadQuery<'a, AsyncPgConnection, JournalEntry> + QueryFragment<Pg> + Send + 'a {
    diesel::insert_into(entries_table)
        .values(entry)
        .on_conflict((entries_user_id, entries_date))
        .do_update()
        .set((entry, entries_updated_at.eq(now)))
}

/// Creates today's entry, or replaces it if one was already recorded.
#[tracing::instrument(name = "journal_record", skip(pool, payload), fields(user_id = %AccountId(user_id)))]
pub async fn record_today(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<EntryPayload>,
) -> Result<Json<EntryView>, AppError> {
    let new_entry = payload.into_new_entry(user_id, today_date())?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let stored: JournalEntry = upsert_entry(&new_entry, Utc::now())
        .get_result(&mut conn)
        .await?;

    tracing::info!(
        entry_date = %stored.entry_date,
        mood = %stored.mood,
        "Journal entry recorded"
    );

    EntryView::try_from(stored)
        .map(Json)
        .map_err(AppError::CorruptRecord)
}

#[tracing::instrument(name = "journal_history", skip(pool), fields(user_id = %AccountId(user_id)))]
pub async fn list_entries(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<EntryView>>, AppError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let history = entries_table
        .filter(entries_user_id.eq(user_id))
        .order(entries_date.desc())
        .load::<JournalEntry>(&mut conn)
        .await?;

    let entries = history
        .into_iter()
        .map(EntryView::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::CorruptRecord)?;

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(mood: &str, goals: &[&str]) -> EntryPayload {
        EntryPayload {
            mood: mood.to_string(),
            goals: goals.iter().map(|goal| goal.to_string()).collect(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_payload_rejects_unknown_mood() {
        let err = payload("ecstatic", &[])
            .into_new_entry(Uuid::new_v4(), day())
            .unwrap_err();
        match err {
            AppError::Validation(message) => {
                assert_eq!(message, "please select one of the given moods")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_payload_rejects_missing_mood() {
        assert!(payload("", &["sleep"])
            .into_new_entry(Uuid::new_v4(), day())
            .is_err());
    }

    #[test]
    fn test_payload_drops_unknown_goals() {
        let entry = payload("happy", &["sleep", "skydiving", "outdoors"])
            .into_new_entry(Uuid::new_v4(), day())
            .unwrap();
        assert_eq!(entry.mood, "happy");
        assert!(entry.sleep && entry.outdoors);
        assert!(!entry.exercise && !entry.gratitude && !entry.meditation);
        assert_eq!(entry.entry_date, day());
    }

    #[test]
    fn test_resubmission_updates_the_same_day() {
        let entry = payload("content", &["sleep", "gratitude"])
            .into_new_entry(Uuid::new_v4(), day())
            .unwrap();
        let sql = diesel::debug_query::<Pg, _>(&upsert_entry(&entry, Utc::now())).to_string();

        assert!(
            sql.starts_with(r#"INSERT INTO "journal_entries""#),
            "{sql}"
        );
        let (_, update) = sql
            .split_once(r#"ON CONFLICT ("user_id", "entry_date") DO UPDATE SET "#)
            .unwrap_or_else(|| panic!("missing per-day conflict target: {sql}"));
        for column in [
            "mood",
            "sleep",
            "exercise",
            "outdoors",
            "gratitude",
            "meditation",
            "updated_at",
        ] {
            assert!(update.contains(&format!(r#""{column}" = "#)), "{column}: {sql}");
        }
    }

    #[test]
    fn test_entries_are_unique_per_day_and_follow_their_user() {
        let migration = include_str!(
            "../../migrations/2024-05-01-000100_create_journal_entries/up.sql"
        );
        assert!(migration.contains("REFERENCES users (id) ON DELETE CASCADE"));
        assert!(migration.contains("UNIQUE (user_id, entry_date)"));
    }

    #[test]
    fn test_greeting_mentions_user() {
        for _ in 0..20 {
            let (greeting, prompt) = greeting_for("writer");
            assert!(greeting.contains("writer"), "{greeting}");
            assert!(!greeting.contains("{}"), "{greeting}");
            assert!(PROMPTS.contains(&prompt));
        }
    }

    #[test]
    fn test_today_page_shape() {
        let page = TodayPage {
            date: day(),
            greeting: "Good day, writer.".to_string(),
            prompt: PROMPTS[0],
            moods: Mood::ALL.to_vec(),
            goals: vec![GoalOption {
                key: Goal::Sleep,
                label: Goal::Sleep.label(),
            }],
            entry: None,
        };
        let json = serde_json::to_value(page).unwrap();
        assert_eq!(json["moods"][0], "happy");
        assert_eq!(json["goals"][0]["key"], "sleep");
        assert_eq!(json["goals"][0]["label"], "Slept Well");
        assert!(json["entry"].is_null());
    }
}
