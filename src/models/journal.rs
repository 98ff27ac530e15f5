use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::user::User;
use crate::schema::journal_entries;

use super::{ModelValidationError, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Content,
    Neutral,
    Discontent,
    Unhappy,
}

impl Mood {
    /// Ordered from best to worst, the order the journal form lists them in.
    pub const ALL: [Mood; 5] = [
        Mood::Happy,
        Mood::Content,
        Mood::Neutral,
        Mood::Discontent,
        Mood::Unhappy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Content => "content",
            Mood::Neutral => "neutral",
            Mood::Discontent => "discontent",
            Mood::Unhappy => "unhappy",
        }
    }
}

impl FromStr for Mood {
    type Err = ModelValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == value)
            .ok_or(ModelValidationError::InvalidMood)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Sleep,
    Exercise,
    Outdoors,
    Gratitude,
    Meditation,
}

impl Goal {
    pub const ALL: [Goal; 5] = [
        Goal::Sleep,
        Goal::Exercise,
        Goal::Outdoors,
        Goal::Gratitude,
        Goal::Meditation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Goal::Sleep => "sleep",
            Goal::Exercise => "exercise",
            Goal::Outdoors => "outdoors",
            Goal::Gratitude => "gratitude",
            Goal::Meditation => "meditation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Goal::Sleep => "Slept Well",
            Goal::Exercise => "Exercised",
            Goal::Outdoors => "Spent Time Outdoors",
            Goal::Gratitude => "Fostered Gratitude",
            Goal::Meditation => "Meditated",
        }
    }
}

impl FromStr for Goal {
    type Err = ModelValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Goal::ALL
            .into_iter()
            .find(|goal| goal.as_str() == value)
            .ok_or_else(|| ModelValidationError::UnknownGoal(value.to_string()))
    }
}

/// Which goals were met on a given day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalChecklist {
    pub sleep: bool,
    pub exercise: bool,
    pub outdoors: bool,
    pub gratitude: bool,
    pub meditation: bool,
}

impl GoalChecklist {
    /// Builds a checklist from submitted goal keys. Keys outside the goal
    /// vocabulary are dropped and repeats collapse.
    pub fn from_submitted<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checklist = Self::default();
        for key in keys {
            match key.as_ref().parse::<Goal>() {
                Ok(goal) => checklist.set(goal, true),
                Err(err) => tracing::debug!(error = %err, "Ignoring submitted goal"),
            }
        }
        checklist
    }

    pub fn set(&mut self, goal: Goal, checked: bool) {
        let slot = match goal {
            Goal::Sleep => &mut self.sleep,
            Goal::Exercise => &mut self.exercise,
            Goal::Outdoors => &mut self.outdoors,
            Goal::Gratitude => &mut self.gratitude,
            Goal::Meditation => &mut self.meditation,
        };
        *slot = checked;
    }

    pub fn is_checked(&self, goal: Goal) -> bool {
        match goal {
            Goal::Sleep => self.sleep,
            Goal::Exercise => self.exercise,
            Goal::Outdoors => self.outdoors,
            Goal::Gratitude => self.gratitude,
            Goal::Meditation => self.meditation,
        }
    }

    pub fn checked(&self) -> Vec<Goal> {
        Goal::ALL
            .into_iter()
            .filter(|goal| self.is_checked(*goal))
            .collect()
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = journal_entries)]
#[diesel(belongs_to(User))]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: NaiveDate,
    pub mood: String,
    pub sleep: bool,
    pub exercise: bool,
    pub outdoors: bool,
    pub gratitude: bool,
    pub meditation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn goals(&self) -> GoalChecklist {
        GoalChecklist {
            sleep: self.sleep,
            exercise: self.exercise,
            outdoors: self.outdoors,
            gratitude: self.gratitude,
            meditation: self.meditation,
        }
    }
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = journal_entries)]
pub struct NewJournalEntry {
    pub user_id: Uuid,
    pub entry_date: NaiveDate,
    pub mood: String,
    pub sleep: bool,
    pub exercise: bool,
    pub outdoors: bool,
    pub gratitude: bool,
    pub meditation: bool,
}

impl NewJournalEntry {
    pub fn new(
        user_id: Uuid,
        entry_date: NaiveDate,
        mood: Mood,
        goals: GoalChecklist,
    ) -> ValidationResult<Self> {
        if user_id == Uuid::nil() {
            return Err(ModelValidationError::InvalidUserId);
        }

        Ok(Self {
            user_id,
            entry_date,
            mood: mood.as_str().to_string(),
            sleep: goals.sleep,
            exercise: goals.exercise,
            outdoors: goals.outdoors,
            gratitude: goals.gratitude,
            meditation: goals.meditation,
        })
    }
}

/// Client-facing shape of a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub date: NaiveDate,
    pub mood: Mood,
    pub goals: Vec<Goal>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JournalEntry> for EntryView {
    type Error = ModelValidationError;

    fn try_from(entry: JournalEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            date: entry.entry_date,
            mood: entry.mood.parse()?,
            goals: entry.goals().checked(),
            updated_at: entry.updated_at,
        })
    }
}
