//! Core domain types for the Ignition progression system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Activity categories, intensities and recorded activities
//! - Missions, their rules and lifecycle
//! - Collectible cards and ownership
//! - User progress and reset bookkeeping
//! - Domain events and the effects returned to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Activity Types
// ============================================================================

/// Category of a logged spark
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Decision,
    Energy,
    Idea,
    Experiment,
    Challenge,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Decision,
        Category::Energy,
        Category::Idea,
        Category::Experiment,
        Category::Challenge,
    ];

    /// Base points before the intensity multiplier
    pub fn base_points(self) -> u32 {
        match self {
            Category::Decision => 10,
            Category::Energy => 15,
            Category::Idea => 8,
            Category::Experiment => 20,
            Category::Challenge => 25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Decision => "decision",
            Category::Energy => "energy",
            Category::Idea => "idea",
            Category::Experiment => "experiment",
            Category::Challenge => "challenge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// How intense a spark was; ordered from lowest to highest
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Intensity {
    pub const ALL: [Intensity; 4] = [
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
        Intensity::Extreme,
    ];

    /// Point multiplier, expressed in tenths to keep point math integral
    fn multiplier_tenths(self) -> u32 {
        match self {
            Intensity::Low => 10,
            Intensity::Medium => 15,
            Intensity::High => 20,
            Intensity::Extreme => 25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
            Intensity::Extreme => "extreme",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }
}

/// A recorded spark. Immutable once appended to the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub category: Category,
    pub intensity: Intensity,
    pub points: u32,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    /// Build a new activity, deriving its points from category and intensity
    pub fn new(category: Category, intensity: Intensity, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            intensity,
            points: activity_points(category, intensity),
            timestamp,
        }
    }
}

/// `floor(base × multiplier)` for a category/intensity pair
pub fn activity_points(category: Category, intensity: Intensity) -> u32 {
    category.base_points() * intensity.multiplier_tenths() / 10
}

// ============================================================================
// Mission Types
// ============================================================================

/// Lifecycle family of a mission
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    /// Reopened every local midnight
    Daily,
    /// Reopened every Monday
    Weekly,
    /// Permanent, never reset
    Achievement,
}

impl MissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionKind::Daily => "daily",
            MissionKind::Weekly => "weekly",
            MissionKind::Achievement => "achievement",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Some(MissionKind::Daily),
            "weekly" => Some(MissionKind::Weekly),
            "achievement" | "achievements" => Some(MissionKind::Achievement),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Available,
    Completed,
}

/// Externally derived counters a mission can track
///
/// The mission engine never computes these itself; the caller supplies them
/// through [`crate::missions::Aggregates`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum AggregateSource {
    TotalActivities,
    CurrentStreak,
    OwnedCards,
    OwnedCardsOfRarity(Rarity),
    OwnedCardsInCategory(Category),
    /// Activities in the trailing hour ending at today's latest activity
    ActivitiesWithinLastHour,
    ActiveDaysThisWeek,
    DistinctCategoriesThisWeek,
    OverloadsThisWeek,
    DailyMissionsCompletedThisWeek,
}

/// How a mission turns activity into progress
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionRule {
    /// +1 for each activity in the category
    CategoryMatch { category: Category },
    /// +1 for every activity
    AnyActivity,
    /// +1 when the activity's local hour is in `[start_hour, end_hour)`
    TimeOfDay { start_hour: u32, end_hour: u32 },
    /// +1 when the activity is at least this intense
    IntensityAtLeast { intensity: Intensity },
    /// +points of each activity
    CumulativePoints,
    /// Progress is re-derived from an external count
    AggregateCount { source: AggregateSource },
}

/// A goal with a target, a reward and a reset lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: MissionKind,
    pub category: Option<Category>,
    pub rule: MissionRule,
    pub target_value: u32,
    pub current_progress: u32,
    pub reward_points: u32,
    pub status: MissionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Mission {
    pub fn is_completed(&self) -> bool {
        self.status == MissionStatus::Completed
    }

    /// Fraction of the target reached, in `[0, 1]`
    pub fn progress_fraction(&self) -> f64 {
        if self.target_value == 0 {
            return 0.0;
        }
        (self.current_progress as f64 / self.target_value as f64).min(1.0)
    }
}

// ============================================================================
// Card Types
// ============================================================================

/// Card rarity tier, ordered from most to least common
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 4] = [Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary];

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }
}

/// An entry of the fixed 50-card catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub rarity: Rarity,
}

/// Ownership record for a card the user has obtained at least once
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OwnedCard {
    pub card_id: String,
    pub owned_count: u32,
    pub first_obtained_at: DateTime<Utc>,
}

impl OwnedCard {
    pub fn is_owned(&self) -> bool {
        self.owned_count >= 1
    }
}

// ============================================================================
// User State Types
// ============================================================================

/// Singleton progress record for the user
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct UserProgress {
    pub total_points: u64,
    pub fuel_level: u32,
    pub total_overloads: u32,
    pub last_overload_at: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub total_activities: u32,
    /// Overloads since the last weekly reset
    #[serde(default)]
    pub weekly_overloads: u32,
    /// Daily missions completed since the last weekly reset
    #[serde(default)]
    pub weekly_daily_missions_completed: u32,
}

/// When daily and weekly missions were last reopened
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetAnchor {
    pub last_daily_reset: DateTime<Utc>,
    pub last_weekly_reset: DateTime<Utc>,
}

impl ResetAnchor {
    /// An anchor that has never fired (the Unix epoch); forces both resets
    /// on first evaluation
    pub fn never() -> Self {
        Self {
            last_daily_reset: DateTime::UNIX_EPOCH,
            last_weekly_reset: DateTime::UNIX_EPOCH,
        }
    }
}

impl Default for ResetAnchor {
    fn default() -> Self {
        Self::never()
    }
}

// ============================================================================
// Events and Effects
// ============================================================================

/// Input to [`crate::engine::ProgressionEngine::handle`]
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    ActivityRecorded {
        category: Category,
        intensity: Intensity,
        timestamp: DateTime<Utc>,
    },
    CardDropRequested {
        category: Category,
    },
    MissionCompletionRequested {
        mission_id: String,
    },
}

/// Outcome of handling an event, relayed to UI/notification/audio layers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    MissionCompleted {
        mission_id: String,
        reward_points: u32,
    },
    CardObtained {
        card_id: String,
        is_new: bool,
        bonus_points: u32,
    },
    NoCardObtained,
    OverloadTriggered {
        new_total_overloads: u32,
    },
    LevelUp {
        level: u32,
    },
    StreakUpdated {
        current: u32,
        longest: u32,
    },
}
