//! Mission catalog, progress rules and the reset scheduler.
//!
//! Missions move from `available` to `completed` the instant their progress
//! reaches the target. Daily missions reopen at local midnight, weekly ones on
//! Monday; achievements stay completed forever.
//!
//! Progress comes from two places:
//! - [`MissionEngine::apply_activity`] for rules that react to a single
//!   activity (category, time of day, intensity, points)
//! - [`MissionEngine::apply_aggregates`] for rules whose progress is an
//!   external count supplied by the caller (cards owned, streak, ...)

use crate::types::*;
use crate::Calendar;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Default Catalog
// ============================================================================

struct MissionSeed {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    kind: MissionKind,
    category: Option<Category>,
    rule: MissionRule,
    target: u32,
    reward: u32,
}

const fn category(c: Category) -> MissionRule {
    MissionRule::CategoryMatch { category: c }
}

const fn aggregate(source: AggregateSource) -> MissionRule {
    MissionRule::AggregateCount { source }
}

const MORNING: MissionRule = MissionRule::TimeOfDay {
    start_hour: 0,
    end_hour: 12,
};

const EVENING: MissionRule = MissionRule::TimeOfDay {
    start_hour: 20,
    end_hour: 24,
};

const HIGH_OR_ABOVE: MissionRule = MissionRule::IntensityAtLeast {
    intensity: Intensity::High,
};

#[rustfmt::skip]
const DEFAULT_MISSIONS: &[MissionSeed] = &[
    // Daily
    MissionSeed { id: "daily_morning_spark", title: "Morning Spark", description: "Create 1 spark before 12:00 PM", kind: MissionKind::Daily, category: None, rule: MORNING, target: 1, reward: 50 },
    MissionSeed { id: "daily_decision_maker", title: "Decision Maker", description: "Record 2 Decision-type sparks", kind: MissionKind::Daily, category: Some(Category::Decision), rule: category(Category::Decision), target: 2, reward: 75 },
    MissionSeed { id: "daily_idea_generator", title: "Idea Generator", description: "Create 1 Idea spark", kind: MissionKind::Daily, category: Some(Category::Idea), rule: category(Category::Idea), target: 1, reward: 60 },
    MissionSeed { id: "daily_energy_boost", title: "Energy Boost", description: "Complete 3 Energy sparks", kind: MissionKind::Daily, category: Some(Category::Energy), rule: category(Category::Energy), target: 3, reward: 100 },
    MissionSeed { id: "daily_challenger", title: "Daily Challenger", description: "Take on 1 Challenge", kind: MissionKind::Daily, category: Some(Category::Challenge), rule: category(Category::Challenge), target: 1, reward: 80 },
    MissionSeed { id: "daily_experimenter", title: "Experimenter", description: "Try 1 new Experiment", kind: MissionKind::Daily, category: Some(Category::Experiment), rule: category(Category::Experiment), target: 1, reward: 70 },
    MissionSeed { id: "daily_spark_streak", title: "Spark Streak", description: "Create 5 sparks today", kind: MissionKind::Daily, category: None, rule: MissionRule::AnyActivity, target: 5, reward: 150 },
    MissionSeed { id: "daily_high_intensity", title: "High Intensity", description: "Create 2 High or Extreme intensity sparks", kind: MissionKind::Daily, category: None, rule: HIGH_OR_ABOVE, target: 2, reward: 90 },
    MissionSeed { id: "daily_quick_fire", title: "Quick Fire", description: "Create 3 sparks in 1 hour", kind: MissionKind::Daily, category: None, rule: aggregate(AggregateSource::ActivitiesWithinLastHour), target: 3, reward: 120 },
    MissionSeed { id: "daily_reflection_time", title: "Reflection Time", description: "Create 1 Decision spark", kind: MissionKind::Daily, category: Some(Category::Decision), rule: category(Category::Decision), target: 1, reward: 65 },
    MissionSeed { id: "daily_double_decision", title: "Double Decision", description: "Make 2 important decisions today", kind: MissionKind::Daily, category: Some(Category::Decision), rule: category(Category::Decision), target: 2, reward: 85 },
    MissionSeed { id: "daily_creative_burst", title: "Creative Burst", description: "Generate 3 new ideas", kind: MissionKind::Daily, category: Some(Category::Idea), rule: category(Category::Idea), target: 3, reward: 110 },
    MissionSeed { id: "daily_energy_master", title: "Energy Master", description: "Complete 5 energy-focused activities", kind: MissionKind::Daily, category: Some(Category::Energy), rule: category(Category::Energy), target: 5, reward: 140 },
    MissionSeed { id: "daily_night_owl", title: "Night Owl", description: "Create 1 spark after 8:00 PM", kind: MissionKind::Daily, category: None, rule: EVENING, target: 1, reward: 55 },
    MissionSeed { id: "daily_perfectionist", title: "Perfectionist", description: "Create 1 spark with extreme intensity", kind: MissionKind::Daily, category: None, rule: MissionRule::IntensityAtLeast { intensity: Intensity::Extreme }, target: 1, reward: 95 },
    // Weekly
    MissionSeed { id: "weekly_warrior", title: "Weekly Warrior", description: "Complete 20 sparks this week", kind: MissionKind::Weekly, category: None, rule: MissionRule::AnyActivity, target: 20, reward: 500 },
    MissionSeed { id: "weekly_challenge_master", title: "Challenge Master", description: "Complete 5 Challenge sparks", kind: MissionKind::Weekly, category: Some(Category::Challenge), rule: category(Category::Challenge), target: 5, reward: 400 },
    MissionSeed { id: "weekly_idea_factory", title: "Idea Factory", description: "Generate 10 Idea sparks", kind: MissionKind::Weekly, category: Some(Category::Idea), rule: category(Category::Idea), target: 10, reward: 450 },
    MissionSeed { id: "weekly_energy_dynamo", title: "Energy Dynamo", description: "Complete 15 Energy sparks", kind: MissionKind::Weekly, category: Some(Category::Energy), rule: category(Category::Energy), target: 15, reward: 550 },
    MissionSeed { id: "weekly_consistent_creator", title: "Consistent Creator", description: "Create at least 1 spark every day", kind: MissionKind::Weekly, category: None, rule: aggregate(AggregateSource::ActiveDaysThisWeek), target: 7, reward: 600 },
    MissionSeed { id: "weekly_diversity_champion", title: "Diversity Champion", description: "Use all 5 spark categories", kind: MissionKind::Weekly, category: None, rule: aggregate(AggregateSource::DistinctCategoriesThisWeek), target: 5, reward: 700 },
    MissionSeed { id: "weekly_decision_week", title: "Decision Week", description: "Make 8 Decision sparks", kind: MissionKind::Weekly, category: Some(Category::Decision), rule: category(Category::Decision), target: 8, reward: 480 },
    MissionSeed { id: "weekly_experiment_lab", title: "Experiment Lab", description: "Complete 7 Experiment sparks", kind: MissionKind::Weekly, category: Some(Category::Experiment), rule: category(Category::Experiment), target: 7, reward: 520 },
    MissionSeed { id: "weekly_point_collector", title: "Point Collector", description: "Earn 1000 points this week", kind: MissionKind::Weekly, category: None, rule: MissionRule::CumulativePoints, target: 1000, reward: 800 },
    MissionSeed { id: "weekly_overload_seeker", title: "Overload Seeker", description: "Trigger 1 Overload mode", kind: MissionKind::Weekly, category: None, rule: aggregate(AggregateSource::OverloadsThisWeek), target: 1, reward: 1000 },
    MissionSeed { id: "weekly_reflection_master", title: "Reflection Master", description: "Complete 6 Challenge sparks", kind: MissionKind::Weekly, category: Some(Category::Challenge), rule: category(Category::Challenge), target: 6, reward: 420 },
    MissionSeed { id: "weekly_power_week", title: "Power Week", description: "Create 30 sparks in one week", kind: MissionKind::Weekly, category: None, rule: MissionRule::AnyActivity, target: 30, reward: 750 },
    MissionSeed { id: "weekly_intensity_champion", title: "Intensity Champion", description: "Create 10 high/extreme intensity sparks", kind: MissionKind::Weekly, category: None, rule: HIGH_OR_ABOVE, target: 10, reward: 650 },
    MissionSeed { id: "weekly_morning_person", title: "Morning Person", description: "Create 5 morning sparks (before noon)", kind: MissionKind::Weekly, category: None, rule: MORNING, target: 5, reward: 380 },
    MissionSeed { id: "weekly_grand_achiever", title: "Grand Achiever", description: "Complete 5 daily missions this week", kind: MissionKind::Weekly, category: None, rule: aggregate(AggregateSource::DailyMissionsCompletedThisWeek), target: 5, reward: 850 },
    // Achievements
    MissionSeed { id: "achievement_first_card", title: "First Card", description: "Collect your first Spark Card", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCards), target: 1, reward: 100 },
    MissionSeed { id: "achievement_rare_collector", title: "Rare Collector", description: "Collect 5 Rare cards", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCardsOfRarity(Rarity::Rare)), target: 5, reward: 300 },
    MissionSeed { id: "achievement_epic_hunter", title: "Epic Hunter", description: "Obtain 1 Epic card", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCardsOfRarity(Rarity::Epic)), target: 1, reward: 500 },
    MissionSeed { id: "achievement_legendary_status", title: "Legendary Status", description: "Obtain your first Legendary card", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCardsOfRarity(Rarity::Legendary)), target: 1, reward: 1000 },
    MissionSeed { id: "achievement_master_decision", title: "Master of Decision", description: "Complete the Decision category (10 cards)", kind: MissionKind::Achievement, category: Some(Category::Decision), rule: aggregate(AggregateSource::OwnedCardsInCategory(Category::Decision)), target: 10, reward: 750 },
    MissionSeed { id: "achievement_master_energy", title: "Master of Energy", description: "Complete the Energy category (10 cards)", kind: MissionKind::Achievement, category: Some(Category::Energy), rule: aggregate(AggregateSource::OwnedCardsInCategory(Category::Energy)), target: 10, reward: 750 },
    MissionSeed { id: "achievement_master_ideas", title: "Master of Ideas", description: "Complete the Idea category (10 cards)", kind: MissionKind::Achievement, category: Some(Category::Idea), rule: aggregate(AggregateSource::OwnedCardsInCategory(Category::Idea)), target: 10, reward: 750 },
    MissionSeed { id: "achievement_master_experiments", title: "Master of Experiments", description: "Complete the Experiment category (10 cards)", kind: MissionKind::Achievement, category: Some(Category::Experiment), rule: aggregate(AggregateSource::OwnedCardsInCategory(Category::Experiment)), target: 10, reward: 750 },
    MissionSeed { id: "achievement_master_challenges", title: "Master of Challenges", description: "Complete the Challenge category (10 cards)", kind: MissionKind::Achievement, category: Some(Category::Challenge), rule: aggregate(AggregateSource::OwnedCardsInCategory(Category::Challenge)), target: 10, reward: 750 },
    MissionSeed { id: "achievement_legendary_collector", title: "Legendary Collector", description: "Collect 3 Legendary cards", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCardsOfRarity(Rarity::Legendary)), target: 3, reward: 2000 },
    MissionSeed { id: "achievement_completionist", title: "Completionist", description: "Collect all 50 Spark Cards", kind: MissionKind::Achievement, category: None, rule: aggregate(AggregateSource::OwnedCards), target: 50, reward: 5000 },
];

/// Cached default mission catalog
static DEFAULT_CATALOG: Lazy<Vec<Mission>> = Lazy::new(build_default_missions);

/// Get a reference to the cached default mission catalog
pub fn default_missions() -> &'static [Mission] {
    &DEFAULT_CATALOG
}

/// Builds the fixed mission catalog, every mission available with no progress
pub fn build_default_missions() -> Vec<Mission> {
    DEFAULT_MISSIONS
        .iter()
        .map(|seed| Mission {
            id: seed.id.into(),
            title: seed.title.into(),
            description: seed.description.into(),
            kind: seed.kind,
            category: seed.category,
            rule: seed.rule.clone(),
            target_value: seed.target,
            current_progress: 0,
            reward_points: seed.reward,
            status: MissionStatus::Available,
            expires_at: None,
            completed_at: None,
        })
        .collect()
}

/// Check the per-mission invariants
///
/// Returns a list of violations (empty if all missions are consistent).
pub fn validate_missions(missions: &[Mission]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for mission in missions {
        if !seen.insert(mission.id.as_str()) {
            errors.push(format!("Duplicate mission id '{}'", mission.id));
        }
        if mission.target_value == 0 {
            errors.push(format!("Mission '{}': target is 0", mission.id));
        }
        if mission.current_progress > mission.target_value {
            errors.push(format!(
                "Mission '{}': progress {} > target {}",
                mission.id, mission.current_progress, mission.target_value
            ));
        }
        if mission.is_completed() != mission.completed_at.is_some() {
            errors.push(format!(
                "Mission '{}': status {:?} disagrees with completed_at",
                mission.id, mission.status
            ));
        }
        if let MissionRule::TimeOfDay {
            start_hour,
            end_hour,
        } = mission.rule
        {
            if start_hour >= end_hour || end_hour > 24 {
                errors.push(format!(
                    "Mission '{}': invalid hour window {}..{}",
                    mission.id, start_hour, end_hour
                ));
            }
        }
    }

    errors
}

// ============================================================================
// Progress
// ============================================================================

/// A change to one mission's progress
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissionUpdate {
    pub mission_id: String,
    pub kind: MissionKind,
    pub previous_progress: u32,
    pub new_progress: u32,
    pub completed: bool,
    pub reward_points: u32,
}

/// Counts supplied by the caller for [`MissionRule::AggregateCount`] missions
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregates {
    pub total_activities: u32,
    pub current_streak: u32,
    pub owned_cards: u32,
    pub owned_by_rarity: HashMap<Rarity, u32>,
    pub owned_by_category: HashMap<Category, u32>,
    pub activities_within_last_hour: u32,
    pub active_days_this_week: u32,
    pub distinct_categories_this_week: u32,
    pub overloads_this_week: u32,
    pub daily_missions_completed_this_week: u32,
}

impl Aggregates {
    pub fn get(&self, source: AggregateSource) -> u32 {
        match source {
            AggregateSource::TotalActivities => self.total_activities,
            AggregateSource::CurrentStreak => self.current_streak,
            AggregateSource::OwnedCards => self.owned_cards,
            AggregateSource::OwnedCardsOfRarity(r) => {
                self.owned_by_rarity.get(&r).copied().unwrap_or(0)
            }
            AggregateSource::OwnedCardsInCategory(c) => {
                self.owned_by_category.get(&c).copied().unwrap_or(0)
            }
            AggregateSource::ActivitiesWithinLastHour => self.activities_within_last_hour,
            AggregateSource::ActiveDaysThisWeek => self.active_days_this_week,
            AggregateSource::DistinctCategoriesThisWeek => self.distinct_categories_this_week,
            AggregateSource::OverloadsThisWeek => self.overloads_this_week,
            AggregateSource::DailyMissionsCompletedThisWeek => {
                self.daily_missions_completed_this_week
            }
        }
    }
}

/// Outcome of a reset evaluation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetOutcome {
    pub anchor: ResetAnchor,
    pub daily_reset: bool,
    pub weekly_reset: bool,
}

impl ResetOutcome {
    pub fn any(&self) -> bool {
        self.daily_reset || self.weekly_reset
    }
}

/// Applies progress rules and resets to missions
#[derive(Clone, Copy, Debug, Default)]
pub struct MissionEngine {
    calendar: Calendar,
}

impl MissionEngine {
    pub fn new(calendar: Calendar) -> Self {
        Self { calendar }
    }

    /// Advance missions that react to a single activity
    ///
    /// Completed missions and aggregate-driven missions are left untouched.
    /// Daily and weekly missions only count an activity timestamped in the
    /// current day or week.
    pub fn apply_activity(
        &self,
        event: &ActivityEvent,
        missions: &mut [Mission],
        now: DateTime<Utc>,
    ) -> Vec<MissionUpdate> {
        let mut updates = Vec::new();
        let same_day = self.calendar.same_day(event.timestamp, now);
        let same_week = self.calendar.in_week_of(event.timestamp, now);

        for mission in missions.iter_mut().filter(|m| !m.is_completed()) {
            let in_period = match mission.kind {
                MissionKind::Daily => same_day,
                MissionKind::Weekly => same_week,
                MissionKind::Achievement => true,
            };
            if !in_period {
                continue;
            }

            let increment = match mission.rule {
                MissionRule::CategoryMatch { category } => (event.category == category) as u32,
                MissionRule::AnyActivity => 1,
                MissionRule::TimeOfDay {
                    start_hour,
                    end_hour,
                } => {
                    let hour = self.calendar.hour_of(event.timestamp);
                    (start_hour <= hour && hour < end_hour) as u32
                }
                MissionRule::IntensityAtLeast { intensity } => {
                    (event.intensity >= intensity) as u32
                }
                MissionRule::CumulativePoints => event.points,
                MissionRule::AggregateCount { .. } => 0,
            };

            if increment == 0 {
                continue;
            }

            let target = mission.current_progress.saturating_add(increment);
            if let Some(update) = set_progress(mission, target, now) {
                updates.push(update);
            }
        }

        updates
    }

    /// Re-derive progress of aggregate-driven missions from caller counts
    pub fn apply_aggregates(
        &self,
        aggregates: &Aggregates,
        missions: &mut [Mission],
        now: DateTime<Utc>,
    ) -> Vec<MissionUpdate> {
        let mut updates = Vec::new();

        for mission in missions.iter_mut().filter(|m| !m.is_completed()) {
            if let MissionRule::AggregateCount { source } = mission.rule {
                if let Some(update) = set_progress(mission, aggregates.get(source), now) {
                    updates.push(update);
                }
            }
        }

        updates
    }

    /// Complete a mission on request, filling its progress
    ///
    /// Returns `None` when the mission was already completed.
    pub fn complete_mission(&self, mission: &mut Mission, now: DateTime<Utc>) -> Option<MissionUpdate> {
        if mission.is_completed() {
            tracing::debug!("Mission {} already completed, ignoring", mission.id);
            return None;
        }
        set_progress(mission, mission.target_value, now)
    }

    /// Reopen daily/weekly missions whose period has rolled over
    ///
    /// Daily missions reset when the anchor's local day is before today;
    /// weekly ones when it precedes this week's Monday. An anchor in the
    /// future never fires and is never moved backwards.
    pub fn evaluate_resets(
        &self,
        anchor: ResetAnchor,
        missions: &mut [Mission],
        now: DateTime<Utc>,
    ) -> ResetOutcome {
        let today = self.calendar.day_of(now);
        let mut next = anchor;

        let daily_reset = self.calendar.day_of(anchor.last_daily_reset) < today;
        if daily_reset {
            let count = reset_kind(missions, MissionKind::Daily);
            next.last_daily_reset = now;
            tracing::info!("Daily missions reset ({} reopened)", count);
        }

        let weekly_reset =
            self.calendar.day_of(anchor.last_weekly_reset) < Calendar::week_start(today);
        if weekly_reset {
            let count = reset_kind(missions, MissionKind::Weekly);
            next.last_weekly_reset = now;
            tracing::info!("Weekly missions reset ({} reopened)", count);
        }

        ResetOutcome {
            anchor: next,
            daily_reset,
            weekly_reset,
        }
    }
}

/// Set capped progress and complete on reaching the target
fn set_progress(mission: &mut Mission, progress: u32, now: DateTime<Utc>) -> Option<MissionUpdate> {
    let capped = progress.min(mission.target_value);
    if capped == mission.current_progress && capped < mission.target_value {
        return None;
    }

    let previous = mission.current_progress;
    mission.current_progress = capped;

    let completed = capped == mission.target_value;
    if completed {
        mission.status = MissionStatus::Completed;
        mission.completed_at = Some(now);
        tracing::info!(
            "Mission completed: {} (+{} points)",
            mission.title,
            mission.reward_points
        );
    }

    Some(MissionUpdate {
        mission_id: mission.id.clone(),
        kind: mission.kind,
        previous_progress: previous,
        new_progress: capped,
        completed,
        reward_points: if completed { mission.reward_points } else { 0 },
    })
}

fn reset_kind(missions: &mut [Mission], kind: MissionKind) -> usize {
    let mut count = 0;
    for mission in missions.iter_mut().filter(|m| m.kind == kind) {
        mission.current_progress = 0;
        mission.status = MissionStatus::Available;
        mission.completed_at = None;
        count += 1;
    }
    count
}
