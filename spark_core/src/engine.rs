//! Progression engine: turns domain events into persisted state and effects.
//!
//! Each call to [`ProgressionEngine::handle`]:
//! 1. Seeds the mission and card catalogs if the store has none
//! 2. Re-reads a snapshot of the store
//! 3. Runs the reset scheduler
//! 4. Applies the event in memory (points, missions, card drop, streak,
//!    aggregate missions)
//! 5. Hands the changed records to [`Store::commit`] as one change set
//!
//! A write failure surfaces as `Err` and no effects are returned.

use crate::cards::{default_card_catalog, drop_card, validate_catalog, DuplicateBonus};
use crate::config::Config;
use crate::ledger::{RewardLedger, OVERLOAD_THRESHOLD};
use crate::level::{Level, LevelProgress};
use crate::missions::{
    default_missions, validate_missions, Aggregates, MissionEngine, MissionUpdate, ResetOutcome,
};
use crate::streak::{activity_days, compute_streak, Streak, DEFAULT_LOOKBACK_DAYS};
use crate::{
    ActivityEvent, Calendar, CardDefinition, Category, Changes, Clock, DomainEvent, Effect, Error,
    Intensity, Mission, MissionKind, OwnedCard, RandomSource, ResetAnchor, Result, Store,
    UserProgress,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Upper bound on aggregate re-derivation rounds per event
const MAX_AGGREGATE_PASSES: usize = 8;

/// Tunables the engine is constructed with
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub calendar: Calendar,
    pub overload_threshold: u32,
    pub duplicate_bonus: DuplicateBonus,
    pub lookback_days: u32,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            calendar: config.calendar(),
            overload_threshold: config.rewards.overload_threshold,
            duplicate_bonus: config.rewards.duplicate_bonus.clone(),
            lookback_days: config.streak.lookback_days,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            calendar: Calendar::utc(),
            overload_threshold: OVERLOAD_THRESHOLD,
            duplicate_bonus: DuplicateBonus::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Read-only summary for display
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub progress: UserProgress,
    pub level: LevelProgress,
    pub fuel_fraction: f64,
    pub overload_threshold: u32,
    pub streak: Streak,
    pub owned_cards: usize,
    pub catalog_size: usize,
    pub missions_completed: usize,
    pub missions_total: usize,
}

/// Everything an event needs, read from the store up front
struct Snapshot {
    missions: Vec<Mission>,
    catalog: Vec<CardDefinition>,
    owned: Vec<OwnedCard>,
    progress: UserProgress,
    anchor: Option<ResetAnchor>,
    activities: Vec<ActivityEvent>,
}

/// Effects and pending writes accumulated while applying one event
#[derive(Default)]
struct Pass {
    completed: Vec<Effect>,
    card: Option<Effect>,
    overloads: Vec<Effect>,
    streak: Option<Effect>,
    anchor: Option<ResetAnchor>,
    missions_dirty: bool,
    owned_changed: Vec<OwnedCard>,
    activity: Option<ActivityEvent>,
}

impl Pass {
    fn into_effects(self, level_up: Option<Level>) -> Vec<Effect> {
        let mut effects = self.completed;
        effects.extend(self.card);
        effects.extend(self.overloads);
        if let Some(level) = level_up {
            effects.push(Effect::LevelUp {
                level: level.number(),
            });
        }
        effects.extend(self.streak);
        effects
    }
}

/// Orchestrates missions, card drops, the ledger and streaks over a store
pub struct ProgressionEngine<S, C, R> {
    store: S,
    clock: C,
    random: R,
    settings: EngineSettings,
    missions: MissionEngine,
    ledger: RewardLedger,
}

impl<S: Store, C: Clock, R: RandomSource> ProgressionEngine<S, C, R> {
    pub fn new(store: S, clock: C, random: R, settings: EngineSettings) -> Self {
        Self {
            missions: MissionEngine::new(settings.calendar),
            ledger: RewardLedger::new(settings.overload_threshold),
            store,
            clock,
            random,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Current time according to the engine's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Finish any interrupted commit, then write the default catalogs if the
    /// store holds none
    ///
    /// Stored missions that break their own invariants are rejected rather
    /// than progressed further.
    pub fn ensure_seeded(&mut self) -> Result<()> {
        self.store.recover()?;

        let stored = self.store.missions()?;
        if stored.is_empty() {
            let missions = default_missions();
            self.store.save_missions(missions)?;
            tracing::info!("Seeded {} missions", missions.len());
        } else {
            let problems = validate_missions(&stored);
            if !problems.is_empty() {
                return Err(Error::CatalogValidation(problems.join("; ")));
            }
        }

        let catalog = self.store.catalog()?;
        if catalog.is_empty() {
            let cards = default_card_catalog();
            self.store.save_catalog(cards)?;
            tracing::info!("Seeded {} cards", cards.len());
        } else {
            for problem in validate_catalog(&catalog) {
                tracing::warn!("Card catalog: {}", problem);
            }
        }

        Ok(())
    }

    /// Apply one domain event and return its effects in display order
    pub fn handle(&mut self, event: DomainEvent) -> Result<Vec<Effect>> {
        let now = self.clock.now();
        self.ensure_seeded()?;

        let mut snapshot = self.load_snapshot()?;
        let mut pass = Pass::default();
        self.run_resets(&mut snapshot, &mut pass, now);

        let points_before = snapshot.progress.total_points;

        match event {
            DomainEvent::ActivityRecorded {
                category,
                intensity,
                timestamp,
            } => self.record_activity(&mut snapshot, &mut pass, category, intensity, timestamp, now),
            DomainEvent::CardDropRequested { category } => {
                self.resolve_drop(&mut snapshot, &mut pass, category, now);
                self.settle_aggregates(&mut snapshot, &mut pass, now);
            }
            DomainEvent::MissionCompletionRequested { mission_id } => {
                self.complete_requested(&mut snapshot, &mut pass, &mission_id, now)?
            }
        }

        let level_before = Level::for_points(points_before);
        let level_after = Level::for_points(snapshot.progress.total_points);
        let level_up = (level_after > level_before).then_some(level_after);
        if let Some(level) = level_up {
            tracing::info!("Level up: {} ({})", level.number(), level.title());
        }

        self.commit(&snapshot, &pass)?;
        Ok(pass.into_effects(level_up))
    }

    /// Run the reset scheduler alone and persist its outcome
    pub fn tick(&mut self) -> Result<ResetOutcome> {
        let now = self.clock.now();
        self.ensure_seeded()?;

        let mut snapshot = self.load_snapshot()?;
        let mut pass = Pass::default();
        let outcome = self.run_resets(&mut snapshot, &mut pass, now);

        self.commit(&snapshot, &pass)?;
        Ok(outcome)
    }

    /// Current progress, level, streak and collection counts
    pub fn status(&self) -> Result<StatusReport> {
        let now = self.clock.now();
        let progress = self.store.user_progress()?;
        let missions = self.store.missions()?;
        let catalog = self.store.catalog()?;
        let owned = self.store.owned_cards()?;
        let activities = self.store.activities()?;

        let calendar = &self.settings.calendar;
        let days = activity_days(&activities, calendar);
        let streak = compute_streak(&days, calendar.day_of(now), self.settings.lookback_days);

        Ok(StatusReport {
            level: LevelProgress::for_points(progress.total_points),
            fuel_fraction: self.ledger.fuel_fraction(&progress),
            overload_threshold: self.ledger.threshold(),
            streak,
            owned_cards: owned.iter().filter(|o| o.is_owned()).count(),
            catalog_size: catalog.len(),
            missions_completed: missions.iter().filter(|m| m.is_completed()).count(),
            missions_total: missions.len(),
            progress,
        })
    }

    fn load_snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            missions: self.store.missions()?,
            catalog: self.store.catalog()?,
            owned: self.store.owned_cards()?,
            progress: self.store.user_progress()?,
            anchor: self.store.reset_anchor()?,
            activities: self.store.activities()?,
        })
    }

    fn run_resets(&self, snapshot: &mut Snapshot, pass: &mut Pass, now: DateTime<Utc>) -> ResetOutcome {
        let anchor = snapshot.anchor.unwrap_or_else(ResetAnchor::never);
        let outcome = self
            .missions
            .evaluate_resets(anchor, &mut snapshot.missions, now);

        if outcome.weekly_reset {
            snapshot.progress.weekly_overloads = 0;
            snapshot.progress.weekly_daily_missions_completed = 0;
        }
        if outcome.any() || snapshot.anchor.is_none() {
            pass.anchor = Some(outcome.anchor);
            pass.missions_dirty = true;
        }
        snapshot.anchor = Some(outcome.anchor);

        outcome
    }

    fn record_activity(
        &mut self,
        snapshot: &mut Snapshot,
        pass: &mut Pass,
        category: Category,
        intensity: Intensity,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let event = ActivityEvent::new(category, intensity, timestamp);
        tracing::info!(
            "Recording {} {} activity (+{} points)",
            intensity.as_str(),
            category.as_str(),
            event.points
        );

        snapshot.progress.total_activities += 1;
        self.award(&mut snapshot.progress, pass, event.points, now);

        let updates = self
            .missions
            .apply_activity(&event, &mut snapshot.missions, now);
        self.settle(updates, snapshot, pass, now);

        snapshot.activities.push(event.clone());
        pass.activity = Some(event);

        self.resolve_drop(snapshot, pass, category, now);

        let calendar = &self.settings.calendar;
        let days = activity_days(&snapshot.activities, calendar);
        let streak = compute_streak(&days, calendar.day_of(now), self.settings.lookback_days);
        snapshot.progress.current_streak = streak.current;
        snapshot.progress.longest_streak = snapshot.progress.longest_streak.max(streak.longest);
        pass.streak = Some(Effect::StreakUpdated {
            current: snapshot.progress.current_streak,
            longest: snapshot.progress.longest_streak,
        });

        self.settle_aggregates(snapshot, pass, now);
    }

    fn resolve_drop(&mut self, snapshot: &mut Snapshot, pass: &mut Pass, category: Category, now: DateTime<Utc>) {
        let result = drop_card(
            category,
            &snapshot.owned,
            &snapshot.catalog,
            &mut self.random,
            &self.settings.duplicate_bonus,
        );

        let Some(card) = result.card else {
            tracing::warn!(
                "No {} cards in the {} pool, catalog may be incomplete",
                result.rarity.as_str(),
                category.as_str()
            );
            pass.card = Some(Effect::NoCardObtained);
            return;
        };

        let owned = match snapshot.owned.iter_mut().find(|o| o.card_id == card.id) {
            Some(existing) => {
                existing.owned_count += 1;
                existing.clone()
            }
            None => {
                let record = OwnedCard {
                    card_id: card.id.clone(),
                    owned_count: 1,
                    first_obtained_at: now,
                };
                snapshot.owned.push(record.clone());
                record
            }
        };
        pass.owned_changed.retain(|o| o.card_id != owned.card_id);
        pass.owned_changed.push(owned);

        if result.duplicate_bonus_points > 0 {
            self.award(&mut snapshot.progress, pass, result.duplicate_bonus_points, now);
        }

        tracing::info!(
            "Card {}: {} ({})",
            if result.is_new_card { "obtained" } else { "duplicate" },
            card.name,
            card.rarity.as_str()
        );

        pass.card = Some(Effect::CardObtained {
            card_id: card.id,
            is_new: result.is_new_card,
            bonus_points: result.duplicate_bonus_points,
        });
    }

    fn complete_requested(
        &mut self,
        snapshot: &mut Snapshot,
        pass: &mut Pass,
        mission_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mission = snapshot
            .missions
            .iter_mut()
            .find(|m| m.id == mission_id)
            .ok_or_else(|| Error::UnknownMission(mission_id.to_string()))?;

        let update = self.missions.complete_mission(mission, now);
        self.settle(update.into_iter().collect(), snapshot, pass, now);
        self.settle_aggregates(snapshot, pass, now);
        Ok(())
    }

    /// Re-derive aggregate missions until no further progress is made
    fn settle_aggregates(&mut self, snapshot: &mut Snapshot, pass: &mut Pass, now: DateTime<Utc>) {
        for _ in 0..MAX_AGGREGATE_PASSES {
            let aggregates = self.aggregates(snapshot, now);
            let updates = self
                .missions
                .apply_aggregates(&aggregates, &mut snapshot.missions, now);
            if updates.is_empty() {
                return;
            }
            self.settle(updates, snapshot, pass, now);
        }
        tracing::debug!("Aggregate missions still moving after {} passes", MAX_AGGREGATE_PASSES);
    }

    /// Pay out completed missions and record the changes
    fn settle(&mut self, updates: Vec<MissionUpdate>, snapshot: &mut Snapshot, pass: &mut Pass, now: DateTime<Utc>) {
        if updates.is_empty() {
            return;
        }
        pass.missions_dirty = true;

        for update in updates.into_iter().filter(|u| u.completed) {
            if update.kind == MissionKind::Daily {
                snapshot.progress.weekly_daily_missions_completed += 1;
            }
            self.award(&mut snapshot.progress, pass, update.reward_points, now);
            pass.completed.push(Effect::MissionCompleted {
                mission_id: update.mission_id,
                reward_points: update.reward_points,
            });
        }
    }

    fn award(&self, progress: &mut UserProgress, pass: &mut Pass, points: u32, now: DateTime<Utc>) {
        let effect = self.ledger.award(progress, points, now);
        if effect.overload_triggered {
            pass.overloads.push(Effect::OverloadTriggered {
                new_total_overloads: progress.total_overloads,
            });
        }
    }

    fn aggregates(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Aggregates {
        let calendar = &self.settings.calendar;
        let definitions: HashMap<&str, &CardDefinition> = snapshot
            .catalog
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();

        let mut aggregates = Aggregates {
            total_activities: snapshot.activities.len() as u32,
            current_streak: snapshot.progress.current_streak,
            overloads_this_week: snapshot.progress.weekly_overloads,
            daily_missions_completed_this_week: snapshot.progress.weekly_daily_missions_completed,
            ..Default::default()
        };

        for owned in snapshot.owned.iter().filter(|o| o.is_owned()) {
            aggregates.owned_cards += 1;
            if let Some(card) = definitions.get(owned.card_id.as_str()) {
                *aggregates.owned_by_rarity.entry(card.rarity).or_insert(0) += 1;
                *aggregates.owned_by_category.entry(card.category).or_insert(0) += 1;
            }
        }

        let this_week: Vec<&ActivityEvent> = snapshot
            .activities
            .iter()
            .filter(|a| calendar.in_week_of(a.timestamp, now))
            .collect();
        aggregates.active_days_this_week = this_week
            .iter()
            .map(|a| calendar.day_of(a.timestamp))
            .collect::<HashSet<_>>()
            .len() as u32;
        aggregates.distinct_categories_this_week = this_week
            .iter()
            .map(|a| a.category)
            .collect::<HashSet<_>>()
            .len() as u32;

        let today: Vec<DateTime<Utc>> = snapshot
            .activities
            .iter()
            .map(|a| a.timestamp)
            .filter(|ts| calendar.same_day(*ts, now))
            .collect();
        if let Some(latest) = today.iter().max() {
            let window_start = *latest - Duration::hours(1);
            aggregates.activities_within_last_hour =
                today.iter().filter(|ts| **ts > window_start).count() as u32;
        }

        aggregates
    }

    fn commit(&mut self, snapshot: &Snapshot, pass: &Pass) -> Result<()> {
        let changes = Changes {
            missions: if pass.missions_dirty {
                snapshot.missions.clone()
            } else {
                Vec::new()
            },
            owned_cards: pass.owned_changed.clone(),
            progress: Some(snapshot.progress.clone()),
            anchor: pass.anchor,
            activity: pass.activity.clone(),
        };
        self.store.commit(&changes)
    }
}
