//! Igniter levels derived from lifetime points.
//!
//! Every 1000 points is a level, from Novice Igniter (1) to Mythical Flame
//! (10).

/// Points per level step
pub const POINTS_PER_LEVEL: u64 = 1000;

pub const MAX_LEVEL: u32 = 10;

const TITLES: [&str; MAX_LEVEL as usize] = [
    "Novice Igniter",
    "Apprentice Igniter",
    "Practitioner Igniter",
    "Adept Igniter",
    "Expert Igniter",
    "Master Igniter",
    "Grand Master",
    "Legendary Igniter",
    "Titan of Ignition",
    "Mythical Flame",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Level(u32);

impl Level {
    pub fn for_points(total_points: u64) -> Self {
        let level = (total_points / POINTS_PER_LEVEL).clamp(1, MAX_LEVEL as u64);
        Level(level as u32)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn title(self) -> &'static str {
        TITLES[(self.0 - 1) as usize]
    }

    pub fn next(self) -> Option<Level> {
        (self.0 < MAX_LEVEL).then(|| Level(self.0 + 1))
    }

    /// Points at which this level is reached
    pub fn required_points(self) -> u64 {
        self.0 as u64 * POINTS_PER_LEVEL
    }
}

/// Where the user stands relative to the next level
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelProgress {
    pub current: Level,
    pub next: Option<Level>,
    pub points_needed: u64,
}

impl LevelProgress {
    pub fn for_points(total_points: u64) -> Self {
        let current = Level::for_points(total_points);
        let next = current.next();
        let target = next
            .map(Level::required_points)
            .unwrap_or(current.required_points() + POINTS_PER_LEVEL);

        Self {
            current,
            next,
            points_needed: target.saturating_sub(total_points),
        }
    }
}
