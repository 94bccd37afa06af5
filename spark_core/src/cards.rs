//! Spark card catalog and weighted card drops.
//!
//! The catalog is fixed: five categories, each with five common, three rare,
//! one epic and one legendary card. Drops are resolved in two draws: one
//! picks the rarity tier from a cumulative distribution, the other picks a
//! card uniformly among the catalog entries of that category and tier.

use crate::types::*;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of cards in a complete catalog
pub const CATALOG_SIZE: usize = 50;

/// Cumulative upper bounds of the rarity distribution (60/30/8/2)
pub const RARITY_THRESHOLDS: [(f64, Rarity); 3] = [
    (0.60, Rarity::Common),
    (0.90, Rarity::Rare),
    (0.98, Rarity::Epic),
];

/// Cards per rarity tier in each category
const TIER_SIZES: [(Rarity, usize); 4] = [
    (Rarity::Common, 5),
    (Rarity::Rare, 3),
    (Rarity::Epic, 1),
    (Rarity::Legendary, 1),
];

/// Card names per category, ordered common → legendary
const CARD_NAMES: [(Category, [&str; 10]); 5] = [
    (
        Category::Decision,
        [
            "balance", "choice", "compass", "crossroads", "pathfinder", "chessmaster", "oracle",
            "timeline", "mindpalace", "destinyweaver",
        ],
    ),
    (
        Category::Energy,
        [
            "bolt", "flame", "pulse", "spark", "surge", "blaze", "inferno", "thunder", "phoenix",
            "supernova",
        ],
    ),
    (
        Category::Idea,
        [
            "blueprint", "brain", "gear", "lightbulb", "sketch", "eureka", "innovation", "vision",
            "architect", "prometheus",
        ],
    ),
    (
        Category::Experiment,
        [
            "beaker", "flask", "labcoat", "microscope", "testtube", "catalyst", "formula",
            "mutation", "alchemist", "madscientist",
        ],
    ),
    (
        Category::Challenge,
        [
            "gauntlet", "mountain", "shield", "sword", "target", "arena", "champion", "dragon",
            "titan", "immortal",
        ],
    ),
];

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CARDS: Lazy<Vec<CardDefinition>> = Lazy::new(build_default_card_catalog);

/// Get a reference to the cached default card catalog
pub fn default_card_catalog() -> &'static [CardDefinition] {
    &DEFAULT_CARDS
}

/// Builds the 50-card catalog
pub fn build_default_card_catalog() -> Vec<CardDefinition> {
    let mut cards = Vec::with_capacity(CATALOG_SIZE);

    for (category, names) in CARD_NAMES {
        let mut names = names.iter();
        for (rarity, count) in TIER_SIZES {
            for name in names.by_ref().take(count) {
                cards.push(CardDefinition {
                    id: format!("{}_{}", category.as_str(), name),
                    name: capitalize(name),
                    category,
                    rarity,
                });
            }
        }
    }

    cards
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Validate a catalog's shape
///
/// Returns a list of validation errors (empty if valid).
pub fn validate_catalog(cards: &[CardDefinition]) -> Vec<String> {
    let mut errors = Vec::new();

    if cards.len() != CATALOG_SIZE {
        errors.push(format!(
            "Catalog has {} cards, expected {}",
            cards.len(),
            CATALOG_SIZE
        ));
    }

    let mut seen = HashSet::new();
    for card in cards {
        if !seen.insert(card.id.as_str()) {
            errors.push(format!("Duplicate card id '{}'", card.id));
        }
    }

    for category in Category::ALL {
        for (rarity, expected) in TIER_SIZES {
            let count = cards
                .iter()
                .filter(|c| c.category == category && c.rarity == rarity)
                .count();
            if count != expected {
                errors.push(format!(
                    "Category '{}' has {} {} cards, expected {}",
                    category.as_str(),
                    count,
                    rarity.as_str(),
                    expected
                ));
            }
        }
    }

    errors
}

/// Map a uniform draw in `[0, 1)` onto a rarity tier
pub fn resolve_rarity(draw: f64) -> Rarity {
    RARITY_THRESHOLDS
        .iter()
        .find(|(bound, _)| draw < *bound)
        .map(|(_, rarity)| *rarity)
        .unwrap_or(Rarity::Legendary)
}

/// Bonus points granted when a dropped card is already owned
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateBonus {
    #[serde(default = "default_common_bonus")]
    pub common: u32,
    #[serde(default = "default_rare_bonus")]
    pub rare: u32,
    #[serde(default = "default_epic_bonus")]
    pub epic: u32,
    #[serde(default = "default_legendary_bonus")]
    pub legendary: u32,
}

fn default_common_bonus() -> u32 {
    10
}

fn default_rare_bonus() -> u32 {
    25
}

fn default_epic_bonus() -> u32 {
    50
}

fn default_legendary_bonus() -> u32 {
    100
}

impl Default for DuplicateBonus {
    fn default() -> Self {
        Self {
            common: default_common_bonus(),
            rare: default_rare_bonus(),
            epic: default_epic_bonus(),
            legendary: default_legendary_bonus(),
        }
    }
}

impl DuplicateBonus {
    pub fn for_rarity(&self, rarity: Rarity) -> u32 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }

    /// Bonuses must not decrease as rarity increases
    pub fn is_monotonic(&self) -> bool {
        self.common <= self.rare && self.rare <= self.epic && self.epic <= self.legendary
    }
}

/// Outcome of a single drop
#[derive(Clone, Debug, PartialEq)]
pub struct DropResult {
    pub card: Option<CardDefinition>,
    pub rarity: Rarity,
    pub is_new_card: bool,
    pub duplicate_bonus_points: u32,
}

impl DropResult {
    fn empty(rarity: Rarity) -> Self {
        Self {
            card: None,
            rarity,
            is_new_card: false,
            duplicate_bonus_points: 0,
        }
    }
}

/// Resolve a card drop for a category
///
/// Does not touch ownership: the caller records the drop. An empty pool for
/// the resolved tier yields a result with no card.
pub fn drop_card<R: crate::RandomSource + ?Sized>(
    category: Category,
    owned: &[OwnedCard],
    catalog: &[CardDefinition],
    random: &mut R,
    bonus: &DuplicateBonus,
) -> DropResult {
    let rarity = resolve_rarity(random.next_f64());

    let mut candidates: Vec<&CardDefinition> = catalog
        .iter()
        .filter(|c| c.category == category && c.rarity == rarity)
        .collect();

    if candidates.is_empty() {
        return DropResult::empty(rarity);
    }

    // Sort for deterministic selection
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    let index = ((random.next_f64() * candidates.len() as f64) as usize).min(candidates.len() - 1);
    let card = candidates[index].clone();

    let already_owned = owned
        .iter()
        .any(|o| o.card_id == card.id && o.is_owned());

    tracing::debug!(
        "Dropped {} ({:?}) for {:?}, duplicate: {}",
        card.id,
        rarity,
        category,
        already_owned
    );

    DropResult {
        is_new_card: !already_owned,
        duplicate_bonus_points: if already_owned {
            bonus.for_rarity(rarity)
        } else {
            0
        },
        card: Some(card),
        rarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedRandom, SeededRandom};
    use chrono::Utc;
    use std::collections::HashMap;

    fn owned(card_id: &str) -> OwnedCard {
        OwnedCard {
            card_id: card_id.into(),
            owned_count: 1,
            first_obtained_at: Utc::now(),
        }
    }

    #[test]
    fn test_catalog_loads() {
        let catalog = build_default_card_catalog();
        assert_eq!(catalog.len(), CATALOG_SIZE);
        assert_eq!(default_card_catalog().len(), CATALOG_SIZE);
    }

    #[test]
    fn test_default_catalog_validates() {
        let errors = validate_catalog(default_card_catalog());
        assert!(
            errors.is_empty(),
            "Default catalog has validation errors: {:?}",
            errors
        );
    }

    #[test]
    fn test_validation_reports_missing_tier() {
        let catalog: Vec<_> = build_default_card_catalog()
            .into_iter()
            .filter(|c| !(c.category == Category::Idea && c.rarity == Rarity::Epic))
            .collect();

        let errors = validate_catalog(&catalog);
        assert!(errors.iter().any(|e| e.contains("'idea' has 0 epic")));
    }

    #[test]
    fn test_card_ids_and_names() {
        let catalog = build_default_card_catalog();
        let supernova = catalog.iter().find(|c| c.id == "energy_supernova").unwrap();
        assert_eq!(supernova.name, "Supernova");
        assert_eq!(supernova.rarity, Rarity::Legendary);
        assert_eq!(supernova.category, Category::Energy);
    }

    #[test]
    fn test_rarity_thresholds() {
        assert_eq!(resolve_rarity(0.0), Rarity::Common);
        assert_eq!(resolve_rarity(0.5999), Rarity::Common);
        assert_eq!(resolve_rarity(0.60), Rarity::Rare);
        assert_eq!(resolve_rarity(0.8999), Rarity::Rare);
        assert_eq!(resolve_rarity(0.90), Rarity::Epic);
        assert_eq!(resolve_rarity(0.9799), Rarity::Epic);
        assert_eq!(resolve_rarity(0.98), Rarity::Legendary);
        assert_eq!(resolve_rarity(0.9999), Rarity::Legendary);
    }

    #[test]
    fn test_rarity_distribution_converges() {
        let catalog = default_card_catalog();
        let mut rng = SeededRandom::new(7);
        let bonus = DuplicateBonus::default();
        let trials = 100_000;
        let mut counts: HashMap<Rarity, u32> = HashMap::new();

        for i in 0..trials {
            let category = Category::ALL[i % Category::ALL.len()];
            let result = drop_card(category, &[], catalog, &mut rng, &bonus);
            *counts.entry(result.rarity).or_default() += 1;
        }

        let expected = [
            (Rarity::Common, 0.60),
            (Rarity::Rare, 0.30),
            (Rarity::Epic, 0.08),
            (Rarity::Legendary, 0.02),
        ];
        for (rarity, p) in expected {
            let observed = counts.get(&rarity).copied().unwrap_or(0) as f64 / trials as f64;
            assert!(
                (observed - p).abs() < 0.01,
                "{:?}: observed {:.4}, expected {:.2}",
                rarity,
                observed,
                p
            );
        }
    }

    #[test]
    fn test_drop_picks_from_category_and_tier() {
        let catalog = default_card_catalog();
        // 0.95 → epic; only one epic per category
        let mut rng = ScriptedRandom::new([0.95, 0.3]);
        let result = drop_card(
            Category::Idea,
            &[],
            catalog,
            &mut rng,
            &DuplicateBonus::default(),
        );

        let card = result.card.unwrap();
        assert_eq!(card.id, "idea_architect");
        assert!(result.is_new_card);
        assert_eq!(result.duplicate_bonus_points, 0);
    }

    #[test]
    fn test_uniform_pick_is_sorted_by_id() {
        let catalog = default_card_catalog();
        // Rare decision cards sorted: chessmaster, oracle, timeline
        let mut rng = ScriptedRandom::new([0.7, 0.99]);
        let result = drop_card(
            Category::Decision,
            &[],
            catalog,
            &mut rng,
            &DuplicateBonus::default(),
        );
        assert_eq!(result.card.unwrap().id, "decision_timeline");
    }

    #[test]
    fn test_duplicate_earns_bonus() {
        let catalog = default_card_catalog();
        let mut rng = ScriptedRandom::new([0.99, 0.0]);
        let result = drop_card(
            Category::Energy,
            &[owned("energy_supernova")],
            catalog,
            &mut rng,
            &DuplicateBonus::default(),
        );

        assert_eq!(result.card.unwrap().id, "energy_supernova");
        assert!(!result.is_new_card);
        assert_eq!(result.duplicate_bonus_points, 100);
    }

    #[test]
    fn test_zero_count_row_is_not_owned() {
        let catalog = default_card_catalog();
        let mut row = owned("energy_supernova");
        row.owned_count = 0;
        let mut rng = ScriptedRandom::new([0.99, 0.0]);
        let result = drop_card(
            Category::Energy,
            &[row],
            catalog,
            &mut rng,
            &DuplicateBonus::default(),
        );
        assert!(result.is_new_card);
    }

    #[test]
    fn test_empty_pool_is_a_no_op() {
        let catalog: Vec<_> = build_default_card_catalog()
            .into_iter()
            .filter(|c| c.category != Category::Challenge)
            .collect();
        let mut rng = ScriptedRandom::new([0.1, 0.1]);
        let result = drop_card(
            Category::Challenge,
            &[],
            &catalog,
            &mut rng,
            &DuplicateBonus::default(),
        );

        assert!(result.card.is_none());
        assert!(!result.is_new_card);
        assert_eq!(result.duplicate_bonus_points, 0);
    }

    #[test]
    fn test_default_bonus_is_monotonic() {
        assert!(DuplicateBonus::default().is_monotonic());
        let bad = DuplicateBonus {
            common: 50,
            ..DuplicateBonus::default()
        };
        assert!(!bad.is_monotonic());
    }
}
