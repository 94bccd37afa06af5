use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use spark_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ignite")]
#[command(about = "Ignition spark tracker: missions, cards and overloads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed card drops for reproducible runs
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Evaluate as if the current time were this RFC 3339 instant
    #[arg(long, global = true, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,

    /// Print effects as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a spark
    Log {
        /// decision, energy, idea, experiment or challenge
        #[arg(long, value_parser = parse_category)]
        category: Category,

        /// low, medium, high or extreme
        #[arg(long, value_parser = parse_intensity, default_value = "medium")]
        intensity: Intensity,

        /// When the spark happened (RFC 3339, defaults to now)
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },

    /// Draw a card without logging a spark
    Drop {
        #[arg(long, value_parser = parse_category)]
        category: Category,
    },

    /// Mark a mission as completed
    Complete {
        /// Mission id, as shown by `ignite missions`
        mission_id: String,
    },

    /// Reopen daily and weekly missions whose period has ended
    Reset,

    /// Show level, points, fuel and streak
    Status,

    /// List missions
    Missions {
        /// daily, weekly or achievement
        #[arg(long, value_parser = parse_kind)]
        kind: Option<MissionKind>,
    },

    /// List the card collection
    Cards {
        /// Only show cards that have been obtained
        #[arg(long)]
        owned: bool,
    },

    /// Export activity history to CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    Category::parse(s).ok_or_else(|| {
        format!("unknown category '{s}' (expected decision, energy, idea, experiment or challenge)")
    })
}

fn parse_intensity(s: &str) -> std::result::Result<Intensity, String> {
    Intensity::parse(s)
        .ok_or_else(|| format!("unknown intensity '{s}' (expected low, medium, high or extreme)"))
}

fn parse_kind(s: &str) -> std::result::Result<MissionKind, String> {
    MissionKind::parse(s)
        .ok_or_else(|| format!("unknown mission kind '{s}' (expected daily, weekly or achievement)"))
}

fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))
}

/// Wall clock, or a fixed instant from `--now`
enum CliClock {
    System(SystemClock),
    Fixed(DateTime<Utc>),
}

impl Clock for CliClock {
    fn now(&self) -> DateTime<Utc> {
        match self {
            CliClock::System(clock) => clock.now(),
            CliClock::Fixed(now) => *now,
        }
    }
}

/// Thread RNG, or a seeded one from `--seed`
enum CliRandom {
    Thread(ThreadRandom),
    Seeded(SeededRandom),
}

impl RandomSource for CliRandom {
    fn next_f64(&mut self) -> f64 {
        match self {
            CliRandom::Thread(rng) => rng.next_f64(),
            CliRandom::Seeded(rng) => rng.next_f64(),
        }
    }
}

type Engine = ProgressionEngine<FileStore, CliClock, CliRandom>;

fn main() -> Result<()> {
    // Initialize logging
    spark_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());

    let clock = match cli.now {
        Some(now) => CliClock::Fixed(now),
        None => CliClock::System(SystemClock),
    };
    let random = match cli.seed {
        Some(seed) => CliRandom::Seeded(SeededRandom::new(seed)),
        None => CliRandom::Thread(ThreadRandom::new()),
    };

    let store = FileStore::open(&data_dir)?;
    let mut engine = ProgressionEngine::new(store, clock, random, EngineSettings::from_config(&config));

    match cli.command {
        Commands::Log {
            category,
            intensity,
            at,
        } => cmd_log(&mut engine, category, intensity, at, cli.json),
        Commands::Drop { category } => cmd_drop(&mut engine, category, cli.json),
        Commands::Complete { mission_id } => cmd_complete(&mut engine, mission_id, cli.json),
        Commands::Reset => cmd_reset(&mut engine),
        Commands::Status => cmd_status(&mut engine),
        Commands::Missions { kind } => cmd_missions(&mut engine, kind),
        Commands::Cards { owned } => cmd_cards(&mut engine, owned),
        Commands::Export { out } => cmd_export(&engine, &out),
    }
}

fn cmd_log(
    engine: &mut Engine,
    category: Category,
    intensity: Intensity,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<()> {
    let timestamp = at.unwrap_or_else(|| engine.now());
    let effects = engine.handle(DomainEvent::ActivityRecorded {
        category,
        intensity,
        timestamp,
    })?;

    if !json {
        println!(
            "✓ Logged {} {} spark (+{} pts)",
            intensity.as_str(),
            category.as_str(),
            activity_points(category, intensity)
        );
    }
    print_effects(engine, &effects, json)
}

fn cmd_drop(engine: &mut Engine, category: Category, json: bool) -> Result<()> {
    let effects = engine.handle(DomainEvent::CardDropRequested { category })?;
    print_effects(engine, &effects, json)
}

fn cmd_complete(engine: &mut Engine, mission_id: String, json: bool) -> Result<()> {
    let effects = engine.handle(DomainEvent::MissionCompletionRequested {
        mission_id: mission_id.clone(),
    })?;

    if effects.is_empty() && !json {
        println!("Mission {} is already completed.", mission_id);
        return Ok(());
    }
    print_effects(engine, &effects, json)
}

fn cmd_reset(engine: &mut Engine) -> Result<()> {
    let outcome = engine.tick()?;

    if outcome.daily_reset {
        println!("✓ Daily missions reset");
    }
    if outcome.weekly_reset {
        println!("✓ Weekly missions reset");
    }
    if !outcome.any() {
        println!("Nothing to reset.");
    }
    Ok(())
}

fn cmd_status(engine: &mut Engine) -> Result<()> {
    engine.tick()?;
    let status = engine.status()?;
    let level = status.level.current;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  LEVEL {}: {}", level.number(), level.title());
    println!("╰─────────────────────────────────────────╯");
    println!();
    match status.level.next {
        Some(next) => println!(
            "  Next: {} in {} pts",
            next.title(),
            status.level.points_needed
        ),
        None => println!("  Max level reached"),
    }
    println!("  Points:    {}", status.progress.total_points);
    println!(
        "  Fuel:      {}/{} ({:.0}%)",
        status.progress.fuel_level,
        status.overload_threshold,
        status.fuel_fraction * 100.0
    );
    println!("  Overloads: {}", status.progress.total_overloads);
    println!(
        "  Streak:    {} days (longest {})",
        status.streak.current,
        status.streak.longest.max(status.progress.longest_streak)
    );
    println!("  Sparks:    {}", status.progress.total_activities);
    println!("  Cards:     {}/{}", status.owned_cards, status.catalog_size);
    println!(
        "  Missions:  {}/{} completed",
        status.missions_completed, status.missions_total
    );
    println!();
    Ok(())
}

fn cmd_missions(engine: &mut Engine, kind: Option<MissionKind>) -> Result<()> {
    engine.tick()?;
    let missions = engine.store().missions()?;

    for mission in missions
        .iter()
        .filter(|m| kind.map_or(true, |k| m.kind == k))
    {
        println!(
            "[{}] {:<32} {:<22} {:>5}/{:<5} {:>3.0}% +{}",
            if mission.is_completed() { "✓" } else { " " },
            mission.id,
            mission.title,
            mission.current_progress,
            mission.target_value,
            mission.progress_fraction() * 100.0,
            mission.reward_points
        );
    }
    Ok(())
}

fn cmd_cards(engine: &mut Engine, owned_only: bool) -> Result<()> {
    engine.tick()?;
    let catalog = engine.store().catalog()?;
    let owned = engine.store().owned_cards()?;

    for card in &catalog {
        let count = owned
            .iter()
            .find(|o| o.card_id == card.id)
            .map_or(0, |o| o.owned_count);
        if owned_only && count == 0 {
            continue;
        }
        println!(
            "{:<26} {:<14} {:<10} {:<9} x{}",
            card.id,
            card.name,
            card.category.as_str(),
            card.rarity.as_str(),
            count
        );
    }
    Ok(())
}

fn cmd_export(engine: &Engine, out: &std::path::Path) -> Result<()> {
    let activities = engine.store().activities()?;
    let count = export_activities(&activities, out)?;

    println!("✓ Exported {} sparks", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn print_effects(engine: &Engine, effects: &[Effect], json: bool) -> Result<()> {
    if json {
        for effect in effects {
            println!("{}", serde_json::to_string(effect)?);
        }
        return Ok(());
    }

    let missions = engine.store().missions()?;
    let catalog = engine.store().catalog()?;

    for effect in effects {
        match effect {
            Effect::MissionCompleted {
                mission_id,
                reward_points,
            } => {
                let title = missions
                    .iter()
                    .find(|m| &m.id == mission_id)
                    .map_or(mission_id.as_str(), |m| m.title.as_str());
                println!("✓ Mission complete: {} (+{} pts)", title, reward_points);
            }
            Effect::CardObtained {
                card_id,
                is_new,
                bonus_points,
            } => {
                let card = catalog.iter().find(|c| &c.id == card_id);
                let name = card.map_or(card_id.as_str(), |c| c.name.as_str());
                let rarity = card.map_or("", |c| c.rarity.as_str());
                if *is_new {
                    println!("★ New card: {} ({})", name, rarity);
                } else {
                    println!("→ Duplicate card: {} ({}) +{} pts", name, rarity, bonus_points);
                }
            }
            Effect::NoCardObtained => println!("→ No card this time"),
            Effect::OverloadTriggered {
                new_total_overloads,
            } => println!("⚡ OVERLOAD! (#{})", new_total_overloads),
            Effect::LevelUp { level } => println!("▲ Level up! You reached level {}", level),
            Effect::StreakUpdated { current, longest } => {
                println!("  Streak: {} days (longest {})", current, longest)
            }
        }
    }
    Ok(())
}
