//! Random game fabrication for the live generator and for seeding.

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use rand::seq::IndexedRandom;
use rand::Rng;

use super::models::Game;

pub const MIN_PRICE: f64 = 4.99;
pub const MAX_PRICE: f64 = 69.99;
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;
pub const MIN_TAGS: usize = 2;
pub const MAX_TAGS: usize = 4;
pub const DEFAULT_MAX_GAME_ID: i64 = 1_000_000;
pub const DEFAULT_MAX_ID_ATTEMPTS: u32 = 1_000;

pub const GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "RPG",
    "Strategy",
    "Simulation",
    "Puzzle",
    "Racing",
    "Sports",
    "Horror",
    "Platformer",
    "Shooter",
    "Roguelike",
];

pub const PLATFORMS: &[&str] = &[
    "PC",
    "PlayStation 5",
    "PlayStation 4",
    "Xbox Series X",
    "Xbox One",
    "Nintendo Switch",
    "macOS",
    "Linux",
    "iOS",
    "Android",
];

const TITLE_OPENERS: &[&str] = &[
    "Shadow", "Crimson", "Iron", "Lost", "Neon", "Silent", "Eternal", "Hollow", "Solar", "Frozen",
];
const TITLE_SUBJECTS: &[&str] = &[
    "Kingdom", "Frontier", "Legacy", "Protocol", "Odyssey", "Dungeon", "Horizon", "Circuit",
    "Citadel", "Harbor",
];
const TITLE_SUFFIXES: &[&str] = &["", "", "", " II", " III", ": Reborn", ": Origins", " Deluxe"];

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no free game id found after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct GameGenerator {
    max_id_attempts: u32,
    max_game_id: i64,
}

impl GameGenerator {
    pub fn new(max_id_attempts: u32) -> Self {
        Self {
            max_id_attempts: max_id_attempts.max(1),
            max_game_id: DEFAULT_MAX_GAME_ID,
        }
    }

    /// Restrict ids to `1..=max_game_id`.
    pub fn with_max_game_id(mut self, max_game_id: i64) -> Self {
        self.max_game_id = max_game_id.max(1);
        self
    }

    /// Fabricate a game whose id is not in `existing`. `company_ids` may be empty.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        existing: &HashSet<i64>,
        company_ids: &[i64],
    ) -> Result<Game, GenerationError> {
        let id = self.pick_id(rng, existing)?;
        let name = format!(
            "{} {}{}",
            pick(rng, TITLE_OPENERS),
            pick(rng, TITLE_SUBJECTS),
            pick(rng, TITLE_SUFFIXES)
        );
        let genres = pick_tags(rng, GENRES);
        let platforms = pick_tags(rng, PLATFORMS);
        let description = format!(
            "{} is a {} game available on {}.",
            name,
            genres.join("/").to_lowercase(),
            platforms.join(", ")
        );

        Ok(Game {
            id,
            price: round_to(rng.random_range(MIN_PRICE..=MAX_PRICE), 100.0),
            rating: round_to(rng.random_range(MIN_RATING..=MAX_RATING), 10.0),
            company_id: company_ids.choose(rng).copied(),
            release_date: random_release_date(rng),
            name,
            description,
            genres,
            platforms,
        })
    }

    fn pick_id<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        existing: &HashSet<i64>,
    ) -> Result<i64, GenerationError> {
        for _ in 0..self.max_id_attempts {
            let candidate = rng.random_range(1..=self.max_game_id);
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(GenerationError::IdSpaceExhausted {
            attempts: self.max_id_attempts,
        })
    }
}

impl Default for GameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ID_ATTEMPTS)
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn pick_tags<R: Rng + ?Sized>(rng: &mut R, pool: &[&str]) -> Vec<String> {
    let count = rng.random_range(MIN_TAGS..=MAX_TAGS);
    pool.choose_multiple(rng, count)
        .map(|tag| tag.to_string())
        .collect()
}

// Bounds carry at most `scale` precision, so rounding cannot leave them.
fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

fn random_release_date<R: Rng + ?Sized>(rng: &mut R) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    epoch
        .checked_add_days(Days::new(rng.random_range(0..9_500)))
        .unwrap_or(epoch)
}
