//! Startup data: a fixed set of companies plus a batch of generated games.

use super::generator::{GameGenerator, GenerationError};
use super::models::Company;
use super::store::CatalogStore;

const DEFAULT_COMPANIES: &[(i64, &str, &str, i32)] = &[
    (1, "Northwind Interactive", "Canada", 2004),
    (2, "Blue Lantern Studios", "Poland", 2011),
    (3, "Kitsune Works", "Japan", 1998),
    (4, "Redstone Forge", "United States", 2015),
    (5, "Aurora Pixel", "Sweden", 2009),
];

/// Insert the default companies and `game_count` generated games. Returns the number of games added.
pub fn seed_catalog(
    store: &CatalogStore,
    generator: &GameGenerator,
    game_count: usize,
) -> Result<usize, GenerationError> {
    for &(id, name, country, founded_year) in DEFAULT_COMPANIES {
        store.upsert_company(Company {
            id,
            name: name.to_string(),
            country: country.to_string(),
            founded_year,
        });
    }

    let company_ids = store.company_ids();
    let mut rng = rand::rng();
    for _ in 0..game_count {
        let game = generator.generate(&mut rng, &store.game_ids(), &company_ids)?;
        store.upsert_game(game);
    }

    tracing::info!(
        companies = DEFAULT_COMPANIES.len(),
        games = game_count,
        "catalog seeded"
    );
    Ok(game_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_companies_and_games() {
        let store = CatalogStore::new();
        let added = seed_catalog(&store, &GameGenerator::default(), 25).unwrap();

        assert_eq!(added, 25);
        assert_eq!(store.game_count(), 25);
        assert_eq!(store.company_ids().len(), DEFAULT_COMPANIES.len());
        assert!(store
            .games()
            .iter()
            .all(|g| g.company_id.is_some_and(|id| store.company(id).is_some())));
    }

    #[test]
    fn seeding_fails_when_ids_run_out() {
        let store = CatalogStore::new();
        let generator = GameGenerator::new(50).with_max_game_id(3);

        let err = seed_catalog(&store, &generator, 4).unwrap_err();
        assert!(matches!(err, GenerationError::IdSpaceExhausted { .. }));
        assert_eq!(store.game_count(), 3);
    }
}
