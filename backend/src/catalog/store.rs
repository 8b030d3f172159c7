//! Shared catalog of games and companies. Thread-safe; shared via Arc across all connections.

use std::collections::HashSet;

use dashmap::DashMap;

use super::models::{Company, Game};

pub struct CatalogStore {
    games: DashMap<i64, Game>,
    companies: DashMap<i64, Company>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            games: DashMap::new(),
            companies: DashMap::new(),
        }
    }

    /// Snapshot of every game, ordered by id.
    pub fn games(&self) -> Vec<Game> {
        let mut games: Vec<Game> = self.games.iter().map(|g| g.value().clone()).collect();
        games.sort_by_key(|g| g.id);
        games
    }

    /// Ids currently in the catalog; used to avoid collisions when fabricating games.
    pub fn game_ids(&self) -> HashSet<i64> {
        self.games.iter().map(|g| *g.key()).collect()
    }

    pub fn game(&self, id: i64) -> Option<Game> {
        self.games.get(&id).map(|g| g.value().clone())
    }

    /// Insert the game, replacing any game stored under the same id. Returns the stored game.
    pub fn upsert_game(&self, game: Game) -> Game {
        if self.games.insert(game.id, game.clone()).is_some() {
            tracing::debug!(game_id = game.id, "replaced existing game");
        }
        game
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn company_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.companies.iter().map(|c| *c.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn company(&self, id: i64) -> Option<Company> {
        self.companies.get(&id).map(|c| c.value().clone())
    }

    pub fn upsert_company(&self, company: Company) -> Company {
        self.companies.insert(company.id, company.clone());
        company
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;

    fn game(id: i64, company_id: Option<i64>) -> Game {
        Game {
            id,
            name: format!("Game {id}"),
            price: 9.99,
            rating: 4.0,
            description: String::new(),
            genres: vec!["Action".into()],
            platforms: vec!["PC".into()],
            company_id,
            release_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        }
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let store = CatalogStore::new();
        store.upsert_game(game(7, None));
        assert_eq!(store.game_count(), 1);

        let mut renamed = game(7, None);
        renamed.name = "Renamed".into();
        let stored = store.upsert_game(renamed);

        assert_eq!(stored.name, "Renamed");
        assert_eq!(store.game_count(), 1);
        assert_eq!(store.game(7).unwrap().name, "Renamed");
    }

    #[test]
    fn snapshot_is_ordered_and_detached() {
        let store = CatalogStore::new();
        for id in [5, 1, 3] {
            store.upsert_game(game(id, None));
        }
        let snapshot = store.games();
        store.upsert_game(game(2, None));

        let ids: Vec<i64> = snapshot.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
        assert_eq!(store.game_ids(), HashSet::from([1, 2, 3, 5]));
    }

    #[test]
    fn companies_are_tracked_by_id() {
        let store = CatalogStore::new();
        store.upsert_company(Company {
            id: 1,
            name: "Acme".into(),
            country: "US".into(),
            founded_year: 1999,
        });
        store.upsert_company(Company {
            id: 1,
            name: "Acme Interactive".into(),
            country: "US".into(),
            founded_year: 1999,
        });

        assert_eq!(store.company_ids(), vec![1]);
        assert_eq!(store.company(1).unwrap().name, "Acme Interactive");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_are_not_lost() {
        let store = Arc::new(CatalogStore::new());
        let mut handles = Vec::new();
        for worker in 0..8i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..50i64 {
                    store.upsert_game(game(worker * 1000 + n, None));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.game_count(), 400);
    }
}
