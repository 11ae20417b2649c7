use futures::TryStreamExt;
use sqlx::mysql::{MySql, MySqlConnection, MySqlPool, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Transaction};
use tournament_fixture_core::{
    AvailabilityWindow, CourtId, FixtureMatch, MatchState, OccupiedSlots, PairId, PendingMatch,
    Round, SeededPair, SlotKey, TimeOfDay, TimeSlot,
};

use crate::model::{
    link_columns, Category, CategoryId, CategoryState, Entrant, MatchId, MatchRecord, MatchRow,
    PlayerId, RegistrationId, Tournament, TournamentId, TournamentState,
};
use crate::Error;

#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    /// Starts a new transaction. All writes of a single operation go through one transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, MySql>, Error> {
        Ok(self.pool.begin().await?)
    }

    pub async fn acquire(&self) -> Result<PoolConnection<MySql>, Error> {
        Ok(self.pool.acquire().await?)
    }

    #[inline]
    pub fn tournaments(&self) -> TournamentsClient<'_> {
        TournamentsClient { store: self }
    }

    #[inline]
    pub fn categories(&self, tournament: TournamentId) -> CategoriesClient<'_> {
        CategoriesClient {
            store: self,
            tournament,
        }
    }

    #[inline]
    pub fn registrations(
        &self,
        tournament: TournamentId,
        category: CategoryId,
    ) -> RegistrationsClient<'_> {
        RegistrationsClient {
            store: self,
            tournament,
            category,
        }
    }

    #[inline]
    pub fn pairs(&self, tournament: TournamentId, category: CategoryId) -> PairsClient<'_> {
        PairsClient {
            store: self,
            tournament,
            category,
        }
    }

    #[inline]
    pub fn matches(&self, tournament: TournamentId) -> MatchesClient<'_> {
        MatchesClient {
            store: self,
            tournament,
        }
    }

    #[inline]
    pub fn courts(&self, tournament: TournamentId) -> CourtsClient<'_> {
        CourtsClient {
            store: self,
            tournament,
        }
    }

    /// Creates all tables that do not exist yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        for sql in schema(&self.table_prefix) {
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        Ok(())
    }
}

fn schema(prefix: &str) -> [String; 8] {
    [
        format!("CREATE TABLE IF NOT EXISTS {}tournaments (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, name TEXT NOT NULL, state TINYINT UNSIGNED NOT NULL, match_duration SMALLINT UNSIGNED NULL, buffer SMALLINT UNSIGNED NULL)", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}categories (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, name TEXT NOT NULL, state TINYINT UNSIGNED NOT NULL, INDEX (tournament_id))", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}players (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, name TEXT NOT NULL, ranking_points INT UNSIGNED NULL)", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}registrations (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, category_id BIGINT UNSIGNED NOT NULL, player1_id BIGINT UNSIGNED NOT NULL, player2_id BIGINT UNSIGNED NULL, player2_name TEXT NULL, confirmed BOOLEAN NOT NULL, INDEX (tournament_id, category_id))", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}pairs (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, category_id BIGINT UNSIGNED NOT NULL, registration_id BIGINT UNSIGNED NOT NULL, seed INT UNSIGNED NOT NULL, strength BIGINT UNSIGNED NOT NULL, INDEX (tournament_id, category_id))", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}courts (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, name TEXT NOT NULL, INDEX (tournament_id))", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}court_windows (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, court_id BIGINT UNSIGNED NOT NULL, date DATE NOT NULL, start_time CHAR(5) NOT NULL, end_time CHAR(5) NOT NULL, INDEX (court_id))", prefix),
        format!("CREATE TABLE IF NOT EXISTS {}matches (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, category_id BIGINT UNSIGNED NOT NULL, position INT UNSIGNED NOT NULL, round VARCHAR(32) NOT NULL, number INT UNSIGNED NOT NULL, pair1_id BIGINT UNSIGNED NULL, pair2_id BIGINT UNSIGNED NULL, state TINYINT UNSIGNED NOT NULL, winner_id BIGINT UNSIGNED NULL, next_winner_position INT UNSIGNED NULL, next_winner_slot TINYINT UNSIGNED NULL, next_loser_position INT UNSIGNED NULL, next_loser_slot TINYINT UNSIGNED NULL, court_id BIGINT UNSIGNED NULL, date DATE NULL, start_time CHAR(5) NULL, end_time CHAR(5) NULL, INDEX (tournament_id, category_id))", prefix),
    ]
}

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

fn tournament_from_row(id: TournamentId, row: &MySqlRow) -> Result<Tournament, Error> {
    let state = row.try_get("state")?;

    Ok(Tournament {
        id,
        name: row.try_get("name")?,
        state: TournamentState::from_u8(state).ok_or(Error::InvalidColumn("state"))?,
        match_duration: row.try_get("match_duration")?,
        buffer: row.try_get("buffer")?,
    })
}

#[derive(Copy, Clone, Debug)]
pub struct TournamentsClient<'a> {
    store: &'a Store,
}

impl<'a> TournamentsClient<'a> {
    /// Returns the [`Tournament`] with the given `id`. Returns `None` if no tournament with the
    /// given `id` exists.
    pub async fn get(
        &self,
        conn: &mut MySqlConnection,
        id: TournamentId,
    ) -> Result<Option<Tournament>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT name, state, match_duration, buffer FROM {}tournaments WHERE id = ?",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await
        );

        Ok(Some(tournament_from_row(id, &row)?))
    }

    /// Same as [`get`] but locks the tournament row until the transaction ends.
    ///
    /// [`get`]: Self::get
    pub async fn get_for_update(
        &self,
        conn: &mut MySqlConnection,
        id: TournamentId,
    ) -> Result<Option<Tournament>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT name, state, match_duration, buffer FROM {}tournaments WHERE id = ? FOR UPDATE",
                self.store.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await
        );

        Ok(Some(tournament_from_row(id, &row)?))
    }

    pub async fn set_state(
        &self,
        conn: &mut MySqlConnection,
        id: TournamentId,
        state: TournamentState,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}tournaments SET state = ? WHERE id = ?",
            self.store.table_prefix
        ))
        .bind(state.to_u8())
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct CategoriesClient<'a> {
    store: &'a Store,
    tournament: TournamentId,
}

impl<'a> CategoriesClient<'a> {
    fn from_row(&self, row: &MySqlRow) -> Result<Category, Error> {
        let state = row.try_get("state")?;

        Ok(Category {
            id: CategoryId(row.try_get("id")?),
            tournament_id: self.tournament,
            name: row.try_get("name")?,
            state: CategoryState::from_u8(state).ok_or(Error::InvalidColumn("state"))?,
        })
    }

    pub async fn list(&self, conn: &mut MySqlConnection) -> Result<Vec<Category>, Error> {
        let sql = format!(
            "SELECT id, name, state FROM {}categories WHERE tournament_id = ? ORDER BY id",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(self.tournament.0).fetch(&mut *conn);

        let mut categories = Vec::new();
        while let Some(row) = rows.try_next().await? {
            categories.push(self.from_row(&row)?);
        }

        Ok(categories)
    }

    pub async fn get(
        &self,
        conn: &mut MySqlConnection,
        id: CategoryId,
    ) -> Result<Option<Category>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, name, state FROM {}categories WHERE tournament_id = ? AND id = ?",
                self.store.table_prefix
            ))
            .bind(self.tournament.0)
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await
        );

        Ok(Some(self.from_row(&row)?))
    }

    pub async fn set_state(
        &self,
        conn: &mut MySqlConnection,
        id: CategoryId,
        state: CategoryState,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}categories SET state = ? WHERE tournament_id = ? AND id = ?",
            self.store.table_prefix
        ))
        .bind(state.to_u8())
        .bind(self.tournament.0)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct RegistrationsClient<'a> {
    store: &'a Store,
    tournament: TournamentId,
    category: CategoryId,
}

impl<'a> RegistrationsClient<'a> {
    /// Returns all confirmed registrations with the current ranking points of both players,
    /// in the order they were registered.
    pub async fn confirmed(&self, conn: &mut MySqlConnection) -> Result<Vec<Entrant>, Error> {
        let prefix = &self.store.table_prefix;
        let sql = format!(
            "SELECT r.id, r.player1_id, r.player2_id, p1.ranking_points AS points1, p2.ranking_points AS points2 \
             FROM {prefix}registrations r \
             LEFT JOIN {prefix}players p1 ON p1.id = r.player1_id \
             LEFT JOIN {prefix}players p2 ON p2.id = r.player2_id \
             WHERE r.tournament_id = ? AND r.category_id = ? AND r.confirmed = TRUE \
             ORDER BY r.id",
            prefix = prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.tournament.0)
            .bind(self.category.0)
            .fetch(&mut *conn);

        let mut entrants = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let player1: u64 = row.try_get("player1_id")?;
            let player2: Option<u64> = row.try_get("player2_id")?;

            entrants.push(Entrant {
                registration: RegistrationId(row.try_get("id")?),
                players: [Some(PlayerId(player1)), player2.map(PlayerId)],
                points: [row.try_get("points1")?, row.try_get("points2")?],
            });
        }

        Ok(entrants)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PairsClient<'a> {
    store: &'a Store,
    tournament: TournamentId,
    category: CategoryId,
}

impl<'a> PairsClient<'a> {
    pub async fn delete_all(&self, conn: &mut MySqlConnection) -> Result<(), Error> {
        sqlx::query(&format!(
            "DELETE FROM {}pairs WHERE tournament_id = ? AND category_id = ?",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .bind(self.category.0)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert(
        &self,
        conn: &mut MySqlConnection,
        registration: RegistrationId,
        pair: &SeededPair,
    ) -> Result<PairId, Error> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}pairs (tournament_id, category_id, registration_id, seed, strength) VALUES (?, ?, ?, ?, ?)",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .bind(self.category.0)
        .bind(registration.0)
        .bind(pair.seed)
        .bind(pair.strength)
        .execute(&mut *conn)
        .await?;

        Ok(PairId(res.last_insert_id()))
    }
}

const MATCH_COLUMNS: &str = "id, category_id, position, round, number, pair1_id, pair2_id, state, winner_id, next_winner_position, next_winner_slot, next_loser_position, next_loser_slot, court_id, date, start_time, end_time";

fn match_row(row: &MySqlRow) -> Result<MatchRow, sqlx::Error> {
    Ok(MatchRow {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        position: row.try_get("position")?,
        round: row.try_get("round")?,
        number: row.try_get("number")?,
        pair1_id: row.try_get("pair1_id")?,
        pair2_id: row.try_get("pair2_id")?,
        state: row.try_get("state")?,
        winner_id: row.try_get("winner_id")?,
        next_winner_position: row.try_get("next_winner_position")?,
        next_winner_slot: row.try_get("next_winner_slot")?,
        next_loser_position: row.try_get("next_loser_position")?,
        next_loser_slot: row.try_get("next_loser_slot")?,
        court_id: row.try_get("court_id")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
    })
}

#[derive(Copy, Clone, Debug)]
pub struct MatchesClient<'a> {
    store: &'a Store,
    tournament: TournamentId,
}

impl<'a> MatchesClient<'a> {
    /// Returns all matches of the tournament, or only those of `category`, ordered by
    /// category and position.
    pub async fn list(
        &self,
        conn: &mut MySqlConnection,
        category: Option<CategoryId>,
    ) -> Result<Vec<MatchRecord>, Error> {
        let filter = match category {
            Some(_) => " AND category_id = ?",
            None => "",
        };

        let sql = format!(
            "SELECT {} FROM {}matches WHERE tournament_id = ?{} ORDER BY category_id, position",
            MATCH_COLUMNS, self.store.table_prefix, filter
        );

        let mut query = sqlx::query(&sql).bind(self.tournament.0);
        if let Some(category) = category {
            query = query.bind(category.0);
        }

        let mut rows = query.fetch(&mut *conn);

        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(MatchRecord::try_from(match_row(&row)?)?);
        }

        Ok(matches)
    }

    pub async fn get(
        &self,
        conn: &mut MySqlConnection,
        id: MatchId,
    ) -> Result<Option<MatchRecord>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT {} FROM {}matches WHERE tournament_id = ? AND id = ?",
                MATCH_COLUMNS, self.store.table_prefix
            ))
            .bind(self.tournament.0)
            .bind(id.0)
            .fetch_one(&mut *conn)
            .await
        );

        Ok(Some(MatchRecord::try_from(match_row(&row)?)?))
    }

    pub async fn delete_category(
        &self,
        conn: &mut MySqlConnection,
        category: CategoryId,
    ) -> Result<u64, Error> {
        let res = sqlx::query(&format!(
            "DELETE FROM {}matches WHERE tournament_id = ? AND category_id = ?",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .bind(category.0)
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected())
    }

    pub async fn insert(
        &self,
        conn: &mut MySqlConnection,
        category: CategoryId,
        position: usize,
        m: &FixtureMatch,
    ) -> Result<MatchId, Error> {
        let (next_winner_position, next_winner_slot) = link_columns(m.next_winner);
        let (next_loser_position, next_loser_slot) = link_columns(m.next_loser);

        let res = sqlx::query(&format!(
            "INSERT INTO {}matches (tournament_id, category_id, position, round, number, pair1_id, pair2_id, state, winner_id, next_winner_position, next_winner_slot, next_loser_position, next_loser_slot) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .bind(category.0)
        .bind(position as u32)
        .bind(m.round.to_string())
        .bind(m.number)
        .bind(m.pairs[0].map(|pair| pair.0))
        .bind(m.pairs[1].map(|pair| pair.0))
        .bind(m.state.to_u8())
        .bind(m.winner.map(|pair| pair.0))
        .bind(next_winner_position)
        .bind(next_winner_slot)
        .bind(next_loser_position)
        .bind(next_loser_slot)
        .execute(&mut *conn)
        .await?;

        Ok(MatchId(res.last_insert_id()))
    }

    /// Writes the pairs, state and winner of a match. Links never change after a draw.
    pub async fn update(
        &self,
        conn: &mut MySqlConnection,
        id: MatchId,
        m: &FixtureMatch,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}matches SET pair1_id = ?, pair2_id = ?, state = ?, winner_id = ? WHERE tournament_id = ? AND id = ?",
            self.store.table_prefix
        ))
        .bind(m.pairs[0].map(|pair| pair.0))
        .bind(m.pairs[1].map(|pair| pair.0))
        .bind(m.state.to_u8())
        .bind(m.winner.map(|pair| pair.0))
        .bind(self.tournament.0)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_slot(
        &self,
        conn: &mut MySqlConnection,
        id: MatchId,
        slot: &TimeSlot,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}matches SET court_id = ?, date = ?, start_time = ?, end_time = ? WHERE tournament_id = ? AND id = ?",
            self.store.table_prefix
        ))
        .bind(slot.court.0)
        .bind(slot.date)
        .bind(slot.start.to_string())
        .bind(slot.end.to_string())
        .bind(self.tournament.0)
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Returns the slots used by all matches of the tournament that still take place.
    pub async fn occupied(&self, conn: &mut MySqlConnection) -> Result<OccupiedSlots, Error> {
        let sql = format!(
            "SELECT court_id, date, start_time FROM {}matches WHERE tournament_id = ? AND court_id IS NOT NULL AND state NOT IN (?, ?)",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.tournament.0)
            .bind(MatchState::Walkover.to_u8())
            .bind(MatchState::Cancelled.to_u8())
            .fetch(&mut *conn);

        let mut occupied = OccupiedSlots::new();
        while let Some(row) = rows.try_next().await? {
            let start: String = row.try_get("start_time")?;

            occupied.insert(SlotKey {
                court: CourtId(row.try_get("court_id")?),
                date: row.try_get("date")?,
                start: start.parse()?,
            });
        }

        Ok(occupied)
    }

    /// Returns all matches of the tournament that still need a slot.
    pub async fn pending(
        &self,
        conn: &mut MySqlConnection,
    ) -> Result<Vec<PendingMatch<MatchId>>, Error> {
        let sql = format!(
            "SELECT id, round, number FROM {}matches WHERE tournament_id = ? AND court_id IS NULL AND winner_id IS NULL AND state NOT IN (?, ?)",
            self.store.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.tournament.0)
            .bind(MatchState::Walkover.to_u8())
            .bind(MatchState::Cancelled.to_u8())
            .fetch(&mut *conn);

        let mut pending = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let round: String = row.try_get("round")?;

            pending.push(PendingMatch::new(
                MatchId(row.try_get("id")?),
                round.parse::<Round>()?,
                row.try_get("number")?,
            ));
        }

        Ok(pending)
    }

    /// Returns the number of matches that still wait for a result. Byes are never counted:
    /// they resolve together with the match feeding them.
    pub async fn count_undecided(&self, conn: &mut MySqlConnection) -> Result<u64, Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS undecided FROM {}matches WHERE tournament_id = ? AND winner_id IS NULL AND state NOT IN (?, ?)",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .bind(MatchState::Walkover.to_u8())
        .bind(MatchState::Cancelled.to_u8())
        .fetch_one(&mut *conn)
        .await?;

        let undecided: i64 = row.try_get("undecided")?;
        Ok(undecided as u64)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct CourtsClient<'a> {
    store: &'a Store,
    tournament: TournamentId,
}

impl<'a> CourtsClient<'a> {
    pub async fn count(&self, conn: &mut MySqlConnection) -> Result<u64, Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS courts FROM {}courts WHERE tournament_id = ?",
            self.store.table_prefix
        ))
        .bind(self.tournament.0)
        .fetch_one(&mut *conn)
        .await?;

        let courts: i64 = row.try_get("courts")?;
        Ok(courts as u64)
    }

    /// Returns the availability windows of all courts of the tournament.
    pub async fn windows(
        &self,
        conn: &mut MySqlConnection,
    ) -> Result<Vec<AvailabilityWindow>, Error> {
        let prefix = &self.store.table_prefix;
        let sql = format!(
            "SELECT w.court_id, w.date, w.start_time, w.end_time FROM {prefix}court_windows w \
             JOIN {prefix}courts c ON c.id = w.court_id \
             WHERE c.tournament_id = ? ORDER BY w.date, w.start_time, w.court_id",
            prefix = prefix
        );

        let mut rows = sqlx::query(&sql).bind(self.tournament.0).fetch(&mut *conn);

        let mut windows = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let start: String = row.try_get("start_time")?;
            let end: String = row.try_get("end_time")?;

            windows.push(AvailabilityWindow {
                court: CourtId(row.try_get("court_id")?),
                date: row.try_get("date")?,
                start: start.parse::<TimeOfDay>()?,
                end: end.parse::<TimeOfDay>()?,
            });
        }

        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::schema;

    #[test]
    fn test_schema_prefix() {
        let tables = schema("tf_");

        for sql in &tables {
            assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS tf_"));
        }

        let names: Vec<&str> = tables
            .iter()
            .filter_map(|sql| sql.split_whitespace().nth(5))
            .collect();
        assert_eq!(
            names,
            [
                "tf_tournaments",
                "tf_categories",
                "tf_players",
                "tf_registrations",
                "tf_pairs",
                "tf_courts",
                "tf_court_windows",
                "tf_matches",
            ]
        );
    }
}
