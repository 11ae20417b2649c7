//! The operations exposed by the server.
//!
//! Every writing operation takes the lock of its tournament, runs in a single transaction
//! and validates everything before the first write. A failed operation leaves the store
//! unchanged.
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tournament_fixture_core::schedule::{allocate, generate_slots};
use tournament_fixture_core::{
    seeding, AvailabilityWindow, DayPlan, Fixture, Outcome, PairId, PendingMatch, RankedPair,
    Round, SeededPair, SlotLength, TimeSlot, MIN_PAIRS,
};

use crate::config::Scheduling;
use crate::model::{
    Category, CategoryFixture, CategoryId, CategoryState, FixtureResult, MatchEntry, MatchId,
    MatchRecord, PublicationResult, RegistrationId, ResultRequest, ResultResponse, RoundFixture,
    ScheduleResult, Tournament, TournamentId, TournamentState,
};
use crate::state::State;
use crate::{Error, StatusCodeError, ValidationError};

fn tournament_not_found() -> Error {
    StatusCodeError::not_found()
        .message("Invalid tournament id")
        .into()
}

fn category_not_found() -> Error {
    StatusCodeError::not_found()
        .message("Invalid category id")
        .into()
}

/// Draws the fixture of a category and places its matches on the courts.
///
/// A category that was already drawn but not published is drawn again from scratch: its
/// pairs and matches are deleted and recreated.
pub async fn draw_category(
    state: &State,
    tournament_id: TournamentId,
    category_id: CategoryId,
) -> Result<FixtureResult, Error> {
    let _guard = state.locks.lock(tournament_id).await;

    let store = &state.store;
    let mut tx = store.begin().await?;

    let tournament = store
        .tournaments()
        .get_for_update(&mut tx, tournament_id)
        .await?
        .ok_or_else(tournament_not_found)?;

    let category = store
        .categories(tournament_id)
        .get(&mut tx, category_id)
        .await?
        .ok_or_else(category_not_found)?;

    let entrants = store
        .registrations(tournament_id, category_id)
        .confirmed(&mut tx)
        .await?;
    let courts = store.courts(tournament_id).count(&mut tx).await?;
    let windows = store.courts(tournament_id).windows(&mut tx).await?;

    validate_draw(&category, entrants.len(), courts, windows.len())?;

    let slots = time_slots(&windows, slot_length(&tournament, &state.config.scheduling))?;
    let plan = DayPlan::new(windows.iter().map(|window| window.date));

    for entrant in &entrants {
        log::trace!(
            "Registration {}: players {:?}, points {:?}",
            entrant.registration,
            entrant.players,
            entrant.points
        );
    }

    // Registrations stand in for the pairs until the pairs are stored.
    let ranked = entrants
        .iter()
        .map(|entrant| RankedPair::new(PairId(entrant.registration.0), entrant.points));
    let seeded = seeding::seed(ranked, &mut StdRng::from_entropy());

    let deleted = store
        .matches(tournament_id)
        .delete_category(&mut tx, category_id)
        .await?;
    store
        .pairs(tournament_id, category_id)
        .delete_all(&mut tx)
        .await?;

    if deleted > 0 {
        log::info!(
            "Drawing category {} of tournament {} again, {} matches deleted",
            category_id,
            tournament_id,
            deleted
        );
    }

    let mut pair_ids = Vec::with_capacity(seeded.len());
    for pair in &seeded {
        let registration = RegistrationId(pair.id.0);
        let id = store
            .pairs(tournament_id, category_id)
            .insert(&mut tx, registration, pair)
            .await?;

        pair_ids.push(id);
    }

    let (pairs, fixture) = draw_fixture(&seeded, &pair_ids)?;

    let mut match_ids = Vec::with_capacity(fixture.len());
    for (position, m) in fixture.matches().iter().enumerate() {
        let id = store
            .matches(tournament_id)
            .insert(&mut tx, category_id, position, m)
            .await?;

        match_ids.push(id);
    }

    let pending = pending_matches(&fixture, &match_ids);

    let occupied = store.matches(tournament_id).occupied(&mut tx).await?;
    let allocation = allocate(pending, &slots, &plan, occupied);

    for (id, slot) in &allocation.assigned {
        store
            .matches(tournament_id)
            .set_slot(&mut tx, *id, slot)
            .await?;
    }

    store
        .categories(tournament_id)
        .set_state(&mut tx, category_id, CategoryState::Drafted)
        .await?;

    tx.commit().await?;

    log::info!(
        "Drew category {} of tournament {}: {} pairs, {} matches, {} unscheduled",
        category_id,
        tournament_id,
        pairs.len(),
        fixture.len(),
        allocation.unscheduled.len()
    );

    Ok(FixtureResult {
        tournament: tournament_id,
        category: category_id,
        pairs,
        matches: fixture.len(),
        scheduled: allocation.assigned.len(),
        unscheduled: allocation.unscheduled.len(),
    })
}

/// Publishes the drafted fixture of a category and notifies the participants.
pub async fn publish_category(
    state: &State,
    tournament_id: TournamentId,
    category_id: CategoryId,
) -> Result<PublicationResult, Error> {
    let guard = state.locks.lock(tournament_id).await;

    let store = &state.store;
    let mut tx = store.begin().await?;

    let tournament = store
        .tournaments()
        .get_for_update(&mut tx, tournament_id)
        .await?
        .ok_or_else(tournament_not_found)?;

    let category = store
        .categories(tournament_id)
        .get(&mut tx, category_id)
        .await?
        .ok_or_else(category_not_found)?;

    if category.state != CategoryState::Drafted {
        return Err(ValidationError::InvalidCategoryState(category.state).into());
    }

    let records = store
        .matches(tournament_id)
        .list(&mut tx, Some(category_id))
        .await?;
    let fixture = resume_fixture(&records)?;

    store
        .categories(tournament_id)
        .set_state(&mut tx, category_id, CategoryState::Published)
        .await?;

    let tournament_state = state_after_publication(tournament.state);
    if tournament_state != tournament.state {
        store
            .tournaments()
            .set_state(&mut tx, tournament_id, tournament_state)
            .await?;
    }

    tx.commit().await?;

    let publication = PublicationResult {
        tournament: tournament_id,
        category: category_id,
        tournament_state,
        opening_matches: fixture
            .opening_matches()
            .into_iter()
            .map(|index| records[index].entry())
            .collect(),
    };

    state
        .notifier
        .send_unlocked(guard, publication.clone())
        .await;

    Ok(publication)
}

/// Returns the fixture of a tournament, or of a single category, grouped by category and
/// round.
pub async fn get_fixture(
    state: &State,
    tournament_id: TournamentId,
    category_id: Option<CategoryId>,
) -> Result<Vec<CategoryFixture>, Error> {
    let store = &state.store;
    let mut conn = store.acquire().await?;

    store
        .tournaments()
        .get(&mut conn, tournament_id)
        .await?
        .ok_or_else(tournament_not_found)?;

    let mut categories = store.categories(tournament_id).list(&mut conn).await?;
    if let Some(id) = category_id {
        categories.retain(|category| category.id == id);

        if categories.is_empty() {
            return Err(category_not_found());
        }
    }

    let matches = store
        .matches(tournament_id)
        .list(&mut conn, category_id)
        .await?;

    Ok(group_fixture(categories, matches))
}

/// Places every match of the tournament that has no slot yet. Matches that already have a
/// slot are never moved.
pub async fn schedule_tournament(
    state: &State,
    tournament_id: TournamentId,
) -> Result<ScheduleResult, Error> {
    let _guard = state.locks.lock(tournament_id).await;

    let store = &state.store;
    let mut tx = store.begin().await?;

    let tournament = store
        .tournaments()
        .get_for_update(&mut tx, tournament_id)
        .await?
        .ok_or_else(tournament_not_found)?;

    let windows = store.courts(tournament_id).windows(&mut tx).await?;
    let slots = time_slots(&windows, slot_length(&tournament, &state.config.scheduling))?;
    let plan = DayPlan::new(windows.iter().map(|window| window.date));

    let pending = store.matches(tournament_id).pending(&mut tx).await?;
    let occupied = store.matches(tournament_id).occupied(&mut tx).await?;

    let allocation = allocate(pending, &slots, &plan, occupied);

    for (id, slot) in &allocation.assigned {
        store
            .matches(tournament_id)
            .set_slot(&mut tx, *id, slot)
            .await?;
    }

    tx.commit().await?;

    log::info!(
        "Scheduled tournament {}: {} matches placed, {} unscheduled",
        tournament_id,
        allocation.assigned.len(),
        allocation.unscheduled.len()
    );

    Ok(ScheduleResult {
        tournament: tournament_id,
        scheduled: allocation.assigned.len(),
        unscheduled: allocation.unscheduled.len(),
    })
}

/// Records the result of a match of a published category and moves both pairs on.
pub async fn record_result(
    state: &State,
    tournament_id: TournamentId,
    match_id: MatchId,
    request: ResultRequest,
) -> Result<ResultResponse, Error> {
    let _guard = state.locks.lock(tournament_id).await;

    let store = &state.store;
    let mut tx = store.begin().await?;

    let tournament = store
        .tournaments()
        .get_for_update(&mut tx, tournament_id)
        .await?
        .ok_or_else(tournament_not_found)?;

    let record = store
        .matches(tournament_id)
        .get(&mut tx, match_id)
        .await?
        .ok_or_else(|| Error::from(StatusCodeError::not_found().message("Invalid match id")))?;

    let category = store
        .categories(tournament_id)
        .get(&mut tx, record.category)
        .await?
        .ok_or_else(category_not_found)?;

    if category.state != CategoryState::Published {
        return Err(ValidationError::InvalidCategoryState(category.state).into());
    }

    let mut records = store
        .matches(tournament_id)
        .list(&mut tx, Some(record.category))
        .await?;
    let mut fixture = resume_fixture(&records)?;

    let outcome = if request.walkover {
        Outcome::Walkover
    } else {
        Outcome::Played
    };

    let changed = fixture
        .record_result(record.position, request.winner, outcome)
        .map_err(ValidationError::Result)?;
    let changed = unique(changed);

    for index in &changed {
        let updated = &mut records[*index];
        updated.inner = fixture[*index].clone();

        store
            .matches(tournament_id)
            .update(&mut tx, updated.id, &updated.inner)
            .await?;
    }

    let categories = store.categories(tournament_id).list(&mut tx).await?;
    let undecided = store.matches(tournament_id).count_undecided(&mut tx).await?;

    let tournament_state = if is_finished(&categories, undecided) {
        TournamentState::Finished
    } else {
        tournament.state
    };

    if tournament_state != tournament.state {
        store
            .tournaments()
            .set_state(&mut tx, tournament_id, tournament_state)
            .await?;
    }

    tx.commit().await?;

    log::info!(
        "Match {} of tournament {} won by pair {}",
        match_id,
        tournament_id,
        request.winner
    );

    Ok(ResultResponse {
        tournament_state,
        changed: changed.iter().map(|index| records[*index].entry()).collect(),
    })
}

/// Checks that a category can be drawn.
pub fn validate_draw(
    category: &Category,
    entrants: usize,
    courts: u64,
    windows: usize,
) -> Result<(), ValidationError> {
    if category.state == CategoryState::Published {
        return Err(ValidationError::InvalidCategoryState(category.state));
    }

    if entrants < MIN_PAIRS {
        return Err(ValidationError::NotEnoughPairs {
            min: MIN_PAIRS,
            found: entrants,
        });
    }

    if courts == 0 {
        return Err(ValidationError::NoCourts);
    }

    if windows == 0 {
        return Err(ValidationError::NoWindows);
    }

    Ok(())
}

/// Cuts the availability windows into time slots. Windows or slot lengths that cannot be
/// cut are rejected as invalid input.
pub fn time_slots(
    windows: &[AvailabilityWindow],
    length: SlotLength,
) -> Result<Vec<TimeSlot>, ValidationError> {
    generate_slots(windows, length).map_err(ValidationError::Schedule)
}

/// Draws the fixture from the seeded pairs once they are stored under `pair_ids`.
///
/// The seeded pairs carry their registration ids until then. `pair_ids` holds the stored id
/// of every seeded pair, in seeding order.
pub fn draw_fixture(
    seeded: &[SeededPair],
    pair_ids: &[PairId],
) -> Result<(Vec<SeededPair>, Fixture), ValidationError> {
    debug_assert_eq!(seeded.len(), pair_ids.len());

    let pairs: Vec<SeededPair> = seeded
        .iter()
        .zip(pair_ids)
        .map(|(pair, id)| SeededPair { id: *id, ..*pair })
        .collect();

    let fixture = Fixture::draw(pair_ids).map_err(ValidationError::Result)?;

    Ok((pairs, fixture))
}

/// Returns the matches of a freshly drawn fixture that need a slot, keyed by the id each
/// match was stored under. `match_ids` holds one id per match, in fixture order.
pub fn pending_matches(fixture: &Fixture, match_ids: &[MatchId]) -> Vec<PendingMatch<MatchId>> {
    fixture
        .pending()
        .into_iter()
        .map(|m| PendingMatch::new(match_ids[m.key], m.round, m.number))
        .collect()
}

/// Returns the slot length of a tournament, falling back to the configured defaults.
pub fn slot_length(tournament: &Tournament, scheduling: &Scheduling) -> SlotLength {
    SlotLength::new(
        tournament.match_duration.unwrap_or(scheduling.match_duration),
        tournament.buffer.unwrap_or(scheduling.buffer),
    )
}

/// The first published category starts the tournament.
pub fn state_after_publication(state: TournamentState) -> TournamentState {
    match state {
        TournamentState::Published => TournamentState::InProgress,
        state => state,
    }
}

/// A tournament is finished once all categories are published and every match is decided.
pub fn is_finished(categories: &[Category], undecided: u64) -> bool {
    !categories.is_empty()
        && undecided == 0
        && categories
            .iter()
            .all(|category| category.state == CategoryState::Published)
}

/// Rebuilds the fixture of a category from its matches, which must be ordered by position.
pub fn resume_fixture(records: &[MatchRecord]) -> Result<Fixture, Error> {
    if records
        .iter()
        .enumerate()
        .any(|(index, record)| record.position != index)
    {
        return Err(Error::InvalidColumn("position"));
    }

    Ok(Fixture::resume(
        records.iter().map(|record| record.inner.clone()).collect(),
    )?)
}

/// Groups matches by category and round. Rounds are in playing order, matches by number.
pub fn group_fixture(
    categories: Vec<Category>,
    matches: Vec<MatchRecord>,
) -> Vec<CategoryFixture> {
    let mut by_category: BTreeMap<CategoryId, BTreeMap<Round, Vec<MatchEntry>>> =
        BTreeMap::new();

    for record in matches {
        by_category
            .entry(record.category)
            .or_default()
            .entry(record.inner.round)
            .or_default()
            .push(record.entry());
    }

    categories
        .into_iter()
        .map(|category| {
            let rounds = by_category
                .remove(&category.id)
                .unwrap_or_default()
                .into_iter()
                .map(|(round, mut matches)| {
                    matches.sort_by_key(|m| m.number);
                    RoundFixture { round, matches }
                })
                .collect();

            CategoryFixture {
                category: category.id,
                name: category.name,
                state: category.state,
                rounds,
            }
        })
        .collect()
}

fn unique(indexes: Vec<usize>) -> Vec<usize> {
    let mut seen = Vec::with_capacity(indexes.len());
    for index in indexes {
        if !seen.contains(&index) {
            seen.push(index);
        }
    }

    seen
}
