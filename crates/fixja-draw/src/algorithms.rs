// Tournament planning algorithms: pool sizing, serpentine seeding, and the
// round-robin / final-series draw formats that go with them.
//
// Pool sizing works on exact integer ratios. Every quantity in the
// calculation is a multiple of 1/max_per_day (or 1/(2*max_per_day) for the
// half-day rounding of elimination days), so comparisons cross-multiply
// instead of dividing.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DrawError;
use crate::format::{DrawFormat, MatchDescriptor, RoundDescriptor};

/// Label given to the third place playoff in generated final series.
pub const BRONZE_MEDAL: &str = "Bronze Medal";

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

/// Round `value` up to the nearest multiple of `factor`.
pub fn ceiling(value: u32, factor: u32) -> u32 {
    if factor == 0 {
        return value;
    }
    value.div_ceil(factor) * factor
}

/// Number of knockout rounds needed to find a winner from `pools` pools.
///
/// A single pool plays a 4-team final series (semi finals and a final), so
/// it needs two rounds. Otherwise one round per halving plus the final.
pub fn final_series_rounds(pools: u32) -> Result<u32, DrawError> {
    if !pools.is_power_of_two() {
        return Err(DrawError::NotPowerOfTwo(pools));
    }
    if pools == 1 {
        return Ok(2);
    }
    Ok(pools.trailing_zeros() + 1)
}

/// Conventional name for a knockout round with `number_of_matches` matches.
pub fn final_series_round_label(number_of_matches: usize) -> String {
    match number_of_matches {
        2 => "Semi Final".to_string(),
        4 => "Quarter Final".to_string(),
        n if n >= 8 => format!("Round of {}", n * 2),
        _ => "Final".to_string(),
    }
}

/// Split `items` into chunks of exactly `size`, padding the last with `None`.
pub fn grouper<T: Clone>(items: &[T], size: usize) -> Vec<Vec<Option<T>>> {
    if size == 0 {
        return Vec::new();
    }
    items
        .chunks(size)
        .map(|chunk| {
            let mut group: Vec<Option<T>> = chunk.iter().cloned().map(Some).collect();
            group.resize(size, None);
            group
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Round robin
// ---------------------------------------------------------------------------

/// Circle-method round robin.
///
/// An odd number of teams is padded with `T::default()` (the bye). With
/// `rounds = None` one complete cycle of `count - 1` rounds is produced.
pub fn round_robin<T: Clone + Default>(
    teams: impl IntoIterator<Item = T>,
    rounds: Option<usize>,
) -> Vec<Vec<(T, T)>> {
    let mut teams: Vec<T> = teams.into_iter().collect();
    if teams.len() % 2 == 1 {
        teams.push(T::default());
    }

    let count = teams.len();
    let half = count / 2;
    let rounds = rounds.unwrap_or(count.saturating_sub(1));

    let mut schedule = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let pairings = (0..half)
            .map(|i| (teams[i].clone(), teams[count - i - 1].clone()))
            .collect();
        // Hold the first team still and rotate everyone else one place.
        if count > 1 {
            teams[1..].rotate_right(1);
        }
        schedule.push(pairings);
    }
    schedule
}

/// Render a round robin between teams `1..=teams` as a draw format, numbering
/// matches sequentially across every round.
pub fn round_robin_format(teams: u32, rounds: Option<usize>) -> String {
    let mut lines = Vec::new();
    let mut match_id = 1;
    for round in round_robin(1..=teams, rounds) {
        lines.push("ROUND".to_string());
        for (home, away) in round {
            lines.push(format!("{match_id}: {home} vs {away}"));
            match_id += 1;
        }
    }
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Final series
// ---------------------------------------------------------------------------

/// Build a single elimination final series for `number_of_pools` pools.
///
/// Algorithm:
/// 1. Opening round: a single pool plays P1 v P4 and P2 v P3; otherwise each
///    pool winner meets the runner up of the pool at the opposite end
///    (`G1P1 vs G{n}P2`, `G2P1 vs G{n-1}P2`, ...).
/// 2. Each following round pairs the winner of the first remaining match
///    with the winner of the last, working inwards, until one match is left.
/// 3. With a bronze label, the semi final losers meet in an extra match of
///    the final round, and the final itself takes the round label.
pub fn single_elimination_final_format(
    number_of_pools: u32,
    bronze_playoff: Option<&str>,
) -> Result<Vec<RoundDescriptor>, DrawError> {
    if !number_of_pools.is_power_of_two() {
        return Err(DrawError::NotPowerOfTwo(number_of_pools));
    }

    let mut initial;
    if number_of_pools == 1 {
        initial = RoundDescriptor::new(1, Some(final_series_round_label(2)));
        initial.add(MatchDescriptor::new(1, "P1", "P4"));
        initial.add(MatchDescriptor::new(2, "P2", "P3"));
    } else {
        let pools = number_of_pools as usize;
        initial = RoundDescriptor::new(1, Some(final_series_round_label(pools)));
        for pool in 0..number_of_pools {
            initial.add(MatchDescriptor::new(
                pool + 1,
                format!("G{}P1", pool + 1),
                format!("G{}P2", number_of_pools - pool),
            ));
        }
    }

    let mut series = vec![initial];

    while let Some(previous) = series.last().filter(|r| r.matches.len() > 1) {
        let matches_this_round = previous.matches.len() / 2;
        let last_id = previous.matches[previous.matches.len() - 1].match_id;

        let mut this_round = RoundDescriptor::new(
            previous.count + 1,
            Some(final_series_round_label(matches_this_round)),
        );
        for i in 0..matches_this_round {
            let high = &previous.matches[i];
            let low = &previous.matches[previous.matches.len() - 1 - i];
            this_round.add(MatchDescriptor::new(
                last_id + i as u32 + 1,
                format!("W{}", high.match_id),
                format!("W{}", low.match_id),
            ));
        }
        series.push(this_round);
    }

    if let Some(label) = bronze_playoff {
        if series.len() >= 2 {
            let semis = &series[series.len() - 2];
            let bronze = MatchDescriptor::new(
                0,
                format!("L{}", semis.matches[0].match_id),
                format!("L{}", semis.matches[1].match_id),
            )
            .with_label(label);

            if let Some(final_round) = series.last_mut() {
                let round_label = final_round.round_label.clone();
                let final_match = &mut final_round.matches[0];
                final_match.match_label = round_label;
                let bronze = MatchDescriptor {
                    match_id: final_match.match_id + 1,
                    ..bronze
                };
                final_round.add(bronze);
            }
        }
    }

    Ok(series)
}

// ---------------------------------------------------------------------------
// Pool sizing
// ---------------------------------------------------------------------------

/// Decide how many pools (1, 2, 4 or 8) to split a division into.
///
/// Algorithm, for each candidate pool count in turn:
/// 1. largest pool = ceil(teams / pools); preliminary rounds = largest - 1.
/// 2. elimination rounds = `final_series_rounds(pools)`; elimination days are
///    those rounds at `max_per_day`, rounded up to the half day.
/// 3. Reject the candidate if the preliminary rounds do not fit in the days
///    left before the elimination days.
/// 4. Accept it if all rounds fit in `days_available`.
///
/// Returns `None` when no candidate satisfies the constraints.
/// `min_per_day` is accepted for interface compatibility and does not change
/// the outcome.
pub fn optimum_tournament_pool_count(
    number_of_teams: u32,
    days_available: u32,
    max_per_day: u32,
    min_per_day: u32,
) -> Option<u32> {
    debug!(
        number_of_teams,
        days_available, max_per_day, min_per_day, "sizing tournament pools"
    );
    if max_per_day == 0 {
        warn!("cannot size pools with max_per_day = 0");
        return None;
    }

    let teams = i64::from(number_of_teams);
    let days = i64::from(days_available);
    let per_day = i64::from(max_per_day);

    for n in 0..4 {
        let number_of_pools: u32 = 1 << n;
        let pools = i64::from(number_of_pools);

        let largest_pool_size = (teams + pools - 1) / pools;
        let preliminary_rounds = largest_pool_size - 1;
        let elimination_rounds = i64::from(final_series_rounds(number_of_pools).ok()?);
        // elimination days, counted in half days
        let elimination_halves = (2 * elimination_rounds + per_day - 1) / per_day;
        let total_rounds = preliminary_rounds + elimination_rounds;

        // preliminary_rounds / max_per_day > days_available - elimination_days
        if 2 * preliminary_rounds > per_day * (2 * days - elimination_halves) {
            warn!(
                "Too many games ({}) to be played before the finals with {} pools.",
                preliminary_rounds, number_of_pools
            );
            continue;
        }

        // total_rounds / max_per_day <= days_available
        if total_rounds <= days * per_day {
            return Some(number_of_pools);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// An entrant tagged with its seeding rank. Equality and ordering consider
/// the rank only.
#[derive(Debug, Clone)]
struct Seed<T> {
    order: usize,
    value: T,
}

impl<T> PartialEq for Seed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl<T> Eq for Seed<T> {}

impl<T> PartialOrd for Seed<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Seed<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order.cmp(&other.order)
    }
}

/// A labelled draw format produced for a planned tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawFormatEntry {
    pub label: String,
    pub format: String,
}

/// Result of `seeded_tournament`.
#[derive(Debug, Clone, Serialize)]
pub struct SeededTournament<T> {
    pub pools: Vec<Vec<T>>,
    pub draw_formats: Vec<DrawFormatEntry>,
}

/// Distribute seeded entrants into pools and produce the draw formats needed
/// to play the tournament.
///
/// Entrants are dealt in a serpentine pattern so each pool gets a balanced
/// spread of seeds: with 2 pools, pool 1 receives seeds 1, 4, 5, 8 and pool 2
/// seeds 2, 3, 6, 7.
pub fn seeded_tournament<T: Clone>(
    seeded_team_list: &[T],
    days_available: u32,
    max_per_day: u32,
    min_per_day: u32,
) -> Result<SeededTournament<T>, DrawError> {
    let number_of_teams =
        u32::try_from(seeded_team_list.len()).map_err(|_| DrawError::IncompatibleConstraints)?;
    let number_of_pools = optimum_tournament_pool_count(
        number_of_teams,
        days_available,
        max_per_day,
        min_per_day,
    )
    .ok_or(DrawError::IncompatibleConstraints)?;

    let seeds: Vec<Seed<T>> = seeded_team_list
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, value)| Seed {
            order: i + 1,
            value,
        })
        .collect();

    // Deal each row of `number_of_pools` seeds across the pools, reversing
    // direction on alternate rows.
    let width = number_of_pools as usize;
    let mut columns: Vec<Vec<Option<Seed<T>>>> = vec![Vec::new(); width];
    for (i, group) in grouper(&seeds, width).into_iter().enumerate() {
        let row: Vec<Option<Seed<T>>> = if i % 2 == 1 {
            group
        } else {
            group.into_iter().rev().collect()
        };
        for (column, slot) in columns.iter_mut().zip(row) {
            column.push(slot);
        }
    }

    let mut columns: Vec<Vec<Seed<T>>> = columns
        .into_iter()
        .map(|column| column.into_iter().flatten().collect())
        .collect();
    // Pool 1 is the one holding the top seed.
    columns.sort_by(|a: &Vec<Seed<T>>, b: &Vec<Seed<T>>| match (a.first(), b.first()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut sizes: Vec<u32> = columns
        .iter()
        .filter(|pool| !pool.is_empty())
        .map(|pool| ceiling(pool.len() as u32, 2))
        .collect();
    sizes.sort_unstable();
    sizes.dedup();

    let mut draw_formats: Vec<DrawFormatEntry> = sizes
        .into_iter()
        .map(|size| DrawFormatEntry {
            label: format!("Round Robin ({}/{} teams)", size - 1, size),
            format: round_robin_format(size, None),
        })
        .collect();

    let finals = single_elimination_final_format(number_of_pools, Some(BRONZE_MEDAL))?;
    draw_formats.push(DrawFormatEntry {
        label: format!("Final Series ({number_of_pools} pools)"),
        format: DrawFormat::from(finals).to_string(),
    });

    let pools = columns
        .into_iter()
        .map(|pool| pool.into_iter().map(|seed| seed.value).collect())
        .collect();

    Ok(SeededTournament {
        pools,
        draw_formats,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
