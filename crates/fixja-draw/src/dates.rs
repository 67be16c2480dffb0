// Date strategies for successive rounds of a draw.
//
// Weekly seasons get one date per week, tournaments get `games_per_day`
// consecutive slots on each playing day. Both skip the season's and the
// division's exclusion dates and yield midnight in the season's timezone.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveTime};
use tracing::debug;

use crate::model::{Division, Season, SeasonMode};

/// A stream of dates, one per generated round. `None` leaves the round
/// undated.
pub type DateSource = Box<dyn Iterator<Item = Option<DateTime<FixedOffset>>>>;

/// Localize `date` at midnight in `timezone`. `None` when the UTC instant
/// falls outside the representable range.
pub fn coerce_datetime(date: NaiveDate, timezone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local.checked_sub_signed(Duration::seconds(i64::from(timezone.local_minus_utc())))?;
    Some(DateTime::from_naive_utc_and_offset(utc, timezone))
}

fn exclusions(season: &Season, division: &Division) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    for &exclusion in &season.exclusions {
        debug!("EXCLUSION ({}) {}", season.title, exclusion);
        dates.insert(exclusion);
    }
    for &exclusion in &division.exclusions {
        debug!("EXCLUSION ({}) {}", division.title, exclusion);
        dates.insert(exclusion);
    }
    dates
}

/// Every `step` days from `start`, minus the excluded days.
fn every(
    start: NaiveDate,
    step: u64,
    excluded: BTreeSet<NaiveDate>,
) -> impl Iterator<Item = NaiveDate> {
    (0u64..)
        .map_while(move |n| start.checked_add_days(Days::new(n * step)))
        .filter(move |date| !excluded.contains(date))
}

/// One date per week from `start`.
pub fn weekly_date_generator(
    season: &Season,
    division: &Division,
    start: NaiveDate,
) -> impl Iterator<Item = DateTime<FixedOffset>> {
    debug!(division = %division.title, %start, "weekly date generator");
    let timezone = season.timezone;
    every(start, 7, exclusions(season, division))
        .map_while(move |date| coerce_datetime(date, timezone))
}

/// Each playing day from `start`, repeated `games_per_day` times.
///
/// `games_per_day` falls back to the division default and then to 1.
pub fn tournament_date_generator(
    season: &Season,
    division: &Division,
    start: NaiveDate,
    games_per_day: Option<u32>,
) -> impl Iterator<Item = DateTime<FixedOffset>> {
    let games_per_day = games_per_day
        .or(division.games_per_day)
        .unwrap_or(1)
        .max(1) as usize;
    debug!(
        division = %division.title,
        %start,
        games_per_day,
        "tournament date generator"
    );
    let timezone = season.timezone;
    every(start, 1, exclusions(season, division))
        .map_while(move |date| coerce_datetime(date, timezone))
        .flat_map(move |dt| std::iter::repeat(dt).take(games_per_day))
}

/// Leaves every round undated.
pub fn no_dates() -> DateSource {
    Box::new(std::iter::repeat(None))
}

/// First date available to a draw that follows one last played on `last`.
pub fn following_start(mode: SeasonMode, last: NaiveDate) -> NaiveDate {
    let step = match mode {
        SeasonMode::Weekly => 7,
        SeasonMode::Daily => 1,
        SeasonMode::Unscheduled => 0,
    };
    last.checked_add_days(Days::new(step)).unwrap_or(last)
}

/// The strategy the season's mode selects.
pub fn date_source_for(season: &Season, division: &Division, start: NaiveDate) -> DateSource {
    match season.mode {
        SeasonMode::Weekly => Box::new(weekly_date_generator(season, division, start).map(Some)),
        SeasonMode::Daily => {
            Box::new(tournament_date_generator(season, division, start, None).map(Some))
        }
        SeasonMode::Unscheduled => no_dates(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn season(mode: SeasonMode) -> Season {
        Season {
            title: "2015".into(),
            mode,
            start_date: date(2015, 3, 30),
            timezone: FixedOffset::east_opt(10 * 3600).unwrap(),
            exclusions: Vec::new(),
        }
    }

    #[test]
    fn coerce_keeps_local_midnight() {
        let tz = FixedOffset::east_opt(10 * 3600).unwrap();
        let dt = coerce_datetime(date(2015, 3, 30), tz).unwrap();
        assert_eq!(dt.date_naive(), date(2015, 3, 30));
        assert_eq!(dt.time(), NaiveTime::MIN);
        assert_eq!(dt.offset(), &tz);
        assert_eq!(dt.to_rfc3339(), "2015-03-30T00:00:00+10:00");
    }

    #[test]
    fn coerce_out_of_range_is_none() {
        let east = FixedOffset::east_opt(10 * 3600).unwrap();
        assert_eq!(coerce_datetime(NaiveDate::MIN, east), None);

        let west = FixedOffset::west_opt(10 * 3600).unwrap();
        let dt = coerce_datetime(NaiveDate::MAX, west).unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::MAX);
    }

    #[test]
    fn weekly_stops_at_the_end_of_the_calendar() {
        let season = season(SeasonMode::Weekly);
        let division = Division::new("Open");
        let start = NaiveDate::MAX.checked_sub_days(Days::new(14)).unwrap();

        let dates: Vec<_> = weekly_date_generator(&season, &division, start).collect();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[2].date_naive(), NaiveDate::MAX);
    }

    #[test]
    fn weekly_skips_season_exclusion() {
        let mut season = season(SeasonMode::Weekly);
        season.exclusions.push(date(2015, 4, 6));
        let division = Division::new("Open");

        let dates: Vec<NaiveDate> = weekly_date_generator(&season, &division, date(2015, 3, 30))
            .take(5)
            .map(|dt| dt.date_naive())
            .collect();
        assert_eq!(
            dates,
            vec![
                date(2015, 3, 30),
                date(2015, 4, 13),
                date(2015, 4, 20),
                date(2015, 4, 27),
                date(2015, 5, 4),
            ]
        );
    }

    #[test]
    fn weekly_skips_division_exclusion() {
        let season = season(SeasonMode::Weekly);
        let mut division = Division::new("Open");
        division.exclusions.push(date(2015, 4, 13));

        let dates: Vec<NaiveDate> = weekly_date_generator(&season, &division, date(2015, 3, 30))
            .take(3)
            .map(|dt| dt.date_naive())
            .collect();
        assert_eq!(dates, vec![date(2015, 3, 30), date(2015, 4, 6), date(2015, 4, 20)]);
    }

    #[test]
    fn tournament_repeats_each_day() {
        let mut season = season(SeasonMode::Daily);
        season.exclusions.push(date(2015, 3, 31));
        let division = Division::new("Open");

        let dates: Vec<NaiveDate> =
            tournament_date_generator(&season, &division, date(2015, 3, 30), Some(2))
                .take(5)
                .map(|dt| dt.date_naive())
                .collect();
        assert_eq!(
            dates,
            vec![
                date(2015, 3, 30),
                date(2015, 3, 30),
                date(2015, 4, 1),
                date(2015, 4, 1),
                date(2015, 4, 2),
            ]
        );
    }

    #[test]
    fn tournament_uses_division_default() {
        let season = season(SeasonMode::Daily);
        let mut division = Division::new("Open");
        division.games_per_day = Some(3);

        let dates: Vec<NaiveDate> =
            tournament_date_generator(&season, &division, date(2015, 3, 30), None)
                .take(4)
                .map(|dt| dt.date_naive())
                .collect();
        assert_eq!(
            dates,
            vec![date(2015, 3, 30), date(2015, 3, 30), date(2015, 3, 30), date(2015, 3, 31)]
        );
    }

    #[test]
    fn tournament_zero_games_per_day_falls_back_to_one() {
        let season = season(SeasonMode::Daily);
        let division = Division::new("Open");
        let dates: Vec<_> = tournament_date_generator(&season, &division, date(2015, 3, 30), Some(0))
            .take(2)
            .collect();
        assert_ne!(dates[0], dates[1]);
    }

    #[test]
    fn following_start_steps_by_mode() {
        assert_eq!(following_start(SeasonMode::Weekly, date(2015, 3, 30)), date(2015, 4, 6));
        assert_eq!(following_start(SeasonMode::Daily, date(2015, 3, 30)), date(2015, 3, 31));
        assert_eq!(following_start(SeasonMode::Daily, NaiveDate::MAX), NaiveDate::MAX);
    }

    #[test]
    fn unscheduled_season_yields_no_dates() {
        let season = season(SeasonMode::Unscheduled);
        let division = Division::new("Open");
        let mut source = date_source_for(&season, &division, season.start_date);
        assert_eq!(source.next(), Some(None));
        assert_eq!(source.next(), Some(None));
    }
}
