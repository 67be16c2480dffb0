// Match generation: turn a parsed draw format into match drafts for a stage
// or pool, resolving team references along the way.
//
// Generation is pure. Drafts accumulate in a `MatchCollection` and are only
// handed to persistence by `MatchCollection::save`.

use std::collections::HashMap;
use std::convert::Infallible;

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{debug, warn};

use crate::dates::{date_source_for, DateSource};
use crate::error::DrawError;
use crate::format::{win_loss, DrawFormat, RoundDescriptor, WinLoss};
use crate::model::{
    Division, Entrant, Season, Stage, StageGroup, StageGroupId, StageId, TeamId, UndecidedTeamId,
};

// ---------------------------------------------------------------------------
// Draw targets
// ---------------------------------------------------------------------------

/// What a generator needs to know about the stage or pool it is drawing.
pub trait DrawContext {
    fn season(&self) -> &Season;
    fn division(&self) -> &Division;
    fn stage(&self) -> &Stage;
    fn pool(&self) -> Option<&StageGroup>;

    fn title(&self) -> String {
        match self.pool() {
            Some(pool) => format!("{} / {}", self.stage().title, pool.title),
            None => self.stage().title.clone(),
        }
    }

    /// Entrants addressed by 1-based index in the draw format. The first
    /// stage draws from real teams; later stages draw from their undecided
    /// placeholders.
    fn entrants(&self) -> Vec<Entrant> {
        let stage = self.stage();
        if stage.order > 1 {
            return match self.pool() {
                Some(pool) => stage
                    .undecided_for_pool(pool.id)
                    .map(|u| Entrant::Undecided(u.id))
                    .collect(),
                None => stage
                    .undecided_teams
                    .iter()
                    .map(|u| Entrant::Undecided(u.id))
                    .collect(),
            };
        }
        match self.pool() {
            Some(pool) => pool.teams.iter().copied().map(Entrant::Team).collect(),
            None => {
                let mut teams: Vec<_> = self.division().teams.iter().collect();
                teams.sort_by_key(|t| t.order);
                teams.into_iter().map(|t| Entrant::Team(t.id)).collect()
            }
        }
    }

    /// Round number the next generated round starts at: one past the last
    /// round of the stage this one comes after.
    fn initial_round(&self) -> u32 {
        self.stage()
            .comes_after(self.division())
            .and_then(|previous| previous.last_round)
            .map_or(1, |round| round + 1)
    }

    fn scope(&self) -> (StageId, Option<StageGroupId>) {
        (self.stage().id, self.pool().map(|p| p.id))
    }
}

/// A stage, or one pool of a stage, within its division and season.
#[derive(Debug, Clone, Copy)]
pub struct DrawTarget<'a> {
    pub season: &'a Season,
    pub division: &'a Division,
    pub stage: &'a Stage,
    pub pool: Option<&'a StageGroup>,
}

impl<'a> DrawTarget<'a> {
    pub fn for_stage(season: &'a Season, division: &'a Division, stage: &'a Stage) -> Self {
        DrawTarget {
            season,
            division,
            stage,
            pool: None,
        }
    }

    pub fn for_pool(
        season: &'a Season,
        division: &'a Division,
        stage: &'a Stage,
        pool: &'a StageGroup,
    ) -> Self {
        DrawTarget {
            season,
            division,
            stage,
            pool: Some(pool),
        }
    }
}

impl DrawContext for DrawTarget<'_> {
    fn season(&self) -> &Season {
        self.season
    }

    fn division(&self) -> &Division {
        self.division
    }

    fn stage(&self) -> &Stage {
        self.stage
    }

    fn pool(&self) -> Option<&StageGroup> {
        self.pool
    }
}

// ---------------------------------------------------------------------------
// Match drafts
// ---------------------------------------------------------------------------

/// Natural key of a generated match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchRef {
    pub stage: StageId,
    pub stage_group: Option<StageGroupId>,
    pub round: u32,
    pub match_id: u32,
}

/// One side of a generated match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchSide {
    Bye,
    Team(TeamId),
    Undecided(UndecidedTeamId),
    /// A reference that cannot be resolved yet, e.g. `G1P2`.
    Unresolved(String),
    /// Winner or loser of another match in the same run.
    PendingWinLoss { result: WinLoss, target: MatchRef },
}

impl MatchSide {
    fn from_entrant(entrant: Entrant) -> Self {
        match entrant {
            Entrant::Team(id) => MatchSide::Team(id),
            Entrant::Undecided(id) => MatchSide::Undecided(id),
        }
    }

    pub fn is_bye(&self) -> bool {
        matches!(self, MatchSide::Bye)
    }

    /// The symbolic text stored for sides without a team: the raw reference,
    /// or the bare `W`/`L` of a win/loss reference.
    pub fn eval(&self) -> Option<&str> {
        match self {
            MatchSide::Unresolved(formula) => Some(formula.as_str()),
            MatchSide::PendingWinLoss { result, .. } => Some(result.letter()),
            _ => None,
        }
    }

    pub fn target(&self) -> Option<MatchRef> {
        match self {
            MatchSide::PendingWinLoss { target, .. } => Some(*target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchDraft {
    pub stage: StageId,
    pub stage_group: Option<StageGroupId>,
    pub match_id: u32,
    pub round: u32,
    pub date: Option<DateTime<FixedOffset>>,
    pub label: Option<String>,
    pub is_bye: bool,
    pub include_in_ladder: bool,
    pub home: MatchSide,
    pub away: MatchSide,
}

impl MatchDraft {
    pub fn key(&self) -> MatchRef {
        MatchRef {
            stage: self.stage,
            stage_group: self.stage_group,
            round: self.round,
            match_id: self.match_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Collections and persistence
// ---------------------------------------------------------------------------

/// Keys already assigned by a sink to the targets of a draft's win/loss
/// references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedKeys<K> {
    pub home: Option<K>,
    pub away: Option<K>,
}

/// Receives match drafts when a collection is saved.
pub trait MatchSink {
    type Key: Clone;
    type Error;

    fn save(
        &mut self,
        draft: &MatchDraft,
        related: RelatedKeys<Self::Key>,
    ) -> Result<Self::Key, Self::Error>;
}

/// Keeps saved drafts in memory; keys are positions in `saved`.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<(MatchDraft, RelatedKeys<usize>)>,
}

impl MatchSink for MemorySink {
    type Key = usize;
    type Error = Infallible;

    fn save(
        &mut self,
        draft: &MatchDraft,
        related: RelatedKeys<usize>,
    ) -> Result<usize, Infallible> {
        self.saved.push((draft.clone(), related));
        Ok(self.saved.len() - 1)
    }
}

/// Ordered accumulator of generated matches, indexed by format match id.
#[derive(Debug, Clone, Default)]
pub struct MatchCollection {
    matches: Vec<MatchDraft>,
    by_id: HashMap<u32, Vec<usize>>,
}

impl MatchCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, draft: MatchDraft) {
        self.by_id
            .entry(draft.match_id)
            .or_default()
            .push(self.matches.len());
        self.matches.push(draft);
    }

    /// Every match generated with format id `match_id`, oldest first.
    pub fn get(&self, match_id: u32) -> Vec<&MatchDraft> {
        self.by_id
            .get(&match_id)
            .map(|indices| indices.iter().map(|&i| &self.matches[i]).collect())
            .unwrap_or_default()
    }

    /// The most recently added match with format id `match_id`.
    pub fn get_latest(&self, match_id: u32) -> Option<&MatchDraft> {
        self.by_id
            .get(&match_id)
            .and_then(|indices| indices.last())
            .map(|&i| &self.matches[i])
    }

    pub fn find(&self, key: &MatchRef) -> Option<&MatchDraft> {
        self.matches.iter().find(|m| m.key() == *key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchDraft> {
        self.matches.iter()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Append `other`, then order everything by date with undated matches
    /// first. The sort is stable.
    pub fn extend_from(&mut self, other: MatchCollection) {
        let mut matches = std::mem::take(&mut self.matches);
        matches.extend(other.matches);
        matches.sort_by_key(|m| m.date);

        self.by_id.clear();
        for draft in matches {
            self.add(draft);
        }
    }

    /// Hand every draft to `sink` in order. Win/loss references are passed
    /// the key the sink returned for their target. A target that is not in
    /// this collection, or comes after the referring match, is passed as
    /// `None` and logged.
    pub fn save<S: MatchSink>(&self, sink: &mut S) -> Result<Vec<S::Key>, S::Error> {
        let mut saved: HashMap<MatchRef, S::Key> = HashMap::new();
        let mut keys = Vec::with_capacity(self.matches.len());

        for draft in &self.matches {
            let related = RelatedKeys {
                home: related_key(&saved, draft, &draft.home),
                away: related_key(&saved, draft, &draft.away),
            };
            let key = sink.save(draft, related)?;
            saved.insert(draft.key(), key.clone());
            keys.push(key);
        }

        Ok(keys)
    }
}

fn related_key<K: Clone>(
    saved: &HashMap<MatchRef, K>,
    draft: &MatchDraft,
    side: &MatchSide,
) -> Option<K> {
    let target = side.target()?;
    let key = saved.get(&target).cloned();
    if key.is_none() {
        warn!(
            round = draft.round,
            match_id = draft.match_id,
            ?target,
            "win/loss target has not been saved; related match left empty"
        );
    }
    key
}

impl<'a> IntoIterator for &'a MatchCollection {
    type Item = &'a MatchDraft;
    type IntoIter = std::slice::Iter<'a, MatchDraft>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Result of looking up a team reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamLookup {
    Entrant(Entrant),
    /// Numeric reference with no entrant behind it.
    Bye,
    /// Anything that is not a plain index.
    Symbol(String),
}

pub struct DrawGenerator<C> {
    context: C,
    teams: Vec<Entrant>,
    rounds: Vec<RoundDescriptor>,
    start_date: Option<NaiveDate>,
}

impl<C: DrawContext> DrawGenerator<C> {
    pub fn new(context: C, start_date: Option<NaiveDate>) -> Self {
        let teams = context.entrants();
        DrawGenerator {
            context,
            teams,
            rounds: Vec::new(),
            start_date,
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn teams(&self) -> &[Entrant] {
        &self.teams
    }

    /// Replace the entrants addressed by numeric references.
    pub fn set_teams(&mut self, teams: Vec<Entrant>) {
        self.teams = teams;
    }

    pub fn rounds(&self) -> &[RoundDescriptor] {
        &self.rounds
    }

    pub fn team(&self, token: &str) -> TeamLookup {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return TeamLookup::Symbol(token.to_string());
        }
        token
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| self.teams.get(index))
            .map_or(TeamLookup::Bye, |&entrant| TeamLookup::Entrant(entrant))
    }

    /// Append the rounds of `text`. Unrecognised lines are ignored; use
    /// `DrawFormat::validate` first for user supplied text.
    pub fn parse(&mut self, text: &str) {
        self.rounds.extend(DrawFormat::parse(text).rounds);
    }

    fn side(&self, token: &str, generated: &MatchCollection) -> Result<MatchSide, DrawError> {
        match self.team(token) {
            TeamLookup::Entrant(entrant) => Ok(MatchSide::from_entrant(entrant)),
            TeamLookup::Bye => Ok(MatchSide::Bye),
            TeamLookup::Symbol(symbol) => match win_loss(&symbol) {
                Some((result, match_id)) => {
                    let target = generated
                        .get_latest(match_id)
                        .ok_or(DrawError::UnknownMatch(match_id))?;
                    Ok(MatchSide::PendingWinLoss {
                        result,
                        target: target.key(),
                    })
                }
                None => Ok(MatchSide::Unresolved(symbol)),
            },
        }
    }

    /// Generate `n` rounds (default: each parsed round once), cycling
    /// through the parsed rounds as often as needed.
    ///
    /// Round numbers start after the preceding stage's last round, shifted
    /// by `offset`. `dates` overrides the season's date strategy and yields
    /// one date per round.
    pub fn generate(
        &self,
        n: Option<usize>,
        offset: u32,
        dates: Option<DateSource>,
    ) -> Result<MatchCollection, DrawError> {
        let mut collection = MatchCollection::new();
        if self.rounds.is_empty() {
            return Ok(collection);
        }

        let context = &self.context;
        let mut dates = dates.unwrap_or_else(|| {
            let start = self.start_date.unwrap_or(context.season().start_date);
            date_source_for(context.season(), context.division(), start)
        });

        let (stage, stage_group) = context.scope();
        let include_in_ladder = context.stage().keep_ladder;
        let initial = context.initial_round() + offset;
        let count = n.unwrap_or(self.rounds.len());
        debug!(
            draw = %context.title(),
            rounds = count,
            initial,
            "generating draw"
        );

        for (i, descriptor) in self.rounds.iter().cycle().take(count).enumerate() {
            let round = initial + i as u32;
            let date = dates.next().flatten();
            debug!(round, ?date, "ROUND {}", descriptor.count);

            for md in &descriptor.matches {
                let home = self.side(&md.home_team, &collection)?;
                let away = self.side(&md.away_team, &collection)?;
                let is_bye = home.is_bye() || away.is_bye();

                collection.add(MatchDraft {
                    stage,
                    stage_group,
                    match_id: md.match_id,
                    round,
                    date,
                    label: md
                        .match_label
                        .clone()
                        .or_else(|| descriptor.round_label.clone()),
                    is_bye,
                    include_in_ladder,
                    home,
                    away,
                });
            }
        }

        Ok(collection)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::round_robin_format;
    use crate::dates::no_dates;
    use crate::model::{SeasonMode, Team, UndecidedTeam};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn season(mode: SeasonMode) -> Season {
        Season {
            title: "Summer".into(),
            mode,
            start_date: date(2015, 3, 30),
            timezone: FixedOffset::east_opt(0).unwrap(),
            exclusions: Vec::new(),
        }
    }

    fn division(teams: u32) -> Division {
        let mut division = Division::new("Open");
        division.teams = (1..=teams)
            .map(|i| Team {
                id: TeamId(100 + i),
                title: format!("Team {i}"),
                order: i,
            })
            .collect();
        division.stages = vec![Stage::new(StageId(1), "Round Robin", 1)];
        division
    }

    fn generate(
        season: &Season,
        division: &Division,
        format: &str,
        n: Option<usize>,
    ) -> Result<MatchCollection, DrawError> {
        let target = DrawTarget::for_stage(season, division, &division.stages[0]);
        let mut generator = DrawGenerator::new(target, None);
        generator.parse(format);
        generator.generate(n, 0, None)
    }

    #[test]
    fn round_robin_assigns_division_teams() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let matches = generate(&season, &division, &round_robin_format(4, None), None).unwrap();

        assert_eq!(matches.len(), 6);
        let first = matches.get_latest(1).unwrap();
        assert_eq!(first.round, 1);
        assert_eq!(first.home, MatchSide::Team(TeamId(101)));
        assert_eq!(first.away, MatchSide::Team(TeamId(104)));
        assert_eq!(first.date, None);
        assert_eq!(matches.get_latest(6).unwrap().round, 3);
    }

    #[test]
    fn generating_more_rounds_cycles_the_format() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let matches = generate(&season, &division, &round_robin_format(4, None), Some(4)).unwrap();

        assert_eq!(matches.len(), 8);
        let repeats = matches.get(1);
        assert_eq!(repeats.len(), 2);
        assert_eq!(repeats[1].round, 4);
        assert_eq!(repeats[0].home, repeats[1].home);
    }

    #[test]
    fn cycled_win_loss_binds_to_latest_match() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let format = "ROUND\n1: 1 vs 2\nROUND\n2: W1 vs 3";
        let matches = generate(&season, &division, format, Some(4)).unwrap();

        assert_eq!(matches.len(), 4);
        let firsts = matches.get(1);
        let seconds = matches.get(2);
        assert_eq!(seconds.len(), 2);
        let binding = |m: &MatchDraft| m.home.target().map(|t| (t.round, t.match_id));
        assert_eq!(binding(seconds[0]), Some((1, 1)));
        assert_eq!(seconds[0].home.target(), Some(firsts[0].key()));
        assert_eq!(binding(seconds[1]), Some((3, 1)));
        assert_eq!(seconds[1].home.target(), Some(firsts[1].key()));
        assert_eq!(seconds[1].round, 4);
    }

    #[test]
    fn win_loss_references_point_at_generated_matches() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let format = "ROUND\n1: 1 vs 2\n2: 3 vs 4\nROUND\n3: L1 vs L2 Bronze\n4: W1 vs W2 Final";
        let matches = generate(&season, &division, format, None).unwrap();

        let bronze = matches.get_latest(3).unwrap();
        let semi_1 = matches.get_latest(1).unwrap().key();
        let semi_2 = matches.get_latest(2).unwrap().key();
        assert_eq!(
            bronze.home,
            MatchSide::PendingWinLoss {
                result: WinLoss::Loss,
                target: semi_1
            }
        );
        assert_eq!(bronze.away.eval(), Some("L"));
        assert_eq!(bronze.away.target(), Some(semi_2));
        assert_eq!(bronze.label.as_deref(), Some("Bronze"));
        assert_eq!(bronze.round, 2);
    }

    #[test]
    fn reference_to_ungenerated_match_is_an_error() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let err = generate(&season, &division, "ROUND\n1: W2 vs 1\n2: 3 vs 4", None).unwrap_err();
        assert_eq!(err, DrawError::UnknownMatch(2));
    }

    #[test]
    fn missing_entrants_become_byes() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(3);
        let matches = generate(&season, &division, &round_robin_format(3, None), None).unwrap();

        assert_eq!(matches.len(), 6);
        let byes: Vec<_> = matches.iter().filter(|m| m.is_bye).collect();
        assert_eq!(byes.len(), 3);
        assert_eq!(byes[0].away, MatchSide::Bye);
        assert_eq!(byes[0].home, MatchSide::Team(TeamId(101)));
    }

    #[test]
    fn team_lookup_classifies_tokens() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(2);
        let target = DrawTarget::for_stage(&season, &division, &division.stages[0]);
        let generator = DrawGenerator::new(target, None);

        assert_eq!(generator.team("2"), TeamLookup::Entrant(Entrant::Team(TeamId(102))));
        assert_eq!(generator.team("3"), TeamLookup::Bye);
        assert_eq!(generator.team("0"), TeamLookup::Bye);
        assert_eq!(generator.team("G1P1"), TeamLookup::Symbol("G1P1".into()));
    }

    #[test]
    fn positional_references_stay_unresolved() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let matches = generate(&season, &division, "ROUND Final\n1: G1P1 vs G2P1", None).unwrap();
        let fin = matches.get_latest(1).unwrap();
        assert_eq!(fin.home, MatchSide::Unresolved("G1P1".into()));
        assert_eq!(fin.home.eval(), Some("G1P1"));
        assert_eq!(fin.label.as_deref(), Some("Final"));
    }

    #[test]
    fn later_stages_continue_round_numbers() {
        let season = season(SeasonMode::Unscheduled);
        let mut division = division(4);
        division.stages[0].last_round = Some(3);
        let mut finals = Stage::new(StageId(2), "Finals", 2);
        finals.keep_ladder = false;
        finals.undecided_teams = (1..=4)
            .map(|i| UndecidedTeam {
                id: UndecidedTeamId(i),
                formula: format!("P{i}"),
                label: String::new(),
                stage_group: None,
            })
            .collect();
        division.stages.push(finals);

        let target = DrawTarget::for_stage(&season, &division, &division.stages[1]);
        let mut generator = DrawGenerator::new(target, None);
        generator.parse("ROUND\n1: 1 vs 4\n2: 2 vs 3\nROUND\n3: W1 vs W2");

        let matches = generator.generate(None, 0, None).unwrap();
        let semi = matches.get_latest(1).unwrap();
        assert_eq!(semi.round, 4);
        assert_eq!(semi.home, MatchSide::Undecided(UndecidedTeamId(1)));
        assert!(!semi.include_in_ladder);
        assert_eq!(matches.get_latest(3).unwrap().round, 5);

        let shifted = generator.generate(None, 2, None).unwrap();
        assert_eq!(shifted.get_latest(1).unwrap().round, 6);
    }

    #[test]
    fn pool_targets_use_pool_teams() {
        let season = season(SeasonMode::Unscheduled);
        let mut division = division(4);
        division.stages[0].pools = vec![StageGroup {
            id: StageGroupId(7),
            title: "Pool B".into(),
            order: 2,
            teams: vec![TeamId(104), TeamId(102)],
        }];
        let stage = &division.stages[0];
        let target = DrawTarget::for_pool(&season, &division, stage, &stage.pools[0]);
        let mut generator = DrawGenerator::new(target, None);
        generator.parse("ROUND\n1: 1 vs 2");

        let matches = generator.generate(None, 0, None).unwrap();
        let m = matches.get_latest(1).unwrap();
        assert_eq!(m.stage_group, Some(StageGroupId(7)));
        assert_eq!(m.home, MatchSide::Team(TeamId(104)));
    }

    #[test]
    fn weekly_season_dates_each_round() {
        let season = season(SeasonMode::Weekly);
        let division = division(4);
        let matches = generate(&season, &division, &round_robin_format(4, None), None).unwrap();

        let days: Vec<NaiveDate> = matches
            .iter()
            .filter_map(|m| m.date.map(|d| d.date_naive()))
            .collect();
        assert_eq!(
            days,
            vec![
                date(2015, 3, 30),
                date(2015, 3, 30),
                date(2015, 4, 6),
                date(2015, 4, 6),
                date(2015, 4, 13),
                date(2015, 4, 13),
            ]
        );
    }

    #[test]
    fn custom_date_source_overrides_season_mode() {
        let season = season(SeasonMode::Weekly);
        let division = division(4);
        let target = DrawTarget::for_stage(&season, &division, &division.stages[0]);
        let mut generator = DrawGenerator::new(target, None);
        generator.parse(&round_robin_format(4, None));

        let matches = generator.generate(None, 0, Some(no_dates())).unwrap();
        assert!(matches.iter().all(|m| m.date.is_none()));
    }

    #[test]
    fn set_teams_overrides_entrants() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let target = DrawTarget::for_stage(&season, &division, &division.stages[0]);
        let mut generator = DrawGenerator::new(target, None);
        generator.set_teams(vec![Entrant::Team(TeamId(103)), Entrant::Team(TeamId(101))]);
        generator.parse("ROUND\n1: 1 vs 2");

        let matches = generator.generate(None, 0, None).unwrap();
        assert_eq!(matches.get_latest(1).unwrap().home, MatchSide::Team(TeamId(103)));
    }

    #[test]
    fn save_passes_related_keys() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let format = "ROUND\n1: 1 vs 2\n2: 3 vs 4\nROUND\n3: W1 vs W2";
        let matches = generate(&season, &division, format, None).unwrap();

        let mut sink = MemorySink::default();
        let keys = matches.save(&mut sink).unwrap();
        assert_eq!(keys, vec![0, 1, 2]);

        let (_, related) = &sink.saved[2];
        assert_eq!(
            related,
            &RelatedKeys {
                home: Some(0),
                away: Some(1)
            }
        );
        assert_eq!(sink.saved[0].1, RelatedKeys { home: None, away: None });
    }

    #[test]
    fn save_leaves_missing_targets_empty() {
        let season = season(SeasonMode::Unscheduled);
        let division = division(4);
        let format = "ROUND\n1: 1 vs 2\n2: 3 vs 4\nROUND\n3: W1 vs L2";
        let matches = generate(&season, &division, format, None).unwrap();

        let mut final_only = MatchCollection::new();
        final_only.add(matches.get_latest(3).unwrap().clone());

        let mut sink = MemorySink::default();
        final_only.save(&mut sink).unwrap();
        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.saved[0].1, RelatedKeys { home: None, away: None });
        assert_eq!(sink.saved[0].0.home.eval(), Some("W"));
    }

    #[test]
    fn extend_from_orders_by_date() {
        let season = season(SeasonMode::Weekly);
        let division = division(4);
        let mut weekly = generate(&season, &division, &round_robin_format(4, None), None).unwrap();
        let undated = {
            let target = DrawTarget::for_stage(&season, &division, &division.stages[0]);
            let mut generator = DrawGenerator::new(target, None);
            generator.parse("ROUND\n9: 1 vs 2");
            generator.generate(None, 0, Some(no_dates())).unwrap()
        };

        weekly.extend_from(undated);
        assert_eq!(weekly.len(), 7);
        assert_eq!(weekly.iter().next().map(|m| m.match_id), Some(9));
        assert_eq!(weekly.get_latest(9).unwrap().date, None);
        assert!(weekly.get_latest(1).unwrap().date.is_some());
    }
}
