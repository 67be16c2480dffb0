// Draw format language: parsing, validation and rendering.
//
// A draw format is a sequence of round blocks:
//
//     ROUND [label]
//     <id>: <home> vs <away> [label]
//
// Team references are 1-based indices (`3`), pool or stage positions
// (`P1`, `G2P1`, `S1G2P3`), or the winner/loser of an earlier match (`W1`,
// `L2`).

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::DrawError;

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

const TEAM_TOKEN: &str = r"(?:(?:S[0-9]+)?(?:(?:G[0-9]+)?P|[WL])|[PWL])?[0-9]+";

fn grammar() -> String {
    format!(
        r"(?x)
        (?P<round>ROUND(?:\x20+(?P<round_label>[0-9]+|[\S\x20]+))?)
        |
        (?:
            (?P<match_id>[0-9]+):\s*
            (?P<home>{TEAM_TOKEN})
            \s*vs\s*
            (?P<away>{TEAM_TOKEN})
            \x20*(?P<match_label>[\S\x20]+)?
        )"
    )
}

// Compiled once; the patterns are constants so construction cannot fail.
static DRAW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&grammar()).unwrap());
static DRAW_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^(?:{})", grammar())).unwrap());
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:S(?P<stage>[0-9]+))?(?:G(?P<group>[0-9]+))?P(?P<position>[0-9]+)$").unwrap()
});
static WIN_LOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<result>[WL])(?P<match_id>[0-9]+)").unwrap());

// ---------------------------------------------------------------------------
// Team tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WinLoss {
    Win,
    Loss,
}

impl WinLoss {
    pub fn letter(&self) -> &'static str {
        match self {
            WinLoss::Win => "W",
            WinLoss::Loss => "L",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WinLoss::Win => "Winner",
            WinLoss::Loss => "Loser",
        }
    }
}

/// A parsed team reference from a match line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamToken {
    /// 1-based index into the target's entrants.
    Index(usize),
    /// Finishing position, optionally qualified by stage and group.
    Position {
        stage: Option<usize>,
        group: Option<usize>,
        position: usize,
    },
    /// Winner or loser of the match with this id.
    Result { result: WinLoss, match_id: u32 },
}

impl TeamToken {
    /// Classify `token`. Returns `None` for text outside the reference
    /// grammar handled here (such as stage-qualified win/loss references).
    pub fn parse(token: &str) -> Option<Self> {
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            return token.parse().ok().map(TeamToken::Index);
        }
        if let Some(caps) = POSITION_RE.captures(token) {
            return Some(TeamToken::Position {
                stage: number(&caps, "stage"),
                group: number(&caps, "group"),
                position: number(&caps, "position")?,
            });
        }
        win_loss(token).map(|(result, match_id)| TeamToken::Result { result, match_id })
    }
}

/// Detect a `W<n>` / `L<n>` prefix.
pub fn win_loss(token: &str) -> Option<(WinLoss, u32)> {
    let caps = WIN_LOSE_RE.captures(token)?;
    let result = match &caps["result"] {
        "W" => WinLoss::Win,
        _ => WinLoss::Loss,
    };
    let match_id = caps["match_id"].parse().ok()?;
    Some((result, match_id))
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, name: &str) -> Option<T> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// One match line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDescriptor {
    pub match_id: u32,
    pub home_team: String,
    pub away_team: String,
    pub match_label: Option<String>,
}

impl MatchDescriptor {
    pub fn new(match_id: u32, home_team: impl Into<String>, away_team: impl Into<String>) -> Self {
        MatchDescriptor {
            match_id,
            home_team: home_team.into(),
            away_team: away_team.into(),
            match_label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.match_label = Some(label.into());
        self
    }
}

impl fmt::Display for MatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} vs {}", self.match_id, self.home_team, self.away_team)?;
        if let Some(label) = &self.match_label {
            write!(f, " {label}")?;
        }
        Ok(())
    }
}

/// One `ROUND` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundDescriptor {
    /// Sequential block number, starting at 1.
    pub count: u32,
    pub round_label: Option<String>,
    pub matches: Vec<MatchDescriptor>,
}

impl RoundDescriptor {
    pub fn new(count: u32, round_label: Option<String>) -> Self {
        RoundDescriptor {
            count,
            round_label,
            matches: Vec::new(),
        }
    }

    pub fn add(&mut self, descriptor: MatchDescriptor) {
        self.matches.push(descriptor);
    }
}

impl fmt::Display for RoundDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.round_label {
            Some(label) => write!(f, "ROUND {label}")?,
            None => write!(f, "ROUND")?,
        }
        for m in &self.matches {
            write!(f, "\n{m}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A parsed draw format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawFormat {
    pub rounds: Vec<RoundDescriptor>,
}

impl DrawFormat {
    /// Lenient parse: text that matches neither a round header nor a match
    /// line is skipped. Match lines appearing before any `ROUND` header open
    /// an unlabelled round.
    pub fn parse(text: &str) -> Self {
        let mut rounds: Vec<RoundDescriptor> = Vec::new();

        for caps in DRAW_RE.captures_iter(text) {
            if caps.name("round").is_some() {
                let label = caps
                    .name("round_label")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty());
                rounds.push(RoundDescriptor::new(rounds.len() as u32 + 1, label));
                continue;
            }

            let Some(match_id) = number::<u32>(&caps, "match_id") else {
                continue;
            };
            let descriptor = MatchDescriptor {
                match_id,
                home_team: caps["home"].to_string(),
                away_team: caps["away"].to_string(),
                match_label: caps
                    .name("match_label")
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
            };

            if rounds.is_empty() {
                rounds.push(RoundDescriptor::new(1, None));
            }
            if let Some(round) = rounds.last_mut() {
                round.add(descriptor);
            }
        }

        DrawFormat { rounds }
    }

    /// Strict, line-by-line check. Every line must start with a round header
    /// or a match line, and match ids must be unique and fit in a `u32`. All
    /// offending lines are reported together.
    pub fn validate(text: &str) -> Result<(), DrawError> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (idx, line) in text.lines().enumerate() {
            let Some(caps) = DRAW_LINE_RE.captures(line) else {
                errors.push(idx + 1);
                continue;
            };
            if let Some(match_id) = caps.name("match_id") {
                if match_id.as_str().parse::<u32>().is_err()
                    || !seen.insert(match_id.as_str().to_string())
                {
                    errors.push(idx + 1);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DrawError::InvalidFormat { lines: errors })
        }
    }

    pub fn match_count(&self) -> usize {
        self.rounds.iter().map(|r| r.matches.len()).sum()
    }
}

impl From<Vec<RoundDescriptor>> for DrawFormat {
    fn from(rounds: Vec<RoundDescriptor>) -> Self {
        DrawFormat { rounds }
    }
}

impl fmt::Display for DrawFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, round) in self.rounds.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{round}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KNOCKOUT: &str = "ROUND\n1: 1 vs 2 Semi 1\n2: 3 vs 4 Semi 2\nROUND\n3: L1 vs L2 Bronze\nROUND\n4: W1 vs W2 Final";

    #[test]
    fn parses_rounds_and_labels() {
        let format = DrawFormat::parse(KNOCKOUT);
        assert_eq!(format.rounds.len(), 3);
        assert_eq!(format.match_count(), 4);

        let first = &format.rounds[0];
        assert_eq!(first.count, 1);
        assert_eq!(first.round_label, None);
        assert_eq!(first.matches[0], MatchDescriptor::new(1, "1", "2").with_label("Semi 1"));
        assert_eq!(format.rounds[1].matches[0].home_team, "L1");
        assert_eq!(format.rounds[2].count, 3);
    }

    #[test]
    fn round_labels_are_captured() {
        let format = DrawFormat::parse("ROUND Semi Final\n1: P1 vs P4\nROUND 7\n2: W1 vs W2");
        assert_eq!(format.rounds[0].round_label.as_deref(), Some("Semi Final"));
        assert_eq!(format.rounds[1].round_label.as_deref(), Some("7"));
        // Numbering ignores the label.
        assert_eq!(format.rounds[1].count, 2);
    }

    #[test]
    fn pool_and_stage_tokens_parse() {
        let format = DrawFormat::parse("ROUND\n1: S1G2P3 vs G1P1 Crossover");
        let m = &format.rounds[0].matches[0];
        assert_eq!(m.home_team, "S1G2P3");
        assert_eq!(m.away_team, "G1P1");
        assert_eq!(m.match_label.as_deref(), Some("Crossover"));
    }

    #[test]
    fn parse_skips_garbage_silently() {
        let format = DrawFormat::parse("ROUND\n1: 1 vs 2\nthis is nonsense\n2: 3 versus 4\n3: 3 vs 4");
        assert_eq!(format.match_count(), 2);
        assert_eq!(format.rounds[0].matches[1].match_id, 3);
    }

    #[test]
    fn match_lines_before_round_open_implicit_round() {
        let format = DrawFormat::parse("1: 1 vs 2\n2: 3 vs 4");
        assert_eq!(format.rounds.len(), 1);
        assert_eq!(format.match_count(), 2);
    }

    #[test]
    fn validate_accepts_well_formed_text() {
        assert!(DrawFormat::validate(KNOCKOUT).is_ok());
    }

    #[test]
    fn validate_reports_all_bad_lines() {
        let text = "ROUND\n1: 1 vs 2\nrubbish\n2: 3 vs 4\nmore rubbish";
        let err = DrawFormat::validate(text).unwrap_err();
        assert_eq!(err, DrawError::InvalidFormat { lines: vec![3, 5] });
    }

    #[test]
    fn validate_flags_duplicate_ids() {
        let text = "ROUND\n1: 1 vs 2\n2: 3 vs 4\nROUND\n1: 1 vs 3";
        let err = DrawFormat::validate(text).unwrap_err();
        assert_eq!(err, DrawError::InvalidFormat { lines: vec![5] });
    }

    #[test]
    fn validate_flags_ids_parse_would_drop() {
        let text = "ROUND\n99999999999: 1 vs 2\n2: 3 vs 4";
        let err = DrawFormat::validate(text).unwrap_err();
        assert_eq!(err, DrawError::InvalidFormat { lines: vec![2] });
        assert_eq!(DrawFormat::parse(text).match_count(), 1);
    }

    #[test]
    fn display_round_trips() {
        let format = DrawFormat::parse(KNOCKOUT);
        assert_eq!(format.to_string(), KNOCKOUT);
        assert_eq!(DrawFormat::parse(&format.to_string()), format);
    }

    #[test]
    fn team_token_classification() {
        assert_eq!(TeamToken::parse("12"), Some(TeamToken::Index(12)));
        assert_eq!(
            TeamToken::parse("G2P1"),
            Some(TeamToken::Position {
                stage: None,
                group: Some(2),
                position: 1
            })
        );
        assert_eq!(
            TeamToken::parse("S1P4"),
            Some(TeamToken::Position {
                stage: Some(1),
                group: None,
                position: 4
            })
        );
        assert_eq!(
            TeamToken::parse("L3"),
            Some(TeamToken::Result {
                result: WinLoss::Loss,
                match_id: 3
            })
        );
        assert_eq!(TeamToken::parse("X9"), None);
    }
}
