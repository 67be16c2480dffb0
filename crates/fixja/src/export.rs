// CSV export of generated draws.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use fixja_draw::generator::MatchCollection;
use fixja_draw::model::Division;

/// One exported match. Column order follows field order.
#[derive(Debug, Serialize)]
struct MatchRow {
    stage: String,
    pool: String,
    round: u32,
    match_id: u32,
    date: String,
    label: String,
    home: String,
    away: String,
    bye: bool,
}

/// Write every match of `division` to `writer` as CSV with a header row.
/// Returns the number of matches written.
pub fn write_matches<W: Write>(
    writer: W,
    division: &Division,
    matches: &MatchCollection,
) -> Result<usize> {
    let mut out = csv::Writer::from_writer(writer);
    let mut count = 0;

    for draft in matches {
        let stage = division.stage(draft.stage);
        let pool = draft
            .stage_group
            .and_then(|id| stage.and_then(|s| s.pool(id)))
            .map(|p| p.title.clone())
            .unwrap_or_default();

        out.serialize(MatchRow {
            stage: stage.map(|s| s.title.clone()).unwrap_or_default(),
            pool,
            round: draft.round,
            match_id: draft.match_id,
            date: draft.date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            label: draft.label.clone().unwrap_or_default(),
            home: draft.home_title(division, matches),
            away: draft.away_title(division, matches),
            bye: draft.is_bye,
        })
        .context("failed to write match row")?;
        count += 1;
    }

    out.flush().context("failed to flush CSV output")?;
    Ok(count)
}

/// Export to `<dir>/<division title>.csv`, creating `dir` if needed.
pub fn export_to_file(dir: &Path, division: &Division, matches: &MatchCollection) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create export directory {}", dir.display()))?;

    let path = dir.join(format!("{}.csv", file_stem(&division.title)));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let count = write_matches(file, division, matches)?;

    info!("Exported {} matches to {}", count, path.display());
    Ok(path)
}

fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if stem.is_empty() {
        "division".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{FixedOffset, NaiveDate};
    use fixja_draw::builder::build;
    use fixja_draw::model::{Season, SeasonMode};
    use fixja_draw::schema::DivisionStructure;

    fn built() -> fixja_draw::builder::BuiltDivision {
        let season = Season {
            title: "Summer".into(),
            mode: SeasonMode::Weekly,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            timezone: FixedOffset::east_opt(0).unwrap(),
            exclusions: Vec::new(),
        };
        let structure = DivisionStructure::from_json(
            r#"{
                "title": "Mixed Open",
                "teams": ["Ayr", "Brora", "Clyde"],
                "draw_formats": {"rr": "ROUND\n1: 1 vs 2\n2: 3 vs 4\nROUND\n3: 1 vs 3\nROUND\n4: 2 vs 3"},
                "stages": [{"title": "Round Robin", "draw_format_ref": "rr"}]
            }"#,
        )
        .unwrap();
        build(&season, &structure).unwrap()
    }

    #[test]
    fn writes_header_and_one_row_per_match() {
        let built = built();
        let mut out = Vec::new();
        let count = write_matches(&mut out, &built.division, &built.matches).unwrap();
        assert_eq!(count, 4);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "stage,pool,round,match_id,date,label,home,away,bye"
        );
        assert_eq!(lines[1], "Round Robin,,1,1,,,Ayr,Brora,false");
        assert_eq!(lines[2], "Round Robin,,1,2,,,Clyde,Bye,true");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn export_to_file_uses_division_title() {
        let built = built();
        let dir = std::env::temp_dir().join("fixja_export_test");
        let _ = std::fs::remove_dir_all(&dir);

        let path = export_to_file(&dir, &built.division, &built.matches).unwrap();
        assert!(path.ends_with("mixed_open.csv"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_stem_replaces_punctuation() {
        assert_eq!(file_stem("Men's Open"), "men_s_open");
        assert_eq!(file_stem(""), "division");
    }
}
