use dcwc_data::{Character, CharacterRoster, Rarity};
use dcwc_state::{clamp_badge, clamp_rank, MatchCandidate, TextMatch};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Share of a name's characters that must show up in a line for a fuzzy hit
pub const DEFAULT_NAME_OVERLAP: f64 = 0.7;

fn rank_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:Rank|Level|Lvl|R)\s*(\d{1,2})").expect("valid rank regex"))
}

fn badge_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:Badge|B)\s*(\d{1,2})").expect("valid badge regex"))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})").expect("valid number regex"))
}

/// Finds known character names in recognized text
#[derive(Debug, Clone)]
pub struct TextMatcher {
    name_overlap: f64,
}

impl Default for TextMatcher {
    fn default() -> Self {
        Self {
            name_overlap: DEFAULT_NAME_OVERLAP,
        }
    }
}

impl TextMatcher {
    pub fn new(name_overlap: f64) -> Self {
        Self {
            name_overlap: name_overlap.clamp(0.0, 1.0),
        }
    }

    /// One match per character, highest confidence first.
    /// Within equal confidence, earlier lines (then roster order) come first.
    /// A line that names a character exactly yields no fuzzy matches.
    pub fn match_text(&self, text: &str, roster: &CharacterRoster) -> Vec<TextMatch> {
        let mut results: Vec<TextMatch> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let hits: Vec<(&Character, f64)> = roster
                .iter()
                .filter_map(|c| self.name_confidence(line, &c.name).map(|conf| (c, conf)))
                .collect();
            let has_exact = hits.iter().any(|(_, conf)| *conf >= 1.0);

            for (character, confidence) in hits {
                if has_exact && confidence < 1.0 {
                    debug!("Dropping fuzzy {} ({:.2}) on exact line {:?}", character.name, confidence, line);
                    continue;
                }
                if !seen.insert(character.id.clone()) {
                    continue;
                }

                let rank = extract_rank(line);
                let badge_level = extract_badge(line, character.rarity);
                debug!(
                    "Text match: {} in {:?} (confidence {:.2}, rank {:?}, badge {:?})",
                    character.name, line, confidence, rank, badge_level
                );

                results.push(TextMatch {
                    candidate: MatchCandidate::from_text(&character.id, confidence),
                    character_name: character.name.clone(),
                    rank,
                    badge_level,
                    line: line.to_string(),
                });
            }
        }

        results.sort_by(|a, b| b.candidate.confidence.total_cmp(&a.candidate.confidence));
        results
    }

    /// Confidence that `line` mentions `name`, or `None` when it does not.
    /// 1.0 for an exact (normalized) substring; otherwise the share of the
    /// name's characters found anywhere in the line.
    pub fn name_confidence(&self, line: &str, name: &str) -> Option<f64> {
        let line = normalize(line);
        let name = normalize(name);
        if name.is_empty() {
            return None;
        }
        if line.contains(&name) {
            return Some(1.0);
        }

        let len = name.chars().count();
        let threshold = (len as f64 * self.name_overlap) as usize;
        let matched = name.chars().filter(|c| line.contains(*c)).count();

        if matched >= threshold {
            Some(matched as f64 / len as f64)
        } else {
            None
        }
    }
}

/// Lower-case with `-`, `_` and spaces removed
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Rank from "Rank 10", "R10", "Lvl 3"...; falls back to the first 1-2 digit number
pub fn extract_rank(line: &str) -> Option<u8> {
    keyword_or_bare_number(line, rank_regex()).map(|n| clamp_rank(n as i64))
}

/// Badge from "Badge 25", "B25"...; falls back to the first 1-2 digit number
pub fn extract_badge(line: &str, rarity: Rarity) -> Option<u8> {
    keyword_or_bare_number(line, badge_regex()).map(|n| clamp_badge(n as i64, rarity))
}

fn keyword_or_bare_number(line: &str, keyword: &Regex) -> Option<u32> {
    keyword
        .captures(line)
        .or_else(|| number_regex().captures(line))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> CharacterRoster {
        CharacterRoster::from_characters(vec![
            Character::new("batman", "Batman", Rarity::Legendary),
            Character::new("superman", "Superman", Rarity::Legendary),
            Character::new("greenlantern", "Green Lantern", Rarity::Epic),
            Character::new("harleyquinn", "Harley Quinn", Rarity::Epic),
        ])
    }

    #[test]
    fn test_batman_rank_ten() {
        let matches = TextMatcher::default().match_text("Batman Rank 10", &roster());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate.character_id, "batman");
        assert_eq!(matches[0].candidate.confidence, 1.0);
        assert_eq!(matches[0].rank, Some(10));
        assert_eq!(matches[0].character_name, "Batman");
        assert_eq!(matches[0].line, "Batman Rank 10");
    }

    #[test]
    fn test_exact_name_hides_fuzzy_on_same_line() {
        let shipped = CharacterRoster::from_json(include_str!("../../../data/characters.json")).unwrap();
        // "aquaman" shares 5 of 7 letters with this line
        let matcher = TextMatcher::default();
        assert!(matcher.name_confidence("Batman Rank 10", "Aquaman").unwrap() > 0.7);

        let matches = matcher.match_text("Batman Rank 10", &shipped);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate.character_id, "batman");

        // On its own line the fuzzy hit still counts
        let matches = matcher.match_text("Batman Rank 10\nAquamn R4", &shipped);
        let aquaman = matches
            .iter()
            .find(|m| m.candidate.character_id == "aquaman")
            .unwrap();
        assert_eq!(aquaman.rank, Some(4));
        assert_eq!(aquaman.line, "Aquamn R4");
    }

    #[test]
    fn test_no_duplicate_ids() {
        let text = "Batman R5\nBATMAN rank 7\nbat-man\nSuperman";
        let matches = TextMatcher::default().match_text(text, &roster());
        let ids: Vec<&str> = matches.iter().map(|m| m.candidate.character_id.as_str()).collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len());

        // First occurrence wins
        let batman = matches.iter().find(|m| m.candidate.character_id == "batman").unwrap();
        assert_eq!(batman.rank, Some(5));
    }

    #[test]
    fn test_separators_and_case_are_ignored() {
        let matches = TextMatcher::default().match_text("GREEN-LANTERN badge 99", &roster());
        let gl = matches
            .iter()
            .find(|m| m.candidate.character_id == "greenlantern")
            .unwrap();
        assert_eq!(gl.candidate.confidence, 1.0);
        // Epic badge tops out at 30
        assert_eq!(gl.badge_level, Some(30));
    }

    #[test]
    fn test_fuzzy_match_confidence() {
        let matcher = TextMatcher::default();
        // Both "a"s missing: 4 of 6 letters, threshold floor(6 * 0.7) = 4
        let conf = matcher.name_confidence("btmn", "Batman").unwrap();
        assert!((conf - 4.0 / 6.0).abs() < 1e-9);
        assert_eq!(matcher.name_confidence("xyz", "Batman"), None);
        assert_eq!(matcher.name_confidence("anything", "  "), None);
    }

    #[test]
    fn test_sorted_by_confidence() {
        let matches = TextMatcher::default().match_text("btmn\nSuperman", &roster());
        assert_eq!(matches[0].candidate.character_id, "superman");
        assert!(matches
            .windows(2)
            .all(|w| w[0].candidate.confidence >= w[1].candidate.confidence));
    }

    #[test]
    fn test_rank_and_badge_extraction() {
        assert_eq!(extract_rank("Batman Rank 10"), Some(10));
        assert_eq!(extract_rank("batman r3"), Some(3));
        assert_eq!(extract_rank("Lvl 99"), Some(15));
        assert_eq!(extract_rank("Batman 0"), Some(1));
        assert_eq!(extract_rank("Batman"), None);

        assert_eq!(extract_badge("Badge 25 Rank 3", Rarity::Legendary), Some(25));
        assert_eq!(extract_badge("Rank 3 B35", Rarity::Epic), Some(30));
        assert_eq!(extract_badge("Rank 12", Rarity::Legendary), Some(12));
    }

    #[test]
    fn test_empty_text() {
        assert!(TextMatcher::default().match_text("", &roster()).is_empty());
        assert!(TextMatcher::default().match_text("  \n\t\n", &roster()).is_empty());
    }

    #[test]
    fn test_empty_roster() {
        let empty = CharacterRoster::from_characters(Vec::new());
        assert!(TextMatcher::default().match_text("Batman", &empty).is_empty());
    }
}
