use dcwc_data::{Rarity, MAX_RANK};
use serde::{Deserialize, Serialize};

/// Rarity, rank and badge tier read off a single card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadata {
    pub rarity: Rarity,
    pub rank: u8,
    pub badge_level: u8,
}

impl CardMetadata {
    /// Build metadata with rank clamped to 1..=15 and badge to 1..=max_badge(rarity)
    pub fn new(rarity: Rarity, rank: i64, badge_level: i64) -> Self {
        Self {
            rarity,
            rank: clamp_rank(rank),
            badge_level: clamp_badge(badge_level, rarity),
        }
    }

    /// Replace rank and/or badge, keeping both inside their ranges
    pub fn with_overrides(self, rank: Option<u8>, badge_level: Option<u8>) -> Self {
        Self::new(
            self.rarity,
            rank.unwrap_or(self.rank) as i64,
            badge_level.unwrap_or(self.badge_level) as i64,
        )
    }
}

impl Default for CardMetadata {
    fn default() -> Self {
        Self::new(Rarity::Legendary, 1, 1)
    }
}

pub fn clamp_rank(rank: i64) -> u8 {
    rank.clamp(1, MAX_RANK as i64) as u8
}

pub fn clamp_badge(badge_level: i64, rarity: Rarity) -> u8 {
    badge_level.clamp(1, rarity.max_badge() as i64) as u8
}

/// One identity guess for a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub character_id: String,
    /// Image similarity in [0, 1]; 0 for text-only guesses
    pub similarity: f64,
    /// Trust in the guess in [0, 1]; equals `similarity` for template matches
    pub confidence: f64,
}

impl MatchCandidate {
    pub fn from_template(character_id: &str, similarity: f64) -> Self {
        let similarity = similarity.clamp(0.0, 1.0);
        Self {
            character_id: character_id.to_string(),
            similarity,
            confidence: similarity,
        }
    }

    pub fn from_text(character_id: &str, confidence: f64) -> Self {
        Self {
            character_id: character_id.to_string(),
            similarity: 0.0,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Sentinel for "no identity": empty id, zero scores
    pub fn unknown() -> Self {
        Self {
            character_id: String::new(),
            similarity: 0.0,
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.character_id.is_empty()
    }
}

/// A character found in recognized text, with any rank/badge read next to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMatch {
    pub candidate: MatchCandidate,
    pub character_name: String,
    pub rank: Option<u8>,
    pub badge_level: Option<u8>,
    /// Trimmed text line the name was found on
    pub line: String,
}

/// Which signal decided a card's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Template,
    Text,
    None,
}

/// Final answer for one card, index-aligned with the slicer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecognitionResult {
    pub index: usize,
    /// Empty when the card could not be identified
    pub character_id: String,
    pub similarity: f64,
    pub confidence: f64,
    pub source: MatchSource,
    pub metadata: CardMetadata,
}

impl CardRecognitionResult {
    pub fn unknown(index: usize, metadata: CardMetadata) -> Self {
        Self {
            index,
            character_id: String::new(),
            similarity: 0.0,
            confidence: 0.0,
            source: MatchSource::None,
            metadata,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.character_id.is_empty()
    }
}
