use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Highest badge level an Epic character can reach
pub const MAX_BADGE_EPIC: u8 = 30;

/// Highest badge level a Legendary character can reach
pub const MAX_BADGE_LEGENDARY: u8 = 40;

/// Highest rank any character can reach
pub const MAX_RANK: u8 = 15;

/// Two-tier rarity, inferred on screen from the card background color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Epic,
    Legendary,
}

impl Rarity {
    /// Upper bound of the badge level for this rarity
    pub fn max_badge(self) -> u8 {
        match self {
            Rarity::Epic => MAX_BADGE_EPIC,
            Rarity::Legendary => MAX_BADGE_LEGENDARY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Dps,
    Support,
}

/// Static character definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub role: Option<Role>,
    /// Portrait file name; defaults to `{id}.png`
    #[serde(default)]
    pub portrait: Option<String>,
}

impl Character {
    pub fn new(id: &str, name: &str, rarity: Rarity) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rarity,
            role: None,
            portrait: None,
        }
    }

    pub fn portrait_file(&self) -> String {
        self.portrait
            .clone()
            .unwrap_or_else(|| format!("{}.png", self.id))
    }
}

/// Raw characters.json file format
#[derive(Debug, Deserialize)]
struct CharactersFile {
    #[allow(dead_code)]
    version: Option<String>,
    characters: Vec<Character>,
}

/// Known characters, in file order, with id and name indexes
#[derive(Debug, Clone, Default)]
pub struct CharacterRoster {
    characters: Vec<Character>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, String>,
}

impl CharacterRoster {
    /// Build a roster from definitions. Later duplicates of an id are dropped.
    pub fn from_characters(characters: Vec<Character>) -> Self {
        let mut roster = Self::default();
        for character in characters {
            if roster.by_id.contains_key(&character.id) {
                tracing::warn!("Duplicate character id '{}' ignored", character.id);
                continue;
            }
            roster
                .by_name
                .insert(character.name.to_lowercase(), character.id.clone());
            roster
                .by_id
                .insert(character.id.clone(), roster.characters.len());
            roster.characters.push(character);
        }
        roster
    }

    /// Load the roster from `data_dir/characters.json`.
    /// A missing file yields an empty roster.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("characters.json");
        if !path.exists() {
            tracing::warn!("No characters.json found at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let roster = Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        tracing::info!("Loaded {} characters", roster.len());
        Ok(roster)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: CharactersFile = serde_json::from_str(content)?;
        Ok(Self::from_characters(file.characters))
    }

    pub fn get(&self, id: &str) -> Option<&Character> {
        self.by_id.get(id).map(|&i| &self.characters[i])
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<&Character> {
        self.by_name
            .get(&name.to_lowercase())
            .and_then(|id| self.get(id))
    }

    pub fn by_rarity(&self, rarity: Rarity) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(move |c| c.rarity == rarity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.characters.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
