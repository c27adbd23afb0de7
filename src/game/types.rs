use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::shared::AppError;

/// Game mode, as sent over the wire: `standard`, `timeAttack` or `endless`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum GameMode {
    Standard,
    TimeAttack,
    Endless,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Difficulty {
    Easy,
    Hard,
}

impl GameMode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        parse_closed::<Self>("mode", raw)
    }
}

impl Difficulty {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        parse_closed::<Self>("difficulty", raw)
    }
}

fn parse_closed<E>(field: &str, raw: &str) -> Result<E, AppError>
where
    E: FromStr + IntoEnumIterator + fmt::Display,
{
    E::from_str(raw.trim()).map_err(|_| {
        let allowed: Vec<String> = E::iter().map(|variant| variant.to_string()).collect();
        AppError::validation(format!(
            "unknown {} '{}', expected one of: {}",
            field,
            raw,
            allowed.join(", ")
        ))
    })
}

pub const DEFAULT_CATEGORY: &str = "all";
const MAX_CATEGORY_LEN: usize = 32;

/// Movie category a session draws from; lowercase slug such as `sci-fi` or `all`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Missing or blank input falls back to the catch-all category
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, AppError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(value) => Self::parse(value),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let value = raw.trim();
        let well_formed = !value.is_empty()
            && value.len() <= MAX_CATEGORY_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if !well_formed {
            return Err(AppError::validation(format!(
                "invalid category '{}': expected 1-{} lowercase letters, digits or '-'",
                raw, MAX_CATEGORY_LEN
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Category {
    fn default() -> Self {
        Self(DEFAULT_CATEGORY.to_string())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Category::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Identity of a leaderboard partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub category: Category,
}

impl PartitionKey {
    pub fn new(mode: GameMode, difficulty: Difficulty, category: Category) -> Self {
        Self {
            mode,
            difficulty,
            category,
        }
    }

    /// Builds a key from raw query values, defaulting like the public leaderboard endpoint
    pub fn parse(
        mode: Option<&str>,
        difficulty: Option<&str>,
        category: Option<&str>,
    ) -> Result<Self, AppError> {
        let mode = match mode.map(str::trim) {
            None | Some("") => GameMode::Standard,
            Some(raw) => GameMode::parse(raw)?,
        };
        let difficulty = match difficulty.map(str::trim) {
            None | Some("") => Difficulty::Easy,
            Some(raw) => Difficulty::parse(raw)?,
        };
        Ok(Self::new(mode, difficulty, Category::parse_optional(category)?))
    }

    /// Key under which the partition is persisted, e.g. `timeAttack:hard:sci-fi`
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.mode, self.difficulty, self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("standard", GameMode::Standard)]
    #[case("timeAttack", GameMode::TimeAttack)]
    #[case("endless", GameMode::Endless)]
    #[case(" endless ", GameMode::Endless)]
    fn parses_known_modes(#[case] raw: &str, #[case] expected: GameMode) {
        assert_eq!(GameMode::parse(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("blitz")]
    #[case("TimeAttack")]
    #[case("time_attack")]
    fn rejects_unknown_modes(#[case] raw: &str) {
        let err = GameMode::parse(raw).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("timeAttack")));
    }

    #[rstest]
    #[case("easy", Difficulty::Easy)]
    #[case("hard", Difficulty::Hard)]
    fn parses_known_difficulties(#[case] raw: &str, #[case] expected: Difficulty) {
        assert_eq!(Difficulty::parse(raw).unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_difficulty() {
        assert!(matches!(
            Difficulty::parse("nightmare"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn modes_serialize_as_wire_strings() {
        assert_eq!(
            serde_json::to_string(&GameMode::TimeAttack).unwrap(),
            "\"timeAttack\""
        );
        assert_eq!(GameMode::TimeAttack.to_string(), "timeAttack");
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"hard\"");
    }

    #[rstest]
    #[case(None, "all")]
    #[case(Some(""), "all")]
    #[case(Some("   "), "all")]
    #[case(Some("sci-fi"), "sci-fi")]
    #[case(Some("classic"), "classic")]
    fn category_defaults_and_parses(#[case] raw: Option<&str>, #[case] expected: &str) {
        assert_eq!(Category::parse_optional(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("Action")]
    #[case("sci fi")]
    #[case("drama;drop table")]
    #[case("a-very-long-category-name-that-goes-on")]
    fn category_rejects_malformed(#[case] raw: &str) {
        assert!(matches!(Category::parse(raw), Err(AppError::Validation(_))));
    }

    #[test]
    fn category_deserialization_validates() {
        assert!(serde_json::from_str::<Category>("\"horror\"").is_ok());
        assert!(serde_json::from_str::<Category>("\"Horror!\"").is_err());
    }

    #[test]
    fn partition_key_defaults_match_public_leaderboard() {
        let key = PartitionKey::parse(None, None, None).unwrap();
        assert_eq!(key.storage_key(), "standard:easy:all");
    }

    #[test]
    fn partition_key_rejects_malformed_parts() {
        assert!(PartitionKey::parse(Some("arcade"), None, None).is_err());
        assert!(PartitionKey::parse(None, Some("medium"), None).is_err());
        assert!(PartitionKey::parse(None, None, Some("NOPE")).is_err());
    }

    #[test]
    fn partition_key_storage_key() {
        let key = PartitionKey::new(
            GameMode::TimeAttack,
            Difficulty::Hard,
            Category::parse("sci-fi").unwrap(),
        );
        assert_eq!(key.storage_key(), "timeAttack:hard:sci-fi");
    }
}
