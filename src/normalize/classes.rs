//! Class to primary attribute mapping.

use serde::{Deserialize, Serialize};

/// One of the five base attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "str")]
    Strength,
    #[serde(rename = "dex")]
    Dexterity,
    #[serde(rename = "int")]
    Intelligence,
    #[serde(rename = "con")]
    Constitution,
    #[serde(rename = "lck")]
    Luck,
}

const CLASS_TABLE: &[(&str, Attribute)] = &[
    ("warrior", Attribute::Strength),
    ("battlemage", Attribute::Strength),
    ("berserker", Attribute::Strength),
    ("paladin", Attribute::Strength),
    ("scout", Attribute::Dexterity),
    ("assassin", Attribute::Dexterity),
    ("demonhunter", Attribute::Dexterity),
    ("plaguedoctor", Attribute::Dexterity),
    ("mage", Attribute::Intelligence),
    ("druid", Attribute::Intelligence),
    ("bard", Attribute::Intelligence),
    ("necromancer", Attribute::Intelligence),
];

/// Primary attribute for a class name. Unknown classes use intelligence.
pub fn main_attribute(class: &str) -> Attribute {
    let key: String = class
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect();

    CLASS_TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, attr)| *attr)
        .unwrap_or(Attribute::Intelligence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_classes() {
        assert_eq!(main_attribute("Warrior"), Attribute::Strength);
        assert_eq!(main_attribute("Scout"), Attribute::Dexterity);
        assert_eq!(main_attribute("Mage"), Attribute::Intelligence);
        assert_eq!(main_attribute("Demon Hunter"), Attribute::Dexterity);
        assert_eq!(main_attribute("battle_mage"), Attribute::Strength);
        assert_eq!(main_attribute("PLAGUE-DOCTOR"), Attribute::Dexterity);
        assert_eq!(main_attribute("Necromancer"), Attribute::Intelligence);
    }

    #[test]
    fn test_unknown_class_defaults_to_intelligence() {
        assert_eq!(main_attribute(""), Attribute::Intelligence);
        assert_eq!(main_attribute("Gardener"), Attribute::Intelligence);
    }
}
