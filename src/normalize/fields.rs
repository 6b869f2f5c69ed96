//! Canonical field aliases for snapshot `values` maps.
//!
//! Scanner versions name the same value differently ("Guild Honor" vs
//! "Honor"). Each canonical field lists its source keys in priority order;
//! the first key present with a non-null value wins.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::numeric::coerce_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Strength,
    Dexterity,
    Intelligence,
    Constitution,
    Luck,
    Level,
    Treasury,
    GemMine,
    Honor,
    HallOfFameRank,
    Members,
    Raids,
    Portal,
    Hydra,
    Pet,
}

impl Field {
    /// Source keys for this field, highest priority first.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Strength => &["Base Strength", "Strength", "Base Str"],
            Field::Dexterity => &["Base Dexterity", "Dexterity", "Base Dex"],
            Field::Intelligence => &["Base Intelligence", "Intelligence", "Base Int"],
            Field::Constitution => &["Base Constitution", "Constitution", "Base Con"],
            Field::Luck => &["Base Luck", "Luck", "Base Lck"],
            Field::Level => &["Level", "Lvl"],
            Field::Treasury => &["Treasury", "Fortress Treasury", "Treasury Level"],
            Field::GemMine => &["Gem Mine", "Mine", "Gem Mine Level"],
            Field::Honor => &["Guild Honor", "Honor"],
            Field::HallOfFameRank => &["Hall of Fame Rank", "Guild Rank", "Rank"],
            Field::Members => &["Members", "Member Count", "Guild Members"],
            Field::Raids => &["Raids", "Guild Raids"],
            Field::Portal => &["Portal", "Guild Portal"],
            Field::Hydra => &["Hydra", "Guild Hydra"],
            Field::Pet => &["Pet", "Guild Pet", "Pet Level"],
        }
    }

    /// Fields read from a player snapshot.
    pub const PLAYER: &'static [Field] = &[
        Field::Strength,
        Field::Dexterity,
        Field::Intelligence,
        Field::Constitution,
        Field::Luck,
        Field::Level,
        Field::Treasury,
        Field::GemMine,
    ];

    /// Fields read from a guild snapshot.
    pub const GUILD: &'static [Field] = &[
        Field::Honor,
        Field::HallOfFameRank,
        Field::Members,
        Field::Raids,
        Field::Portal,
        Field::Hydra,
        Field::Pet,
    ];
}

/// Field values resolved once per record.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFields {
    values: HashMap<Field, f64>,
    present: HashMap<Field, bool>,
}

impl ResolvedFields {
    /// Resolve `fields` against a raw `values` map.
    pub fn resolve(values: &Map<String, Value>, fields: &[Field]) -> Self {
        let mut resolved = Self::default();
        for &field in fields {
            let hit = field
                .aliases()
                .iter()
                .filter_map(|key| values.get(*key))
                .find(|v| !v.is_null());
            resolved.present.insert(field, hit.is_some());
            resolved
                .values
                .insert(field, hit.map(coerce_number).unwrap_or(0.0));
        }
        resolved
    }

    /// Coerced value, 0 when absent.
    pub fn get(&self, field: Field) -> f64 {
        self.values.get(&field).copied().unwrap_or(0.0)
    }

    /// Whether any alias of `field` was present.
    pub fn has(&self, field: Field) -> bool {
        self.present.get(&field).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_alias_wins() {
        let values = map(json!({"Guild Honor": "12,345", "Honor": 1}));
        let fields = ResolvedFields::resolve(&values, Field::GUILD);
        assert_eq!(fields.get(Field::Honor), 12345.0);
    }

    #[test]
    fn test_null_alias_falls_through() {
        let values = map(json!({"Guild Honor": null, "Honor": "900"}));
        let fields = ResolvedFields::resolve(&values, Field::GUILD);
        assert_eq!(fields.get(Field::Honor), 900.0);
        assert!(fields.has(Field::Honor));
    }

    #[test]
    fn test_missing_is_zero() {
        let fields = ResolvedFields::resolve(&Map::new(), Field::PLAYER);
        assert_eq!(fields.get(Field::Strength), 0.0);
        assert!(!fields.has(Field::Strength));
    }

    #[test]
    fn test_unresolved_field_is_zero() {
        let values = map(json!({"Honor": 5}));
        let fields = ResolvedFields::resolve(&values, Field::PLAYER);
        assert_eq!(fields.get(Field::Honor), 0.0);
    }

    #[test]
    fn test_every_field_has_aliases() {
        for field in Field::PLAYER.iter().chain(Field::GUILD) {
            assert!(!field.aliases().is_empty(), "{:?}", field);
        }
    }
}
