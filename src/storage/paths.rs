//! Namespaced document paths.

use crate::models::{DateKey, TimeRange};

pub const TOPLIST_CONFIG: &str = "config/toplists";
pub const CHECKPOINT: &str = "config/checkpoint";

pub const PLAYERS: &str = "players";
pub const GUILDS: &str = "guilds";
pub const LATEST: &str = "latest";

pub const PLAYER_DERIVED: &str = "stats_cache_player_derived";
pub const GUILD_AVG: &str = "stats_cache_guild_avg";
pub const COMPACT_INDEX: &str = "stats_index_compact";
pub const TOPLISTS: &str = "toplists";

pub fn player_latest(player_id: &str) -> String {
    format!("{}/{}/{}", PLAYERS, player_id, LATEST)
}

pub fn guild_latest(guild_id: &str) -> String {
    format!("{}/{}/{}", GUILDS, guild_id, LATEST)
}

pub fn player_derived(player_id: &str) -> String {
    format!("{}/{}", PLAYER_DERIVED, player_id)
}

pub fn guild_avg(guild_id: &str, timestamp: i64) -> String {
    format!("{}/{}__{}", GUILD_AVG, guild_id, timestamp)
}

pub fn compact_index(date_key: DateKey, scope_id: &str) -> String {
    format!("{}/{}__{}", COMPACT_INDEX, date_key, scope_id)
}

pub fn toplist_page(scope_id: &str, range: TimeRange, page: u32) -> String {
    format!("{}/{}__{}__p{}", TOPLISTS, scope_id, range, page)
}

/// Whether `id` can be used as a single path segment.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

/// Entity id of a `<collection>/<id>/latest` path.
pub fn latest_owner<'a>(path: &'a str, collection: &str) -> Option<&'a str> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(c), Some(id), Some(LATEST), None) if c == collection && !id.is_empty() => Some(id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let key: DateKey = "20250110".parse().unwrap();
        assert_eq!(player_latest("7"), "players/7/latest");
        assert_eq!(guild_avg("g1", 1700000000), "stats_cache_guild_avg/g1__1700000000");
        assert_eq!(
            compact_index(key, "EU_all_sum"),
            "stats_index_compact/20250110__EU_all_sum"
        );
        assert_eq!(
            toplist_page("EU_all_sum", TimeRange::Days7, 1),
            "toplists/EU_all_sum__7d__p1"
        );
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("p-123"));
        assert!(is_valid_id("g.1"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("."));
        assert!(!is_valid_id(".."));
        assert!(!is_valid_id("a/b"));
        assert!(!is_valid_id("a\\b"));
    }

    #[test]
    fn test_latest_owner() {
        assert_eq!(latest_owner("players/42/latest", PLAYERS), Some("42"));
        assert_eq!(latest_owner("guilds/42/latest", PLAYERS), None);
        assert_eq!(latest_owner("players/42/history", PLAYERS), None);
        assert_eq!(latest_owner("players/42/latest/extra", PLAYERS), None);
        assert_eq!(latest_owner("players/latest", PLAYERS), None);
    }
}
