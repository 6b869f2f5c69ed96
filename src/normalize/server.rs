//! Server string normalization.
//!
//! Raw snapshots carry whatever server string the scanner saw: host names
//! (`s12.sfgame.eu`), short codes (`EU12`, `f3`) or junk. They all collapse
//! to a `(group, serverKey)` pair; unmatched input lands in `{ALL, "all"}`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Group, ServerKey};

static EU_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:s|eu)(\d+)(?:\.sfgame\.eu)?$").expect("EU server pattern is valid")
});

static FUSION_NUMBERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^f(?:usion)?\s*(\d+)(?:\.sfgame\.[a-z]+)?$").expect("fusion server pattern is valid")
});

/// Fixed single-server regions.
const FIXED_CODES: &[(&str, Group, &str)] = &[
    ("am1", Group::Us, "AM1"),
    ("am1.sfgame.us", Group::Us, "AM1"),
    ("us1", Group::Us, "AM1"),
    ("w1", Group::Int, "W1"),
    ("w1.sfgame.net", Group::Int, "W1"),
    ("int1", Group::Int, "W1"),
];

/// Normalized server location of a player or guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLocation {
    pub group: Group,
    pub server_key: ServerKey,
}

impl ServerLocation {
    /// The catch-all location for unrecognized servers.
    pub fn unknown() -> Self {
        Self {
            group: Group::All,
            server_key: ServerKey::all(),
        }
    }
}

/// Normalize a raw server string.
pub fn normalize_server(raw: &str) -> ServerLocation {
    let s = clean(raw);
    if s.is_empty() {
        return ServerLocation::unknown();
    }

    if let Some(n) = capture_number(&EU_NUMBERED, &s) {
        return ServerLocation {
            group: Group::Eu,
            server_key: ServerKey::new(format!("EU{}", n)),
        };
    }

    if let Some(n) = capture_number(&FUSION_NUMBERED, &s) {
        return ServerLocation {
            group: Group::Fusion,
            server_key: ServerKey::new(format!("F{}", n)),
        };
    }

    if let Some((_, group, code)) = FIXED_CODES.iter().find(|(alias, _, _)| *alias == s) {
        return ServerLocation {
            group: *group,
            server_key: ServerKey::new(*code),
        };
    }

    ServerLocation::unknown()
}

fn clean(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let host = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(lowered.as_str());
    let host = host.strip_prefix("www.").unwrap_or(host);
    host.trim_end_matches('/').to_string()
}

/// Captured server number without leading zeros; `s0` is not a server.
fn capture_number(re: &Regex, s: &str) -> Option<u32> {
    re.captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(group: Group, key: &str) -> ServerLocation {
        ServerLocation {
            group,
            server_key: ServerKey::new(key),
        }
    }

    #[test]
    fn test_eu_servers() {
        assert_eq!(normalize_server("s12.sfgame.eu"), loc(Group::Eu, "EU12"));
        assert_eq!(normalize_server("EU3"), loc(Group::Eu, "EU3"));
        assert_eq!(normalize_server("https://s7.sfgame.eu/"), loc(Group::Eu, "EU7"));
        assert_eq!(normalize_server("  S05.SFGAME.EU "), loc(Group::Eu, "EU5"));
    }

    #[test]
    fn test_fusion_servers() {
        assert_eq!(normalize_server("f1.sfgame.net"), loc(Group::Fusion, "F1"));
        assert_eq!(normalize_server("F12"), loc(Group::Fusion, "F12"));
        assert_eq!(normalize_server("Fusion 4"), loc(Group::Fusion, "F4"));
    }

    #[test]
    fn test_fixed_codes() {
        assert_eq!(normalize_server("am1.sfgame.us"), loc(Group::Us, "AM1"));
        assert_eq!(normalize_server("AM1"), loc(Group::Us, "AM1"));
        assert_eq!(normalize_server("w1.sfgame.net"), loc(Group::Int, "W1"));
    }

    #[test]
    fn test_unknown_collapses_to_all() {
        assert_eq!(normalize_server(""), ServerLocation::unknown());
        assert_eq!(normalize_server("s0.sfgame.eu"), ServerLocation::unknown());
        assert_eq!(normalize_server("am2.sfgame.us"), ServerLocation::unknown());
        assert_eq!(normalize_server("localhost"), ServerLocation::unknown());
        assert_eq!(normalize_server("s12.sfgame.de"), ServerLocation::unknown());
    }
}
