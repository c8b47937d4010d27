//! Game series detection.

/// Series names and the lowercase substrings that identify them.
///
/// Checked in order; the first hit wins.
const SERIES_PATTERNS: &[(&str, &[&str])] = &[
    ("Pokemon", &["pokemon", "pokémon"]),
    ("Mario", &["mario", "smb", "super mario"]),
    ("Zelda", &["zelda"]),
    ("Metroid", &["metroid"]),
    ("Kirby", &["kirby"]),
    ("Sonic", &["sonic"]),
    ("Mega Man", &["mega man", "megaman", "rockman"]),
    ("Final Fantasy", &["final fantasy"]),
    ("Dragon Quest", &["dragon quest"]),
    ("Fire Emblem", &["fire emblem"]),
    ("Castlevania", &["castlevania"]),
    ("Contra", &["contra"]),
    ("Street Fighter", &["street fighter"]),
    ("Mortal Kombat", &["mortal kombat"]),
];

/// Guess the series of an entry from its base game, falling back to its title.
#[must_use]
pub fn detect_series(base_game: Option<&str>, title: &str) -> Option<&'static str> {
    let source = base_game
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(title);
    if source.trim().is_empty() {
        return None;
    }

    let text = source.to_lowercase();
    SERIES_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| text.contains(p)))
        .map(|(series, _)| *series)
}

/// Every series name that [`detect_series`] can return.
pub fn known_series() -> impl Iterator<Item = &'static str> {
    SERIES_PATTERNS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_base_game() {
        assert_eq!(
            detect_series(Some("Pokemon FireRed"), "Unbound"),
            Some("Pokemon")
        );
        assert_eq!(
            detect_series(Some("Pokémon Emerald"), "Whatever"),
            Some("Pokemon")
        );
    }

    #[test]
    fn test_falls_back_to_title() {
        assert_eq!(detect_series(None, "SM64 Coop DX"), None);
        assert_eq!(detect_series(Some(""), "Super Mario 64 Port"), Some("Mario"));
        assert_eq!(detect_series(None, "Rockman X Redux"), Some("Mega Man"));
    }

    #[test]
    fn test_base_game_wins_over_title() {
        assert_eq!(
            detect_series(Some("Metroid Fusion"), "Zelda-style hack"),
            Some("Metroid")
        );
    }

    #[test]
    fn test_order_matters() {
        // "smb" is a Mario pattern and is checked before anything later
        assert_eq!(detect_series(Some("SMB3 Sonic edition"), ""), Some("Mario"));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(detect_series(Some("Chrono Trigger"), "Flames of Eternity"), None);
        assert_eq!(detect_series(None, ""), None);
    }

    #[test]
    fn test_known_series_listed() {
        let all: Vec<_> = known_series().collect();
        assert_eq!(all.len(), 14);
        assert!(all.contains(&"Fire Emblem"));
    }
}
