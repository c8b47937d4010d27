//! Console list normalization.
//!
//! The `console` column holds either a single console name, a comma separated
//! list, or a JSON array encoded as text. Everything is read back as a list of
//! lowercase tokens.

/// Normalize a raw console field into unique lowercase tokens.
///
/// Accepts `"pc"`, `"pc, android"` and `["pc", "android"]` encoded as JSON
/// text. Order of first appearance is preserved.
#[must_use]
pub fn normalize_consoles(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let parts: Vec<String> = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        match serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
            Ok(values) => values
                .into_iter()
                .filter(|v| !v.is_null())
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Err(_) => vec![trimmed.to_string()],
        }
    } else if trimmed.contains(',') {
        trimmed.split(',').map(str::to_string).collect()
    } else {
        vec![trimmed.to_string()]
    };

    dedupe_tokens(parts)
}

/// Normalize a list of console names the same way as [`normalize_consoles`].
#[must_use]
pub fn normalize_console_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dedupe_tokens(items.into_iter().map(|s| s.as_ref().to_string()))
}

/// Encode a console list for storage.
///
/// A single console is stored bare so older rows stay readable; several are
/// stored as a JSON array.
#[must_use]
pub fn encode_consoles(consoles: &[String]) -> String {
    match consoles {
        [] => String::new(),
        [only] => only.clone(),
        many => serde_json::to_string(many).unwrap_or_default(),
    }
}

fn dedupe_tokens(parts: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in parts {
        let token = part.trim().to_lowercase();
        if !token.is_empty() && !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_console() {
        assert_eq!(normalize_consoles("GBA"), vec!["gba"]);
    }

    #[test]
    fn test_comma_separated() {
        assert_eq!(normalize_consoles("PC, Android ,"), vec!["pc", "android"]);
    }

    #[test]
    fn test_json_list() {
        assert_eq!(
            normalize_consoles(r#"["PC", "android", "pc"]"#),
            vec!["pc", "android"]
        );
    }

    #[test]
    fn test_broken_json_is_one_token() {
        assert_eq!(normalize_consoles("[pc, android]"), vec!["[pc, android]"]);
    }

    #[test]
    fn test_empty() {
        assert!(normalize_consoles("   ").is_empty());
        assert!(normalize_consoles("[]").is_empty());
    }

    #[test]
    fn test_encode_round_trips_through_normalize() {
        let many = vec!["pc".to_string(), "linux".to_string()];
        let encoded = encode_consoles(&many);
        assert_eq!(encoded, r#"["pc","linux"]"#);
        assert_eq!(normalize_consoles(&encoded), many);

        assert_eq!(encode_consoles(&["snes".to_string()]), "snes");
        assert_eq!(encode_consoles(&[]), "");
    }

    #[test]
    fn test_normalize_console_list() {
        assert_eq!(
            normalize_console_list(["Windows", " windows", "Linux"]),
            vec!["windows", "linux"]
        );
    }
}
