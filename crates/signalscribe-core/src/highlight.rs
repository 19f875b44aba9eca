//! Keyword highlighting rules and the text-wrapping pass that applies them.
//!
//! Loaded from `colors.yaml` at the root of the watched directory, mutated
//! in place on file-change events (see `watcher`), and read by `Output`
//! under a mutex (see `SharedHighlightRules`).

use indexmap::IndexMap;

use console::Style;

/// Mapping from color name to the phrases that should be wrapped in that
/// color when printed to the console. `IndexMap` (rather than `HashMap`)
/// preserves `colors.yaml`'s on-disk key order, so the "colors in
/// dictionary-iteration order" overlap rule (spec §4.6) is the file's own
/// order, not an arbitrary hash-dependent one.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HighlightRules(pub IndexMap<String, Vec<String>>);

impl HighlightRules {
    pub fn empty() -> Self {
        Self(IndexMap::new())
    }

    /// Parse `colors.yaml`'s contents, dropping any color name that isn't a
    /// recognized terminal color. Unknown colors are skipped, not fatal —
    /// spec: "that entry is dropped; other entries retained."
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml_ng::Error> {
        let raw: IndexMap<String, Vec<String>> = serde_yaml_ng::from_str(yaml)?;
        let filtered = raw
            .into_iter()
            .filter(|(color, _)| color_style(color).is_some())
            .collect();
        Ok(Self(filtered))
    }

    /// Render `text` with every configured phrase wrapped in its color.
    /// Colors are applied in the map's iteration order; within a color,
    /// longest phrases are matched first. Once a span has been matched it
    /// is scratched out of a parallel lowercase buffer so no later phrase
    /// (same or different color) can re-match inside it.
    pub fn highlight(&self, text: &str) -> String {
        if text.is_empty() || self.0.is_empty() {
            return text.to_string();
        }

        // (start, end, style) spans, collected then applied once sorted,
        // so overlapping candidate matches never compound.
        let mut spans: Vec<(usize, usize, Style)> = Vec::new();
        let mut scratch = text.to_lowercase();

        for (color, phrases) in &self.0 {
            let Some(sty) = color_style(color) else {
                continue;
            };
            let mut sorted = phrases.clone();
            sorted.sort_by_key(|p| std::cmp::Reverse(p.len()));

            for phrase in sorted {
                if phrase.is_empty() {
                    continue;
                }
                let needle = phrase.to_lowercase();
                let mut positions = Vec::new();
                let mut start = 0;
                while let Some(idx) = scratch[start..].find(&needle) {
                    let abs = start + idx;
                    positions.push((abs, abs + needle.len()));
                    start = abs + needle.len();
                }
                // process end-to-start so scratching doesn't shift earlier offsets
                for (s, e) in positions.into_iter().rev() {
                    spans.push((s, e, sty.clone()));
                    scratch.replace_range(s..e, &" ".repeat(e - s));
                }
            }
        }

        if spans.is_empty() {
            return text.to_string();
        }

        spans.sort_by_key(|(s, _, _)| *s);

        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (s, e, sty) in spans {
            if s < cursor {
                // scratching prevents overlap in well-formed input; guard anyway
                continue;
            }
            out.push_str(&text[cursor..s]);
            out.push_str(&sty.apply_to(&text[s..e]).to_string());
            cursor = e;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

/// Map a color name from `colors.yaml` to a `console::Style`, restricted to
/// the standard ANSI names. Anything else is an "unknown color name".
fn color_style(name: &str) -> Option<Style> {
    let sty = match name.to_ascii_lowercase().as_str() {
        "black" => Style::new().black(),
        "red" => Style::new().red(),
        "green" => Style::new().green(),
        "yellow" => Style::new().yellow(),
        "blue" => Style::new().blue(),
        "magenta" => Style::new().magenta(),
        "cyan" => Style::new().cyan(),
        "white" => Style::new().white(),
        _ => return None,
    };
    Some(sty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_color_is_dropped_others_retained() {
        let yaml = "red:\n  - alpha\nnotacolor:\n  - beta\n";
        let rules = HighlightRules::parse(yaml).unwrap();
        assert!(rules.0.contains_key("red"));
        assert!(!rules.0.contains_key("notacolor"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let yaml = "red: [unterminated";
        assert!(HighlightRules::parse(yaml).is_err());
    }

    #[test]
    fn case_insensitive_match_and_no_double_highlight() {
        // Insertion (= dictionary-iteration, spec §4.6) order matters here:
        // "blue" is processed before "red", so its longer phrase claims the
        // span first and "police" has nothing left to match inside it.
        let mut map = IndexMap::new();
        map.insert("blue".to_string(), vec!["police department".to_string()]);
        map.insert("red".to_string(), vec!["police".to_string()]);
        let rules = HighlightRules(map);
        let out = rules.highlight("Police Department dispatched a unit");
        let red_wraps = out.matches("\u{1b}[31m").count();
        assert_eq!(red_wraps, 0, "police should be subsumed by the blue phrase");
    }

    #[test]
    fn same_color_sorts_its_own_phrases_longest_first_regardless_of_insertion_order() {
        let mut map = IndexMap::new();
        map.insert(
            "red".to_string(),
            vec!["police".to_string(), "police department".to_string()],
        );
        let rules = HighlightRules(map);
        let out = rules.highlight("Police Department dispatched a unit");
        assert_eq!(
            out.matches("\u{1b}[31m").count(),
            1,
            "the longer phrase should claim the whole span in one wrap"
        );
    }

    #[test]
    fn empty_text_returns_empty() {
        let rules = HighlightRules::empty();
        assert_eq!(rules.highlight(""), "");
    }
}
