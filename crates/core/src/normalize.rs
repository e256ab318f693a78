use crate::config::DisplayConfig;
use regex::Regex;
use std::sync::LazyLock;

/// Discord limits presence strings to 128 characters.
pub const MAX_TITLE_LEN: usize = 128;

// Bracketed tags and any spaces directly before them, e.g. " [x265]".
static BRACKET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *\[[^\]]*\]").expect("bracket tag pattern"));

/// Display title derived from a scraped file path. Recomputed every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTrack {
    pub title: String,
}

impl NormalizedTrack {
    /// Runs the transform pipeline over a raw filename. Steps apply in a fixed
    /// order; each is independently toggled by configuration.
    pub fn from_filename(filename: &str, cfg: &DisplayConfig) -> Self {
        let basename = filename
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(filename);
        let mut title = trim_to(basename, MAX_TITLE_LEN);

        if cfg.replace_underscore {
            title = title.replace('_', " ");
        }

        if cfg.ignore_brackets {
            let stripped = BRACKET_TAG.replace_all(&title, "").into_owned();
            // If the whole stem was bracket content, stripping would leave no
            // title at all; fall back to the unstripped filename instead.
            title = if stem(&stripped).is_empty() {
                trim_to(basename, MAX_TITLE_LEN)
            } else {
                trim_to(&stripped, MAX_TITLE_LEN)
            };
        }

        if cfg.replace_dots {
            title = collapse_separator_dots(&title);
        }

        if cfg.ignore_filetype {
            if let Some(idx) = title.rfind('.') {
                title.truncate(idx);
            }
        }

        Self { title }
    }
}

/// Truncates to `max` code points, ellipsis included.
fn trim_to(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let mut out: String = s.chars().take(max - 3).collect();
        out.push_str("...");
        out
    } else {
        s.to_string()
    }
}

/// Portion before the last '.', or the whole string when there is none.
fn stem(s: &str) -> &str {
    s.rfind('.').map_or(s, |idx| &s[..idx])
}

/// Replaces every '.' that has another '.' after it with a space, so dots used
/// as word separators collapse while the extension separator survives.
fn collapse_separator_dots(s: &str) -> String {
    let Some(last) = s.rfind('.') else {
        return s.to_string();
    };
    s.char_indices()
        .map(|(i, ch)| if ch == '.' && i < last { ' ' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{NormalizedTrack, MAX_TITLE_LEN};
    use crate::config::DisplayConfig;

    fn normalize(filename: &str, cfg: &DisplayConfig) -> String {
        NormalizedTrack::from_filename(filename, cfg).title
    }

    #[test]
    fn keeps_only_the_basename() {
        let cfg = DisplayConfig::default();
        assert_eq!(normalize(r"C:\Videos\movie.mkv", &cfg), "movie.mkv");
        assert_eq!(normalize("/mnt/media/movie.mkv", &cfg), "movie.mkv");
    }

    #[test]
    fn replaces_underscores_when_enabled() {
        let cfg = DisplayConfig {
            replace_underscore: true,
            ..DisplayConfig::default()
        };
        assert_eq!(normalize("My_Movie.mkv", &cfg), "My Movie.mkv");
        assert_eq!(
            normalize("My_Movie.mkv", &DisplayConfig::default()),
            "My_Movie.mkv"
        );
    }

    #[test]
    fn strips_bracketed_tags() {
        let cfg = DisplayConfig {
            ignore_brackets: true,
            ..DisplayConfig::default()
        };
        assert_eq!(
            normalize("My Movie [2020] [x265].mkv", &cfg),
            "My Movie.mkv"
        );
    }

    #[test]
    fn reverts_when_brackets_were_the_whole_stem() {
        let cfg = DisplayConfig {
            ignore_brackets: true,
            ..DisplayConfig::default()
        };
        assert_eq!(normalize("[tag].mkv", &cfg), "[tag].mkv");
    }

    #[test]
    fn collapses_separator_dots_but_keeps_extension() {
        let cfg = DisplayConfig {
            replace_dots: true,
            ..DisplayConfig::default()
        };
        assert_eq!(normalize("My.Movie.2020.mkv", &cfg), "My Movie 2020.mkv");
        assert_eq!(normalize("no-dots", &cfg), "no-dots");
    }

    #[test]
    fn drops_the_extension_when_enabled() {
        let cfg = DisplayConfig {
            ignore_filetype: true,
            ..DisplayConfig::default()
        };
        assert_eq!(normalize("movie.mkv", &cfg), "movie");
    }

    #[test]
    fn truncates_long_names_with_ellipsis() {
        let cfg = DisplayConfig::default();
        let long = "a".repeat(200);
        let title = normalize(&long, &cfg);
        assert_eq!(title.chars().count(), MAX_TITLE_LEN);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn full_pipeline_scenario() {
        let cfg = DisplayConfig {
            replace_underscore: true,
            ignore_brackets: true,
            ..DisplayConfig::default()
        };
        assert_eq!(normalize("My_Movie [2020].mkv", &cfg), "My Movie.mkv");
    }
}
