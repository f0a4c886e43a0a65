//! Fonts
//!
//! The server ships a small family of fixed-width fonts. Glyph rendering is
//! done by the drawing backend; the server only answers metric queries.

use crate::protocol::*;

/// Names reported by ListFonts
pub const BUILTIN_FONTS: &[&str] = &[
    "fixed",
    "cursor",
    "6x10",
    "6x12",
    "6x13",
    "7x13",
    "7x14",
    "8x13",
    "8x16",
    "9x15",
    "9x18",
    "10x20",
    "-misc-fixed-medium-r-normal--10-100-75-75-c-60-iso8859-1",
    "-misc-fixed-medium-r-normal--13-120-75-75-c-80-iso8859-1",
    "-misc-fixed-medium-r-normal--15-140-75-75-c-90-iso8859-1",
    "-misc-fixed-bold-r-normal--13-120-75-75-c-80-iso8859-1",
    "-misc-fixed-bold-r-normal--15-140-75-75-c-90-iso8859-1",
];

/// Per-font metrics; every glyph has the same box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontMetrics {
    pub ascent: i16,
    pub descent: i16,
    pub char_width: i16,
    pub min_char: u16,
    pub max_char: u16,
}

impl Default for FontMetrics {
    fn default() -> Self {
        FontMetrics {
            ascent: 12,
            descent: 4,
            char_width: 8,
            min_char: 0,
            max_char: 255,
        }
    }
}

impl FontMetrics {
    /// Derive metrics from a font name ("8x13" or an XLFD name)
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if let Some((w, h)) = lower.split_once('x') {
            if let (Ok(w), Ok(h)) = (w.parse::<i16>(), h.parse::<i16>()) {
                return Self::from_cell(w, h);
            }
        }
        let fields: Vec<&str> = lower.split('-').collect();
        if fields.len() == 15 {
            let pixel_size = fields[7].parse::<i16>().ok();
            let avg_width = fields[12].parse::<i16>().ok();
            if let (Some(h), Some(w)) = (pixel_size, avg_width) {
                return Self::from_cell(w / 10, h);
            }
        }
        FontMetrics::default()
    }

    fn from_cell(width: i16, height: i16) -> Self {
        let descent = (height / 4).max(1);
        FontMetrics {
            ascent: height - descent,
            descent,
            char_width: width,
            ..FontMetrics::default()
        }
    }

    pub fn height(&self) -> i16 {
        self.ascent + self.descent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    pub name: String,
    pub metrics: FontMetrics,
}

impl Font {
    pub fn new(name: &str) -> Self {
        Font {
            name: name.to_string(),
            metrics: FontMetrics::from_name(name),
        }
    }

    /// Resolve an OpenFont name against the builtin family
    pub fn open(name: &str) -> X11Result<Self> {
        if list_fonts(name, 1).is_empty() {
            return Err(X11Error::bad_name());
        }
        Ok(Font::new(name))
    }
}

/// Case-insensitive match of `*` / `?` wildcard patterns
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let n: Vec<char> = name.to_ascii_lowercase().chars().collect();
    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

/// Builtin font names matching `pattern`, at most `max_names`
pub fn list_fonts(pattern: &str, max_names: u16) -> Vec<&'static str> {
    BUILTIN_FONTS
        .iter()
        .copied()
        .filter(|name| pattern_matches(pattern, name))
        .take(max_names as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(pattern_matches("*", "fixed"));
        assert!(pattern_matches("FIXED", "fixed"));
        assert!(pattern_matches("?x13", "8x13"));
        assert!(pattern_matches("-misc-*-bold-*", "-misc-fixed-bold-r-normal--13-120-75-75-c-80-iso8859-1"));
        assert!(!pattern_matches("?x13", "10x20"));
        assert!(!pattern_matches("fix", "fixed"));
    }

    #[test]
    fn test_list_fonts_limit() {
        assert_eq!(list_fonts("*", 3).len(), 3);
        assert_eq!(list_fonts("9x*", 10), vec!["9x15", "9x18"]);
        assert!(list_fonts("nothing-*", 10).is_empty());
    }

    #[test]
    fn test_metrics_from_name() {
        let m = FontMetrics::from_name("8x16");
        assert_eq!(m.char_width, 8);
        assert_eq!(m.height(), 16);

        let x = FontMetrics::from_name("-misc-fixed-medium-r-normal--13-120-75-75-c-80-iso8859-1");
        assert_eq!(x.char_width, 8);
        assert_eq!(x.height(), 13);

        assert_eq!(FontMetrics::from_name("fixed"), FontMetrics::default());
    }

    #[test]
    fn test_open_unknown_font() {
        assert_eq!(Font::open("no-such-font").unwrap_err().code, ErrorCode::Name);
        assert!(Font::open("6x13").is_ok());
    }
}
