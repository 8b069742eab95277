//! Discovery of child resources referenced by a fetched body.
//!
//! Two independent pattern classes are run over the raw body bytes:
//! absolute `http(s)://` URLs, and quoted bare filenames with one of the
//! extensions `.js .png .jpg .jpeg .css`. Matching is leftmost-first and
//! non-overlapping; every match advances the scan past its end.

use std::sync::LazyLock;

use regex::bytes::Regex;
use tracing::{debug, trace};

use super::error::ParseError;

/// Absolute URL: scheme followed by host/path characters.
const ABSOLUTE_URL_PATTERN: &str = r"(?i:https?)://[A-Za-z0-9./?=_%&:;@~+#-]+";

/// Bare filename inside one matching pair of quotes. Extensions are case-sensitive.
const QUOTED_FILENAME_PATTERN: &str = concat!(
    r#""([A-Za-z0-9_./~%-]+\.(?:js|png|jpg|jpeg|css)(?:\?[A-Za-z0-9_=&%.;-]*)?)""#,
    "|",
    r#"'([A-Za-z0-9_./~%-]+\.(?:js|png|jpg|jpeg|css)(?:\?[A-Za-z0-9_=&%.;-]*)?)'"#,
);

#[allow(clippy::expect_used)]
static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    PatternClass::AbsoluteUrl
        .compile()
        .expect("absolute URL regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static QUOTED_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    PatternClass::QuotedFilename
        .compile()
        .expect("quoted filename regex is valid") // Static pattern, safe to panic
});

/// The two kinds of references the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternClass {
    /// `http://...` or `https://...`
    AbsoluteUrl,
    /// `'name.ext'` or `"name.ext"`
    QuotedFilename,
}

impl PatternClass {
    /// Human-readable name used in logs and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AbsoluteUrl => "absolute URL",
            Self::QuotedFilename => "quoted filename",
        }
    }

    /// Source text of the pattern.
    #[must_use]
    pub fn pattern(self) -> &'static str {
        match self {
            Self::AbsoluteUrl => ABSOLUTE_URL_PATTERN,
            Self::QuotedFilename => QUOTED_FILENAME_PATTERN,
        }
    }

    /// Compiles a fresh regex for this class.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::PatternCompile`] if the pattern is rejected.
    pub fn compile(self) -> Result<Regex, ParseError> {
        Regex::new(self.pattern()).map_err(|e| ParseError::pattern_compile(self.name(), e))
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::AbsoluteUrl => &ABSOLUTE_URL,
            Self::QuotedFilename => &QUOTED_FILENAME,
        }
    }
}

/// A reference found in a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAsset {
    /// Which pattern class produced the match; decides how a child target is built.
    pub kind: PatternClass,
    /// The reference itself, without surrounding quotes.
    pub value: String,
    /// Byte offset of the match in the body.
    pub offset: usize,
}

/// Runs one pattern class over a body.
///
/// Results are in order of first occurrence and may contain duplicates.
#[must_use]
#[tracing::instrument(skip(body, class), fields(body_len = body.len(), class = class.name()))]
pub fn extract(body: &[u8], class: PatternClass) -> Vec<DiscoveredAsset> {
    let regex = class.regex();
    let mut assets = Vec::new();

    match class {
        PatternClass::AbsoluteUrl => {
            for found in regex.find_iter(body) {
                assets.push(DiscoveredAsset {
                    kind: class,
                    value: String::from_utf8_lossy(found.as_bytes()).into_owned(),
                    offset: found.start(),
                });
            }
        }
        PatternClass::QuotedFilename => {
            for captures in regex.captures_iter(body) {
                // Exactly one of the two quote alternatives participates
                let Some(name) = captures.get(1).or_else(|| captures.get(2)) else {
                    continue;
                };
                assets.push(DiscoveredAsset {
                    kind: class,
                    value: String::from_utf8_lossy(name.as_bytes()).into_owned(),
                    offset: name.start(),
                });
            }
        }
    }

    for asset in &assets {
        trace!(value = %asset.value, offset = asset.offset, "found asset");
    }

    assets
}

/// Runs both pattern classes and merges the matches by body offset.
///
/// # Examples
///
/// ```
/// use mirror_core::parser::discover;
///
/// let body = br#"<script src='app.js'></script><a href="http://example.com/x">"#;
/// let assets = discover(body);
/// let values: Vec<_> = assets.iter().map(|a| a.value.as_str()).collect();
/// assert_eq!(values, ["app.js", "http://example.com/x"]);
/// ```
#[must_use]
pub fn discover(body: &[u8]) -> Vec<DiscoveredAsset> {
    let mut assets = extract(body, PatternClass::AbsoluteUrl);
    assets.extend(extract(body, PatternClass::QuotedFilename));
    // Stable sort keeps class order for equal offsets
    assets.sort_by_key(|asset| asset.offset);

    debug!(count = assets.len(), "discovered assets");
    assets
}
