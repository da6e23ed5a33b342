//! Content cues that assign a provisional role to a segment.
//!
//! Rules are tried in order and the first one that matches wins. The default
//! set covers explicit role tags, quoted-dialogue lines and bare speaker
//! labels; callers can push their own [`SegmentRule`]s without touching the
//! rest of the pipeline.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::turn::Role;
use crate::SegmentRule;

// "Name (emotion): "dialogue"" - a strong narrator signal
static DIALOGUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[ \t]*[A-Za-z][A-Za-z' \t-]*\([^)\n]+\):[ \t]*["“]"#).unwrap()
});
static OOC_REST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^ooc:").unwrap());

/// What a rule learned about a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Provisional role, or `None` to keep the parent turn's role.
    pub role: Option<Role>,
    /// Number of leading bytes that are a redundant marker to strip.
    pub strip: usize,
}

/// Extra condition on the text following a rule's match.
#[derive(Debug, Clone)]
pub enum Guard {
    Requires(Regex),
    Forbids(Regex),
}

/// A rule driven by an anchored regex.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    pattern: Regex,
    role: Option<Role>,
    strip: bool,
    guard: Option<Guard>,
}

impl PatternRule {
    pub fn new(name: impl Into<String>, pattern: Regex, role: Option<Role>) -> Self {
        Self {
            name: name.into(),
            pattern,
            role,
            strip: false,
            guard: None,
        }
    }

    /// Strip the matched prefix from the segment.
    pub fn stripping(mut self) -> Self {
        self.strip = true;
        self
    }

    /// Only match when the remaining text matches `rest`.
    pub fn requiring(mut self, rest: Regex) -> Self {
        self.guard = Some(Guard::Requires(rest));
        self
    }

    /// Never match when the remaining text matches `rest`.
    pub fn forbidding(mut self, rest: Regex) -> Self {
        self.guard = Some(Guard::Forbids(rest));
        self
    }
}

impl SegmentRule for PatternRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, text: &str) -> Option<Cue> {
        let m = self.pattern.find(text)?;
        if m.start() != 0 {
            return None;
        }
        let rest = &text[m.end()..];
        let allowed = match &self.guard {
            Some(Guard::Requires(re)) => re.is_match(rest),
            Some(Guard::Forbids(re)) => !re.is_match(rest),
            None => true,
        };
        if !allowed {
            return None;
        }
        Some(Cue {
            role: self.role.clone(),
            strip: if self.strip { m.end() } else { 0 },
        })
    }
}

/// Ordered list of segment rules.
pub struct ClassifierSet {
    rules: Vec<Box<dyn SegmentRule + Send + Sync>>,
}

impl ClassifierSet {
    /// An empty set: every segment inherits its parent's role.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push<R>(&mut self, rule: R)
    where
        R: SegmentRule + Send + Sync + 'static,
    {
        self.rules.push(Box::new(rule));
    }

    pub fn with_rule<R>(mut self, rule: R) -> Self
    where
        R: SegmentRule + Send + Sync + 'static,
    {
        self.push(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// First matching cue, with the name of the rule that produced it.
    pub fn classify(&self, text: &str) -> Option<(&str, Cue)> {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(text).map(|cue| (rule.name(), cue)))
    }
}

impl Default for ClassifierSet {
    fn default() -> Self {
        let re = |pattern: &str| Regex::new(pattern).unwrap();

        ClassifierSet::empty()
            // OOC asides belong to whoever the reconciler picks
            .with_rule(PatternRule::new("ooc_lead", re(r"(?i)^\s*ooc:"), None))
            .with_rule(
                PatternRule::new("user_tag", re(r"(?i)^\s*\{user\}:\s*"), Some(Role::User))
                    .stripping(),
            )
            .with_rule(
                PatternRule::new(
                    "narrator_dialogue",
                    re(r"(?i)^\s*\{narrator\}:\s*"),
                    Some(Role::Narrator),
                )
                .stripping()
                .requiring(DIALOGUE_RE.clone()),
            )
            .with_rule(
                PatternRule::new(
                    "narrator_label_line",
                    re(r"(?i)^\s*\{narrator\}:[ \t]*\r?\n\s*"),
                    Some(Role::Narrator),
                )
                .stripping()
                .forbidding(OOC_REST_RE.clone()),
            )
            .with_rule(PatternRule::new(
                "narrator_tag",
                re(r"(?i)^\s*\{narrator\}:"),
                Some(Role::Narrator),
            ))
            .with_rule(PatternRule::new(
                "dialogue",
                DIALOGUE_RE.clone(),
                Some(Role::Narrator),
            ))
            .with_rule(PatternRule::new(
                "speaker_label",
                re(r"^[ \t]*[A-Za-z][A-Za-z' \t-]*:"),
                Some(Role::Narrator),
            ))
    }
}

impl fmt::Debug for ClassifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierSet")
            .field("rules", &self.rule_names())
            .finish()
    }
}
