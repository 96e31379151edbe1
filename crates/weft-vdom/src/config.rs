#![forbid(unsafe_code)]

//! Reconciler configuration.

use std::fmt;
use std::rc::Rc;

use crate::warning::PatchWarning;

/// Callback receiving every emitted [`PatchWarning`].
pub type PatchWarnHandler = Rc<dyn Fn(&PatchWarning)>;

/// Options for a [`Patcher`](crate::Patcher).
#[derive(Clone)]
pub struct PatchConfig {
    /// Warn when siblings share a key.
    pub check_duplicate_keys: bool,
    /// Tags never reported as unknown.
    pub ignored_elements: Vec<String>,
    /// Platform predicate for tags it does not recognize.
    pub unknown_element: Option<fn(&str) -> bool>,
    pub silent: bool,
    pub warn_handler: Option<PatchWarnHandler>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            check_duplicate_keys: true,
            ignored_elements: Vec::new(),
            unknown_element: None,
            silent: false,
            warn_handler: None,
        }
    }
}

impl fmt::Debug for PatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchConfig")
            .field("check_duplicate_keys", &self.check_duplicate_keys)
            .field("ignored_elements", &self.ignored_elements)
            .field("unknown_element", &self.unknown_element.is_some())
            .field("silent", &self.silent)
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

impl PatchConfig {
    #[must_use]
    pub fn with_check_duplicate_keys(mut self, enabled: bool) -> Self {
        self.check_duplicate_keys = enabled;
        self
    }

    #[must_use]
    pub fn with_ignored_element(mut self, tag: impl Into<String>) -> Self {
        self.ignored_elements.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_unknown_element(mut self, predicate: fn(&str) -> bool) -> Self {
        self.unknown_element = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn with_warn_handler(mut self, handler: impl Fn(&PatchWarning) + 'static) -> Self {
        self.warn_handler = Some(Rc::new(handler));
        self
    }

    /// Whether `tag` (outside a `pre` subtree, without namespace) should be
    /// reported as unknown.
    pub(crate) fn is_unknown(&self, tag: &str) -> bool {
        if self.ignored_elements.iter().any(|t| t == tag) {
            return false;
        }
        self.unknown_element.is_some_and(|predicate| predicate(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashed(tag: &str) -> bool {
        tag.contains('-')
    }

    #[test]
    fn defaults() {
        let config = PatchConfig::default();
        assert!(config.check_duplicate_keys);
        assert!(!config.silent);
        assert!(!config.is_unknown("my-widget"));
    }

    #[test]
    fn ignored_elements_win_over_predicate() {
        let config = PatchConfig::default()
            .with_unknown_element(dashed)
            .with_ignored_element("my-widget");
        assert!(!config.is_unknown("my-widget"));
        assert!(config.is_unknown("other-widget"));
        assert!(!config.is_unknown("div"));
    }
}
