#![forbid(unsafe_code)]

//! Non-fatal conditions reported by the reconciler.

use thiserror::Error;

/// A warn-and-continue condition raised during a patch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchWarning {
    #[error("duplicate key `{key}` among siblings; this may cause an update error")]
    DuplicateKey { key: String },

    #[error("unknown custom element <{tag}>; register it or add it to ignored elements")]
    UnknownElement { tag: String },

    #[error("hydration mismatch: {detail}")]
    HydrationMismatch { detail: String },

    #[error(
        "server-rendered content does not match the client description; discarding it and rendering from scratch"
    )]
    HydrationBailed,
}

/// Why a hydration walk gave up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum HydrationMismatch {
    #[error("expected {expected}, found {found}")]
    Node { expected: String, found: String },

    #[error("innerHTML differs (server: {server:?}, client: {client:?})")]
    InnerHtml { server: String, client: String },

    #[error("<{tag}> has fewer child nodes than its description")]
    MissingChildren { tag: String },

    #[error("<{tag}> has more child nodes than its description")]
    ExtraChildren { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_folds_into_warning() {
        let mismatch = HydrationMismatch::Node {
            expected: "<div>".into(),
            found: "text node".into(),
        };
        let warning = PatchWarning::HydrationMismatch {
            detail: mismatch.to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "hydration mismatch: expected <div>, found text node"
        );
    }

    #[test]
    fn duplicate_key_names_key() {
        let w = PatchWarning::DuplicateKey { key: "a".into() };
        assert!(w.to_string().contains("`a`"));
    }
}
