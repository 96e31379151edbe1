#![forbid(unsafe_code)]

//! Non-fatal conditions reported by the reactive layer.
//!
//! None of these abort the operation that produced them. Each is logged at
//! `WARN` through `tracing` and forwarded to the configured
//! [`WarnHandler`](crate::WarnHandler), unless the active
//! [`ReactiveConfig`](crate::ReactiveConfig) is silent.

use thiserror::Error;

use crate::config;

/// A warn-and-continue condition raised by `set`, `del`, or a container write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveWarning {
    #[error("cannot set reactive property on a non-container value: {value}")]
    InvalidSetTarget { value: String },

    #[error("cannot delete reactive property on a non-container value: {value}")]
    InvalidDeleteTarget { value: String },

    #[error("`{key}` is not a valid array index")]
    InvalidIndex { key: String },

    #[error(
        "avoid adding reactive property `{key}` to a managed instance or its root data at runtime; declare it upfront"
    )]
    RootContainerAdd { key: String },

    #[error("avoid deleting property `{key}` on a managed instance or its root data; set it to null instead")]
    RootContainerDelete { key: String },

    #[error("cannot add property `{key}`: object is not extensible")]
    NonExtensible { key: String },

    #[error("array length {length} exceeds the maximum array length")]
    LengthOutOfRange { length: String },

    #[error("cannot call `{method}` on a frozen array")]
    FrozenArray { method: &'static str },
}

/// Report a warning through the log and the configured handler.
pub(crate) fn emit(warning: ReactiveWarning) {
    let Some(handler) = config::warning_sink() else {
        return;
    };
    tracing::warn!(target: "weft_reactive", warning = %warning, "reactive warning");
    if let Some(handler) = handler {
        handler(&warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReactiveConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn display_names_the_key() {
        let w = ReactiveWarning::RootContainerAdd { key: "count".into() };
        assert!(w.to_string().contains("`count`"));
    }

    #[test]
    fn emit_reaches_handler() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _guard = ReactiveConfig::default()
            .with_warn_handler(move |w| sink.borrow_mut().push(w.clone()))
            .install();

        emit(ReactiveWarning::FrozenArray { method: "push" });

        assert_eq!(
            seen.borrow().as_slice(),
            &[ReactiveWarning::FrozenArray { method: "push" }]
        );
    }

    #[test]
    fn silent_suppresses_handler() {
        let seen = Rc::new(RefCell::new(0u32));
        let sink = Rc::clone(&seen);
        let _guard = ReactiveConfig::default()
            .with_silent(true)
            .with_warn_handler(move |_| *sink.borrow_mut() += 1)
            .install();

        emit(ReactiveWarning::NonExtensible { key: "x".into() });

        assert_eq!(*seen.borrow(), 0);
    }
}
