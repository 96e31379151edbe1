#![forbid(unsafe_code)]

//! Per-thread configuration for the reactive layer.
//!
//! The reactive core is single-threaded, so configuration lives in a
//! thread-local slot. [`ReactiveConfig::install`] swaps a configuration in
//! and returns a [`ConfigGuard`] that restores the previous one on drop,
//! which keeps tests isolated from each other.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::warning::ReactiveWarning;

/// Callback receiving every emitted [`ReactiveWarning`].
pub type WarnHandler = Rc<dyn Fn(&ReactiveWarning)>;

/// Configuration for dependency notification and warnings.
#[derive(Clone)]
pub struct ReactiveConfig {
    /// Whether subscriber updates are batched by an external scheduler.
    ///
    /// When `false`, [`Dep::notify`](crate::Dep::notify) sorts its snapshot
    /// by subscriber id before delivering, since no scheduler will.
    pub async_scheduling: bool,
    /// Suppress warnings entirely (no log event, no handler call).
    pub silent: bool,
    /// Optional sink for warnings, called after the `tracing` event.
    pub warn_handler: Option<WarnHandler>,
}

impl Default for ReactiveConfig {
    fn default() -> Self {
        Self {
            async_scheduling: true,
            silent: false,
            warn_handler: None,
        }
    }
}

impl fmt::Debug for ReactiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveConfig")
            .field("async_scheduling", &self.async_scheduling)
            .field("silent", &self.silent)
            .field("warn_handler", &self.warn_handler.is_some())
            .finish()
    }
}

thread_local! {
    static CONFIG: RefCell<ReactiveConfig> = RefCell::new(ReactiveConfig::default());
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

impl ReactiveConfig {
    /// Set whether an external scheduler batches updates.
    #[must_use]
    pub fn with_async_scheduling(mut self, enabled: bool) -> Self {
        self.async_scheduling = enabled;
        self
    }

    /// Set whether warnings are suppressed.
    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Route warnings to `handler` in addition to the log.
    #[must_use]
    pub fn with_warn_handler(mut self, handler: impl Fn(&ReactiveWarning) + 'static) -> Self {
        self.warn_handler = Some(Rc::new(handler));
        self
    }

    /// Snapshot of the configuration active on this thread.
    #[must_use]
    pub fn current() -> Self {
        CONFIG.with(|c| c.borrow().clone())
    }

    /// Make this the active configuration until the guard is dropped.
    #[must_use = "dropping the guard immediately restores the previous config"]
    pub fn install(self) -> ConfigGuard {
        let previous = CONFIG.with(|c| c.replace(self));
        ConfigGuard {
            previous: Some(previous),
            _not_send: PhantomData,
        }
    }
}

/// Restores the previously installed [`ReactiveConfig`] on drop.
pub struct ConfigGuard {
    previous: Option<ReactiveConfig>,
    _not_send: PhantomData<Rc<()>>,
}

impl fmt::Debug for ConfigGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigGuard").finish_non_exhaustive()
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            CONFIG.with(|c| *c.borrow_mut() = previous);
        }
    }
}

/// Enable or disable creation of new observers on this thread.
///
/// Existing observers keep working; only [`observe`](crate::observe) on a
/// not-yet-observed container is affected.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|s| s.set(enabled));
}

/// Whether [`observe`](crate::observe) may instrument new containers.
#[must_use]
pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

pub(crate) fn async_scheduling() -> bool {
    CONFIG.with(|c| c.borrow().async_scheduling)
}

pub(crate) fn warning_sink() -> Option<Option<WarnHandler>> {
    CONFIG.with(|c| {
        let c = c.borrow();
        if c.silent {
            None
        } else {
            Some(c.warn_handler.clone())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_async_and_loud() {
        let config = ReactiveConfig::default();
        assert!(config.async_scheduling);
        assert!(!config.silent);
        assert!(config.warn_handler.is_none());
    }

    #[test]
    fn install_restores_previous_on_drop() {
        assert!(async_scheduling());
        {
            let _guard = ReactiveConfig::default()
                .with_async_scheduling(false)
                .install();
            assert!(!async_scheduling());
            {
                let _inner = ReactiveConfig::default().install();
                assert!(async_scheduling());
            }
            assert!(!async_scheduling());
        }
        assert!(async_scheduling());
    }

    #[test]
    fn silent_config_has_no_sink() {
        let _guard = ReactiveConfig::default().with_silent(true).install();
        assert!(warning_sink().is_none());
    }

    #[test]
    fn toggle_observing_round_trip() {
        assert!(should_observe());
        toggle_observing(false);
        assert!(!should_observe());
        toggle_observing(true);
        assert!(should_observe());
    }

    #[test]
    fn debug_hides_handler_body() {
        let config = ReactiveConfig::default().with_warn_handler(|_| {});
        let dbg = format!("{config:?}");
        assert!(dbg.contains("warn_handler: true"));
    }
}
