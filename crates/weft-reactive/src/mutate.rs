#![forbid(unsafe_code)]

//! Adding and removing keys after observation.
//!
//! Observation only instruments the keys present when it runs. [`set`] and
//! [`del`] are the way to change the key set of an observed container so
//! that subscribers depending on the container hear about it.
//!
//! Writes to a managed instance or to a container used as an instance's
//! root data still go through, but raise a warning and wire no
//! reactivity.

use crate::observer::define_reactive;
use crate::value::{Key, MAX_ARRAY_LENGTH, Object, Value};
use crate::warning::{self, ReactiveWarning};

fn is_root_container(obj: &Object) -> bool {
    obj.is_managed() || obj.observer().is_some_and(|ob| ob.is_root())
}

/// Assign `target[key] = value`, making a new key reactive and notifying
/// the container when `target` is observed. Returns `value`.
///
/// On an array, an index past the end grows the array first; the write is
/// then a one-element splice, so it notifies like any other splice.
pub fn set(target: &Value, key: impl Into<Key>, value: Value) -> Value {
    let key = key.into();
    match target {
        Value::Array(arr) => {
            let Some(index) = key.as_index().filter(|&i| i < MAX_ARRAY_LENGTH) else {
                warning::emit(ReactiveWarning::InvalidIndex {
                    key: key.to_string(),
                });
                return value;
            };
            if index > arr.len() {
                if let Err(warning) = arr.set_len_raw(index) {
                    warning::emit(warning);
                    return value;
                }
            }
            arr.splice(index, 1, [value.clone()]);
            value
        }
        Value::Object(obj) => {
            let name = key.to_name();
            if obj.has_own(&name) {
                obj.put(&name, value.clone());
                return value;
            }
            if is_root_container(obj) {
                warning::emit(ReactiveWarning::RootContainerAdd {
                    key: name.to_string(),
                });
                obj.put(&name, value.clone());
                return value;
            }
            let Some(ob) = obj.observer() else {
                obj.put(&name, value.clone());
                return value;
            };
            if !obj.is_extensible() {
                warning::emit(ReactiveWarning::NonExtensible {
                    key: name.to_string(),
                });
                return value;
            }
            define_reactive(obj, &name, Some(value.clone()), None, false);
            tracing::trace!(key = %name, dep = ob.dep().id().0, "reactive key added");
            ob.dep().notify();
            value
        }
        other => {
            warning::emit(ReactiveWarning::InvalidSetTarget {
                value: other.to_display_string(),
            });
            value
        }
    }
}

/// Remove `target[key]`, notifying the container when `target` is observed.
///
/// On an array this is a one-element splice. Missing and non-configurable
/// keys are left alone without notifying.
pub fn del(target: &Value, key: impl Into<Key>) {
    let key = key.into();
    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) => {
                arr.splice(index, 1, []);
            }
            None => warning::emit(ReactiveWarning::InvalidIndex {
                key: key.to_string(),
            }),
        },
        Value::Object(obj) => {
            let name = key.to_name();
            if is_root_container(obj) {
                warning::emit(ReactiveWarning::RootContainerDelete {
                    key: name.to_string(),
                });
                obj.delete(&name);
                return;
            }
            if !obj.has_own(&name) || !obj.delete(&name) {
                return;
            }
            if let Some(ob) = obj.observer() {
                tracing::trace!(key = %name, dep = ob.dep().id().0, "reactive key removed");
                ob.dep().notify();
            }
        }
        other => warning::emit(ReactiveWarning::InvalidDeleteTarget {
            value: other.to_display_string(),
        }),
    }
}
