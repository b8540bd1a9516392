// SPDX-License-Identifier: GPL-3.0-only

//! Erased, per-frame result values: a type-safe wrapper around
//! `std::any::Any` for stages to stash and retrieve arbitrary typed
//! data by key.

use std::any::Any;
use std::fmt;

use crate::errors::PipelineError;

/// A dynamically-typed named value in a [`crate::context::FrameContext`]'s
/// result map. Holds at most one value at a time; typed access downcasts
/// and fails with [`PipelineError::TypeMismatch`] on type mismatch or on
/// an empty slot.
#[derive(Default)]
pub struct AnyValue(Option<Box<dyn Any + Send>>);

impl AnyValue {
    pub(crate) fn empty() -> Self {
        Self(None)
    }

    /// Overwrite the stored value, discarding whatever type was there
    /// before.
    pub fn set<T: Any + Send>(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    /// Reset to "no value".
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// True if a value of any type is currently stored.
    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }

    /// Downcast the stored value to `&T`. Fails if nothing is stored
    /// or if a different type was last written.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T, PipelineError> {
        self.0
            .as_deref()
            .and_then(<dyn Any>::downcast_ref::<T>)
            .ok_or_else(|| PipelineError::TypeMismatch { name: name.to_string() })
    }

    /// Downcast the stored value to `&mut T`. Same failure modes as
    /// [`Self::get`].
    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T, PipelineError> {
        self.0
            .as_deref_mut()
            .and_then(<dyn Any>::downcast_mut::<T>)
            .ok_or_else(|| PipelineError::TypeMismatch { name: name.to_string() })
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyValue")
            .field("has_value", &self.has_value())
            .finish()
    }
}
