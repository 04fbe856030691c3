use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use validator::ValidateLength;

/// Cheaply cloneable list used for config values shared across stages.
#[derive(From, Clone, Debug, Serialize, Deserialize, Ord, PartialOrd, Eq, PartialEq, Deref)]
#[serde(transparent)]
pub struct ArcVec<T> {
    inner: Arc<Vec<T>>,
}

impl<T> ArcVec<T> {
    pub fn new<V: Into<Arc<Vec<T>>>>(inner: V) -> Self {
        Self {
            inner: inner.into(),
        }
    }
}

impl<T> Default for ArcVec<T> {
    fn default() -> Self {
        Vec::default().into()
    }
}

impl<T> ValidateLength<usize> for ArcVec<T> {
    fn length(&self) -> Option<usize> {
        Some(self.inner.len())
    }
}

impl<T> From<Vec<T>> for ArcVec<T> {
    fn from(value: Vec<T>) -> Self {
        Self::new(value)
    }
}

impl<T> AsRef<[T]> for ArcVec<T> {
    fn as_ref(&self) -> &[T] {
        self.inner.deref().as_ref()
    }
}

impl<T: Clone> From<&[T]> for ArcVec<T> {
    fn from(value: &[T]) -> Self {
        Self::new(value.to_vec())
    }
}
