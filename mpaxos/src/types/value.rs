use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// Opaque payload carried through agreement. The library stores and
/// forwards values; it never inspects or compares them.
pub trait Value: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}

impl<T> Value for T where T: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {}
