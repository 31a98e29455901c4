// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers for serializing Arcs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::ops::Deref;
use std::sync::Arc;

/// Serializable Arc Type, used to embed shared compiled children in their
/// parents without deep copies.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(bound = "T: Serialize + for<'d> Deserialize<'d>")]
#[serde(transparent)]
pub struct SArc<T>(
    #[serde(serialize_with = "serializer")]
    #[serde(deserialize_with = "deserializer")]
    pub Arc<T>,
);

/// arc serializer
pub fn serializer<T, S>(v: &Arc<T>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let b: &T = v.borrow();
    b.serialize(s)
}

/// arc deserializer
pub fn deserializer<'de, T, D>(d: D) -> Result<Arc<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Arc::new(T::deserialize(d)?))
}

impl<T> Deref for SArc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<Arc<T>> for SArc<T> {
    fn from(a: Arc<T>) -> Self {
        SArc(a)
    }
}
