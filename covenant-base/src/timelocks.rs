// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lock times, both relative (nSequence) and absolute (nLockTime), split by
//! whether they count blocks or seconds.
use super::Clause;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryFrom;
use std::convert::TryInto;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// nLockTime values below this are heights, at or above are unix times.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;
/// BIP-68 flag marking a relative lock as time based.
pub const SEQUENCE_TYPE_FLAG: u32 = 1 << 22;
/// BIP-68 mask for the relative lock value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_ffff;

/// Errors from constructing a lock time out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockTimeError {
    /// Duration can't be represented
    DurationTooLong(Duration),
    /// An absolute time below the height/time threshold
    TimeTooFarInPast(u32),
    /// An absolute height at or above the height/time threshold
    HeightTooHigh(u32),
    /// A relative lock that does not fit in 16 bits
    RelativeTooLong(u32),
}

/// Type Tags used for creating lock time variants. The module lets us keep them
/// public while not polluting the name space.
pub mod type_tags {
    /// Is the lock absolute (nLockTime) or relative (nSequence)
    pub trait Absolutivity {
        /// true for nLockTime
        const IS_ABSOLUTE: bool;
    }
    /// Is the lock counted in blocks or seconds
    pub trait TimeType {
        /// true for blocks
        const IS_HEIGHT: bool;
    }
    /// Relative tag
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Rel;
    /// Absolute tag
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Abs;
    /// Block height tag
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Height;
    /// Median time past tag
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct MTP;
}
use type_tags::*;

/// LockTime represents either a nLockTime or a Sequence field.
/// They are represented generically in the same type. The inner value is the
/// consensus encoding (flags included).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockTime<RelOrAbs: Absolutivity, HeightOrTime: TimeType>(
    u32,
    PhantomData<(RelOrAbs, HeightOrTime)>,
);

/// Represents a type which can be either type of relative lock
#[derive(
    JsonSchema, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum AnyRelTimeLock {
    /// relative block count
    #[serde(rename = "relative_height")]
    RH(RelHeight),
    /// relative time in 512 second units
    #[serde(rename = "relative_time")]
    RT(RelTime),
}

/// Represents a type which can be either type of absolute lock
#[derive(
    JsonSchema, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum AnyAbsTimeLock {
    /// block height
    #[serde(rename = "absolute_height")]
    AH(AbsHeight),
    /// unix timestamp
    #[serde(rename = "absolute_time")]
    AT(AbsTime),
}

/// Represents a type which can be any type of lock
#[derive(
    JsonSchema, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(untagged)]
pub enum AnyTimeLock {
    /// nSequence lock
    R(AnyRelTimeLock),
    /// nLockTime lock
    A(AnyAbsTimeLock),
}

/// Helpful Aliases for specific concrete lock times
mod alias {
    use super::*;
    /// relative block count
    pub type RelHeight = LockTime<Rel, Height>;
    /// relative 512 second units
    pub type RelTime = LockTime<Rel, MTP>;
    /// absolute block height
    pub type AbsHeight = LockTime<Abs, Height>;
    /// absolute unix time
    pub type AbsTime = LockTime<Abs, MTP>;
}
pub use alias::*;

mod trait_impls {
    use super::*;
    impl Absolutivity for Rel {
        const IS_ABSOLUTE: bool = false;
    }
    impl Absolutivity for Abs {
        const IS_ABSOLUTE: bool = true;
    }
    impl TimeType for Height {
        const IS_HEIGHT: bool = true;
    }
    impl TimeType for MTP {
        const IS_HEIGHT: bool = false;
    }

    impl<A, TT> LockTime<A, TT>
    where
        A: Absolutivity,
        TT: TimeType,
    {
        /// the consensus encoded value, as placed in nSequence/nLockTime
        pub fn get(&self) -> u32 {
            self.0
        }

        /// the human facing value: blocks, 512 second units, or unix time
        pub fn value(&self) -> u32 {
            if A::IS_ABSOLUTE {
                self.0
            } else {
                self.0 & SEQUENCE_LOCKTIME_MASK
            }
        }

        /// build a lock from its human facing value, validating the range
        pub fn from_value(v: u32) -> Result<Self, LockTimeError> {
            match (A::IS_ABSOLUTE, TT::IS_HEIGHT) {
                (true, true) if v >= LOCKTIME_THRESHOLD => Err(LockTimeError::HeightTooHigh(v)),
                (true, false) if v < LOCKTIME_THRESHOLD => Err(LockTimeError::TimeTooFarInPast(v)),
                (true, _) => Ok(Self(v, PhantomData)),
                (false, _) if v > SEQUENCE_LOCKTIME_MASK => Err(LockTimeError::RelativeTooLong(v)),
                (false, true) => Ok(Self(v, PhantomData)),
                (false, false) => Ok(Self(v | SEQUENCE_TYPE_FLAG, PhantomData)),
            }
        }
    }

    impl<A, TT> Serialize for LockTime<A, TT>
    where
        A: Absolutivity,
        TT: TimeType,
    {
        fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_u32(self.value())
        }
    }

    impl<'de, A, TT> Deserialize<'de> for LockTime<A, TT>
    where
        A: Absolutivity,
        TT: TimeType,
    {
        fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
            let v = u32::deserialize(d)?;
            Self::from_value(v).map_err(serde::de::Error::custom)
        }
    }

    impl<A, TT> JsonSchema for LockTime<A, TT>
    where
        A: Absolutivity,
        TT: TimeType,
    {
        fn schema_name() -> String {
            match (A::IS_ABSOLUTE, TT::IS_HEIGHT) {
                (true, true) => "AbsHeight",
                (true, false) => "AbsTime",
                (false, true) => "RelHeight",
                (false, false) => "RelTime",
            }
            .into()
        }
        fn json_schema(gen: &mut SchemaGenerator) -> Schema {
            <u32>::json_schema(gen)
        }
    }

    impl AnyRelTimeLock {
        /// the consensus nSequence value
        pub fn get(&self) -> u32 {
            match self {
                AnyRelTimeLock::RH(u) => u.get(),
                AnyRelTimeLock::RT(u) => u.get(),
            }
        }
        /// does this lock count blocks
        pub fn is_height(&self) -> bool {
            matches!(self, AnyRelTimeLock::RH(_))
        }
        /// Some(true) if a template locked with `self` meets `required`.
        /// None if the two count different units.
        pub fn covers(&self, required: &AnyRelTimeLock) -> Option<bool> {
            match (self, required) {
                (AnyRelTimeLock::RH(a), AnyRelTimeLock::RH(b)) => Some(a >= b),
                (AnyRelTimeLock::RT(a), AnyRelTimeLock::RT(b)) => Some(a >= b),
                _ => None,
            }
        }
    }

    impl AnyAbsTimeLock {
        /// the consensus nLockTime value
        pub fn get(&self) -> u32 {
            match self {
                AnyAbsTimeLock::AH(u) => u.get(),
                AnyAbsTimeLock::AT(u) => u.get(),
            }
        }
        /// does this lock count blocks
        pub fn is_height(&self) -> bool {
            matches!(self, AnyAbsTimeLock::AH(_))
        }
        /// Some(true) if a template locked with `self` meets `required`.
        /// None if the two count different units.
        pub fn covers(&self, required: &AnyAbsTimeLock) -> Option<bool> {
            match (self, required) {
                (AnyAbsTimeLock::AH(a), AnyAbsTimeLock::AH(b)) => Some(a >= b),
                (AnyAbsTimeLock::AT(a), AnyAbsTimeLock::AT(b)) => Some(a >= b),
                _ => None,
            }
        }
        /// block height lock, validated
        pub fn at_height(h: u32) -> Result<Self, LockTimeError> {
            Ok(AnyAbsTimeLock::AH(h.try_into()?))
        }
    }

    impl AnyTimeLock {
        /// the consensus value for whichever field this lock goes in
        pub fn get(&self) -> u32 {
            match self {
                AnyTimeLock::A(u) => u.get(),
                AnyTimeLock::R(u) => u.get(),
            }
        }
    }

    impl fmt::Display for LockTimeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }
    impl std::error::Error for LockTimeError {}

    impl TryFrom<u32> for AbsTime {
        type Error = LockTimeError;
        fn try_from(u: u32) -> Result<Self, Self::Error> {
            Self::from_value(u)
        }
    }
    impl TryFrom<u32> for AbsHeight {
        type Error = LockTimeError;
        fn try_from(u: u32) -> Result<Self, Self::Error> {
            Self::from_value(u)
        }
    }
    impl From<u16> for RelTime {
        fn from(u: u16) -> Self {
            Self((u as u32) | SEQUENCE_TYPE_FLAG, PhantomData)
        }
    }
    impl From<u16> for RelHeight {
        fn from(u: u16) -> Self {
            Self(u as u32, PhantomData)
        }
    }

    impl TryFrom<Duration> for RelTime {
        type Error = LockTimeError;
        fn try_from(u: Duration) -> Result<Self, Self::Error> {
            let windows = u.as_secs() / 512;
            if windows > u16::MAX as u64 {
                Err(LockTimeError::DurationTooLong(u))
            } else {
                Ok((windows as u16).into())
            }
        }
    }

    impl TryFrom<Duration> for AbsTime {
        type Error = LockTimeError;
        fn try_from(u: Duration) -> Result<Self, Self::Error> {
            let t = u.as_secs();
            if t > u32::MAX as u64 {
                Err(LockTimeError::DurationTooLong(u))
            } else {
                (t as u32).try_into()
            }
        }
    }

    impl<A, TT> From<LockTime<A, TT>> for Clause
    where
        A: Absolutivity,
        TT: TimeType,
        LockTime<A, TT>: Into<AnyTimeLock>,
    {
        fn from(lt: LockTime<A, TT>) -> Clause {
            let any: AnyTimeLock = lt.into();
            any.into()
        }
    }

    impl From<AnyRelTimeLock> for Clause {
        fn from(lt: AnyRelTimeLock) -> Self {
            Clause::RelativeTime(lt)
        }
    }
    impl From<AnyAbsTimeLock> for Clause {
        fn from(lt: AnyAbsTimeLock) -> Self {
            Clause::AbsoluteTime(lt)
        }
    }
    impl From<AnyTimeLock> for Clause {
        fn from(lt: AnyTimeLock) -> Self {
            match lt {
                AnyTimeLock::A(a) => a.into(),
                AnyTimeLock::R(a) => a.into(),
            }
        }
    }

    impl From<RelTime> for AnyRelTimeLock {
        fn from(lt: RelTime) -> Self {
            AnyRelTimeLock::RT(lt)
        }
    }
    impl From<RelHeight> for AnyRelTimeLock {
        fn from(lt: RelHeight) -> Self {
            AnyRelTimeLock::RH(lt)
        }
    }
    impl From<AbsHeight> for AnyAbsTimeLock {
        fn from(lt: AbsHeight) -> Self {
            AnyAbsTimeLock::AH(lt)
        }
    }
    impl From<AbsTime> for AnyAbsTimeLock {
        fn from(lt: AbsTime) -> Self {
            AnyAbsTimeLock::AT(lt)
        }
    }

    impl From<AnyAbsTimeLock> for AnyTimeLock {
        fn from(lt: AnyAbsTimeLock) -> Self {
            AnyTimeLock::A(lt)
        }
    }
    impl From<AnyRelTimeLock> for AnyTimeLock {
        fn from(lt: AnyRelTimeLock) -> Self {
            AnyTimeLock::R(lt)
        }
    }
    impl From<RelTime> for AnyTimeLock {
        fn from(lt: RelTime) -> Self {
            AnyTimeLock::R(lt.into())
        }
    }
    impl From<RelHeight> for AnyTimeLock {
        fn from(lt: RelHeight) -> Self {
            AnyTimeLock::R(lt.into())
        }
    }
    impl From<AbsHeight> for AnyTimeLock {
        fn from(lt: AbsHeight) -> Self {
            AnyTimeLock::A(lt.into())
        }
    }
    impl From<AbsTime> for AnyTimeLock {
        fn from(lt: AbsTime) -> Self {
            AnyTimeLock::A(lt.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_time_sets_type_flag() {
        let rt = RelTime::from(10);
        assert_eq!(rt.get(), 10 | SEQUENCE_TYPE_FLAG);
        assert_eq!(rt.value(), 10);
        let rh = RelHeight::from(10);
        assert_eq!(rh.get(), 10);
    }

    #[test]
    fn absolute_ranges_are_checked() {
        assert_eq!(
            AbsHeight::try_from(LOCKTIME_THRESHOLD).err(),
            Some(LockTimeError::HeightTooHigh(LOCKTIME_THRESHOLD))
        );
        assert_eq!(
            AbsTime::try_from(100).err(),
            Some(LockTimeError::TimeTooFarInPast(100))
        );
        assert!(AbsTime::try_from(1_600_000_000).is_ok());
    }

    #[test]
    fn json_form() {
        let t: AnyTimeLock = serde_json::from_str(r#"{"relative_height": 144}"#).unwrap();
        assert_eq!(t, AnyTimeLock::R(AnyRelTimeLock::RH(144.into())));
        let t: AnyTimeLock = serde_json::from_str(r#"{"absolute_height": 700000}"#).unwrap();
        assert_eq!(t.get(), 700_000);
        assert!(serde_json::from_str::<AnyTimeLock>(r#"{"absolute_height": 600000000}"#).is_err());
        let s = serde_json::to_string(&AnyRelTimeLock::RT(RelTime::from(3))).unwrap();
        assert_eq!(s, r#"{"relative_time":3}"#);
    }

    #[test]
    fn covers_requires_same_kind() {
        let a = AnyRelTimeLock::RH(RelHeight::from(10));
        let b = AnyRelTimeLock::RH(RelHeight::from(5));
        let c = AnyRelTimeLock::RT(RelTime::from(5));
        assert_eq!(a.covers(&b), Some(true));
        assert_eq!(b.covers(&a), Some(false));
        assert_eq!(a.covers(&c), None);
    }
}
