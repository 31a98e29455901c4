// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The min and max amounts a contract moves
use bitcoin::util::amount::Amount;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Ord, PartialOrd, PartialEq, Eq)]
#[serde(transparent)]
struct AmountSats(#[serde(with = "bitcoin::util::amount::serde::as_sat")] Amount);

/// Tracks the smallest and largest amount seen.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmountRange {
    min: Option<AmountSats>,
    max: Option<AmountSats>,
}

impl AmountRange {
    /// an empty range
    pub fn new() -> AmountRange {
        AmountRange::default()
    }
    /// widen the range to include `amount`
    pub fn update_range(&mut self, amount: Amount) {
        let a = Some(AmountSats(amount));
        self.min = if self.min.is_none() { a } else { std::cmp::min(self.min, a) };
        self.max = std::cmp::max(self.max, a);
    }
    /// smallest amount seen, zero if none
    pub fn min(&self) -> Amount {
        self.min.map(|a| a.0).unwrap_or(Amount::ZERO)
    }
    /// largest amount seen, zero if none
    pub fn max(&self) -> Amount {
        self.max.map(|a| a.0).unwrap_or(Amount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn range() {
        let mut r = AmountRange::new();
        assert_eq!(r.max(), Amount::ZERO);
        r.update_range(Amount::from_sat(5));
        r.update_range(Amount::from_sat(2));
        r.update_range(Amount::from_sat(9));
        assert_eq!(r.min(), Amount::from_sat(2));
        assert_eq!(r.max(), Amount::from_sat(9));
    }
}
