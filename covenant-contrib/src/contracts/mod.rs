// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract kinds

pub mod cold_storage;
pub mod payments;
pub mod subscription;
pub mod undo_send;
pub mod vault;

pub use cold_storage::ColdStorage;
pub use payments::Payments;
pub use subscription::{AutoPay, CancelContest, CancellableSubscription};
pub use undo_send::{UndoSend, UndoSend2};
pub use vault::SmarterVault;
