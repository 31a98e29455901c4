// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriptions which pay out on a schedule and can be cancelled, subject to
//! a contest period in which the recipient claims what they have earned.
use bitcoin::util::amount::Amount;
use covenant::contract::*;
use covenant::template::Builder;
use covenant::Clause;
use covenant_base::timelocks::{AnyAbsTimeLock, LockTimeError};
use log::debug;
use serde_json::Value;
use std::convert::TryFrom;

const LOG_TARGET: &str = "covenant_contrib::subscription";

const FIELDS: &[FieldDecl] = &[
    FieldDecl::required("amount", FieldType::Amount),
    FieldDecl::required("recipient", FieldType::Contract),
    FieldDecl::required("schedule", FieldType::Schedule),
    FieldDecl::required("return_address", FieldType::Contract),
    FieldDecl::required("watchtower_key", FieldType::PubKey),
    FieldDecl::required("return_timeout", FieldType::RelTimeSpec),
];

fn non_empty_schedule(f: &Fields) -> Result<Vec<ScheduleEntry>, CompilationError> {
    let schedule = f.schedule("schedule")?;
    if schedule.is_empty() {
        return Err(CompilationError::TypeMismatch {
            field: "schedule".into(),
            expected: "a non-empty schedule".into(),
        });
    }
    Ok(schedule)
}

fn remaining(total: Amount, spent: Amount) -> Result<Amount, CompilationError> {
    total
        .checked_sub(spent)
        .ok_or(CompilationError::AmountConservation {
            available: total,
            required: spent,
            draining: false,
        })
}

/// CancellableSubscription pays `recipient` each entry of `schedule` once its
/// time arrives, or can be cancelled into a [`CancelContest`].
pub struct CancellableSubscription;

impl CancellableSubscription {
    /// registered name
    pub const KIND: &'static str = "subscription";

    fn cancel(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let contest = NestedContract::new(CancelContest::KIND, Value::from(f.to_map()));
        Ok(ctx.template().add_output(f.amount("amount")?, contest))
    }

    fn claim(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        let schedule = non_empty_schedule(f)?;
        let (first, rest) = (&schedule[0], &schedule[1..]);
        let builder = ctx
            .template()
            .set_lock_time(first.time)?
            .add_output(first.amount, f.contract("recipient")?);
        if rest.is_empty() {
            return Ok(builder);
        }
        let new_amount = remaining(f.amount("amount")?, first.amount)?;
        debug!(target: LOG_TARGET, "{} left over {} more payments", new_amount, rest.len());
        let continuation = f
            .with("amount", Value::from(new_amount.as_sat()))
            .with("schedule", serde_json::to_value(rest)?);
        Ok(builder.add_output(
            new_amount,
            NestedContract::new(Self::KIND, Value::from(continuation.to_map())),
        ))
    }
}

impl ContractType for CancellableSubscription {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .then("cancel", None, Self::cancel)
            .then("claim", None, Self::claim)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Cancellable Subscription", "blue")
    }
}

/// A cancelled subscription. Before `return_timeout` the watchtower can
/// settle at any schedule step, paying the recipient everything earned up to
/// that step and refunding the rest. After it, everything is returned.
pub struct CancelContest;

impl CancelContest {
    /// registered name
    pub const KIND: &'static str = "cancel_contest";

    fn watchtower(f: &Fields) -> Result<Clause, CompilationError> {
        Ok(Clause::key(f.key("watchtower_key")?))
    }

    fn counterclaim<'a>(f: &'a Fields, ctx: Context) -> TxTmplIt<'a> {
        let total = f.amount("amount")?;
        let recipient = f.contract("recipient")?;
        let return_address = f.contract("return_address")?;
        let mut earned = Amount::ZERO;
        Ok(Box::new(non_empty_schedule(f)?.into_iter().map(move |entry| {
            earned = earned
                .checked_add(entry.amount)
                .ok_or(CompilationError::AmountOverflow)?;
            let refundable = remaining(total, earned)?;
            Ok(ctx
                .clone()
                .template()
                .set_lock_time(entry.time)?
                .add_output(earned, recipient.clone())
                .add_output_if_nonzero(refundable, return_address.clone()))
        })))
    }

    fn finish_cancel(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        Ok(ctx
            .template()
            .set_sequence(f.rel_time("return_timeout")?)?
            .add_output(f.amount("amount")?, f.contract("return_address")?))
    }
}

impl ContractType for CancelContest {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .generator("counterclaim", Some(Self::watchtower), Self::counterclaim)
            .then("finish_cancel", None, Self::finish_cancel)
    }
    fn metadata(&self) -> Metadata {
        Metadata::new("Cancellation Attempt", "red")
    }
}

/// A [`CancellableSubscription`] paying `per_time` at every multiple of
/// `period` blocks, `times` times.
pub struct AutoPay;

const AUTO_PAY_FIELDS: &[FieldDecl] = &[
    FieldDecl::required("period", FieldType::Int),
    FieldDecl::required("times", FieldType::Int),
    FieldDecl::required("per_time", FieldType::Amount),
    FieldDecl::required("recipient", FieldType::Contract),
    FieldDecl::required("return_address", FieldType::Contract),
    FieldDecl::required("watchtower_key", FieldType::PubKey),
    FieldDecl::required("return_timeout", FieldType::RelTimeSpec),
];

impl AutoPay {
    /// registered name
    pub const KIND: &'static str = "auto_pay";

    /// The subscription fields these auto pay fields stand for: a schedule
    /// entry at height `(t+1)*period` for each `t` below `times`, for a total
    /// of `per_time * times`.
    pub fn expand(f: &Fields) -> Result<Fields, CompilationError> {
        let period = f.int("period")?;
        let times = f.int("times")?;
        let per_time = f.amount("per_time")?;
        let schedule = (0..times)
            .map(|t| {
                let height = (t + 1)
                    .checked_mul(period)
                    .and_then(|h| u32::try_from(h).ok())
                    .ok_or(LockTimeError::HeightTooHigh(u32::MAX))?;
                Ok(ScheduleEntry {
                    time: AnyAbsTimeLock::at_height(height)?,
                    amount: per_time,
                })
            })
            .collect::<Result<Vec<_>, CompilationError>>()?;
        let amount = per_time
            .checked_mul(times)
            .ok_or(CompilationError::AmountOverflow)?;
        let mut provided = f.to_map();
        for k in ["period", "times", "per_time"] {
            provided.remove(k);
        }
        provided.insert("amount".into(), Value::from(amount.as_sat()));
        provided.insert("schedule".into(), serde_json::to_value(schedule)?);
        Fields::bind(FIELDS, provided)
    }

    fn cancel(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        CancellableSubscription::cancel(&Self::expand(f)?, ctx)
    }
    fn claim(f: &Fields, ctx: Context) -> Result<Builder, CompilationError> {
        CancellableSubscription::claim(&Self::expand(f)?, ctx)
    }
}

impl ContractType for AutoPay {
    fn kind(&self) -> &'static str {
        Self::KIND
    }
    fn fields(&self) -> &'static [FieldDecl] {
        AUTO_PAY_FIELDS
    }
    fn paths(&self) -> PathRegistry {
        PathRegistry::new()
            .then("cancel", None, Self::cancel)
            .then("claim", None, Self::claim)
    }
    fn metadata(&self) -> Metadata {
        CancellableSubscription.metadata()
    }
}
