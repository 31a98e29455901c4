// Copyright Judica, Inc 2021
//
// This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The predicate language spending conditions are written in.
//!
//! A [`Clause`] is an immutable tree. [`Clause::reduce`] puts a tree in a
//! canonical form, and two trees with the same canonical form always lower to
//! the same policy, and therefore the same script.
use crate::timelocks::{AnyAbsTimeLock, AnyRelTimeLock, AnyTimeLock};
use bitcoin::hashes::sha256;
use miniscript::policy::concrete::Policy;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;

/// A spending predicate over signatures, timelocks and template commitments.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    /// Always satisfied; the identity of `And`
    Trivial,
    /// Never satisfied; the identity of `Or`
    Unsatisfiable,
    /// A signature from this key
    Signature(bitcoin::PublicKey),
    /// nLockTime must be at least this
    AbsoluteTime(AnyAbsTimeLock),
    /// nSequence must be at least this
    RelativeTime(AnyRelTimeLock),
    /// The spending transaction must match this CheckTemplateVerify hash
    TxTemplate(sha256::Hash),
    /// All of these
    And(Vec<Clause>),
    /// Any of these; weights hint at likelihood and only affect encoding
    Or(Vec<(usize, Clause)>),
    /// At least k of these
    Threshold(usize, Vec<Clause>),
}

impl Clause {
    /// signature check for a key
    pub fn key(pk: bitcoin::PublicKey) -> Clause {
        Clause::Signature(pk)
    }
    /// absolute timelock check
    pub fn after<L: Into<AnyAbsTimeLock>>(lt: L) -> Clause {
        Clause::AbsoluteTime(lt.into())
    }
    /// relative timelock check
    pub fn older<L: Into<AnyRelTimeLock>>(lt: L) -> Clause {
        Clause::RelativeTime(lt.into())
    }
    /// conjunction
    pub fn and_all<I: IntoIterator<Item = Clause>>(subs: I) -> Clause {
        Clause::And(subs.into_iter().collect())
    }
    /// disjunction with equal weights
    pub fn or_any<I: IntoIterator<Item = Clause>>(subs: I) -> Clause {
        Clause::Or(subs.into_iter().map(|c| (1, c)).collect())
    }
    /// disjunction with explicit weights
    pub fn or_weighted<I: IntoIterator<Item = (usize, Clause)>>(subs: I) -> Clause {
        Clause::Or(subs.into_iter().collect())
    }
    /// k of n
    pub fn threshold<I: IntoIterator<Item = Clause>>(k: usize, subs: I) -> Clause {
        Clause::Threshold(k, subs.into_iter().collect())
    }

    /// Canonicalize the tree. Pure and deterministic: the result depends only
    /// on the input tree, never on the order arguments were supplied in.
    pub fn reduce(&self) -> Clause {
        match self {
            Clause::And(subs) => reduce_and(subs.iter().map(Clause::reduce)),
            Clause::Or(subs) => reduce_or(subs.iter().map(|(w, c)| (*w, c.reduce()))),
            Clause::Threshold(k, subs) => {
                reduce_threshold(*k, subs.iter().map(Clause::reduce).collect())
            }
            leaf => leaf.clone(),
        }
    }

    /// The timelocks every satisfaction of this clause must meet.
    /// Only locks reachable through conjunctions count.
    pub fn required_timelocks(&self) -> Vec<AnyTimeLock> {
        match self {
            Clause::AbsoluteTime(a) => vec![(*a).into()],
            Clause::RelativeTime(r) => vec![(*r).into()],
            Clause::And(subs) => subs.iter().flat_map(Clause::required_timelocks).collect(),
            Clause::Threshold(k, subs) if *k == subs.len() => {
                subs.iter().flat_map(Clause::required_timelocks).collect()
            }
            _ => vec![],
        }
    }

    /// Lower to a miniscript concrete policy. n-ary conjunctions become a
    /// chain of binary `and`s; n-ary disjunctions are paired lightest first so
    /// likely branches end up shallow.
    pub fn to_policy(&self) -> Policy<bitcoin::PublicKey> {
        match self {
            Clause::Trivial => Policy::Trivial,
            Clause::Unsatisfiable => Policy::Unsatisfiable,
            Clause::Signature(pk) => Policy::Key(*pk),
            Clause::AbsoluteTime(lt) => Policy::After(lt.get()),
            Clause::RelativeTime(lt) => Policy::Older(lt.get()),
            Clause::TxTemplate(h) => Policy::TxTemplate(*h),
            Clause::And(subs) => subs
                .iter()
                .map(Clause::to_policy)
                .reduce(|a, b| Policy::And(vec![a, b]))
                .unwrap_or(Policy::Trivial),
            Clause::Or(subs) => or_tree(subs.iter().map(|(w, c)| (*w, c.to_policy())).collect()),
            Clause::Threshold(k, subs) => {
                Policy::Threshold(*k, subs.iter().map(Clause::to_policy).collect())
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Trivial => write!(f, "TRIVIAL"),
            Clause::Unsatisfiable => write!(f, "UNSATISFIABLE"),
            Clause::Signature(pk) => write!(f, "pk({})", pk),
            Clause::AbsoluteTime(lt) => write!(f, "after({})", lt.get()),
            Clause::RelativeTime(lt) => write!(f, "older({})", lt.get()),
            Clause::TxTemplate(h) => write!(f, "txtmpl({})", h),
            Clause::And(subs) => {
                write!(f, "and(")?;
                for (i, s) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", s)?;
                }
                write!(f, ")")
            }
            Clause::Or(subs) => {
                write!(f, "or(")?;
                for (i, (w, s)) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}@{}", w, s)?;
                }
                write!(f, ")")
            }
            Clause::Threshold(k, subs) => {
                write!(f, "thresh({}", k)?;
                for s in subs {
                    write!(f, ",{}", s)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn sort_canonical(v: &mut Vec<Clause>) {
    v.sort_by_cached_key(|c| c.to_string());
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// children must already be reduced
fn reduce_and<I: Iterator<Item = Clause>>(subs: I) -> Clause {
    let mut flat = vec![];
    for sub in subs {
        match sub {
            Clause::Trivial => {}
            Clause::Unsatisfiable => return Clause::Unsatisfiable,
            Clause::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    sort_canonical(&mut flat);
    flat.dedup();
    match flat.len() {
        0 => Clause::Trivial,
        1 => flat.swap_remove(0),
        _ => Clause::And(flat),
    }
}

/// children must already be reduced
fn reduce_or<I: Iterator<Item = (usize, Clause)>>(subs: I) -> Clause {
    let subs: Vec<(usize, Clause)> = subs
        .filter(|(_, c)| *c != Clause::Unsatisfiable)
        .map(|(w, c)| (w.max(1), c))
        .collect();
    if subs.iter().any(|(_, c)| *c == Clause::Trivial) {
        return Clause::Trivial;
    }
    // A nested Or contributes its leaves scaled by the parent weight. To keep
    // integer weights, every branch is scaled by the lcm of the nested totals.
    let scale = subs
        .iter()
        .filter_map(|(_, c)| match c {
            Clause::Or(inner) => Some(inner.iter().map(|(w, _)| *w).sum::<usize>()),
            _ => None,
        })
        .fold(1usize, |acc, total| acc.saturating_mul(total / gcd(acc, total)));
    let mut flat: Vec<(usize, Clause)> = vec![];
    for (w, sub) in subs {
        match sub {
            Clause::Or(inner) => {
                let total: usize = inner.iter().map(|(iw, _)| *iw).sum();
                let per = scale / total;
                flat.extend(
                    inner
                        .into_iter()
                        .map(|(iw, c)| (w.saturating_mul(iw).saturating_mul(per), c)),
                );
            }
            other => flat.push((w.saturating_mul(scale), other)),
        }
    }
    flat.sort_by_cached_key(|(_, c)| c.to_string());
    let mut merged: Vec<(usize, Clause)> = Vec::with_capacity(flat.len());
    for (w, c) in flat {
        match merged.last_mut() {
            Some((lw, lc)) if *lc == c => *lw = lw.saturating_add(w),
            _ => merged.push((w, c)),
        }
    }
    if let Some(factored) = factor_shared(&merged) {
        return factored;
    }
    let g = merged.iter().fold(0, |g, (w, _)| gcd(g, *w));
    match merged.len() {
        0 => Clause::Unsatisfiable,
        1 => merged.swap_remove(0).1,
        _ => Clause::Or(merged.into_iter().map(|(w, c)| (w / g, c)).collect()),
    }
}

fn conjuncts(c: &Clause) -> &[Clause] {
    match c {
        Clause::And(subs) => subs,
        other => std::slice::from_ref(other),
    }
}

/// Pulls the conjunct shared by the most branches out of a disjunction, so
/// `or(and(k,x),and(k,y),z)` becomes `or(and(k,or(x,y)),z)`. A key guarding
/// several paths then appears once in the policy, which the policy compiler
/// requires. Ties go to the first conjunct in canonical order. Each step
/// removes at least one leaf, so repeating it terminates.
///
/// branches must already be reduced and merged
fn factor_shared(branches: &[(usize, Clause)]) -> Option<Clause> {
    let mut counts: BTreeMap<String, (usize, &Clause)> = BTreeMap::new();
    for (_, b) in branches {
        for c in conjuncts(b) {
            counts.entry(c.to_string()).or_insert((0, c)).0 += 1;
        }
    }
    let mut best: Option<(usize, &Clause)> = None;
    for (n, c) in counts.values() {
        if *n > 1 && best.map_or(true, |(m, _)| *n > m) {
            best = Some((*n, *c));
        }
    }
    let shared = best?.1.clone();
    let mut weight = 0usize;
    let mut rests = vec![];
    let mut others = vec![];
    for (w, b) in branches {
        let cs = conjuncts(b);
        if cs.contains(&shared) {
            weight = weight.saturating_add(*w);
            rests.push((*w, reduce_and(cs.iter().filter(|c| **c != shared).cloned())));
        } else {
            others.push((*w, b.clone()));
        }
    }
    let grouped = reduce_and(vec![shared, reduce_or(rests.into_iter())].into_iter());
    others.push((weight, grouped));
    Some(reduce_or(others.into_iter()))
}

/// children must already be reduced
fn reduce_threshold(k: usize, subs: Vec<Clause>) -> Clause {
    let trivials = subs.iter().filter(|c| **c == Clause::Trivial).count();
    let mut rest: Vec<Clause> = subs
        .into_iter()
        .filter(|c| *c != Clause::Trivial && *c != Clause::Unsatisfiable)
        .collect();
    let k = k.saturating_sub(trivials);
    let n = rest.len();
    if k == 0 {
        Clause::Trivial
    } else if k > n {
        Clause::Unsatisfiable
    } else if k == n {
        reduce_and(rest.into_iter())
    } else if k == 1 {
        reduce_or(rest.into_iter().map(|c| (1, c)))
    } else {
        sort_canonical(&mut rest);
        Clause::Threshold(k, rest)
    }
}

struct Weighted(usize, usize, Policy<bitcoin::PublicKey>);
impl PartialEq for Weighted {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}
impl Eq for Weighted {}
impl PartialOrd for Weighted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Weighted {
    // min-heap on weight, then on insertion order
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0).then_with(|| other.1.cmp(&self.1))
    }
}

fn or_tree(branches: Vec<(usize, Policy<bitcoin::PublicKey>)>) -> Policy<bitcoin::PublicKey> {
    let mut seq = branches.len();
    let mut heap: BinaryHeap<Weighted> = branches
        .into_iter()
        .enumerate()
        .map(|(i, (w, p))| Weighted(w, i, p))
        .collect();
    while heap.len() > 1 {
        if let (Some(a), Some(b)) = (heap.pop(), heap.pop()) {
            heap.push(Weighted(
                a.0.saturating_add(b.0),
                seq,
                Policy::Or(vec![(a.0, a.2), (b.0, b.2)]),
            ));
            seq += 1;
        }
    }
    heap.pop().map(|w| w.2).unwrap_or(Policy::Unsatisfiable)
}
