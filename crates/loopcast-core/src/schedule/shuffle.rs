//! Constrained shuffle: one seeded ordering of every show's blocks with no
//! show playing twice in a row, wrap-around included.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;

/// Outcome of the validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShuffleReport {
    pub total_blocks: usize,
    /// Adjacent same-show pairs, wrap-around included.
    pub violations: usize,
    pub wrap_violation: bool,
}

/// Round-robin over the queues: first of each, then second of each, ...
pub fn interleave<T>(queues: Vec<Vec<T>>) -> Vec<T> {
    let total = queues.iter().map(Vec::len).sum();
    let mut iters: Vec<_> = queues.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        for it in iters.iter_mut() {
            if let Some(item) = it.next() {
                out.push(item);
            }
        }
    }
    out
}

pub fn fisher_yates<T>(items: &mut [T], rng: &mut StdRng) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Count adjacent same-key pairs; the wrap pair counts when there are at
/// least three items.
pub fn validate<T, F>(items: &[T], key: F) -> ShuffleReport
where
    F: Fn(&T) -> &str,
{
    let n = items.len();
    let linear = items.windows(2).filter(|w| key(&w[0]) == key(&w[1])).count();
    let wrap_violation = n >= 3 && key(&items[0]) == key(&items[n - 1]);
    ShuffleReport {
        total_blocks: n,
        violations: linear + wrap_violation as usize,
        wrap_violation,
    }
}

/// Same-key linear neighbours of position `i`.
fn conflicts<T, F>(items: &[T], key: &F, i: usize) -> usize
where
    F: Fn(&T) -> &str,
{
    let k = key(&items[i]);
    let mut c = 0;
    if i > 0 && key(&items[i - 1]) == k {
        c += 1;
    }
    if i + 1 < items.len() && key(&items[i + 1]) == k {
        c += 1;
    }
    c
}

/// Fix adjacent pairs by swapping the second block with the nearest block
/// of another show, searching forward first, then backward. A swap is kept
/// only if neither touched position ends up next to its own show.
pub fn repair_linear<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    let n = items.len();
    for _pass in 0..n.max(1) {
        let mut fixed_any = false;
        let mut remaining = false;
        for i in 1..n {
            if key(&items[i - 1]) != key(&items[i]) {
                continue;
            }
            let mut fixed = false;
            for j in (i + 1..n).chain((0..i.saturating_sub(1)).rev()) {
                if key(&items[j]) == key(&items[i]) {
                    continue;
                }
                items.swap(i, j);
                if conflicts(items, &key, i) == 0 && conflicts(items, &key, j) == 0 {
                    fixed = true;
                    break;
                }
                items.swap(i, j);
            }
            if fixed {
                fixed_any = true;
            } else {
                remaining = true;
            }
        }
        if !remaining || !fixed_any {
            break;
        }
    }
}

/// If first and last share a show, swap the last with an interior block
/// that leaves every touched pair clean.
pub fn repair_wrap<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> &str,
{
    let n = items.len();
    if n < 3 || key(&items[0]) != key(&items[n - 1]) {
        return;
    }
    for j in 1..n - 1 {
        if key(&items[j]) == key(&items[0]) {
            continue;
        }
        items.swap(n - 1, j);
        if key(&items[0]) != key(&items[n - 1])
            && conflicts(items, &key, n - 1) == 0
            && conflicts(items, &key, j) == 0
        {
            return;
        }
        items.swap(n - 1, j);
    }
}

/// Deterministic spread used when repair leaves violations: largest show
/// first into even slots, then odd slots. Clean whenever no show holds more
/// than half the blocks.
fn spread<T: Clone, F>(items: &[T], key: &F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&T>> = HashMap::new();
    for item in items {
        let k = key(item);
        if !groups.contains_key(k) {
            order.push(k);
        }
        groups.entry(k).or_default().push(item);
    }
    // stable: ties keep first-appearance order
    order.sort_by_key(|k| std::cmp::Reverse(groups[k].len()));

    let n = items.len();
    let slots: Vec<usize> = (0..n).step_by(2).chain((1..n).step_by(2)).collect();
    let mut out: Vec<Option<T>> = vec![None; n];
    let flat = order.iter().flat_map(|k| groups[k].iter());
    for (slot, item) in slots.into_iter().zip(flat) {
        out[slot] = Some((*item).clone());
    }
    out.into_iter().flatten().collect()
}

/// Interleave, shuffle with `seed`, repair, validate.
pub fn constrained_shuffle<T: Clone, F>(queues: Vec<Vec<T>>, seed: u64, key: F) -> (Vec<T>, ShuffleReport)
where
    F: Fn(&T) -> &str,
{
    let mut items = interleave(queues);
    let mut rng = StdRng::seed_from_u64(seed);
    fisher_yates(&mut items, &mut rng);
    repair_linear(&mut items, &key);
    repair_wrap(&mut items, &key);

    let report = validate(&items, &key);
    if report.violations == 0 {
        return (items, report);
    }
    let spread_items = spread(&items, &key);
    let spread_report = validate(&spread_items, &key);
    if spread_report.violations < report.violations {
        tracing::debug!(
            before = report.violations,
            after = spread_report.violations,
            "repair left violations, using spread order"
        );
        (spread_items, spread_report)
    } else {
        (items, report)
    }
}
