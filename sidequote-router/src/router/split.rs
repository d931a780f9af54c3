//! Split optimisation: distributing one input across several routes.
//!
//! The input is discretised into equal increments; every selection of up to
//! `max_split_routes` candidate routes is scored by the best allocation of
//! increments to its members. Routes through generalised CosmWasm pools are
//! excluded from selections, since each of their evaluations is a network
//! round-trip and split search multiplies evaluation counts; they still
//! compete as single routes.

use futures::future::join_all;
use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::Zero;
use sidequote_common::Coin;
use tracing::{debug, trace};

use crate::router::route::Route;

/// The share of a quote assigned to one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAllocation {
    /// Index into the caller's ranked route list.
    pub route_index: usize,
    pub amount_in: BigUint,
}

/// Picks the input distribution with the highest total output.
///
/// `ranked_outputs` are the full-amount outputs the caller already computed
/// while ranking; index-aligned with `routes`. Ties favour fewer routes,
/// then lower route indices, preserving the ranking order.
pub async fn optimize_splits(
    token_in: &Coin,
    routes: &[Route],
    ranked_outputs: &[BigUint],
    max_split_routes: usize,
    max_split_iterations: usize,
) -> Vec<SplitAllocation> {
    let best_single = best_single_allocation(token_in, ranked_outputs);
    if max_split_routes <= 1 || max_split_iterations < 2 || routes.len() < 2 {
        return best_single.into_iter().collect();
    }

    let splittable: Vec<usize> = (0..routes.len())
        .filter(|&i| !routes[i].contains_generalized_cw_pool())
        .collect();
    if splittable.len() < 2 {
        return best_single.into_iter().collect();
    }

    let increments = max_split_iterations;
    let tables = output_tables(token_in, routes, &splittable, increments).await;

    let mut best_split: Option<(BigUint, Vec<usize>, Vec<usize>)> = None;
    let selection_cap = max_split_routes.min(splittable.len());
    for k in 2..=selection_cap {
        for positions in (0..splittable.len()).combinations(k) {
            let member_tables: Vec<&Vec<Option<BigUint>>> =
                positions.iter().map(|&p| &tables[p]).collect();
            let Some((total, counts)) = best_allocation(&member_tables, increments) else {
                continue;
            };
            let selection: Vec<usize> = positions.iter().map(|&p| splittable[p]).collect();
            let replace = match &best_split {
                None => true,
                Some((best_total, best_selection, _)) => match total.cmp(best_total) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        (selection.len(), index_sum(&selection))
                            < (best_selection.len(), index_sum(best_selection))
                    }
                },
            };
            if replace {
                best_split = Some((total, selection, counts));
            }
        }
    }

    match (best_single, best_split) {
        (Some(single), None) => vec![single],
        (None, None) => Vec::new(),
        (single, Some((split_total, selection, counts))) => {
            // Equal totals keep the single route.
            if single
                .as_ref()
                .is_some_and(|s| single_output(s, ranked_outputs) >= &split_total)
            {
                return single.into_iter().collect();
            }
            debug!(
                routes = selection.len(),
                total_out = %split_total,
                "split beats best single route"
            );
            finalize(token_in, &selection, &counts, max_split_iterations)
                .or_else(|| single.map(|s| vec![s]))
                .unwrap_or_default()
        }
    }
}

fn best_single_allocation(token_in: &Coin, ranked_outputs: &[BigUint]) -> Option<SplitAllocation> {
    ranked_outputs
        .iter()
        .enumerate()
        .max_by(|(a_idx, a), (b_idx, b)| a.cmp(b).then(b_idx.cmp(a_idx)))
        .map(|(route_index, _)| SplitAllocation {
            route_index,
            amount_in: token_in.amount.clone(),
        })
}

fn single_output<'a>(single: &SplitAllocation, ranked_outputs: &'a [BigUint]) -> &'a BigUint {
    &ranked_outputs[single.route_index]
}

/// Per-route outputs for every increment count, evaluated concurrently
/// across routes. A failed or zero-amount evaluation disallows that count.
async fn output_tables(
    token_in: &Coin,
    routes: &[Route],
    splittable: &[usize],
    increments: usize,
) -> Vec<Vec<Option<BigUint>>> {
    let futures = splittable.iter().map(|&route_index| {
        let route = &routes[route_index];
        async move {
            let mut table: Vec<Option<BigUint>> = vec![Some(BigUint::zero())];
            for count in 1..=increments {
                let amount = &token_in.amount * count as u64 / increments as u64;
                if amount.is_zero() {
                    table.push(None);
                    continue;
                }
                let coin = Coin { denom: token_in.denom.clone(), amount };
                table.push(route.calculate_token_out(&coin).await.ok().map(|out| out.amount));
            }
            table
        }
    });
    join_all(futures).await
}

/// Maximises the summed output of one selection, each member receiving at
/// least one increment.
fn best_allocation(
    tables: &[&Vec<Option<BigUint>>],
    remaining: usize,
) -> Option<(BigUint, Vec<usize>)> {
    let (first, rest) = tables.split_first()?;
    if rest.is_empty() {
        let out = first.get(remaining)?.clone()?;
        return Some((out, vec![remaining]));
    }

    let mut best: Option<(BigUint, Vec<usize>)> = None;
    for count in 1..=remaining.saturating_sub(rest.len()) {
        let Some(Some(out)) = first.get(count).map(Clone::clone) else {
            continue;
        };
        let Some((tail_out, tail_counts)) = best_allocation(rest, remaining - count) else {
            continue;
        };
        let total = out + tail_out;
        if best.as_ref().map_or(true, |(b, _)| &total > b) {
            let mut counts = vec![count];
            counts.extend(tail_counts);
            best = Some((total, counts));
        }
    }
    best
}

/// Turns increment counts into exact amounts; the last member absorbs the
/// rounding remainder so the shares always sum to the input.
fn finalize(
    token_in: &Coin,
    selection: &[usize],
    counts: &[usize],
    increments: usize,
) -> Option<Vec<SplitAllocation>> {
    let mut allocations = Vec::with_capacity(selection.len());
    let mut assigned = BigUint::zero();
    for (position, (&route_index, &count)) in selection.iter().zip(counts).enumerate() {
        let amount_in = if position + 1 == selection.len() {
            &token_in.amount - &assigned
        } else {
            &token_in.amount * count as u64 / increments as u64
        };
        if amount_in.is_zero() {
            trace!(route_index, "zero share after discretisation; falling back");
            return None;
        }
        assigned += &amount_in;
        allocations.push(SplitAllocation { route_index, amount_in });
    }
    Some(allocations)
}

fn index_sum(selection: &[usize]) -> usize {
    selection.iter().sum()
}
