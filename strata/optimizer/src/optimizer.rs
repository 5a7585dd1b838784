//! The optimizer driver (§4.3): runs the fixed rule set to a fixpoint,
//! applying each rule across the whole plan tree in the order its
//! `apply_order` prefers, and exposes a per-rule firing counter as query
//! statistics. `disable_optimizer` short-circuits the whole pass.

use std::collections::HashMap;
use strata_common::Result;
use strata_expr::LogicalPlan;

use crate::rule::{ApplyOrder, OptimizerRule};
use crate::rules::default_rules;

/// Safety valve against a buggy or oscillating rule; real plans converge in
/// a handful of passes since each rule only fires while it still finds work.
const MAX_PASSES: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct OptimizerStats {
    pub fired: HashMap<String, u64>,
    pub passes: usize,
}

pub struct Optimizer {
    rules: Vec<Box<dyn OptimizerRule>>,
}

impl Optimizer {
    pub fn new() -> Self {
        Self { rules: default_rules() }
    }

    /// Builds an optimizer running only the given rules, in the given
    /// order — used by tests that want to exercise one rule in isolation.
    pub fn with_rules(rules: Vec<Box<dyn OptimizerRule>>) -> Self {
        Self { rules }
    }

    pub fn optimize(&self, plan: LogicalPlan, disable_optimizer: bool) -> Result<(LogicalPlan, OptimizerStats)> {
        let mut stats = OptimizerStats::default();
        if disable_optimizer {
            return Ok((plan, stats));
        }

        let mut current = plan;
        for pass in 0..MAX_PASSES {
            stats.passes = pass + 1;
            let mut pass_changed = false;
            for rule in &self.rules {
                let (next, changed) = apply_rule_everywhere(rule.as_ref(), &current, &mut stats)?;
                current = next;
                pass_changed |= changed;
            }
            if !pass_changed {
                break;
            }
        }
        Ok((current, stats))
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_rule_everywhere(
    rule: &dyn OptimizerRule,
    plan: &LogicalPlan,
    stats: &mut OptimizerStats,
) -> Result<(LogicalPlan, bool)> {
    match rule.apply_order() {
        ApplyOrder::BottomUp => apply_bottom_up(rule, plan, stats),
        ApplyOrder::TopDown => apply_top_down(rule, plan, stats),
    }
}

fn apply_bottom_up(rule: &dyn OptimizerRule, plan: &LogicalPlan, stats: &mut OptimizerStats) -> Result<(LogicalPlan, bool)> {
    let mut any_changed = false;
    let mut new_children = Vec::new();
    for child in plan.children() {
        let (rewritten, changed) = apply_bottom_up(rule, child, stats)?;
        any_changed |= changed;
        new_children.push(rewritten);
    }
    let rebuilt = if new_children.is_empty() { plan.clone() } else { plan.with_new_children(new_children) };
    match rule.try_optimize(&rebuilt)? {
        Some(new_plan) => {
            record_fire(stats, rule.name());
            Ok((new_plan, true))
        }
        None => Ok((rebuilt, any_changed)),
    }
}

fn apply_top_down(rule: &dyn OptimizerRule, plan: &LogicalPlan, stats: &mut OptimizerStats) -> Result<(LogicalPlan, bool)> {
    let (node, fired_here) = match rule.try_optimize(plan)? {
        Some(new_plan) => {
            record_fire(stats, rule.name());
            (new_plan, true)
        }
        None => (plan.clone(), false),
    };
    let mut any_changed = fired_here;
    let mut new_children = Vec::new();
    for child in node.children() {
        let (rewritten, changed) = apply_top_down(rule, child, stats)?;
        any_changed |= changed;
        new_children.push(rewritten);
    }
    let rebuilt = if new_children.is_empty() { node } else { node.with_new_children(new_children) };
    Ok((rebuilt, any_changed))
}

fn record_fire(stats: &mut OptimizerStats, rule_name: &str) {
    *stats.fired.entry(rule_name.to_string()).or_insert(0) += 1;
}
