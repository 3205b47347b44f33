//! Side-level spending: hiring, buy-backs, level-ups and the base's target.

use std::collections::HashMap;

use crate::dispatch::Tactician;
use crate::error::Result;
use crate::orders::SideOrder;
use crate::snapshot::{Effect, EntityId, UnitKind};

/// Upper bound on hires per round.
const MAX_PURCHASES: usize = 16;

impl Tactician<'_> {
    /// Gold still free this round.
    pub(crate) const fn budget(&self) -> i32 {
        let eco = &self.snap.economy;
        eco.gold - eco.committed - self.spent
    }

    /// Run every spending pass, then aim the base.
    pub(crate) fn run_economy(&mut self) -> Result<()> {
        self.hire()?;
        self.buy_back()?;
        self.level_up()?;
        self.aim_base()
    }

    /// Hire heroes while gold is plentiful, favoring the scarcest kind.
    fn hire(&mut self) -> Result<()> {
        let snap = self.snap;
        let eco = snap.economy;
        if eco.assets <= 0
            || f64::from(eco.gold) / f64::from(eco.assets) < self.config.thresholds.purchase_ratio
        {
            return Ok(());
        }
        let mut counts = UnitKind::HEROES.map(|kind| snap.own_units().filter(|u| u.kind == kind).count());
        for _ in 0..MAX_PURCHASES {
            // exp(-count) is highest for the smallest count; ties keep hero order.
            let Some((slot, &count)) = counts
                .iter()
                .enumerate()
                .min_by_key(|&(i, &c)| (c, i))
            else {
                break;
            };
            let kind = UnitKind::HEROES[slot];
            let Some(cost) = self.config.rules.hire_cost(kind).filter(|&c| c > 0) else {
                break;
            };
            let reserve = cost.saturating_mul(i32::try_from(count + 1).unwrap_or(i32::MAX));
            if reserve > self.budget() {
                break;
            }
            self.emit_side(SideOrder::Hire(kind))?;
            self.spent += cost;
            counts[slot] += 1;
            tracing::info!(round = snap.round, side = ?snap.side, ?kind, cost, "Hired hero");
        }
        Ok(())
    }

    /// Buy back reviving units while the base is under threat and defended.
    fn buy_back(&mut self) -> Result<()> {
        let snap = self.snap;
        let config = self.config;
        let rules = &config.rules;
        let home = self.home();
        if !self.alarmed
            || !snap
                .own_within(home, i64::from(rules.base_range))
                .any(|u| u.kind != UnitKind::Base)
        {
            return Ok(());
        }
        let waiting: Vec<(EntityId, u32)> = snap
            .own_units()
            .filter(|u| {
                u.effect(Effect::Reviving)
                    .is_some_and(|e| e.remaining > config.thresholds.buyback_min_rounds)
            })
            .map(|u| (u.id, u.level))
            .collect();
        for (id, level) in waiting {
            let cost = rules.buyback_cost(level);
            if cost >= self.budget() {
                continue;
            }
            self.emit_side(SideOrder::BuyBack(id))?;
            self.spent += cost;
            tracing::info!(round = snap.round, side = ?snap.side, unit = id, cost, "Bought back unit");
        }
        Ok(())
    }

    /// Level up heroes near home, cheapest first.
    fn level_up(&mut self) -> Result<()> {
        let snap = self.snap;
        let config = self.config;
        let rules = &config.rules;
        let home = self.home();
        let heroes: Vec<(EntityId, u32)> = snap
            .own_within(home, i64::from(rules.level_up_range))
            .filter(|u| u.kind.is_hero() && !u.is_reviving())
            .map(|u| (u.id, u.level))
            .collect();
        if heroes.is_empty() {
            return Ok(());
        }
        let mut pending: HashMap<EntityId, u32> = HashMap::new();
        loop {
            let Some((id, cost)) = heroes
                .iter()
                .map(|&(id, level)| {
                    let at = level + pending.get(&id).copied().unwrap_or(0);
                    (id, rules.level_up_cost(at))
                })
                .min_by_key(|&(id, cost)| (cost, id))
            else {
                break;
            };
            if cost <= 0 || cost >= self.budget() {
                break;
            }
            self.emit_side(SideOrder::LevelUp(id))?;
            self.spent += cost;
            *pending.entry(id).or_default() += 1;
            tracing::info!(round = snap.round, side = ?snap.side, unit = id, cost, "Levelled up unit");
        }
        Ok(())
    }

    /// Point the base at the most valuable hostile in range.
    fn aim_base(&mut self) -> Result<()> {
        let snap = self.snap;
        let home = self.home();
        let in_range: Vec<EntityId> = snap
            .hostiles_within(home, i64::from(self.config.rules.base_range))
            .filter(|u| u.is_active())
            .map(|u| u.id)
            .collect();
        let mut best: Option<(EntityId, f64)> = None;
        for id in in_range {
            let v = self.scorer.value(snap, id);
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((id, v));
            }
        }
        if let Some((target, _)) = best {
            self.emit_side(SideOrder::BaseAttack(target))?;
        }
        Ok(())
    }
}
