//! Pluggable path search.
//!
//! The core never walks a map itself; it asks a [`PathSearch`] for a route
//! and only looks at where the route ends. [`NavGrid`] is a reference A* over
//! a square grid used by tests and the headless harness. [`HazardAwarePath`]
//! wraps any search and steers around remembered enemy positions.
//!
//! A search never fails for an unreachable goal: it returns the route to the
//! reachable cell nearest to it. Only a start outside the grid is an error.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::config::Thresholds;
use crate::error::{Result, TacticsError};
use crate::math::GridPos;

/// Source of routes between grid cells.
pub trait PathSearch {
    /// Route from `start` toward `goal` avoiding `blocks`.
    ///
    /// The route starts at `start` and ends at `goal` when it is reachable,
    /// otherwise at the reachable cell nearest to it.
    fn find_path(&self, start: GridPos, goal: GridPos, blocks: &HashSet<GridPos>)
        -> Result<Vec<GridPos>>;
}

/// Navigation grid for the reference search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavGrid {
    width: i32,
    height: i32,
    walls: Vec<bool>,
}

impl NavGrid {
    /// A grid with every cell walkable.
    #[must_use]
    pub fn open(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            walls: vec![false; (width * height) as usize],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Check if a cell is within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    #[inline]
    fn index(&self, pos: GridPos) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    /// Mark a cell impassable. Returns `false` if out of bounds.
    pub fn set_wall(&mut self, pos: GridPos) -> bool {
        if self.in_bounds(pos) {
            let i = self.index(pos);
            self.walls[i] = true;
            true
        } else {
            false
        }
    }

    /// Whether a cell is in bounds and not a wall.
    #[must_use]
    pub fn is_walkable(&self, pos: GridPos) -> bool {
        self.in_bounds(pos) && !self.walls[self.index(pos)]
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: GridPos,
    f_score: u32,
    /// Deterministic ordering when f_scores are equal.
    tie_breaker: u64,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower f_score must come out first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Extra steps allowed beyond twice the straight-line distance.
const DETOUR_SLACK: u32 = 32;

#[inline]
fn chebyshev(a: GridPos, b: GridPos) -> u32 {
    a.x.abs_diff(b.x).max(a.y.abs_diff(b.y))
}

#[inline]
fn tie_breaker(pos: GridPos) -> u64 {
    ((pos.y as u32 as u64) << 32) | (pos.x as u32 as u64)
}

impl NavGrid {
    fn passable(&self, pos: GridPos, blocks: &HashSet<GridPos>) -> bool {
        self.is_walkable(pos) && !blocks.contains(&pos)
    }

    /// Check if a diagonal move is valid (no corner cutting).
    fn diagonal_ok(&self, from: GridPos, dx: i32, dy: i32, blocks: &HashSet<GridPos>) -> bool {
        if dx == 0 || dy == 0 {
            return true;
        }
        self.passable(from.offset(dx, 0), blocks) && self.passable(from.offset(0, dy), blocks)
    }
}

impl PathSearch for NavGrid {
    fn find_path(
        &self,
        start: GridPos,
        goal: GridPos,
        blocks: &HashSet<GridPos>,
    ) -> Result<Vec<GridPos>> {
        if !self.in_bounds(start) {
            return Err(TacticsError::PathSearch {
                from_x: start.x,
                from_y: start.y,
                reason: "start outside grid".to_string(),
            });
        }
        if start == goal {
            return Ok(vec![start]);
        }

        let cells = self.walls.len();
        let mut g_score = vec![u32::MAX; cells];
        let mut came_from: Vec<Option<GridPos>> = vec![None; cells];
        let mut open_set = BinaryHeap::new();

        g_score[self.index(start)] = 0;
        open_set.push(AStarNode {
            pos: start,
            f_score: chebyshev(start, goal),
            tie_breaker: tie_breaker(start),
        });

        // Closest cell to the goal seen so far, by squared distance then cost.
        let mut best = (start.dist2(goal), 0_u32, start);
        // Detours longer than this are not worth exploring for an unreachable goal.
        let horizon = chebyshev(start, goal).saturating_mul(2) + DETOUR_SLACK;

        while let Some(current) = open_set.pop() {
            let current_g = g_score[self.index(current.pos)];
            if current.f_score > current_g.saturating_add(chebyshev(current.pos, goal)) {
                continue; // stale entry
            }
            let d = current.pos.dist2(goal);
            if (d, current_g) < (best.0, best.1) {
                best = (d, current_g, current.pos);
            }
            if current.pos == goal || current.f_score > horizon {
                break;
            }

            for &(dx, dy) in &DIRECTIONS {
                let next = current.pos.offset(dx, dy);
                if !self.passable(next, blocks) || !self.diagonal_ok(current.pos, dx, dy, blocks) {
                    continue;
                }
                let tentative = current_g + 1;
                let i = self.index(next);
                if tentative < g_score[i] {
                    g_score[i] = tentative;
                    came_from[i] = Some(current.pos);
                    open_set.push(AStarNode {
                        pos: next,
                        f_score: tentative + chebyshev(next, goal),
                        tie_breaker: tie_breaker(next),
                    });
                }
            }
        }

        Ok(self.reconstruct(&came_from, best.2))
    }
}

impl NavGrid {
    fn reconstruct(&self, came_from: &[Option<GridPos>], end: GridPos) -> Vec<GridPos> {
        let mut path = vec![end];
        let mut current = end;
        while let Some(prev) = came_from[self.index(current)] {
            path.push(prev);
            current = prev;
        }
        path.reverse();
        path
    }
}

/// Wraps a search and keeps routes clear of remembered enemies.
///
/// Each hazard blocks a diamond of Manhattan radius `hazard_radius` around
/// it. Cells near the goal stay open so the route can still arrive: within
/// `hazard_clear_dist2` of the goal nothing is blocked, and between
/// `hazard_inner_dist2` and that, only cells within `hazard_core_dist2` of the
/// hazard are. If the result still ends short of the goal, the plain route is
/// used instead.
pub struct HazardAwarePath<'a> {
    base: &'a dyn PathSearch,
    hazards: Vec<GridPos>,
    map_size: i32,
    radius: i32,
    clear_dist2: i64,
    inner_dist2: i64,
    core_dist2: i64,
    fallback_dist2: i64,
}

impl<'a> HazardAwarePath<'a> {
    /// Hazard-aware search around `hazards`.
    #[must_use]
    pub fn new(
        base: &'a dyn PathSearch,
        hazards: Vec<GridPos>,
        map_size: i32,
        thresholds: &Thresholds,
    ) -> Self {
        Self {
            base,
            hazards,
            map_size,
            radius: thresholds.hazard_radius,
            clear_dist2: thresholds.hazard_clear_dist2,
            inner_dist2: thresholds.hazard_inner_dist2,
            core_dist2: thresholds.hazard_core_dist2,
            fallback_dist2: thresholds.hazard_fallback_dist2,
        }
    }

    fn inflate(&self, goal: GridPos, blocks: &HashSet<GridPos>) -> HashSet<GridPos> {
        let mut inflated = blocks.clone();
        for &hazard in &self.hazards {
            for dx in -self.radius..=self.radius {
                let span = self.radius - dx.abs();
                for dy in -span..=span {
                    let cell = hazard.offset(dx, dy);
                    if !cell.in_map(self.map_size) {
                        continue;
                    }
                    let to_goal = cell.dist2(goal);
                    if to_goal > self.clear_dist2
                        || (to_goal > self.inner_dist2 && cell.dist2(hazard) <= self.core_dist2)
                    {
                        inflated.insert(cell);
                    }
                }
            }
        }
        inflated
    }
}

impl PathSearch for HazardAwarePath<'_> {
    fn find_path(
        &self,
        start: GridPos,
        goal: GridPos,
        blocks: &HashSet<GridPos>,
    ) -> Result<Vec<GridPos>> {
        if self.hazards.is_empty() {
            return self.base.find_path(start, goal, blocks);
        }
        let inflated = self.inflate(goal, blocks);
        let path = self.base.find_path(start, goal, &inflated)?;
        let arrives = path
            .last()
            .is_some_and(|end| end.dist2(goal) < self.fallback_dist2);
        if arrives {
            Ok(path)
        } else {
            tracing::debug!(?start, ?goal, "Hazard-aware route falls short, using plain route");
            self.base.find_path(start, goal, blocks)
        }
    }
}
