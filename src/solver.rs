//! The reasoning engine: frontier extraction, the two deterministic
//! deduction rules, exhaustive arrangement enumeration with pruning, and
//! probability-based move selection.

use crate::{Board, Point, Visibility};
use anyhow::bail;
use itertools::Itertools;
use log::{debug, trace};
use std::collections::HashMap;

/// Above this many undetermined cells the solver gives up on exhaustive
/// enumeration (the search is O(2^k)) and falls back to the global
/// base-rate guess. Deployment-level safety valve; the enumerator itself
/// is unguarded.
pub const ENUMERATION_LIMIT: usize = 24;

/// The constraint contributed by one opened, numbered frontier cell:
/// exactly `residual` of its still-hidden neighbors are mines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// The opened cell whose number produced this constraint.
    pub cell: Point,
    /// Mines still required after subtracting the flagged neighbors.
    pub residual: usize,
    /// The hidden (undetermined) neighbors the residual applies to.
    pub hidden: Vec<Point>,
}

/// What one deduction pass over the frontier concluded.
#[derive(Debug, Default)]
pub struct Deduction {
    /// Cells proven to be mines and flagged on the board (Rule 1).
    pub flagged: Vec<Point>,
    /// Cells proven safe, deduplicated in first-encounter order (Rule 2).
    pub safe: Vec<Point>,
}

/// The frontier: every Opened cell with a nonzero frequency that still has
/// at least one Hidden neighbor, in row-major scan order. Recomputed from
/// scratch each turn; solved cells drop out on their own.
pub fn frontier(board: &Board) -> Vec<Point> {
    board
        .positions()
        .filter(|&p| {
            board.vis(p) == Visibility::Opened
                && board.freq(p) > 0
                && !board.hidden_neighbors(p).is_empty()
        })
        .collect()
}

/// Runs the two deduction rules, in order, over a fixed frontier snapshot.
///
/// Rule 1: if a cell's hidden and flagged neighbors together account for
/// its whole frequency, every hidden neighbor is a mine and gets flagged.
/// Rule 2: if the flagged neighbors alone account for the frequency, every
/// hidden neighbor is safe.
///
/// Rule 2 sees Rule 1's flags through live neighbor queries, but the
/// iteration set is frozen: a cell flagged mid-pass is never re-examined
/// within the same turn. This is deliberately not run to a fixed point.
pub fn deduce(board: &mut Board, frontier: &[Point]) -> Deduction {
    let mut flagged = Vec::new();
    for &cell in frontier {
        let hidden = board.hidden_neighbors(cell);
        let n_flagged = board.flagged_neighbors(cell).len();
        if !hidden.is_empty() && hidden.len() + n_flagged == board.freq(cell) as usize {
            for p in hidden {
                // `p` was Hidden a moment ago and nothing else runs in
                // between, so the transition cannot fail.
                board
                    .flag(p)
                    .unwrap_or_else(|e| unreachable!("flagging a hidden cell: {e}"));
                trace!("rule 1: ({}, {}) forces a mine at ({}, {})", cell.x, cell.y, p.x, p.y);
                flagged.push(p);
            }
        }
    }

    let mut safe = Vec::new();
    for &cell in frontier {
        if board.flagged_neighbors(cell).len() == board.freq(cell) as usize {
            for p in board.hidden_neighbors(cell) {
                trace!("rule 2: ({}, {}) proves ({}, {}) safe", cell.x, cell.y, p.x, p.y);
                safe.push(p);
            }
        }
    }
    let safe = safe.into_iter().unique().collect();

    Deduction { flagged, safe }
}

/// Builds the residual constraint for every frontier cell that still has
/// hidden neighbors. A flag count exceeding a cell's frequency means a
/// provably-wrong flag exists somewhere, which the sound rules can never
/// produce; treat it as corruption rather than clamping it away.
pub fn constraints(board: &Board, frontier: &[Point]) -> anyhow::Result<Vec<Constraint>> {
    let mut result = Vec::new();
    for &cell in frontier {
        let hidden = board.hidden_neighbors(cell);
        if hidden.is_empty() {
            continue;
        }
        let flagged = board.flagged_neighbors(cell).len();
        let Some(residual) = (board.freq(cell) as usize).checked_sub(flagged) else {
            bail!(
                "cell ({}, {}) has {} flagged neighbors but frequency {}: board state corrupted",
                cell.x,
                cell.y,
                flagged,
                board.freq(cell)
            );
        };
        result.push(Constraint {
            cell,
            residual,
            hidden,
        });
    }
    Ok(result)
}

/// Exhaustively enumerates every mine/safe assignment over `cells` that
/// drives the residual of every constraint to exactly zero.
///
/// Binary backtracking, one cell at a time, "mine" branch first. The mine
/// branch is pruned when any constraint touching the cell is already
/// satisfied (its residual is 0); decrements are undone on backtrack, so
/// there is a single mutable residual state and no per-branch copies.
/// O(2^k) in the number of cells.
pub fn enumerate_arrangements(cells: &[Point], constraints: &[Constraint]) -> Vec<Vec<bool>> {
    let index: HashMap<Point, usize> = cells.iter().enumerate().map(|(i, &p)| (p, i)).collect();

    // For each cell, the constraints it participates in.
    let mut touching: Vec<Vec<usize>> = vec![Vec::new(); cells.len()];
    let mut residuals: Vec<usize> = Vec::with_capacity(constraints.len());
    for (ci, c) in constraints.iter().enumerate() {
        residuals.push(c.residual);
        for p in &c.hidden {
            if let Some(&i) = index.get(p) {
                touching[i].push(ci);
            }
        }
    }

    let mut assignment = vec![false; cells.len()];
    let mut out = Vec::new();
    backtrack(0, &touching, &mut residuals, &mut assignment, &mut out);
    out
}

fn backtrack(
    idx: usize,
    touching: &[Vec<usize>],
    residuals: &mut [usize],
    assignment: &mut Vec<bool>,
    out: &mut Vec<Vec<bool>>,
) {
    if idx == touching.len() {
        if residuals.iter().all(|&r| r == 0) {
            out.push(assignment.clone());
        }
        return;
    }

    // "Mine" branch: illegal if it would overshoot a satisfied constraint.
    if touching[idx].iter().all(|&ci| residuals[ci] > 0) {
        for &ci in &touching[idx] {
            residuals[ci] -= 1;
        }
        assignment[idx] = true;
        backtrack(idx + 1, touching, residuals, assignment, out);
        for &ci in &touching[idx] {
            residuals[ci] += 1;
        }
    }

    // "Not mine" branch.
    assignment[idx] = false;
    backtrack(idx + 1, touching, residuals, assignment, out);
}

/// Per-cell mine probability across a non-empty arrangement set:
/// count of arrangements assigning a mine, divided by the total.
pub fn aggregate(cells: &[Point], arrangements: &[Vec<bool>]) -> HashMap<Point, f64> {
    debug_assert!(!arrangements.is_empty());
    let total = arrangements.len() as f64;
    cells
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let mines = arrangements.iter().filter(|a| a[i]).count();
            (p, mines as f64 / total)
        })
        .collect()
}

/// The per-game orchestrator: one decision per turn.
///
/// Runs deduction first, falls back to enumeration plus probability
/// aggregation when no certain move exists, and returns the cell(s) to
/// open. The caller applies the moves to the board (including flood-opens)
/// before asking for the next turn.
pub struct Solver {
    turn: u32,
    probabilities: HashMap<Point, f64>,
}

impl Solver {
    pub fn new() -> Self {
        Solver {
            turn: 0,
            probabilities: HashMap::new(),
        }
    }

    /// The mine-probability map of the most recent decision. Certain cells
    /// carry exactly 0.0 or 1.0; cells the last turn learned nothing about
    /// are absent.
    pub fn probabilities(&self) -> &HashMap<Point, f64> {
        &self.probabilities
    }

    /// Advances one turn and returns the cells to open. The returned list
    /// is empty only when the board is already won.
    pub fn make_move(&mut self, board: &mut Board) -> anyhow::Result<Vec<Point>> {
        // Turn 0: nothing is revealed yet, so no deduction is possible.
        // The fixed corner opening bootstraps the frontier; it is a known
        // concession, not a guaranteed-safe move.
        if self.turn == 0 {
            self.turn += 1;
            debug!("turn 0: fixed corner opening");
            return Ok(vec![Point::new(0, 0)]);
        }
        self.turn += 1;
        self.probabilities.clear();

        let frontier = frontier(board);
        let deduction = deduce(board, &frontier);

        // Flags persist across turns and every flag is a proven mine.
        let flagged_cells: Vec<Point> = board
            .positions()
            .filter(|&p| board.vis(p) == Visibility::Flagged)
            .collect();
        for p in flagged_cells {
            self.probabilities.insert(p, 1.0);
        }
        for &p in &deduction.safe {
            self.probabilities.insert(p, 0.0);
        }
        debug!(
            "turn {}: frontier {}, {} new flags, {} forced-safe",
            self.turn,
            frontier.len(),
            deduction.flagged.len(),
            deduction.safe.len()
        );

        if !deduction.safe.is_empty() {
            return Ok(deduction.safe);
        }
        if board.is_won() {
            return Ok(Vec::new());
        }

        let constraints = constraints(board, &frontier)?;
        let undetermined: Vec<Point> = constraints
            .iter()
            .flat_map(|c| c.hidden.iter().copied())
            .unique()
            .collect();

        if undetermined.is_empty() {
            return self.base_rate_guess(board);
        }
        if undetermined.len() > ENUMERATION_LIMIT {
            debug!(
                "frontier too large to enumerate ({} undetermined cells)",
                undetermined.len()
            );
            return self.base_rate_guess(board);
        }

        let arrangements = enumerate_arrangements(&undetermined, &constraints);
        if arrangements.is_empty() {
            // The true mine layout restricted to the frontier is always a
            // consistent arrangement, so an empty set means the frequency
            // or visibility invariants were corrupted.
            bail!("no mine arrangement satisfies the revealed numbers: board state corrupted");
        }
        debug!(
            "enumerated {} arrangements over {} undetermined cells",
            arrangements.len(),
            undetermined.len()
        );
        let estimates = aggregate(&undetermined, &arrangements);

        // Lowest-risk single cell; the first in the undetermined ordering
        // wins ties.
        let mut best = undetermined[0];
        let mut best_p = estimates[&best];
        for &p in &undetermined[1..] {
            if estimates[&p] < best_p {
                best = p;
                best_p = estimates[&p];
            }
        }
        trace!("guessing ({}, {}) at probability {:.3}", best.x, best.y, best_p);
        self.probabilities.extend(estimates);

        Ok(vec![best])
    }

    /// No constraint touches any hidden cell (or the frontier is too large
    /// to enumerate): every hidden cell shares the global base rate, so
    /// pick the first in scan order.
    fn base_rate_guess(&mut self, board: &Board) -> anyhow::Result<Vec<Point>> {
        let hidden: Vec<Point> = board
            .positions()
            .filter(|&p| board.vis(p) == Visibility::Hidden)
            .collect();
        if hidden.is_empty() {
            bail!("no hidden cells remain on an unwon board: board state corrupted");
        }
        let rate = board.remaining_mines() as f64 / hidden.len() as f64;
        for &p in &hidden {
            self.probabilities.insert(p, rate);
        }
        debug!("base-rate fallback: {} hidden cells at {:.3}", hidden.len(), rate);
        Ok(vec![hidden[0]])
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}
