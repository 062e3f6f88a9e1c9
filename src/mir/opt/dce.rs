//! Dead temporary elimination.
//!
//! The expression flattener spills aggressively, so most bodies carry
//! temporaries nobody reads. A local is dead when nothing uses its value
//! and every write to it is a pure bare assignment; its writes become nops
//! and are swept, and the local table renumbers densely afterwards so
//! later stages see no gaps.
//!
//! Effectful writes pin their destination: an unused call result keeps
//! both the call and its local, and a projected store counts as a read of
//! the base, so partially initialized aggregates survive. Parameters and
//! the return place are never candidates.

use crate::diagnostics::LimitError;
use crate::hir::LocalId;
use crate::session::Limits;

use super::super::body::{LocalKind, MirBody};
use super::super::types::{Statement, StatementKind};
use super::super::visitor::{remap_locals, walk_body, Location, PlaceContext, Visitor};
use super::Pass;

/// The dead temporary elimination pass.
pub struct DeadTempElim;

impl Pass for DeadTempElim {
    fn name(&self) -> &'static str {
        "dead-temp-elim"
    }

    fn run(&mut self, body: &mut MirBody, _limits: &Limits) -> Result<bool, LimitError> {
        let mut changed = false;
        let mut removed = vec![false; body.locals.len()];

        // Killing one temp's definition can orphan the temps it read, so
        // collect until a scan finds nothing. Each round removes at least
        // one local, which bounds the loop by the table size.
        loop {
            let candidates = find_dead(body, &removed);
            if candidates.iter().all(|&dead| !dead) {
                break;
            }
            nop_out_writes(body, &candidates);
            for (index, &dead) in candidates.iter().enumerate() {
                if dead {
                    removed[index] = true;
                }
            }
            changed = true;
        }

        changed |= sweep_nops(body);

        if removed.iter().any(|&dead| dead) {
            renumber(body, &removed);
        }
        Ok(changed)
    }
}

struct UseCounter {
    uses: Vec<usize>,
    pinned: Vec<bool>,
}

impl Visitor for UseCounter {
    fn visit_local(&mut self, local: LocalId, context: PlaceContext, _location: Location) {
        if context.is_use() {
            self.uses[local.index as usize] += 1;
        }
    }

    fn visit_statement(&mut self, stmt: &Statement, location: Location) {
        if let StatementKind::Assign(place, rvalue) = &stmt.kind {
            if let Some(local) = place.as_local() {
                if rvalue.has_effects() {
                    self.pinned[local.index as usize] = true;
                }
            }
        }
        self.super_statement(stmt, location);
    }
}

/// Locals with no reads and only pure bare writes, excluding those already
/// removed in an earlier round.
fn find_dead(body: &MirBody, removed: &[bool]) -> Vec<bool> {
    let mut counter = UseCounter {
        uses: vec![0; body.locals.len()],
        pinned: vec![false; body.locals.len()],
    };
    walk_body(&mut counter, body);

    body.locals
        .iter()
        .enumerate()
        .map(|(index, local)| {
            matches!(local.kind, LocalKind::Temp | LocalKind::Var)
                && !removed[index]
                && counter.uses[index] == 0
                && !counter.pinned[index]
        })
        .collect()
}

/// Blank out every pure bare write to a dead local.
fn nop_out_writes(body: &mut MirBody, dead: &[bool]) {
    for block in &mut body.basic_blocks {
        for stmt in &mut block.statements {
            if let StatementKind::Assign(place, rvalue) = &stmt.kind {
                let target = match place.as_local() {
                    Some(local) => local,
                    None => continue,
                };
                if dead[target.index as usize] && !rvalue.has_effects() {
                    stmt.kind = StatementKind::Nop;
                }
            }
        }
    }
}

/// Drop nop statements, including ones left by other passes.
fn sweep_nops(body: &mut MirBody) -> bool {
    let mut changed = false;
    for block in &mut body.basic_blocks {
        let before = block.statements.len();
        block.statements.retain(|stmt| !stmt.is_nop());
        changed |= block.statements.len() != before;
    }
    changed
}

/// Remove dead locals from the table and rewrite every surviving
/// reference densely.
fn renumber(body: &mut MirBody, removed: &[bool]) {
    let mut map = vec![LocalId::new(0); body.locals.len()];
    let mut kept = Vec::with_capacity(body.locals.len());
    let mut next = 0u32;

    for (index, local) in body.locals.iter().enumerate() {
        if !removed[index] {
            let mut local = local.clone();
            local.id = LocalId::new(next);
            map[index] = local.id;
            kept.push(local);
            next += 1;
        }
    }

    body.locals = kept;
    remap_locals(body, &|local| map[local.index as usize]);
}

// ============================================================================
// Tests
// ============================================================================
