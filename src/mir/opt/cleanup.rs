//! Control-flow graph cleanup.
//!
//! The CFG builder emits redundant structure on purpose: a one-armed `if`
//! still gets its else block, dead statements land in stranded blocks,
//! loop shapes carry forwarding gotos. This pass canonicalizes:
//!
//! - branches whose arms agree, or whose condition is a constant, become
//!   gotos
//! - empty blocks that only forward are threaded out of every edge
//! - a block with a single goto predecessor merges into it
//! - blocks unreachable from the entry are deleted and the rest renumber
//!   densely
//!
//! Each sub-step can expose work for the others, so the pass iterates
//! until the body stops changing.

use crate::diagnostics::LimitError;
use crate::session::Limits;

use super::super::body::MirBody;
use super::super::types::{BasicBlockId, Terminator, TerminatorKind, TrapReason};
use super::Pass;

/// The CFG canonicalization pass.
pub struct CleanupCfg;

impl Pass for CleanupCfg {
    fn name(&self) -> &'static str {
        "cleanup-cfg"
    }

    fn run(&mut self, body: &mut MirBody, limits: &Limits) -> Result<bool, LimitError> {
        let mut changed = false;
        for _ in 0..limits.max_pass_iterations {
            let mut round = simplify_branches(body);
            round |= thread_gotos(body);
            round |= merge_chains(body);
            round |= drop_unreachable(body);
            if !round {
                return Ok(changed);
            }
            changed = true;
        }
        Err(LimitError::IterationLimit {
            pass: self.name(),
            limit: limits.max_pass_iterations,
            span: body.span,
        })
    }
}

/// Turn degenerate and constant branches into gotos.
fn simplify_branches(body: &mut MirBody) -> bool {
    let mut changed = false;
    for block in &mut body.basic_blocks {
        let Some(term) = &mut block.terminator else {
            continue;
        };
        if let TerminatorKind::Branch {
            cond,
            then_block,
            else_block,
        } = &term.kind
        {
            let target = if then_block == else_block {
                Some(*then_block)
            } else {
                cond.constant()
                    .and_then(|c| c.kind.as_bool())
                    .map(|taken| if taken { *then_block } else { *else_block })
            };
            if let Some(target) = target {
                term.kind = TerminatorKind::Goto { target };
                changed = true;
            }
        }
    }
    changed
}

/// Redirect edges through empty goto-only blocks to their destination.
///
/// The entry block is never a forwarding destination's replacement target;
/// nothing may gain an edge into block 0.
fn thread_gotos(body: &mut MirBody) -> bool {
    let count = body.basic_blocks.len();
    let mut forward: Vec<Option<BasicBlockId>> = vec![None; count];
    for (id, block) in body.blocks() {
        if !block.statements.is_empty() {
            continue;
        }
        if let Some(Terminator {
            kind: TerminatorKind::Goto { target },
            ..
        }) = &block.terminator
        {
            if *target != id && *target != BasicBlockId::ENTRY {
                forward[id.index()] = Some(*target);
            }
        }
    }
    if forward.iter().all(|f| f.is_none()) {
        return false;
    }

    // Chains resolve transitively; the hop cap guards goto cycles.
    let resolve = |mut block: BasicBlockId| {
        let mut hops = 0;
        while let Some(next) = forward[block.index()] {
            block = next;
            hops += 1;
            if hops > count {
                break;
            }
        }
        block
    };

    let mut changed = false;
    for block in &mut body.basic_blocks {
        if let Some(term) = &mut block.terminator {
            term.kind.retarget(|target| {
                let resolved = resolve(target);
                if resolved != target {
                    changed = true;
                }
                resolved
            });
        }
    }
    changed
}

/// Merge each block into its predecessor when that predecessor is a goto
/// and the only way in.
fn merge_chains(body: &mut MirBody) -> bool {
    let mut changed = false;
    loop {
        let preds = body.predecessors();
        let mut found = None;
        for (id, _) in body.blocks() {
            if id == BasicBlockId::ENTRY {
                continue;
            }
            let Some(list) = preds.get(&id) else {
                continue;
            };
            if list.len() != 1 || list[0] == id {
                continue;
            }
            let pred = list[0];
            let pred_goto = matches!(
                body.get_block(pred)
                    .and_then(|b| b.terminator.as_ref())
                    .map(|t| &t.kind),
                Some(TerminatorKind::Goto { target }) if *target == id
            );
            if pred_goto {
                found = Some((pred, id));
                break;
            }
        }
        let Some((pred, block)) = found else {
            return changed;
        };

        let span = body.span;
        let mut stmts = std::mem::take(&mut body.basic_blocks[block.index()].statements);
        let term = body.basic_blocks[block.index()].terminator.take();
        let pred_data = &mut body.basic_blocks[pred.index()];
        pred_data.statements.append(&mut stmts);
        pred_data.terminator = term;
        // The emptied block is unreachable now; seal it so the body stays
        // well formed until the sweep below removes it.
        body.basic_blocks[block.index()].terminator = Some(Terminator::new(
            TerminatorKind::Trap {
                reason: TrapReason::Unreachable,
            },
            span,
        ));
        changed = true;
    }
}

/// Delete blocks unreachable from the entry and renumber the rest.
fn drop_unreachable(body: &mut MirBody) -> bool {
    let reachable = body.reachable_blocks();
    if reachable.iter().all(|&live| live) {
        return false;
    }

    let mut remap: Vec<Option<BasicBlockId>> = vec![None; reachable.len()];
    let mut next = 0u32;
    for (index, &live) in reachable.iter().enumerate() {
        if live {
            remap[index] = Some(BasicBlockId::new(next));
            next += 1;
        }
    }

    let mut index = 0;
    body.basic_blocks.retain(|_| {
        let keep = reachable[index];
        index += 1;
        keep
    });
    for block in &mut body.basic_blocks {
        if let Some(term) = &mut block.terminator {
            term.kind.retarget(|target| remap[target.index()].unwrap_or(target));
        }
    }
    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{FnId, LocalId, Regime, TypeId};
    use crate::mir::body::LocalKind;
    use crate::mir::types::{
        Constant, Operand, Place, Rvalue, Statement, StatementKind,
    };
    use crate::span::Span;

    fn term(kind: TerminatorKind) -> Terminator {
        Terminator::new(kind, Span::dummy())
    }

    fn assign_const(dest: u32, value: i128) -> Statement {
        Statement::new(
            StatementKind::Assign(
                Place::local(LocalId::new(dest)),
                Rvalue::Use(Operand::Constant(Constant::int(TypeId::new(1), value))),
            ),
            Span::dummy(),
        )
    }

    fn run(body: &mut MirBody) -> bool {
        CleanupCfg
            .run(body, &Limits::default())
            .expect("cleanup failed")
    }

    #[test]
    fn test_constant_branch_folds_and_dead_arm_drops() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        body.new_local(TypeId::new(1), Regime::Value, LocalKind::Var, Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block();
        let bb3 = body.new_block();

        body.set_terminator(
            bb0,
            term(TerminatorKind::Branch {
                cond: Operand::Constant(Constant::bool(TypeId::new(2), true)),
                then_block: bb1,
                else_block: bb2,
            }),
        );
        body.push_statement(bb1, assign_const(1, 1));
        body.set_terminator(bb1, term(TerminatorKind::Goto { target: bb3 }));
        body.push_statement(bb2, assign_const(1, 2));
        body.set_terminator(bb2, term(TerminatorKind::Goto { target: bb3 }));
        body.set_terminator(bb3, term(TerminatorKind::Return));

        assert!(run(&mut body));
        // Everything collapses into one straight-line block.
        assert_eq!(body.basic_blocks.len(), 1);
        assert_eq!(body.basic_blocks[0].statements, vec![assign_const(1, 1)]);
        assert!(matches!(
            body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind),
            Some(TerminatorKind::Return)
        ));
    }

    #[test]
    fn test_empty_arm_threads_away() {
        // The one-armed `if` shape: the else block only forwards.
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        body.new_local(TypeId::new(1), Regime::Value, LocalKind::Var, Span::dummy());
        let cond_local = body.new_local(TypeId::new(2), Regime::Value, LocalKind::Var, Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block();
        let bb3 = body.new_block();

        body.set_terminator(
            bb0,
            term(TerminatorKind::Branch {
                cond: Operand::Copy(Place::local(cond_local)),
                then_block: bb1,
                else_block: bb2,
            }),
        );
        body.push_statement(bb1, assign_const(1, 1));
        body.set_terminator(bb1, term(TerminatorKind::Goto { target: bb3 }));
        body.set_terminator(bb2, term(TerminatorKind::Goto { target: bb3 }));
        body.push_statement(bb3, assign_const(1, 3));
        body.set_terminator(bb3, term(TerminatorKind::Return));

        assert!(run(&mut body));
        assert_eq!(body.basic_blocks.len(), 3);
        match body.basic_blocks[0].terminator.as_ref().map(|t| &t.kind) {
            Some(TerminatorKind::Branch {
                then_block,
                else_block,
                ..
            }) => {
                // The else edge goes straight to the join.
                assert_eq!(*then_block, BasicBlockId::new(1));
                assert_eq!(*else_block, BasicBlockId::new(2));
            }
            other => panic!("expected branch, got {:?}", other),
        }
    }

    #[test]
    fn test_goto_chain_merges() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        body.new_local(TypeId::new(1), Regime::Value, LocalKind::Var, Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        let bb2 = body.new_block();

        body.push_statement(bb0, assign_const(1, 1));
        body.set_terminator(bb0, term(TerminatorKind::Goto { target: bb1 }));
        body.push_statement(bb1, assign_const(1, 2));
        body.set_terminator(bb1, term(TerminatorKind::Goto { target: bb2 }));
        body.push_statement(bb2, assign_const(1, 3));
        body.set_terminator(bb2, term(TerminatorKind::Return));

        assert!(run(&mut body));
        assert_eq!(body.basic_blocks.len(), 1);
        assert_eq!(body.basic_blocks[0].statements.len(), 3);
    }

    #[test]
    fn test_loop_shape_is_preserved() {
        // entry -> header; header branches to body and exit; body loops
        // back. Nothing here is removable.
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        let cond = body.new_local(TypeId::new(2), Regime::Value, LocalKind::Var, Span::dummy());
        let bb0 = body.new_block();
        let header = body.new_block();
        let loop_body = body.new_block();
        let exit = body.new_block();

        body.push_statement(bb0, assign_const(1, 0));
        body.set_terminator(bb0, term(TerminatorKind::Goto { target: header }));
        body.push_statement(header, assign_const(1, 1));
        body.set_terminator(
            header,
            term(TerminatorKind::Branch {
                cond: Operand::Copy(Place::local(cond)),
                then_block: loop_body,
                else_block: exit,
            }),
        );
        body.push_statement(loop_body, assign_const(1, 2));
        body.set_terminator(loop_body, term(TerminatorKind::Goto { target: header }));
        body.set_terminator(exit, term(TerminatorKind::Return));

        let before = body.basic_blocks.len();
        run(&mut body);
        // The header has two predecessors, so nothing merges; the body
        // block is not empty, so nothing threads.
        assert_eq!(body.basic_blocks.len(), before);
    }

    #[test]
    fn test_idempotent() {
        let mut body = MirBody::new(FnId::new(0), Span::dummy());
        body.new_local(TypeId::new(0), Regime::Value, LocalKind::ReturnPlace, Span::dummy());
        body.new_local(TypeId::new(1), Regime::Value, LocalKind::Var, Span::dummy());
        let bb0 = body.new_block();
        let bb1 = body.new_block();
        body.set_terminator(bb0, term(TerminatorKind::Goto { target: bb1 }));
        body.push_statement(bb1, assign_const(1, 1));
        body.set_terminator(bb1, term(TerminatorKind::Return));

        assert!(run(&mut body));
        assert!(!run(&mut body));
    }
}
