//! Aven semantic analysis.
//!
//! Runs the middle of the pipeline over a parsed module: parse
//! finalization (declaration contexts), name binding, type realization,
//! constraint generation, solving, type application, and capture
//! analysis. Every pass appends to the module's issue list and keeps
//! going; the result always contains enough structure for AIR emission,
//! with invalid placeholders standing in for whatever could not be
//! resolved.

pub mod apply;
pub mod captures;
pub mod constrain;
pub mod decls;
pub mod diagnostics;
pub mod error;
pub mod finalize;
pub mod realize;
pub mod resolve;
pub mod solver;
pub mod ty;

use aven_common::IssueList;
use aven_parser::ast::{Module, NodeId};
use rustc_hash::FxHashMap;

use apply::TypeTable;
use captures::CaptureMap;
use decls::{DeclId, DeclTable};
use realize::NominalRegistry;
use resolve::Resolutions;
use ty::{InferCtx, QualTy};

/// Everything the semantic passes learned about one module.
pub struct SemaResult {
    pub decls: DeclTable,
    pub resolutions: Resolutions,
    pub registry: NominalRegistry,
    /// Reified declaration types (props, params, functions, generics).
    pub decl_types: FxHashMap<DeclId, QualTy>,
    /// Reified expression types, keyed by AST node.
    pub types: TypeTable,
    /// Call/identifier/select node -> the declaration inference picked.
    pub selections: FxHashMap<NodeId, DeclId>,
    pub captures: CaptureMap,
    pub issues: IssueList,
}

impl SemaResult {
    /// Whether the module compiled cleanly enough to lower.
    pub fn is_ok(&self) -> bool {
        !self.issues.has_errors()
    }
}

/// Run all semantic passes over a module.
pub fn analyze(module: &Module) -> SemaResult {
    let mut issues = IssueList::new();

    // P2: declaration contexts and well-formedness
    let (table, errors) = finalize::finalize(module);
    for error in errors {
        issues.push(error.into_issue());
    }

    // P3: name binding
    let (resolutions, errors) = resolve::resolve(module, &table);
    for error in errors {
        issues.push(error.into_issue());
    }

    // P4: type realization
    let mut infer = InferCtx::new();
    let (realized, errors) = realize::realize(module, &table, &resolutions, &mut infer);
    for error in errors {
        issues.push(error.into_issue());
    }

    // P5: constraint generation
    let generated = constrain::constrain(module, &table, &resolutions, &realized, &mut infer);

    // P6: solving
    let solved = solver::solve(generated.constraints, &table, &realized, &mut infer);
    for error in solved.errors {
        issues.push(error.into_issue());
    }

    // P7: type application
    let had_errors = issues.has_errors();
    let applied = apply::apply(
        &generated.slots,
        &generated.spans,
        &realized.decl_types,
        &mut infer,
        had_errors,
    );
    for error in applied.errors {
        issues.push(error.into_issue());
    }

    // P8: capture analysis
    let captures = captures::analyze_captures(module, &table, &resolutions);

    SemaResult {
        decls: table,
        resolutions,
        registry: realized.registry,
        decl_types: applied.decl_types,
        types: applied.types,
        selections: solved.selections,
        captures,
        issues,
    }
}
