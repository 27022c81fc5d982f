//! The type applier: writes the solved substitution back onto every
//! typed node.
//!
//! After this pass, a well-formed module has no free variable and no
//! wide union in any type slot. Slots that stay unresolved get the
//! invalid-marked placeholder (`@cst Anything`) so downstream passes can
//! keep going; the ambiguity is only reported as a fresh error when the
//! module was otherwise clean, to avoid cascades behind real errors.

use aven_parser::ast::NodeId;
use rustc_hash::FxHashMap;

use aven_common::Span;

use crate::decls::DeclId;
use crate::error::{ConstraintLoc, SemaError};
use crate::solver::{is_unresolved, reify};
use crate::ty::{InferCtx, QualTy, Ty};

/// Final expression types, keyed by AST node.
#[derive(Debug, Default)]
pub struct TypeTable {
    map: FxHashMap<NodeId, QualTy>,
}

impl TypeTable {
    pub fn get(&self, node: NodeId) -> Option<&QualTy> {
        self.map.get(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &QualTy)> {
        self.map.iter()
    }
}

/// Output of the applier: expression types plus reified declaration
/// types.
pub struct ApplyResult {
    pub types: TypeTable,
    pub decl_types: FxHashMap<DeclId, QualTy>,
    pub errors: Vec<SemaError>,
}

/// Reify every slot and declaration type.
pub fn apply(
    slots: &FxHashMap<NodeId, QualTy>,
    spans: &FxHashMap<NodeId, Span>,
    decl_types: &FxHashMap<DeclId, QualTy>,
    infer: &mut InferCtx,
    had_errors: bool,
) -> ApplyResult {
    let mut errors = Vec::new();
    let mut types = TypeTable::default();

    for (&node, slot) in slots {
        let mut memo = FxHashMap::default();
        let reified = reify(infer, slot, &mut memo);
        if is_unresolved(infer, &reified.ty) {
            if !had_errors {
                let span = spans.get(&node).copied().unwrap_or(Span::point(0));
                errors.push(SemaError::AmbiguousType {
                    loc: ConstraintLoc::new(span, "type"),
                });
            }
            types.map.insert(node, QualTy::cst(Ty::Anything));
        } else {
            types.map.insert(node, reified);
        }
    }

    let mut final_decl_types = FxHashMap::default();
    for (&decl, ty) in decl_types {
        let mut memo = FxHashMap::default();
        let reified = reify(infer, ty, &mut memo);
        if is_unresolved(infer, &reified.ty) {
            final_decl_types.insert(decl, QualTy::cst(Ty::Anything));
        } else {
            final_decl_types.insert(decl, reified);
        }
    }

    ApplyResult {
        types,
        decl_types: final_decl_types,
        errors,
    }
}
