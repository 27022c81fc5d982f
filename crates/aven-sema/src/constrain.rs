//! Constraint generation.
//!
//! Walks the typed portions of the AST top-down. Every value-bearing
//! expression gets a fresh unification variable as its type slot; the walk
//! emits constraints relating the slots to declaration types, literals,
//! and each other. Each constraint carries a [`ConstraintLoc`] naming the
//! path within its root node, used only for diagnostics.

use aven_parser::ast::*;
use rustc_hash::FxHashMap;

use crate::decls::{DeclId, DeclKind, DeclTable};
use crate::error::ConstraintLoc;
use crate::realize::RealizeResult;
use crate::resolve::{Resolution, Resolutions};
use crate::ty::{FunTy, FunTyParam, InferCtx, NominalTy, QualTy, Ty};

/// One typing constraint.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub loc: ConstraintLoc,
}

/// The constraint kinds of the inference system.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// `t` and `u` must unify.
    Equality(QualTy, QualTy),
    /// `t` must be a subtype of `u` (equality on the unqualified part,
    /// plus the top/bottom and function variance rules).
    Conformance(QualTy, QualTy),
    /// `owner` has a member named `member` whose type is `result`. The
    /// node is the select expression, for recording method selections.
    Member {
        owner: QualTy,
        member: String,
        result: QualTy,
        node: NodeId,
    },
    /// The callee's metatype's inner type has a constructor compatible
    /// with `call`. The node is the call expression.
    Construction {
        callee: QualTy,
        call: QualTy,
        node: NodeId,
    },
    /// At least one alternative must hold. `candidates` records, for each
    /// alternative, the declaration it stands for (used to remember which
    /// overload won).
    Disjunction {
        alternatives: Vec<Constraint>,
        node: NodeId,
        candidates: Vec<DeclId>,
    },
    /// The qualifier discipline of a binding operator: `move` needs
    /// `@mut` on both sides, `alias` makes the lvalue `@mut`.
    BindingQual {
        op: BindOp,
        lvalue: QualTy,
        rvalue: QualTy,
    },
}

/// Output of constraint generation.
pub struct ConstrainResult {
    pub constraints: Vec<Constraint>,
    /// Expression node -> its type slot (a fresh variable).
    pub slots: FxHashMap<NodeId, QualTy>,
    /// Expression node -> its source span, for the applier's diagnostics.
    pub spans: FxHashMap<NodeId, aven_common::Span>,
}

/// Generate constraints for a whole module. Top-level statements are the
/// body of the synthesized `main`, whose codomain is `Nothing`.
pub fn constrain(
    module: &Module,
    table: &DeclTable,
    resolutions: &Resolutions,
    realized: &RealizeResult,
    infer: &mut InferCtx,
) -> ConstrainResult {
    let mut generator = Generator {
        table,
        resolutions,
        realized,
        infer,
        constraints: Vec::new(),
        slots: FxHashMap::default(),
        spans: FxHashMap::default(),
        codomains: vec![QualTy::cst(Ty::Nothing)],
    };
    for stmt in &module.stmts {
        generator.visit_stmt(stmt);
    }
    ConstrainResult {
        constraints: generator.constraints,
        slots: generator.slots,
        spans: generator.spans,
    }
}

struct Generator<'a> {
    table: &'a DeclTable,
    resolutions: &'a Resolutions,
    realized: &'a RealizeResult,
    infer: &'a mut InferCtx,
    constraints: Vec<Constraint>,
    slots: FxHashMap<NodeId, QualTy>,
    spans: FxHashMap<NodeId, aven_common::Span>,
    /// Stack of enclosing function codomains; bottom is `main`'s.
    codomains: Vec<QualTy>,
}

impl Generator<'_> {
    fn emit(&mut self, kind: ConstraintKind, span: aven_common::Span, path: &'static str) {
        self.constraints.push(Constraint {
            kind,
            loc: ConstraintLoc::new(span, path),
        });
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.visit_decl(decl),
            Stmt::Brace(block) => self.visit_block(block),
            Stmt::If(s) => self.visit_if(s),
            Stmt::While(s) => {
                let cond = self.visit_expr(&s.cond);
                self.emit(
                    ConstraintKind::Equality(cond, QualTy::cst(Ty::bool())),
                    s.cond.span(),
                    "while.condition",
                );
                self.visit_block(&s.body);
            }
            Stmt::Return(s) => {
                if let Some((op, value)) = &s.binding {
                    let value_ty = self.visit_expr(value);
                    let codomain = self
                        .codomains
                        .last()
                        .expect("codomain stack is never empty")
                        .clone();
                    self.emit(
                        ConstraintKind::Conformance(value_ty.clone(), codomain.clone()),
                        value.span(),
                        "return.value",
                    );
                    if *op != BindOp::Copy {
                        self.emit(
                            ConstraintKind::BindingQual {
                                op: *op,
                                lvalue: codomain,
                                rvalue: value_ty,
                            },
                            s.span,
                            "return",
                        );
                    }
                }
            }
            Stmt::Binding(s) => {
                let rvalue = self.visit_expr(&s.rvalue);
                let lvalue = self.visit_expr(&s.lvalue);
                self.emit(
                    ConstraintKind::Conformance(rvalue.clone(), lvalue.clone()),
                    s.rvalue.span(),
                    "binding.rvalue",
                );
                if s.op != BindOp::Copy {
                    self.emit(
                        ConstraintKind::BindingQual {
                            op: s.op,
                            lvalue,
                            rvalue,
                        },
                        s.op_span,
                        "binding",
                    );
                }
            }
            Stmt::Expr(e) => {
                self.visit_expr(e);
            }
            Stmt::Invalid { .. } => {}
        }
    }

    fn visit_if(&mut self, s: &IfStmt) {
        let cond = self.visit_expr(&s.cond);
        self.emit(
            ConstraintKind::Equality(cond, QualTy::cst(Ty::bool())),
            s.cond.span(),
            "if.condition",
        );
        self.visit_block(&s.then_block);
        if let Some(else_branch) = &s.else_branch {
            self.visit_stmt(else_branch);
        }
    }

    fn visit_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }
    }

    // ── Declarations ───────────────────────────────────────────────────

    fn visit_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Prop(prop) => {
                if let Some((op, init)) = &prop.initializer {
                    let init_ty = self.visit_expr(init);
                    if let Some(decl_ty) = self.decl_type_of(prop.id) {
                        self.emit(
                            ConstraintKind::Conformance(init_ty.clone(), decl_ty.clone()),
                            init.span(),
                            "binding.rvalue",
                        );
                        if *op != BindOp::Copy {
                            self.emit(
                                ConstraintKind::BindingQual {
                                    op: *op,
                                    lvalue: decl_ty,
                                    rvalue: init_ty,
                                },
                                prop.name_span,
                                "binding",
                            );
                        }
                    }
                }
            }
            Decl::Fun(fun) => self.visit_fun(fun),
            Decl::Struct(s) => self.visit_block(&s.body),
            Decl::Union(s) => self.visit_block(&s.body),
            Decl::Interface(s) => self.visit_block(&s.body),
            Decl::Extension(ext) => self.visit_block(&ext.body),
            Decl::UnionCase(_) => {}
        }
    }

    fn visit_fun(&mut self, fun: &FunDecl) {
        let Some(body) = &fun.body else { return };
        let codomain = self
            .decl_type_of(fun.id)
            .and_then(|qt| match qt.ty {
                Ty::Fun(f) => Some(*f.codomain),
                _ => None,
            })
            .unwrap_or_else(|| QualTy::cst(Ty::Nothing));
        self.codomains.push(codomain);
        self.visit_block(body);
        self.codomains.pop();
    }

    fn decl_type_of(&self, node: NodeId) -> Option<QualTy> {
        let decl = self.table.decl_of_node(node)?;
        self.realized.decl_types.get(&decl).cloned()
    }

    // ── Expressions ────────────────────────────────────────────────────

    /// Give `expr` a fresh type slot and emit its constraints. Returns the
    /// slot.
    fn visit_expr(&mut self, expr: &Expr) -> QualTy {
        let slot = QualTy::bare(self.infer.fresh_var());
        self.slots.insert(expr.id(), slot.clone());
        let span = expr.span();
        self.spans.insert(expr.id(), span);

        match expr {
            Expr::BoolLit { .. } => self.literal(slot.clone(), Ty::bool(), span),
            Expr::IntLit { .. } => self.literal(slot.clone(), Ty::int(), span),
            Expr::FloatLit { .. } => self.literal(slot.clone(), Ty::float(), span),
            Expr::StrLit { .. } => self.literal(slot.clone(), Ty::string(), span),
            // a null reference adopts whatever type its use requires
            Expr::NullRef { .. } => {}

            Expr::Ident(ident) => self.visit_ident(ident, &slot),
            Expr::Select(select) => {
                let owner = self.visit_expr(&select.owner);
                self.emit(
                    ConstraintKind::Member {
                        owner,
                        member: select.member.clone(),
                        result: slot.clone(),
                        node: select.id,
                    },
                    select.member_span,
                    "select.ownee",
                );
            }
            Expr::Call(call) => self.visit_call(call, &slot),
            Expr::Subscript(subscript) => {
                self.visit_expr(&subscript.callee);
                for arg in &subscript.args {
                    self.visit_expr(&arg.value);
                }
                // collection subscripts live in the library layer; here
                // they type as `anything`
                self.emit(
                    ConstraintKind::Equality(slot.clone(), QualTy::cst(Ty::Anything)),
                    span,
                    "subscript",
                );
            }
            Expr::Infix(infix) => self.visit_infix(infix, &slot),
            Expr::Prefix(prefix) => {
                let operand = self.visit_expr(&prefix.operand);
                match prefix.op {
                    PrefixOp::Not => {
                        self.emit(
                            ConstraintKind::Conformance(operand, QualTy::cst(Ty::bool())),
                            prefix.operand.span(),
                            "prefix.operand",
                        );
                        let result = self.infer.either_qualified(Ty::bool());
                        self.emit(
                            ConstraintKind::Equality(slot.clone(), QualTy::bare(result)),
                            span,
                            "prefix",
                        );
                    }
                    PrefixOp::Plus | PrefixOp::Minus => {
                        self.emit(
                            ConstraintKind::Conformance(operand, slot.clone()),
                            prefix.operand.span(),
                            "prefix.operand",
                        );
                    }
                }
            }
            Expr::Cast(cast) => {
                // the written type wins; the operand is unconstrained
                self.visit_expr(&cast.operand);
                if let Some(ty) = self.realized.cast_types.get(&cast.id).cloned() {
                    self.emit(ConstraintKind::Equality(slot.clone(), ty), span, "cast");
                }
            }
            Expr::Lambda(lambda) => {
                if let Some(ty) = self.decl_type_of(lambda.fun.id) {
                    self.emit(
                        ConstraintKind::Equality(slot.clone(), ty),
                        span,
                        "lambda",
                    );
                }
                self.visit_fun(&lambda.fun);
            }
            Expr::ArrayLit { elements, .. } | Expr::SetLit { elements, .. } => {
                let mut first: Option<QualTy> = None;
                for elem in elements {
                    let elem_ty = self.visit_expr(elem);
                    if let Some(first) = &first {
                        self.emit(
                            ConstraintKind::Conformance(elem_ty, first.clone()),
                            elem.span(),
                            "literal.element",
                        );
                    } else {
                        first = Some(elem_ty);
                    }
                }
                self.emit(
                    ConstraintKind::Equality(slot.clone(), QualTy::cst(Ty::Anything)),
                    span,
                    "literal",
                );
            }
            Expr::MapLit { entries, .. } => {
                let mut first: Option<(QualTy, QualTy)> = None;
                for (key, value) in entries {
                    let key_ty = self.visit_expr(key);
                    let value_ty = self.visit_expr(value);
                    if let Some((first_key, first_value)) = &first {
                        self.emit(
                            ConstraintKind::Conformance(key_ty, first_key.clone()),
                            key.span(),
                            "literal.key",
                        );
                        self.emit(
                            ConstraintKind::Conformance(value_ty, first_value.clone()),
                            value.span(),
                            "literal.value",
                        );
                    } else {
                        first = Some((key_ty, value_ty));
                    }
                }
                self.emit(
                    ConstraintKind::Equality(slot.clone(), QualTy::cst(Ty::Anything)),
                    span,
                    "literal",
                );
            }
            Expr::Enclosed { inner, .. } => {
                let inner_ty = self.visit_expr(inner);
                self.emit(
                    ConstraintKind::Equality(slot.clone(), inner_ty),
                    span,
                    "enclosed",
                );
            }
            Expr::Invalid { .. } => {}
        }
        slot
    }

    /// Literals may be bound under either qualifier; each literal gets its
    /// own shrinkable union.
    fn literal(&mut self, slot: QualTy, ty: Ty, span: aven_common::Span) {
        let union = self.infer.either_qualified(ty);
        self.emit(
            ConstraintKind::Equality(slot, QualTy::bare(union)),
            span,
            "literal",
        );
    }

    fn visit_ident(&mut self, ident: &IdentExpr, slot: &QualTy) {
        match self.resolutions.get(ident.id) {
            Some(Resolution::Decl(decl)) => {
                let decl = *decl;
                if let Some(ty) = self.ident_decl_type(decl) {
                    self.emit(
                        ConstraintKind::Equality(slot.clone(), ty),
                        ident.span,
                        "ident",
                    );
                }
            }
            Some(Resolution::Overloads(set)) => {
                let set = set.clone();
                let mut alternatives = Vec::new();
                for &candidate in &set {
                    if let Some(ty) = self.ident_decl_type(candidate) {
                        alternatives.push(Constraint {
                            kind: ConstraintKind::Equality(slot.clone(), ty),
                            loc: ConstraintLoc::new(ident.span, "ident"),
                        });
                    }
                }
                self.emit(
                    ConstraintKind::Disjunction {
                        alternatives,
                        node: ident.id,
                        candidates: set,
                    },
                    ident.span,
                    "ident",
                );
            }
            // the binder reported this; leave the slot free
            None => {}
        }
    }

    /// The type an identifier use of `decl` has.
    fn ident_decl_type(&mut self, decl: DeclId) -> Option<QualTy> {
        let info = self.table.decl(decl);
        match info.kind {
            DeclKind::Struct | DeclKind::Union | DeclKind::Interface => {
                let nominal = self.realized.registry.get(decl)?;
                Some(QualTy::cst(Ty::Meta(Box::new(Ty::Nominal(NominalTy {
                    decl,
                    name: nominal.name.clone(),
                    placeholders: nominal.placeholders.clone(),
                })))))
            }
            DeclKind::GenericParam => Some(QualTy::cst(Ty::Meta(Box::new(Ty::Placeholder(
                info.name.clone(),
            ))))),
            DeclKind::Fun { .. } => {
                let ty = self.realized.decl_types.get(&decl)?.clone();
                let instance = self.infer.fresh_instance(&ty.ty);
                Some(QualTy::new(ty.quals, instance))
            }
            DeclKind::Prop { .. } | DeclKind::Param => {
                // shared storage: uses see the declaration's own unions
                self.realized.decl_types.get(&decl).cloned()
            }
            DeclKind::UnionCase => None,
        }
    }

    fn visit_call(&mut self, call: &CallExpr, slot: &QualTy) {
        let callee_ty = self.visit_expr(&call.callee);

        let mut params = Vec::new();
        for arg in &call.args {
            let arg_ty = self.visit_expr(&arg.value);
            let expected = QualTy::bare(self.infer.fresh_var());
            self.emit(
                ConstraintKind::Conformance(arg_ty.clone(), expected.clone()),
                arg.value.span(),
                "call.argument",
            );
            if arg.op != BindOp::Copy {
                self.emit(
                    ConstraintKind::BindingQual {
                        op: arg.op,
                        lvalue: expected.clone(),
                        rvalue: arg_ty,
                    },
                    arg.span,
                    "call.argument",
                );
            }
            params.push(FunTyParam {
                label: arg.label.clone(),
                ty: expected,
            });
        }
        let call_shape = QualTy::bare(Ty::Fun(FunTy {
            placeholders: Vec::new(),
            params,
            codomain: Box::new(slot.clone()),
        }));

        // a call whose callee names a type constructs an instance
        if self.callee_is_type_name(&call.callee) {
            self.emit(
                ConstraintKind::Construction {
                    callee: callee_ty,
                    call: call_shape,
                    node: call.id,
                },
                call.callee.span(),
                "call.callee",
            );
        } else {
            self.emit(
                ConstraintKind::Equality(callee_ty, call_shape),
                call.callee.span(),
                "call.callee",
            );
        }
    }

    fn callee_is_type_name(&self, callee: &Expr) -> bool {
        match callee {
            Expr::Ident(ident) => matches!(
                self.resolutions.get(ident.id),
                Some(Resolution::Decl(decl))
                    if self.table.decl(*decl).kind.is_type()
            ),
            Expr::Enclosed { inner, .. } => self.callee_is_type_name(inner),
            _ => false,
        }
    }

    fn visit_infix(&mut self, infix: &InfixExpr, slot: &QualTy) {
        let lhs = self.visit_expr(&infix.lhs);
        let rhs = self.visit_expr(&infix.rhs);
        match infix.op {
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod => {
                // both operands and the result share one unqualified type
                self.emit(
                    ConstraintKind::Conformance(rhs, lhs.clone()),
                    infix.rhs.span(),
                    "infix.rhs",
                );
                self.emit(
                    ConstraintKind::Conformance(lhs, slot.clone()),
                    infix.lhs.span(),
                    "infix.lhs",
                );
            }
            InfixOp::Eq
            | InfixOp::Ne
            | InfixOp::Lt
            | InfixOp::Le
            | InfixOp::Gt
            | InfixOp::Ge
            | InfixOp::Is
            | InfixOp::RefEq
            | InfixOp::RefNe => {
                self.emit(
                    ConstraintKind::Conformance(rhs, lhs),
                    infix.rhs.span(),
                    "infix.rhs",
                );
                let result = self.infer.either_qualified(Ty::bool());
                self.emit(
                    ConstraintKind::Equality(slot.clone(), QualTy::bare(result)),
                    infix.op_span,
                    "infix",
                );
            }
            InfixOp::And | InfixOp::Or => {
                self.emit(
                    ConstraintKind::Conformance(lhs, QualTy::cst(Ty::bool())),
                    infix.lhs.span(),
                    "infix.lhs",
                );
                self.emit(
                    ConstraintKind::Conformance(rhs, QualTy::cst(Ty::bool())),
                    infix.rhs.span(),
                    "infix.rhs",
                );
                let result = self.infer.either_qualified(Ty::bool());
                self.emit(
                    ConstraintKind::Equality(slot.clone(), QualTy::bare(result)),
                    infix.op_span,
                    "infix",
                );
            }
        }
    }
}
