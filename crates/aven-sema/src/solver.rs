//! The constraint solver.
//!
//! Consumes the generated constraints in insertion order, growing a
//! substitution (the `ena` table inside [`InferCtx`]) and shrinking
//! inference unions in place. Member and construction constraints whose
//! owner is still unresolved are parked and retried each round;
//! disjunctions are trialled against a snapshot and committed once a
//! single alternative survives. The loop terminates because every round
//! either binds a variable, shrinks a union, or reduces a disjunction,
//! and all three are bounded.

use aven_parser::ast::{BindOp, NodeId};
use rustc_hash::FxHashMap;

use crate::constrain::{Constraint, ConstraintKind};
use crate::decls::{DeclId, DeclTable};
use crate::error::{ConstraintLoc, SemaError};
use crate::realize::RealizeResult;
use crate::ty::{FunTy, QualSet, QualTy, Ty, TyVar, InferCtx};

/// Output of solving.
pub struct SolveResult {
    /// Call/identifier/select node -> the declaration the solver picked
    /// (overload winner, method, or explicit constructor).
    pub selections: FxHashMap<NodeId, DeclId>,
    pub errors: Vec<SemaError>,
}

/// Solve a constraint set.
pub fn solve(
    constraints: Vec<Constraint>,
    table: &DeclTable,
    realized: &RealizeResult,
    infer: &mut InferCtx,
) -> SolveResult {
    let mut solver = Solver {
        table,
        realized,
        infer,
        selections: FxHashMap::default(),
        errors: Vec::new(),
        pending: Vec::new(),
        disjunctions: Vec::new(),
        qual_checks: Vec::new(),
        progress: false,
    };
    solver.run(constraints);
    SolveResult {
        selections: solver.selections,
        errors: solver.errors,
    }
}

/// Whether a member/construction constraint could be discharged yet.
enum Outcome {
    Done,
    Defer,
}

struct Solver<'a> {
    table: &'a DeclTable,
    realized: &'a RealizeResult,
    infer: &'a mut InferCtx,
    selections: FxHashMap<NodeId, DeclId>,
    errors: Vec<SemaError>,
    /// Member/construction constraints waiting on an unresolved owner.
    pending: Vec<Constraint>,
    /// Unreduced disjunctions.
    disjunctions: Vec<Constraint>,
    /// Binding-operator qualifier requirements, checked after the
    /// worklist settles.
    qual_checks: Vec<Constraint>,
    progress: bool,
}

impl Solver<'_> {
    fn run(&mut self, constraints: Vec<Constraint>) {
        for constraint in constraints {
            self.dispatch(constraint);
        }

        // rounds: retry parked work until nothing moves; when the
        // worklist stalls with disjunctions still open, force the first
        // surviving alternative and give the parked work another round
        for _ in 0..2 {
            loop {
                self.progress = false;
                self.retry_pending();
                self.process_disjunctions(false);
                if !self.progress {
                    break;
                }
            }
            if self.disjunctions.is_empty() && self.pending.is_empty() {
                break;
            }
            self.process_disjunctions(true);
            self.retry_pending();
        }

        // leftover owners never resolved
        let leftovers = std::mem::take(&mut self.pending);
        for constraint in leftovers {
            if let ConstraintKind::Member { member, .. } = &constraint.kind {
                self.errors.push(SemaError::UnresolvedMember {
                    member: member.clone(),
                    loc: constraint.loc,
                });
            } else if let ConstraintKind::Construction { callee, .. } = &constraint.kind {
                self.errors.push(SemaError::NoConstructor {
                    ty: callee.clone(),
                    loc: constraint.loc,
                });
            }
        }

        // binding-operator qualifier discipline runs last, over the
        // settled (but still shrinkable) unions
        let checks = std::mem::take(&mut self.qual_checks);
        for constraint in checks {
            if let ConstraintKind::BindingQual { op, lvalue, rvalue } = constraint.kind {
                self.check_binding_qual(op, lvalue, rvalue, constraint.loc);
            }
        }
    }

    fn dispatch(&mut self, constraint: Constraint) {
        let loc = constraint.loc;
        match constraint.kind {
            ConstraintKind::Equality(a, b) => {
                if let Err(err) = self.unify(a, b, loc, true) {
                    self.errors.push(err);
                }
            }
            ConstraintKind::Conformance(a, b) => {
                if let Err(err) = self.conform(a, b, loc) {
                    self.errors.push(err);
                }
            }
            ConstraintKind::Member { .. } | ConstraintKind::Construction { .. } => {
                self.try_member_like(constraint);
            }
            ConstraintKind::Disjunction { .. } => self.disjunctions.push(constraint),
            ConstraintKind::BindingQual { .. } => self.qual_checks.push(constraint),
        }
    }

    fn try_member_like(&mut self, constraint: Constraint) {
        let loc = constraint.loc;
        let outcome = match &constraint.kind {
            ConstraintKind::Member {
                owner,
                member,
                result,
                node,
            } => self.solve_member(owner.clone(), member.clone(), result.clone(), *node, loc),
            ConstraintKind::Construction { callee, call, node } => {
                self.solve_construction(callee.clone(), call.clone(), *node, loc)
            }
            _ => unreachable!("try_member_like only sees member-like constraints"),
        };
        match outcome {
            Ok(Outcome::Done) => self.progress = true,
            Ok(Outcome::Defer) => self.pending.push(constraint),
            Err(err) => self.errors.push(err),
        }
    }

    fn retry_pending(&mut self) {
        let parked = std::mem::take(&mut self.pending);
        for constraint in parked {
            self.try_member_like(constraint);
        }
    }

    // ── Unification ────────────────────────────────────────────────────

    /// Unify two qualified types. `exact` demands equal qualifier sets
    /// where both sides have them; conformance mode ignores qualifiers
    /// and admits the top/bottom rules.
    fn unify(
        &mut self,
        a: QualTy,
        b: QualTy,
        loc: ConstraintLoc,
        exact: bool,
    ) -> Result<(), SemaError> {
        let a = self.infer.walk(a);
        let b = self.infer.walk(b);
        if a == b {
            return Ok(());
        }
        // placeholders are bound by specialization, not by inference
        if matches!(a.ty, Ty::Placeholder(_)) || matches!(b.ty, Ty::Placeholder(_)) {
            return Ok(());
        }
        if !exact && (matches!(a.ty, Ty::Nothing) || matches!(b.ty, Ty::Anything)) {
            return Ok(());
        }
        // identical unqualified types unify whenever the qualifier sets
        // are compatible (conformance never looks at qualifiers)
        if a.ty == b.ty && !matches!(a.ty, Ty::Union(_)) {
            if exact && !a.quals.is_empty() && !b.quals.is_empty() && a.quals != b.quals {
                return Err(self.no_unifier(a, b, loc));
            }
            return Ok(());
        }

        match (a.ty.clone(), b.ty.clone()) {
            (Ty::Var(va), Ty::Var(vb)) => {
                if exact
                    && !a.quals.is_empty()
                    && !b.quals.is_empty()
                    && a.quals != b.quals
                {
                    return Err(self.no_unifier(a, b, loc));
                }
                self.infer
                    .table
                    .unify_var_var(va, vb)
                    .expect("walked variables are unbound");
                self.progress = true;
                Ok(())
            }

            (Ty::Var(v), Ty::Union(u)) => self.bind_var_to_union(v, a.quals, u, loc),
            (Ty::Union(u), Ty::Var(v)) => self.bind_var_to_union(v, b.quals, u, loc),

            (Ty::Var(v), _) => self.bind_var(v, a.quals, b, loc, exact),
            (_, Ty::Var(v)) => self.bind_var(v, b.quals, a, loc, exact),

            (Ty::Union(ua), Ty::Union(ub)) => self.unify_unions(ua, ub, a, b, loc, exact),

            (Ty::Union(u), _) => self.reduce_against(u, b, a, loc, exact),
            (_, Ty::Union(u)) => self.reduce_against(u, a, b, loc, exact),

            (Ty::Fun(fa), Ty::Fun(fb)) => {
                if exact
                    && !a.quals.is_empty()
                    && !b.quals.is_empty()
                    && a.quals != b.quals
                {
                    return Err(self.no_unifier(a, b, loc));
                }
                if fa.params.len() != fb.params.len() {
                    return Err(self.no_unifier(a, b, loc));
                }
                for (pa, pb) in fa.params.iter().zip(fb.params.iter()) {
                    if pa.label != pb.label {
                        return Err(self.no_unifier(a.clone(), b.clone(), loc));
                    }
                    self.unify(pa.ty.clone(), pb.ty.clone(), loc, exact)?;
                }
                self.unify(
                    (*fa.codomain).clone(),
                    (*fb.codomain).clone(),
                    loc,
                    exact,
                )
            }

            (Ty::Nominal(na), Ty::Nominal(nb)) => {
                if na.decl != nb.decl {
                    return Err(self.no_unifier(a, b, loc));
                }
                if exact
                    && !a.quals.is_empty()
                    && !b.quals.is_empty()
                    && a.quals != b.quals
                {
                    return Err(self.no_unifier(a, b, loc));
                }
                Ok(())
            }

            (
                Ty::BoundGeneric {
                    base: base_a,
                    bindings: bind_a,
                },
                Ty::BoundGeneric {
                    base: base_b,
                    bindings: bind_b,
                },
            ) => {
                self.unify(
                    QualTy::bare((*base_a).clone()),
                    QualTy::bare((*base_b).clone()),
                    loc,
                    exact,
                )?;
                if bind_a.len() != bind_b.len() {
                    return Err(self.no_unifier(a, b, loc));
                }
                for ((name_a, ty_a), (name_b, ty_b)) in bind_a.iter().zip(bind_b.iter()) {
                    if name_a != name_b {
                        return Err(self.no_unifier(a.clone(), b.clone(), loc));
                    }
                    self.unify(ty_a.clone(), ty_b.clone(), loc, exact)?;
                }
                Ok(())
            }

            (Ty::Meta(ia), Ty::Meta(ib)) => {
                self.unify(QualTy::bare(*ia), QualTy::bare(*ib), loc, exact)
            }

            _ => Err(self.no_unifier(a, b, loc)),
        }
    }

    fn no_unifier(&self, a: QualTy, b: QualTy, loc: ConstraintLoc) -> SemaError {
        SemaError::NoUnifier {
            lhs: a,
            rhs: b,
            loc,
        }
    }

    /// Bind a variable to a non-union, non-variable type (rule 3), with
    /// occurs check. The binding records the qualifier set of whichever
    /// side has one.
    fn bind_var(
        &mut self,
        v: TyVar,
        var_quals: QualSet,
        other: QualTy,
        loc: ConstraintLoc,
        exact: bool,
    ) -> Result<(), SemaError> {
        if self.infer.occurs_in(v, &other.ty) {
            return Err(SemaError::InfiniteType {
                var: v,
                ty: other.ty,
                loc,
            });
        }
        if exact
            && !var_quals.is_empty()
            && !other.quals.is_empty()
            && var_quals != other.quals
        {
            return Err(self.no_unifier(
                QualTy::new(var_quals, Ty::Var(v)),
                other,
                loc,
            ));
        }
        let quals = if other.quals.is_empty() {
            var_quals
        } else {
            other.quals
        };
        self.infer
            .table
            .unify_var_value(v, Some(QualTy::new(quals, other.ty)))
            .expect("walked variable is unbound");
        self.progress = true;
        Ok(())
    }

    /// Rule 2: a variable against a union. Members are filtered to those
    /// whose qualifier set equals the variable's (no filtering when the
    /// variable has none yet); a single survivor binds the variable,
    /// otherwise the variable points at the reduced union.
    fn bind_var_to_union(
        &mut self,
        v: TyVar,
        var_quals: QualSet,
        union: crate::ty::UnionId,
        loc: ConstraintLoc,
    ) -> Result<(), SemaError> {
        let members = self.infer.union_members(union).to_vec();
        let survivors: Vec<QualTy> = if var_quals.is_empty() {
            members
        } else {
            members
                .into_iter()
                .filter(|m| m.quals == var_quals)
                .collect()
        };
        if survivors.is_empty() {
            return Err(self.no_unifier(
                QualTy::new(var_quals, Ty::Var(v)),
                QualTy::bare(Ty::Union(union)),
                loc,
            ));
        }
        self.infer.reduce_union(union, survivors.clone());
        self.progress = true;

        // never create a cycle through the union
        if self.infer.occurs_in(v, &Ty::Union(union)) {
            return Ok(());
        }
        let value = if survivors.len() == 1 && survivors[0].ty != Ty::Var(v) {
            survivors.into_iter().next().expect("one survivor")
        } else {
            QualTy::bare(Ty::Union(union))
        };
        self.infer
            .table
            .unify_var_value(v, Some(value))
            .expect("walked variable is unbound");
        Ok(())
    }

    /// Rule 5: union against union. Each side keeps the members that
    /// match something on the other side (the cross-product intersection
    /// under `matches`); then every variable surviving on one side is
    /// bound against the filtered other side, and symmetrically. The
    /// binding is qualifier-neutral: the variable adopts the other side's
    /// single unqualified type, so members with different qualifiers can
    /// keep sharing it.
    fn unify_unions(
        &mut self,
        ua: crate::ty::UnionId,
        ub: crate::ty::UnionId,
        a: QualTy,
        b: QualTy,
        loc: ConstraintLoc,
        exact: bool,
    ) -> Result<(), SemaError> {
        if ua == ub {
            return Ok(());
        }
        let members_a = self.infer.union_members(ua).to_vec();
        let members_b = self.infer.union_members(ub).to_vec();
        let kept_a: Vec<QualTy> = members_a
            .iter()
            .filter(|ma| {
                members_b
                    .iter()
                    .any(|mb| self.matches((*ma).clone(), mb.clone(), exact))
            })
            .cloned()
            .collect();
        let kept_b: Vec<QualTy> = members_b
            .iter()
            .filter(|mb| {
                members_a
                    .iter()
                    .any(|ma| self.matches(ma.clone(), (*mb).clone(), exact))
            })
            .cloned()
            .collect();
        if kept_a.is_empty() || kept_b.is_empty() {
            return Err(self.no_unifier(a, b, loc));
        }
        if kept_a.len() < members_a.len() || kept_b.len() < members_b.len() {
            self.progress = true;
        }
        self.infer.reduce_union(ua, kept_a.clone());
        self.infer.reduce_union(ub, kept_b.clone());

        self.bind_union_vars(&kept_a, &kept_b, loc)?;
        self.bind_union_vars(&kept_b, &kept_a, loc)?;
        Ok(())
    }

    /// Bind each distinct free variable among `from`'s members to the
    /// single unqualified type the `against` members agree on, if any.
    fn bind_union_vars(
        &mut self,
        from: &[QualTy],
        against: &[QualTy],
        loc: ConstraintLoc,
    ) -> Result<(), SemaError> {
        let mut vars: Vec<TyVar> = Vec::new();
        for member in from {
            let walked = self.infer.walk(member.clone());
            if let Ty::Var(v) = walked.ty {
                let root = self.infer.table.find(v);
                if !vars.contains(&root) {
                    vars.push(root);
                }
            }
        }
        if vars.is_empty() {
            return Ok(());
        }
        // the other side must agree on one concrete unqualified type
        let mut concrete: Option<Ty> = None;
        for member in against {
            let walked = self.infer.walk(member.clone());
            if matches!(walked.ty, Ty::Var(_)) {
                return Ok(());
            }
            match &concrete {
                None => concrete = Some(walked.ty),
                Some(ty) if *ty == walked.ty => {}
                Some(_) => return Ok(()),
            }
        }
        let Some(ty) = concrete else { return Ok(()) };
        for v in vars {
            if self.infer.occurs_in(v, &ty) {
                return Err(SemaError::InfiniteType {
                    var: v,
                    ty: ty.clone(),
                    loc,
                });
            }
            self.infer
                .table
                .unify_var_value(v, Some(QualTy::bare(ty.clone())))
                .expect("walked variable is unbound");
            self.progress = true;
        }
        Ok(())
    }

    /// Rule 6: a union against a non-union. Members that could unify with
    /// the other side survive; a single survivor really unifies.
    fn reduce_against(
        &mut self,
        union: crate::ty::UnionId,
        other: QualTy,
        union_side: QualTy,
        loc: ConstraintLoc,
        exact: bool,
    ) -> Result<(), SemaError> {
        let members = self.infer.union_members(union).to_vec();
        let survivors: Vec<QualTy> = members
            .into_iter()
            .filter(|m| self.matches(m.clone(), other.clone(), exact))
            .collect();
        if survivors.is_empty() {
            return Err(self.no_unifier(union_side, other, loc));
        }
        let single = survivors.len() == 1;
        self.infer.reduce_union(union, survivors.clone());
        self.progress = true;
        if single {
            self.unify(
                survivors.into_iter().next().expect("one survivor"),
                other,
                loc,
                exact,
            )?;
        }
        Ok(())
    }

    /// A conservative "could these unify" probe. Mirrors the unification
    /// rules but never mutates solver state; used to prune cross products
    /// and test overload alternatives cheaply.
    fn matches(&mut self, a: QualTy, b: QualTy, exact: bool) -> bool {
        let a = self.infer.walk(a);
        let b = self.infer.walk(b);
        if a == b {
            return true;
        }
        let quals_ok = !exact
            || a.quals.is_empty()
            || b.quals.is_empty()
            || a.quals == b.quals;
        if !exact && (matches!(a.ty, Ty::Nothing) || matches!(b.ty, Ty::Anything)) {
            return true;
        }
        match (&a.ty, &b.ty) {
            (Ty::Placeholder(_), _) | (_, Ty::Placeholder(_)) => true,
            (Ty::Var(_), _) | (_, Ty::Var(_)) => quals_ok,
            (Ty::Union(u), _) => {
                let members = self.infer.union_members(*u).to_vec();
                members
                    .into_iter()
                    .any(|m| self.matches(m, b.clone(), exact))
            }
            (_, Ty::Union(u)) => {
                let members = self.infer.union_members(*u).to_vec();
                members
                    .into_iter()
                    .any(|m| self.matches(a.clone(), m, exact))
            }
            (Ty::Builtin(x), Ty::Builtin(y)) => x == y && quals_ok,
            (Ty::Anything, Ty::Anything) | (Ty::Nothing, Ty::Nothing) => quals_ok,
            (Ty::Fun(fa), Ty::Fun(fb)) => {
                if fa.params.len() != fb.params.len() || !quals_ok {
                    return false;
                }
                let pairs: Vec<(QualTy, QualTy)> = fa
                    .params
                    .iter()
                    .zip(fb.params.iter())
                    .map(|(pa, pb)| (pa.ty.clone(), pb.ty.clone()))
                    .collect();
                let labels_ok = fa
                    .params
                    .iter()
                    .zip(fb.params.iter())
                    .all(|(pa, pb)| pa.label == pb.label);
                let codomains = ((*fa.codomain).clone(), (*fb.codomain).clone());
                labels_ok
                    && pairs
                        .into_iter()
                        .all(|(pa, pb)| self.matches(pa, pb, exact))
                    && self.matches(codomains.0, codomains.1, exact)
            }
            (Ty::Nominal(na), Ty::Nominal(nb)) => na.decl == nb.decl && quals_ok,
            (
                Ty::BoundGeneric {
                    base: base_a,
                    bindings: bind_a,
                },
                Ty::BoundGeneric {
                    base: base_b,
                    bindings: bind_b,
                },
            ) => {
                if bind_a.len() != bind_b.len() {
                    return false;
                }
                let bases = ((**base_a).clone(), (**base_b).clone());
                let pairs: Vec<(QualTy, QualTy)> = bind_a
                    .iter()
                    .zip(bind_b.iter())
                    .map(|(x, y)| (x.1.clone(), y.1.clone()))
                    .collect();
                let names_ok = bind_a
                    .iter()
                    .zip(bind_b.iter())
                    .all(|(x, y)| x.0 == y.0);
                names_ok
                    && self.matches(QualTy::bare(bases.0), QualTy::bare(bases.1), exact)
                    && pairs
                        .into_iter()
                        .all(|(x, y)| self.matches(x, y, exact))
            }
            (Ty::Meta(ia), Ty::Meta(ib)) => {
                let (ia, ib) = ((**ia).clone(), (**ib).clone());
                self.matches(QualTy::bare(ia), QualTy::bare(ib), exact)
            }
            _ => false,
        }
    }

    // ── Conformance ────────────────────────────────────────────────────

    /// `a <: b`: reflexive, `Nothing` below everything, `Anything` above
    /// everything, functions contravariant in parameters and covariant in
    /// codomain, nominals invariant. Everything else weakens to equality
    /// on the unqualified part.
    fn conform(&mut self, a: QualTy, b: QualTy, loc: ConstraintLoc) -> Result<(), SemaError> {
        let a = self.infer.walk(a);
        let b = self.infer.walk(b);
        if matches!(b.ty, Ty::Anything) || matches!(a.ty, Ty::Nothing) {
            return Ok(());
        }
        if let (Ty::Fun(fa), Ty::Fun(fb)) = (&a.ty, &b.ty) {
            if fa.params.len() != fb.params.len() {
                return Err(self.no_unifier(a.clone(), b.clone(), loc));
            }
            let pairs: Vec<(QualTy, QualTy)> = fa
                .params
                .iter()
                .zip(fb.params.iter())
                .map(|(pa, pb)| (pb.ty.clone(), pa.ty.clone()))
                .collect();
            let codomains = ((*fa.codomain).clone(), (*fb.codomain).clone());
            for (super_param, sub_param) in pairs {
                self.conform(super_param, sub_param, loc)?;
            }
            return self.conform(codomains.0, codomains.1, loc);
        }
        self.unify(a, b, loc, false)
    }

    // ── Member constraints ─────────────────────────────────────────────

    fn solve_member(
        &mut self,
        owner: QualTy,
        member: String,
        result: QualTy,
        node: NodeId,
        loc: ConstraintLoc,
    ) -> Result<Outcome, SemaError> {
        let owner = self.infer.walk(owner);
        let (decl, bindings) = match &owner.ty {
            Ty::Var(_) => return Ok(Outcome::Defer),
            // a union whose members agree on one unqualified type is as
            // good as resolved for member lookup
            Ty::Union(u) => {
                let members = self.infer.union_members(*u).to_vec();
                let mut shared: Option<Ty> = None;
                for m in members {
                    let walked = self.infer.walk(m);
                    match &shared {
                        _ if matches!(walked.ty, Ty::Var(_)) => return Ok(Outcome::Defer),
                        None => shared = Some(walked.ty),
                        Some(ty) if *ty == walked.ty => {}
                        Some(_) => return Ok(Outcome::Defer),
                    }
                }
                let Some(ty) = shared else { return Ok(Outcome::Defer) };
                return self.solve_member(QualTy::new(owner.quals, ty), member, result, node, loc);
            }
            Ty::Nominal(n) => (n.decl, Vec::new()),
            Ty::BoundGeneric { base, bindings } => match base.as_ref() {
                Ty::Nominal(n) => (n.decl, bindings.clone()),
                _ => {
                    return Err(SemaError::NoMember {
                        ty: owner,
                        member,
                        loc,
                    })
                }
            },
            Ty::Meta(inner) => return self.solve_meta_member(inner, owner.clone(), member, result, loc),
            _ => {
                return Err(SemaError::NoMember {
                    ty: owner,
                    member,
                    loc,
                })
            }
        };

        let Some(info) = self.realized.registry.get(decl) else {
            return Err(SemaError::NoMember { ty: owner, member, loc });
        };

        // stored property?
        if let Some((_, prop)) = info.prop(&member) {
            let prop_ty = prop.ty.clone();
            let member_ty = self.infer.instance_with(&prop_ty, &bindings);
            self.unify(result, member_ty, loc, true)?;
            return Ok(Outcome::Done);
        }

        // method(s)?
        let methods = info.methods_named(&member);
        match methods.len() {
            0 => Err(SemaError::NoMember { ty: owner, member, loc }),
            1 => {
                let method = methods[0];
                let ty = self.method_use_type(method, &bindings);
                self.unify(result, QualTy::cst(ty), loc, true)?;
                self.selections.insert(node, method);
                Ok(Outcome::Done)
            }
            _ => {
                // overloaded methods become a disjunction
                let mut alternatives = Vec::new();
                for &method in &methods {
                    let ty = self.method_use_type(method, &bindings);
                    alternatives.push(Constraint {
                        kind: ConstraintKind::Equality(result.clone(), QualTy::cst(ty)),
                        loc,
                    });
                }
                self.disjunctions.push(Constraint {
                    kind: ConstraintKind::Disjunction {
                        alternatives,
                        node,
                        candidates: methods,
                    },
                    loc,
                });
                Ok(Outcome::Done)
            }
        }
    }

    /// A use of a method: owner bindings applied, then the method's own
    /// placeholders instantiated fresh.
    fn method_use_type(&mut self, method: DeclId, bindings: &[(String, QualTy)]) -> Ty {
        match self.realized.decl_types.get(&method) {
            Some(ty) => {
                let bound = self.infer.instance_with(ty, bindings);
                self.infer.fresh_instance(&bound.ty)
            }
            None => self.infer.fresh_var(),
        }
    }

    /// Member access on a metatype: nested types and static members.
    fn solve_meta_member(
        &mut self,
        inner: &Ty,
        owner: QualTy,
        member: String,
        result: QualTy,
        loc: ConstraintLoc,
    ) -> Result<Outcome, SemaError> {
        let decl = match inner {
            Ty::Nominal(n) => n.decl,
            _ => {
                return Err(SemaError::NoMember {
                    ty: owner,
                    member,
                    loc,
                })
            }
        };
        // nested type?
        let nested = self
            .table
            .decl(decl)
            .opens
            .map(|ctx| self.table.named_in(ctx, &member))
            .unwrap_or_default()
            .into_iter()
            .find(|&d| self.table.decl(d).kind.is_type());
        if let Some(nested) = nested {
            if let Some(info) = self.realized.registry.get(nested) {
                let meta = QualTy::cst(Ty::Meta(Box::new(Ty::Nominal(
                    crate::ty::NominalTy {
                        decl: nested,
                        name: info.name.clone(),
                        placeholders: info.placeholders.clone(),
                    },
                ))));
                self.unify(result, meta, loc, true)?;
                return Ok(Outcome::Done);
            }
        }
        // static method?
        if let Some(info) = self.realized.registry.get(decl) {
            let methods = info.methods_named(&member);
            if let Some(&method) = methods.first() {
                let ty = self.method_use_type(method, &[]);
                self.unify(result, QualTy::cst(ty), loc, true)?;
                return Ok(Outcome::Done);
            }
        }
        Err(SemaError::NoMember {
            ty: owner,
            member,
            loc,
        })
    }

    // ── Construction ───────────────────────────────────────────────────

    fn solve_construction(
        &mut self,
        callee: QualTy,
        call: QualTy,
        node: NodeId,
        loc: ConstraintLoc,
    ) -> Result<Outcome, SemaError> {
        let callee = self.infer.walk(callee);
        let inner = match &callee.ty {
            Ty::Var(_) => return Ok(Outcome::Defer),
            Ty::Meta(inner) => inner.as_ref().clone(),
            _ => return Err(SemaError::NoConstructor { ty: callee, loc }),
        };
        let decl = match &inner {
            Ty::Nominal(n) => n.decl,
            Ty::BoundGeneric { base, .. } => match base.as_ref() {
                Ty::Nominal(n) => n.decl,
                _ => return Err(SemaError::NoConstructor { ty: callee, loc }),
            },
            _ => return Err(SemaError::NoConstructor { ty: callee, loc }),
        };
        let Some(info) = self.realized.registry.get(decl) else {
            return Err(SemaError::NoConstructor { ty: callee, loc });
        };

        // candidate constructors: explicit `new`s, or the synthesized one
        let mut candidates: Vec<(DeclId, Ty)> = Vec::new();
        let ctors = info.constructors.clone();
        let default_ctor = info.default_ctor.clone();
        for ctor in ctors {
            if let Some(ty) = self.realized.decl_types.get(&ctor) {
                let ty = ty.ty.clone();
                candidates.push((ctor, self.infer.fresh_instance(&ty)));
            }
        }
        if candidates.is_empty() {
            if let Some(default) = default_ctor {
                let ty = Ty::Fun(default);
                // the nominal decl itself marks the synthesized ctor
                candidates.push((decl, self.infer.fresh_instance(&ty)));
            }
        }
        if candidates.is_empty() {
            return Err(SemaError::NoConstructor { ty: callee, loc });
        }

        if candidates.len() == 1 {
            let (ctor, ty) = candidates.into_iter().next().expect("one candidate");
            self.unify(call, QualTy::bare(ty), loc, true)?;
            self.selections.insert(node, ctor);
            return Ok(Outcome::Done);
        }
        let mut alternatives = Vec::new();
        let mut decls = Vec::new();
        for (ctor, ty) in candidates {
            alternatives.push(Constraint {
                kind: ConstraintKind::Equality(call.clone(), QualTy::bare(ty)),
                loc,
            });
            decls.push(ctor);
        }
        self.disjunctions.push(Constraint {
            kind: ConstraintKind::Disjunction {
                alternatives,
                node,
                candidates: decls,
            },
            loc,
        });
        Ok(Outcome::Done)
    }

    // ── Disjunctions ───────────────────────────────────────────────────

    /// Trial every open disjunction. Zero survivors is an error, one is
    /// committed. With `force`, multi-survivor disjunctions commit their
    /// first survivor so solving always lands on a concrete answer.
    fn process_disjunctions(&mut self, force: bool) {
        let open = std::mem::take(&mut self.disjunctions);
        for constraint in open {
            let loc = constraint.loc;
            let ConstraintKind::Disjunction {
                alternatives,
                node,
                candidates,
            } = constraint.kind
            else {
                unreachable!("disjunction list only holds disjunctions");
            };

            let mut survivors = Vec::new();
            for (index, alternative) in alternatives.iter().enumerate() {
                if self.trial(alternative) {
                    survivors.push(index);
                }
            }
            match survivors.len() {
                0 => self.errors.push(SemaError::EmptyDisjunction { loc }),
                1 => {
                    let index = survivors[0];
                    self.commit_alternative(&alternatives[index], node, candidates.get(index));
                }
                _ if force => {
                    let index = survivors[0];
                    self.commit_alternative(&alternatives[index], node, candidates.get(index));
                }
                _ => {
                    // reduced but still open: revisit next round
                    if survivors.len() < alternatives.len() {
                        self.progress = true;
                    }
                    let kept_alts: Vec<Constraint> = survivors
                        .iter()
                        .map(|&i| alternatives[i].clone())
                        .collect();
                    let kept_decls: Vec<DeclId> = survivors
                        .iter()
                        .filter_map(|&i| candidates.get(i).copied())
                        .collect();
                    self.disjunctions.push(Constraint {
                        kind: ConstraintKind::Disjunction {
                            alternatives: kept_alts,
                            node,
                            candidates: kept_decls,
                        },
                        loc,
                    });
                }
            }
        }
    }

    /// Try an alternative against a snapshot; roll everything back.
    fn trial(&mut self, alternative: &Constraint) -> bool {
        let snapshot = self.infer.table.snapshot();
        let unions = self.infer.union_snapshot();
        let ok = match &alternative.kind {
            ConstraintKind::Equality(a, b) => self
                .unify(a.clone(), b.clone(), alternative.loc, true)
                .is_ok(),
            ConstraintKind::Conformance(a, b) => {
                self.conform(a.clone(), b.clone(), alternative.loc).is_ok()
            }
            _ => false,
        };
        self.infer.table.rollback_to(snapshot);
        self.infer.union_rollback(unions);
        ok
    }

    fn commit_alternative(
        &mut self,
        alternative: &Constraint,
        node: NodeId,
        candidate: Option<&DeclId>,
    ) {
        let result = match &alternative.kind {
            ConstraintKind::Equality(a, b) => {
                self.unify(a.clone(), b.clone(), alternative.loc, true)
            }
            ConstraintKind::Conformance(a, b) => {
                self.conform(a.clone(), b.clone(), alternative.loc)
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            self.errors.push(err);
        } else {
            if let Some(&decl) = candidate {
                self.selections.insert(node, decl);
            }
            self.progress = true;
        }
    }

    // ── Binding-operator qualifier discipline ──────────────────────────

    fn check_binding_qual(
        &mut self,
        op: BindOp,
        lvalue: QualTy,
        rvalue: QualTy,
        loc: ConstraintLoc,
    ) {
        match op {
            // a move needs mutable access on both sides
            BindOp::Move => {
                self.require_mut(lvalue, "<-", loc);
                self.require_mut(rvalue, "<-", loc);
            }
            // aliased storage is mutable through the new binding; the
            // rvalue may be any variant
            BindOp::Alias => {
                self.require_mut(lvalue, "&-", loc);
            }
            BindOp::Copy => {}
        }
    }

    /// Require `@mut` of an operand: resolved types are checked, unions
    /// shrink to their mutable members.
    fn require_mut(&mut self, ty: QualTy, op: &'static str, loc: ConstraintLoc) {
        let walked = self.infer.walk(ty);
        match walked.ty {
            Ty::Union(u) => {
                let members = self.infer.union_members(u).to_vec();
                let mutable: Vec<QualTy> = members
                    .into_iter()
                    .filter(|m| m.quals.contains(QualSet::MUT))
                    .collect();
                if mutable.is_empty() {
                    self.errors.push(SemaError::QualifierMismatch {
                        op,
                        required: "@mut",
                        found: walked,
                        loc,
                    });
                } else {
                    self.infer.reduce_union(u, mutable);
                }
            }
            // an unconstrained variable cannot be faulted
            Ty::Var(_) => {}
            _ => {
                if !walked.quals.contains(QualSet::MUT) {
                    self.errors.push(SemaError::QualifierMismatch {
                        op,
                        required: "@mut",
                        found: walked,
                        loc,
                    });
                }
            }
        }
    }
}

// ── Reification ────────────────────────────────────────────────────────

/// Apply the final substitution recursively to a type. Collapsed unions
/// are replaced by their member; unions still offering both disciplines
/// default to `@cst`. The memo, keyed by the original type, terminates
/// reification on self-referential types.
pub fn reify(infer: &mut InferCtx, qt: &QualTy, memo: &mut FxHashMap<Ty, QualTy>) -> QualTy {
    let walked = infer.walk(qt.clone());
    if let Some(hit) = memo.get(&walked.ty) {
        return QualTy::new(
            if walked.quals.is_empty() {
                hit.quals
            } else {
                walked.quals
            },
            hit.ty.clone(),
        );
    }
    memo.insert(walked.ty.clone(), walked.clone());

    let reified = match &walked.ty {
        Ty::Union(id) => {
            let members = infer.union_members(*id).to_vec();
            let chosen = members
                .iter()
                .find(|m| m.quals == QualSet::CST)
                .or_else(|| members.first())
                .cloned();
            match chosen {
                Some(member) => reify(infer, &member, memo),
                None => walked.clone(),
            }
        }
        Ty::Fun(fun) => {
            let fun = fun.clone();
            let params = fun
                .params
                .iter()
                .map(|p| crate::ty::FunTyParam {
                    label: p.label.clone(),
                    ty: reify(infer, &p.ty, memo),
                })
                .collect();
            let codomain = reify(infer, &fun.codomain, memo);
            QualTy::new(
                walked.quals,
                Ty::Fun(FunTy {
                    placeholders: fun.placeholders,
                    params,
                    codomain: Box::new(codomain),
                }),
            )
        }
        Ty::BoundGeneric { base, bindings } => {
            let base = base.clone();
            let bindings = bindings
                .iter()
                .map(|(n, b)| (n.clone(), reify(infer, b, memo)))
                .collect();
            QualTy::new(
                walked.quals,
                Ty::BoundGeneric {
                    base,
                    bindings,
                },
            )
        }
        Ty::Meta(inner) => {
            let inner = reify(infer, &QualTy::bare((**inner).clone()), memo);
            QualTy::new(walked.quals, Ty::Meta(Box::new(inner.ty)))
        }
        _ => walked.clone(),
    };
    memo.insert(walked.ty, reified.clone());
    reified
}

/// Whether a reified type still contains a free variable or a wide union.
pub fn is_unresolved(infer: &InferCtx, ty: &Ty) -> bool {
    match ty {
        Ty::Var(_) => true,
        Ty::Union(id) => {
            infer.union_members(*id).len() != 1
                || infer
                    .union_members(*id)
                    .iter()
                    .any(|m| is_unresolved(infer, &m.ty))
        }
        Ty::Anything | Ty::Nothing | Ty::Placeholder(_) | Ty::Builtin(_) | Ty::Nominal(_) => {
            false
        }
        Ty::Fun(fun) => {
            fun.params.iter().any(|p| is_unresolved(infer, &p.ty.ty))
                || is_unresolved(infer, &fun.codomain.ty)
        }
        Ty::Meta(inner) => is_unresolved(infer, inner),
        Ty::BoundGeneric { base, bindings } => {
            is_unresolved(infer, base)
                || bindings.iter().any(|(_, b)| is_unresolved(infer, &b.ty))
        }
    }
}
