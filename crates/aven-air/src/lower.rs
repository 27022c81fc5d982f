//! Lowering: the fully-typed AST becomes AIR.
//!
//! Top-level code lands in a synthesized `main` whose codomain is
//! `Nothing`. Functions that capture enclosing symbols are emitted as
//! context-free clones taking their captures as leading parameters, with
//! a `partial_apply` at the declaration site binding the captured values.
//! Methods and destructors are uncurried (`self` becomes the first
//! parameter) and method selects produce `partial_apply fn, owner`.
//! Generic declarations are not emitted directly; each use site enqueues
//! a specialization request keyed by the concrete function type, and the
//! queue is drained after `main`, deduplicated by mangled name.

use std::collections::VecDeque;

use aven_parser::ast::*;
use aven_sema::decls::{CtxKind, DeclId, DeclKind};
use aven_sema::resolve::Resolution;
use aven_sema::ty::{self, BuiltinTy, QualSet, QualTy, Ty};
use aven_sema::SemaResult;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::builder::FunctionBuilder;
use crate::mangle::{air_nominal_name, mangle_function, mangle_ty};
use crate::{AirQuals, AirType, AirTypeKind, Inst, RegId, Unit, Value};

/// Lower a type-checked module to an AIR unit.
pub fn lower(module: &Module, sema: &SemaResult, module_name: &str) -> Unit {
    let mut emitter = Emitter {
        sema,
        module_name,
        unit: Unit::new(),
        fun_decls: FxHashMap::default(),
        work: VecDeque::new(),
        emitted: FxHashSet::default(),
    };
    emitter.index_functions(&module.stmts);
    emitter.emit_main(module);
    emitter.drain_work();
    emitter.unit
}

/// One function waiting to be emitted, possibly under a placeholder
/// substitution (a specialization request that already resolved its
/// bindings).
struct WorkItem<'a> {
    decl: DeclId,
    fun: &'a FunDecl,
    subst: Vec<(String, QualTy)>,
    mangled: String,
}

struct Emitter<'a> {
    sema: &'a SemaResult,
    module_name: &'a str,
    unit: Unit,
    fun_decls: FxHashMap<NodeId, &'a FunDecl>,
    work: VecDeque<WorkItem<'a>>,
    /// Mangled names already emitted or queued.
    emitted: FxHashSet<String>,
}

/// Per-function emission state: the builder, the register map, and the
/// frame (exit label plus return/self registers).
struct FnCtx {
    builder: FunctionBuilder,
    locals: FxHashMap<DeclId, Value>,
    ret_reg: Option<RegId>,
    self_reg: Option<RegId>,
    subst: Vec<(String, QualTy)>,
}

impl<'a> Emitter<'a> {
    // ── Indexing ───────────────────────────────────────────────────────

    fn index_functions(&mut self, stmts: &'a [Stmt]) {
        for stmt in stmts {
            self.index_stmt(stmt);
        }
    }

    fn index_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.index_decl(decl),
            Stmt::Brace(block) => self.index_functions(&block.stmts),
            Stmt::If(s) => {
                self.index_expr(&s.cond);
                self.index_functions(&s.then_block.stmts);
                if let Some(else_branch) = &s.else_branch {
                    self.index_stmt(else_branch);
                }
            }
            Stmt::While(s) => {
                self.index_expr(&s.cond);
                self.index_functions(&s.body.stmts);
            }
            Stmt::Return(s) => {
                if let Some((_, value)) = &s.binding {
                    self.index_expr(value);
                }
            }
            Stmt::Binding(s) => {
                self.index_expr(&s.lvalue);
                self.index_expr(&s.rvalue);
            }
            Stmt::Expr(e) => self.index_expr(e),
            Stmt::Invalid { .. } => {}
        }
    }

    fn index_decl(&mut self, decl: &'a Decl) {
        match decl {
            Decl::Prop(prop) => {
                if let Some((_, init)) = &prop.initializer {
                    self.index_expr(init);
                }
            }
            Decl::Fun(fun) => {
                self.fun_decls.insert(fun.id, fun);
                if let Some(body) = &fun.body {
                    self.index_functions(&body.stmts);
                }
            }
            Decl::Struct(s) => self.index_functions(&s.body.stmts),
            Decl::Union(s) => self.index_functions(&s.body.stmts),
            Decl::Interface(s) => self.index_functions(&s.body.stmts),
            Decl::Extension(ext) => self.index_functions(&ext.body.stmts),
            Decl::UnionCase(_) => {}
        }
    }

    fn index_expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Lambda(lambda) => {
                self.fun_decls.insert(lambda.fun.id, &lambda.fun);
                if let Some(body) = &lambda.fun.body {
                    self.index_functions(&body.stmts);
                }
            }
            Expr::Select(e) => self.index_expr(&e.owner),
            Expr::Call(e) => {
                self.index_expr(&e.callee);
                for arg in &e.args {
                    self.index_expr(&arg.value);
                }
            }
            Expr::Subscript(e) => {
                self.index_expr(&e.callee);
                for arg in &e.args {
                    self.index_expr(&arg.value);
                }
            }
            Expr::Infix(e) => {
                self.index_expr(&e.lhs);
                self.index_expr(&e.rhs);
            }
            Expr::Prefix(e) => self.index_expr(&e.operand),
            Expr::Cast(e) => self.index_expr(&e.operand),
            Expr::Enclosed { inner, .. } => self.index_expr(inner),
            Expr::ArrayLit { elements, .. } | Expr::SetLit { elements, .. } => {
                for elem in elements {
                    self.index_expr(elem);
                }
            }
            Expr::MapLit { entries, .. } => {
                for (key, value) in entries {
                    self.index_expr(key);
                    self.index_expr(value);
                }
            }
            _ => {}
        }
    }

    // ── Top level ──────────────────────────────────────────────────────

    fn emit_main(&mut self, module: &'a Module) {
        self.emitted.insert("main".to_string());
        let builder = FunctionBuilder::new("main", Vec::new(), AirType::nothing());
        let mut ctx = FnCtx {
            builder,
            locals: FxHashMap::default(),
            ret_reg: None,
            self_reg: None,
            subst: Vec::new(),
        };
        for stmt in &module.stmts {
            self.lower_stmt(&mut ctx, stmt);
        }
        let function = ctx.builder.finish(None);
        self.unit.push(function);
    }

    fn drain_work(&mut self) {
        while let Some(item) = self.work.pop_front() {
            self.emit_function(item);
        }
    }

    // ── Queueing ───────────────────────────────────────────────────────

    /// Queue a function for emission unless that mangled name is already
    /// spoken for.
    fn queue(&mut self, decl: DeclId, fun: &'a FunDecl, subst: Vec<(String, QualTy)>, mangled: String) {
        if fun.body.is_none() || !self.emitted.insert(mangled.clone()) {
            return;
        }
        self.work.push_back(WorkItem {
            decl,
            fun,
            subst,
            mangled,
        });
    }

    /// Queue a non-generic function at its declaration.
    fn queue_plain(&mut self, fun: &'a FunDecl) {
        let Some(decl) = self.sema.decls.decl_of_node(fun.id) else {
            return;
        };
        if self.is_generic(decl) {
            // recorded for later specialization; nothing to emit yet
            return;
        }
        let mangled = self.mangled_name(decl, fun, &[]);
        self.queue(decl, fun, Vec::new(), mangled);
    }

    /// Queue the members of a nominal-type body (methods, constructors,
    /// destructors of non-generic owners).
    fn queue_nominal_members(&mut self, body: &'a Block, generic_owner: bool) {
        for stmt in &body.stmts {
            if let Stmt::Decl(Decl::Fun(fun)) = stmt {
                if !generic_owner {
                    self.queue_plain(fun);
                }
            }
        }
    }

    /// A specialization request: a generic declaration used at a concrete
    /// function type. Returns the specialized mangled name.
    fn request_specialization(&mut self, decl: DeclId, concrete: &Ty) -> String {
        let fun = self
            .fun_decls
            .get(&self.sema.decls.decl(decl).node)
            .copied();
        let generic_ty = self
            .sema
            .decl_types
            .get(&decl)
            .map(|qt| qt.ty.clone())
            .unwrap_or(Ty::Anything);
        let mut bindings = Vec::new();
        match_placeholders(&generic_ty, concrete, &mut bindings);
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings.dedup_by(|a, b| a.0 == b.0);
        let bound = Ty::BoundGeneric {
            base: Box::new(generic_ty),
            bindings: bindings.clone(),
        };
        let fun_ast = match fun {
            Some(f) => f,
            None => return "main".to_string(),
        };
        let mangled = self.mangled_decl_ty(decl, fun_ast, &bound);
        self.queue(decl, fun_ast, bindings, mangled.clone());
        mangled
    }

    fn is_generic(&self, decl: DeclId) -> bool {
        matches!(
            self.sema.decl_types.get(&decl),
            Some(QualTy {
                ty: Ty::Fun(fun),
                ..
            }) if !fun.placeholders.is_empty()
        )
    }

    fn mangled_name(&self, decl: DeclId, fun: &FunDecl, subst: &[(String, QualTy)]) -> String {
        let base_ty = self
            .sema
            .decl_types
            .get(&decl)
            .map(|qt| qt.ty.clone())
            .unwrap_or(Ty::Anything);
        let ty = if subst.is_empty() {
            base_ty
        } else {
            Ty::BoundGeneric {
                base: Box::new(base_ty),
                bindings: subst.to_vec(),
            }
        };
        self.mangled_decl_ty(decl, fun, &ty)
    }

    fn mangled_decl_ty(&self, decl: DeclId, fun: &FunDecl, ty: &Ty) -> String {
        let air_name = fun
            .attrs
            .iter()
            .find(|a| a.name == "air_name")
            .and_then(|a| a.args.first())
            .map(|s| s.as_str());
        mangle_function(&self.sema.decls, self.module_name, decl, ty, air_name)
    }

    // ── Function emission ──────────────────────────────────────────────

    fn emit_function(&mut self, item: WorkItem<'a>) {
        let fun = item.fun;
        let decl = item.decl;
        let kind = match self.sema.decls.decl(decl).kind {
            DeclKind::Fun { kind } => kind,
            _ => FunKind::Regular,
        };
        let captures = self.sema.captures.get(&decl).cloned().unwrap_or_default();
        let is_member = matches!(kind, FunKind::Method | FunKind::Destructor);
        let is_ctor = kind == FunKind::Constructor;

        let mut params: Vec<(String, AirType)> = Vec::new();
        let self_ty = self.owner_self_ty(decl, &item.subst);
        if is_member {
            // uncurried: the receiver is the leading parameter
            params.push((
                "self".to_string(),
                self_ty.clone().unwrap_or_else(AirType::anything),
            ));
        }
        // a capturing function's clone takes its environment first
        let captured: Vec<DeclId> = if !is_member && !is_ctor { captures } else { Vec::new() };
        for &cap in &captured {
            let ty = self.decl_air_type(cap, &item.subst);
            params.push((self.sema.decls.decl(cap).name.clone(), ty));
        }
        for param in &fun.params {
            let ty = self
                .sema
                .decls
                .decl_of_node(param.id)
                .map(|d| self.decl_air_type(d, &item.subst))
                .unwrap_or_else(AirType::anything);
            params.push((param.name.clone(), ty));
        }

        let codomain = if is_ctor {
            self_ty.clone().unwrap_or_else(AirType::anything)
        } else {
            self.fun_codomain(decl, &item.subst)
        };

        let builder = FunctionBuilder::new(item.mangled, params, codomain.clone());
        let mut ctx = FnCtx {
            builder,
            locals: FxHashMap::default(),
            ret_reg: None,
            self_reg: None,
            subst: item.subst,
        };

        // parameter registers
        let mut index = 0;
        if is_member {
            ctx.self_reg = Some(ctx.builder.function_mut().param_reg(index));
            index += 1;
        }
        for &cap in &captured {
            let reg = ctx.builder.function_mut().param_reg(index);
            ctx.locals.insert(cap, Value::Reg(reg));
            index += 1;
        }
        for param in &fun.params {
            let reg = ctx.builder.function_mut().param_reg(index);
            if let Some(d) = self.sema.decls.decl_of_node(param.id) {
                ctx.locals.insert(d, Value::Reg(reg));
            }
            index += 1;
        }

        // a constructor allocates its instance; others allocate the
        // return register when the codomain carries a value
        let ret_value = if is_ctor {
            let ty = self_ty.unwrap_or_else(AirType::anything);
            let reg = ctx.builder.emit_into(|dst| Inst::Alloc { dst, ty });
            ctx.self_reg = Some(reg);
            ctx.ret_reg = Some(reg);
            Some(Value::Reg(reg))
        } else if !codomain.is_nothing() {
            let ty = codomain.clone();
            let reg = ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty });
            ctx.ret_reg = Some(reg);
            Some(Value::Reg(reg))
        } else {
            None
        };

        if let Some(body) = &fun.body {
            for stmt in &body.stmts {
                self.lower_stmt(&mut ctx, stmt);
            }
        }
        let function = ctx.builder.finish(ret_value);
        self.unit.push(function);
    }

    /// The AIR type of `self` for a member of a nominal type.
    fn owner_self_ty(&self, decl: DeclId, subst: &[(String, QualTy)]) -> Option<AirType> {
        let ctx = self.sema.decls.decl(decl).ctx?;
        let owner = match self.sema.decls.ctx(ctx).kind {
            CtxKind::Nominal(owner) => owner,
            CtxKind::Extension(node) => match self.sema.resolutions.get(node)? {
                Resolution::Decl(subject) => *subject,
                _ => return None,
            },
            _ => return None,
        };
        let info = self.sema.registry.get(owner)?;
        Some(self.resolve_type(&QualTy::mutable(info.self_ty()), subst))
    }

    fn fun_codomain(&self, decl: DeclId, subst: &[(String, QualTy)]) -> AirType {
        match self.sema.decl_types.get(&decl) {
            Some(QualTy { ty: Ty::Fun(fun), .. }) => self.resolve_type(&fun.codomain, subst),
            _ => AirType::nothing(),
        }
    }

    // ── Type resolution ────────────────────────────────────────────────

    fn decl_air_type(&self, decl: DeclId, subst: &[(String, QualTy)]) -> AirType {
        match self.sema.decl_types.get(&decl) {
            Some(ty) => self.resolve_type(ty, subst),
            None => AirType::anything(),
        }
    }

    fn node_air_type(&self, node: NodeId, subst: &[(String, QualTy)]) -> AirType {
        match self.sema.types.get(node) {
            Some(ty) => self.resolve_type(ty, subst),
            None => AirType::anything(),
        }
    }

    /// Convert a reified semantic type to a concrete AIR type, applying
    /// the current specialization substitution.
    fn resolve_type(&self, qt: &QualTy, subst: &[(String, QualTy)]) -> AirType {
        let ty = ty::substitute_placeholders(&qt.ty, subst);
        let quals = match (qt.quals.contains(QualSet::CST), qt.quals.contains(QualSet::MUT)) {
            (false, false) => AirQuals::None,
            (true, false) => AirQuals::Cst,
            (false, true) => AirQuals::Mut,
            (true, true) => AirQuals::Both,
        };
        let kind = self.resolve_kind(&ty, subst);
        AirType::new(quals, kind)
    }

    fn resolve_kind(&self, ty: &Ty, subst: &[(String, QualTy)]) -> AirTypeKind {
        match ty {
            Ty::Anything | Ty::Meta(_) => AirTypeKind::Anything,
            Ty::Nothing => AirTypeKind::Nothing,
            Ty::Builtin(BuiltinTy::Bool) => AirTypeKind::Bool,
            Ty::Builtin(BuiltinTy::Int) => AirTypeKind::Int,
            Ty::Builtin(BuiltinTy::Float) => AirTypeKind::Float,
            Ty::Builtin(BuiltinTy::String) => AirTypeKind::String,
            Ty::Nominal(n) => AirTypeKind::Nominal(n.name.clone()),
            Ty::BoundGeneric { base, bindings } => match base.as_ref() {
                Ty::Nominal(n) => {
                    AirTypeKind::Nominal(air_nominal_name(&n.name, bindings))
                }
                other => self.resolve_kind(other, subst),
            },
            Ty::Fun(fun) => AirTypeKind::Fun {
                params: fun
                    .params
                    .iter()
                    .map(|p| self.resolve_type(&p.ty, subst))
                    .collect(),
                codomain: Box::new(self.resolve_type(&fun.codomain, subst)),
            },
            // unresolved leftovers only appear behind reported errors;
            // lowering proceeds with the invalid placeholder
            Ty::Placeholder(_) | Ty::Var(_) | Ty::Union(_) => AirTypeKind::Anything,
        }
    }

    // ── Statements ─────────────────────────────────────────────────────

    fn lower_stmt(&mut self, ctx: &mut FnCtx, stmt: &'a Stmt) {
        match stmt {
            Stmt::Decl(decl) => self.lower_decl(ctx, decl),
            Stmt::Brace(block) => {
                for stmt in &block.stmts {
                    self.lower_stmt(ctx, stmt);
                }
            }
            Stmt::If(s) => self.lower_if(ctx, s),
            Stmt::While(s) => self.lower_while(ctx, s),
            Stmt::Return(s) => {
                if let Some((op, value)) = &s.binding {
                    let v = self.lower_expr(ctx, value);
                    if let Some(ret) = ctx.ret_reg {
                        ctx.builder.emit(binding_inst(*op, v, Value::Reg(ret)));
                    }
                }
                ctx.builder.seal_with_jump("exit");
            }
            Stmt::Binding(s) => {
                let rvalue = self.lower_expr(ctx, &s.rvalue);
                let lvalue = self.lower_expr(ctx, &s.lvalue);
                ctx.builder.emit(binding_inst(s.op, rvalue, lvalue));
            }
            Stmt::Expr(e) => {
                let value = self.lower_expr(ctx, e);
                // statement results are unused
                if let Value::Reg(_) = value {
                    ctx.builder.emit(Inst::Drop { value });
                }
            }
            Stmt::Invalid { .. } => {}
        }
    }

    fn lower_decl(&mut self, ctx: &mut FnCtx, decl: &'a Decl) {
        match decl {
            Decl::Prop(prop) => {
                let Some(decl_id) = self.sema.decls.decl_of_node(prop.id) else {
                    return;
                };
                let ty = self.decl_air_type(decl_id, &ctx.subst);
                let reg = ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty });
                ctx.locals.insert(decl_id, Value::Reg(reg));
                if let Some((op, init)) = &prop.initializer {
                    let value = self.lower_expr(ctx, init);
                    ctx.builder.emit(binding_inst(*op, value, Value::Reg(reg)));
                }
            }
            Decl::Fun(fun) => self.lower_fun_decl(ctx, fun),
            Decl::Struct(s) => {
                let generic = !s.generic_params.is_empty();
                self.queue_nominal_members(&s.body, generic);
            }
            Decl::Union(s) => {
                let generic = !s.generic_params.is_empty();
                self.queue_nominal_members(&s.body, generic);
            }
            Decl::Interface(s) => {
                self.queue_nominal_members(&s.body, !s.generic_params.is_empty());
            }
            Decl::Extension(ext) => self.queue_nominal_members(&ext.body, false),
            Decl::UnionCase(_) => {}
        }
    }

    /// A function declaration in statement position. Generic declarations
    /// wait for specialization requests; capturing functions get their
    /// closure built here, at the declaration site.
    fn lower_fun_decl(&mut self, ctx: &mut FnCtx, fun: &'a FunDecl) {
        let Some(decl_id) = self.sema.decls.decl_of_node(fun.id) else {
            return;
        };
        if self.is_generic(decl_id) {
            return;
        }
        self.queue_plain(fun);
        let captured = self.sema.captures.get(&decl_id).cloned().unwrap_or_default();
        if captured.is_empty() {
            return;
        }
        let mangled = self.mangled_name(decl_id, fun, &[]);
        let args: Vec<Value> = captured
            .iter()
            .filter_map(|cap| ctx.locals.get(cap).cloned())
            .collect();
        let ty = self.decl_air_type(decl_id, &ctx.subst);
        let reg = ctx.builder.emit_into(|dst| Inst::PartialApply {
            dst,
            callee: Value::Fun(mangled),
            args,
            ty,
        });
        ctx.locals.insert(decl_id, Value::Reg(reg));
    }

    fn lower_if(&mut self, ctx: &mut FnCtx, s: &'a IfStmt) {
        let then_label = ctx.builder.add_block("then");
        let else_label = ctx.builder.add_block("else");
        let post_label = ctx.builder.add_block("post");

        let cond = self.lower_expr(ctx, &s.cond);
        ctx.builder.emit(Inst::Branch {
            cond,
            then_label: then_label.clone(),
            else_label: else_label.clone(),
        });

        ctx.builder.switch_to(&then_label);
        for stmt in &s.then_block.stmts {
            self.lower_stmt(ctx, stmt);
        }
        ctx.builder.seal_with_jump(&post_label);

        ctx.builder.switch_to(&else_label);
        if let Some(else_branch) = &s.else_branch {
            self.lower_stmt(ctx, else_branch);
        }
        ctx.builder.seal_with_jump(&post_label);

        ctx.builder.switch_to(&post_label);
    }

    fn lower_while(&mut self, ctx: &mut FnCtx, s: &'a WhileStmt) {
        let test_label = ctx.builder.add_block("test");
        let cont_label = ctx.builder.add_block("cont");
        let post_label = ctx.builder.add_block("post");

        ctx.builder.seal_with_jump(&test_label);

        ctx.builder.switch_to(&test_label);
        let cond = self.lower_expr(ctx, &s.cond);
        ctx.builder.emit(Inst::Branch {
            cond,
            then_label: cont_label.clone(),
            else_label: post_label.clone(),
        });

        ctx.builder.switch_to(&cont_label);
        for stmt in &s.body.stmts {
            self.lower_stmt(ctx, stmt);
        }
        ctx.builder.seal_with_jump(&test_label);

        ctx.builder.switch_to(&post_label);
    }

    // ── Expressions ────────────────────────────────────────────────────

    fn lower_expr(&mut self, ctx: &mut FnCtx, expr: &'a Expr) -> Value {
        match expr {
            Expr::BoolLit { value, .. } => Value::Bool(*value),
            Expr::IntLit { value, .. } => Value::Int(*value),
            Expr::FloatLit { value, .. } => Value::Float(*value),
            Expr::StrLit { value, .. } => Value::Str(value.clone()),
            Expr::NullRef { .. } => Value::Null,
            Expr::Ident(ident) => self.lower_ident(ctx, ident),
            Expr::Select(select) => self.lower_select(ctx, select),
            Expr::Call(call) => self.lower_call(ctx, call),
            Expr::Subscript(subscript) => {
                for arg in &subscript.args {
                    self.lower_expr(ctx, &arg.value);
                }
                self.lower_expr(ctx, &subscript.callee);
                let ty = AirType::anything();
                Value::Reg(ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty }))
            }
            Expr::Infix(infix) => self.lower_infix(ctx, infix),
            Expr::Prefix(prefix) => self.lower_prefix(ctx, prefix),
            Expr::Cast(cast) => {
                let value = self.lower_expr(ctx, &cast.operand);
                let ty = self.node_air_type(cast.id, &ctx.subst);
                Value::Reg(
                    ctx.builder
                        .emit_into(|dst| Inst::UnsafeCast { dst, value, ty }),
                )
            }
            Expr::Lambda(lambda) => {
                self.lower_fun_decl(ctx, &lambda.fun);
                let Some(decl_id) = self.sema.decls.decl_of_node(lambda.fun.id) else {
                    return Value::Null;
                };
                match ctx.locals.get(&decl_id) {
                    Some(value) => value.clone(),
                    None => Value::Fun(self.mangled_name(decl_id, &lambda.fun, &[])),
                }
            }
            Expr::ArrayLit { elements, .. } | Expr::SetLit { elements, .. } => {
                for elem in elements {
                    self.lower_expr(ctx, elem);
                }
                let ty = AirType::anything();
                Value::Reg(ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty }))
            }
            Expr::MapLit { entries, .. } => {
                for (key, value) in entries {
                    self.lower_expr(ctx, key);
                    self.lower_expr(ctx, value);
                }
                let ty = AirType::anything();
                Value::Reg(ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty }))
            }
            Expr::Enclosed { inner, .. } => self.lower_expr(ctx, inner),
            Expr::Invalid { .. } => Value::Null,
        }
    }

    fn lower_ident(&mut self, ctx: &mut FnCtx, ident: &IdentExpr) -> Value {
        // an overload selection recorded by the solver wins over the
        // binder's ambiguous set
        let decl = match self.sema.selections.get(&ident.id) {
            Some(&decl) => Some(decl),
            None => match self.sema.resolutions.get(ident.id) {
                Some(Resolution::Decl(decl)) => Some(*decl),
                Some(Resolution::Overloads(set)) => set.first().copied(),
                None => None,
            },
        };
        let Some(decl) = decl else { return Value::Null };
        let info = self.sema.decls.decl(decl);
        match info.kind {
            DeclKind::Prop { .. } | DeclKind::Param => {
                // a stored member of the enclosing nominal type reads
                // through `self`
                if let Some(value) = ctx.locals.get(&decl) {
                    return value.clone();
                }
                if let Some((owner, index)) = self.member_position(decl) {
                    if let Some(self_reg) = ctx.self_reg {
                        let ty = self.decl_air_type(decl, &ctx.subst);
                        let _ = owner;
                        return Value::Reg(ctx.builder.emit_into(|dst| Inst::Extract {
                            dst,
                            src: Value::Reg(self_reg),
                            index,
                            ty,
                        }));
                    }
                }
                Value::Null
            }
            DeclKind::Fun { .. } => self.function_reference(ctx, decl, ident.id),
            _ => Value::Null,
        }
    }

    /// Materialize a reference to a function declaration: the closure
    /// value for capturing functions, a specialization for generics, or
    /// the plain mangled reference.
    fn function_reference(&mut self, ctx: &mut FnCtx, decl: DeclId, node: NodeId) -> Value {
        if let Some(value) = ctx.locals.get(&decl) {
            // thick function: the declaration site bound its environment
            return value.clone();
        }
        if self.is_generic(decl) {
            let concrete = self
                .sema
                .types
                .get(node)
                .map(|qt| ty::substitute_placeholders(&qt.ty, &ctx.subst))
                .unwrap_or(Ty::Anything);
            let mangled = self.request_specialization(decl, &concrete);
            return Value::Fun(mangled);
        }
        let Some(fun) = self.fun_decls.get(&self.sema.decls.decl(decl).node).copied() else {
            return Value::Null;
        };
        self.queue_plain(fun);
        Value::Fun(self.mangled_name(decl, fun, &[]))
    }

    /// The owner and extraction index of a stored property.
    fn member_position(&self, decl: DeclId) -> Option<(DeclId, usize)> {
        let ctx = self.sema.decls.decl(decl).ctx?;
        let owner = match self.sema.decls.ctx(ctx).kind {
            CtxKind::Nominal(owner) => owner,
            _ => return None,
        };
        let info = self.sema.registry.get(owner)?;
        let name = &self.sema.decls.decl(decl).name;
        info.prop(name).map(|(index, _)| (owner, index))
    }

    fn lower_select(&mut self, ctx: &mut FnCtx, select: &'a SelectExpr) -> Value {
        let owner = self.lower_expr(ctx, &select.owner);

        // a method select produces the bound method via partial_apply
        if let Some(&method) = self.sema.selections.get(&select.id) {
            if matches!(
                self.sema.decls.decl(method).kind,
                DeclKind::Fun {
                    kind: FunKind::Method | FunKind::Destructor
                }
            ) {
                let mangled = self.method_reference(method, select.owner.id(), ctx);
                let ty = self.node_air_type(select.id, &ctx.subst);
                return Value::Reg(ctx.builder.emit_into(|dst| Inst::PartialApply {
                    dst,
                    callee: Value::Fun(mangled),
                    args: vec![owner],
                    ty,
                }));
            }
        }

        // otherwise a stored property: extract by member position
        let index = self
            .owner_nominal(select.owner.id(), ctx)
            .and_then(|owner_decl| {
                let info = self.sema.registry.get(owner_decl)?;
                info.prop(&select.member).map(|(index, _)| index)
            })
            .unwrap_or(0);
        let ty = self.node_air_type(select.id, &ctx.subst);
        Value::Reg(ctx.builder.emit_into(|dst| Inst::Extract {
            dst,
            src: owner,
            index,
            ty,
        }))
    }

    /// The nominal declaration behind an owner expression's type.
    fn owner_nominal(&self, owner_node: NodeId, ctx: &FnCtx) -> Option<DeclId> {
        let qt = self.sema.types.get(owner_node)?;
        let ty = ty::substitute_placeholders(&qt.ty, &ctx.subst);
        match ty {
            Ty::Nominal(n) => Some(n.decl),
            Ty::BoundGeneric { base, .. } => match *base {
                Ty::Nominal(n) => Some(n.decl),
                _ => None,
            },
            _ => None,
        }
    }

    /// Mangled name of a method, specialized by its owner's bindings when
    /// the owner is generic. Queues the emission.
    fn method_reference(&mut self, method: DeclId, owner_node: NodeId, ctx: &FnCtx) -> String {
        let Some(fun) = self
            .fun_decls
            .get(&self.sema.decls.decl(method).node)
            .copied()
        else {
            return "main".to_string();
        };
        let bindings = self
            .sema
            .types
            .get(owner_node)
            .map(|qt| ty::substitute_placeholders(&qt.ty, &ctx.subst))
            .and_then(|ty| match ty {
                Ty::BoundGeneric { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap_or_default();
        let mangled = self.mangled_name(method, fun, &bindings);
        self.queue(method, fun, bindings, mangled.clone());
        mangled
    }

    fn lower_call(&mut self, ctx: &mut FnCtx, call: &'a CallExpr) -> Value {
        // construction: the solver picked a constructor (or the nominal
        // declaration itself, standing for the synthesized one)
        if let Some(&chosen) = self.sema.selections.get(&call.id) {
            return self.lower_construction(ctx, call, chosen);
        }

        let callee_is_static = self.callee_is_static(call);
        let callee = self.lower_expr(ctx, &call.callee);
        let callee = if callee_is_static {
            callee
        } else {
            // arbitrary callable values go through a bound reference
            let ty = self.node_air_type(call.callee.id(), &ctx.subst);
            let reg = ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty });
            ctx.builder.emit(Inst::Bind {
                src: callee,
                dst: Value::Reg(reg),
            });
            Value::Reg(reg)
        };

        let args = self.lower_args(ctx, &call.args);
        let ty = self.node_air_type(call.id, &ctx.subst);
        Value::Reg(ctx.builder.emit_into(|dst| Inst::Apply {
            dst,
            callee,
            args,
            ty,
        }))
    }

    /// Statically known callees skip the make_ref/bind dance: direct
    /// function names and method selects.
    fn callee_is_static(&self, call: &CallExpr) -> bool {
        match call.callee.as_ref() {
            Expr::Ident(ident) => {
                let decl = match self.sema.selections.get(&ident.id) {
                    Some(&decl) => Some(decl),
                    None => match self.sema.resolutions.get(ident.id) {
                        Some(Resolution::Decl(decl)) => Some(*decl),
                        Some(Resolution::Overloads(set)) => set.first().copied(),
                        None => None,
                    },
                };
                matches!(
                    decl.map(|d| self.sema.decls.decl(d).kind),
                    Some(DeclKind::Fun { .. })
                )
            }
            Expr::Select(select) => self.sema.selections.contains_key(&select.id),
            Expr::Enclosed { .. } => false,
            _ => false,
        }
    }

    /// Evaluate arguments into argument registers using their binding
    /// operators.
    fn lower_args(&mut self, ctx: &mut FnCtx, args: &'a [CallArg]) -> Vec<Value> {
        let mut values = Vec::new();
        for arg in args {
            let value = self.lower_expr(ctx, &arg.value);
            let ty = self.node_air_type(arg.value.id(), &ctx.subst);
            let reg = ctx.builder.emit_into(|dst| Inst::MakeRef { dst, ty });
            ctx.builder.emit(binding_inst(arg.op, value, Value::Reg(reg)));
            values.push(Value::Reg(reg));
        }
        values
    }

    fn lower_construction(&mut self, ctx: &mut FnCtx, call: &'a CallExpr, chosen: DeclId) -> Value {
        let result_ty = self.node_air_type(call.id, &ctx.subst);
        let bindings = self
            .sema
            .types
            .get(call.id)
            .map(|qt| ty::substitute_placeholders(&qt.ty, &ctx.subst))
            .and_then(|ty| match ty {
                Ty::BoundGeneric { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap_or_default();

        let ctor_name = match self.sema.decls.decl(chosen).kind {
            DeclKind::Fun { kind: FunKind::Constructor } => {
                let Some(fun) = self
                    .fun_decls
                    .get(&self.sema.decls.decl(chosen).node)
                    .copied()
                else {
                    return Value::Null;
                };
                let mangled = self.mangled_name(chosen, fun, &bindings);
                self.queue(chosen, fun, bindings, mangled.clone());
                mangled
            }
            // the nominal declaration stands for its synthesized ctor
            _ => self.emit_default_ctor(chosen, &bindings),
        };

        let args = self.lower_args(ctx, &call.args);
        Value::Reg(ctx.builder.emit_into(|dst| Inst::Apply {
            dst,
            callee: Value::Fun(ctor_name),
            args,
            ty: result_ty,
        }))
    }

    /// Emit (once per specialization) the synthesized constructor of a
    /// struct: allocate the instance, copy each argument into its stored
    /// property, return the instance.
    fn emit_default_ctor(&mut self, owner: DeclId, bindings: &[(String, QualTy)]) -> String {
        let Some(info) = self.sema.registry.get(owner) else {
            return "main".to_string();
        };
        let self_kind = if bindings.is_empty() {
            AirTypeKind::Nominal(info.name.clone())
        } else {
            AirTypeKind::Nominal(air_nominal_name(&info.name, bindings))
        };
        let self_ty = AirType::new(AirQuals::Mut, self_kind);

        let base = Ty::Nominal(ty::NominalTy {
            decl: owner,
            name: info.name.clone(),
            placeholders: info.placeholders.clone(),
        });
        let key_ty = if bindings.is_empty() {
            base
        } else {
            Ty::BoundGeneric {
                base: Box::new(base),
                bindings: bindings.to_vec(),
            }
        };
        let mangled = format!(
            "{}_{}_new_{}",
            self.module_name,
            info.name,
            mangle_ty(&key_ty)
        );
        if !self.emitted.insert(mangled.clone()) {
            return mangled;
        }

        let props: Vec<(String, QualTy)> = info
            .props
            .iter()
            .map(|p| {
                let ty = self
                    .sema
                    .decl_types
                    .get(&p.decl)
                    .cloned()
                    .unwrap_or(QualTy::cst(Ty::Anything));
                (p.name.clone(), ty)
            })
            .collect();
        let params: Vec<(String, AirType)> = props
            .iter()
            .map(|(name, ty)| (name.clone(), self.resolve_type(ty, bindings)))
            .collect();

        let mut builder = FunctionBuilder::new(mangled.clone(), params, self_ty.clone());
        let self_reg = builder.emit_into(|dst| Inst::Alloc {
            dst,
            ty: self_ty,
        });
        for (index, (_, ty)) in props.iter().enumerate() {
            let member_ty = self.resolve_type(ty, bindings);
            let member = builder.emit_into(|dst| Inst::Extract {
                dst,
                src: Value::Reg(self_reg),
                index,
                ty: member_ty,
            });
            let param = builder.function_mut().param_reg(index);
            builder.emit(Inst::Copy {
                src: Value::Reg(param),
                dst: Value::Reg(member),
            });
        }
        let function = builder.finish(Some(Value::Reg(self_reg)));
        self.unit.push(function);
        mangled
    }

    fn lower_infix(&mut self, ctx: &mut FnCtx, infix: &'a InfixExpr) -> Value {
        let lhs = self.lower_expr(ctx, &infix.lhs);
        let rhs = self.lower_expr(ctx, &infix.rhs);
        match infix.op {
            InfixOp::RefEq => {
                return Value::Reg(
                    ctx.builder
                        .emit_into(|dst| Inst::RefEq { dst, lhs, rhs }),
                );
            }
            InfixOp::RefNe => {
                return Value::Reg(
                    ctx.builder
                        .emit_into(|dst| Inst::RefNe { dst, lhs, rhs }),
                );
            }
            _ => {}
        }
        let operand_kind = self.node_air_type(infix.lhs.id(), &ctx.subst).kind;
        let callee = Value::Fun(builtin_op_name(&operand_kind, infix.op));
        let ty = self.node_air_type(infix.id, &ctx.subst);
        Value::Reg(ctx.builder.emit_into(|dst| Inst::Apply {
            dst,
            callee,
            args: vec![lhs, rhs],
            ty,
        }))
    }

    fn lower_prefix(&mut self, ctx: &mut FnCtx, prefix: &'a PrefixExpr) -> Value {
        let operand = self.lower_expr(ctx, &prefix.operand);
        let name = match prefix.op {
            PrefixOp::Plus => return operand,
            PrefixOp::Not => "bool_not".to_string(),
            PrefixOp::Minus => {
                let kind = self.node_air_type(prefix.operand.id(), &ctx.subst).kind;
                match kind {
                    AirTypeKind::Float => "float_neg".to_string(),
                    _ => "int_neg".to_string(),
                }
            }
        };
        let ty = self.node_air_type(prefix.id, &ctx.subst);
        Value::Reg(ctx.builder.emit_into(|dst| Inst::Apply {
            dst,
            callee: Value::Fun(name),
            args: vec![operand],
            ty,
        }))
    }
}

/// The instruction a binding operator lowers to.
fn binding_inst(op: BindOp, src: Value, dst: Value) -> Inst {
    match op {
        BindOp::Copy => Inst::Copy { src, dst },
        BindOp::Move => Inst::Move { src, dst },
        BindOp::Alias => Inst::Bind { src, dst },
    }
}

/// The runtime support routine an infix operator dispatches to, by
/// operand type.
fn builtin_op_name(kind: &AirTypeKind, op: InfixOp) -> String {
    let prefix = match kind {
        AirTypeKind::Int => "int",
        AirTypeKind::Float => "float",
        AirTypeKind::Bool => "bool",
        AirTypeKind::String => "string",
        _ => "any",
    };
    let mnemonic = match op {
        InfixOp::Add => "add",
        InfixOp::Sub => "sub",
        InfixOp::Mul => "mul",
        InfixOp::Div => "div",
        InfixOp::Mod => "mod",
        InfixOp::Eq => "eq",
        InfixOp::Ne => "ne",
        InfixOp::Lt => "lt",
        InfixOp::Le => "le",
        InfixOp::Gt => "gt",
        InfixOp::Ge => "ge",
        InfixOp::And => "and",
        InfixOp::Or => "or",
        InfixOp::Is => "is",
        InfixOp::RefEq | InfixOp::RefNe => "ref",
    };
    format!("{prefix}_{mnemonic}")
}

/// Structurally match a generic signature against a concrete use-site
/// type, collecting placeholder bindings.
fn match_placeholders(generic: &Ty, concrete: &Ty, out: &mut Vec<(String, QualTy)>) {
    match (generic, concrete) {
        (Ty::Placeholder(name), other) => {
            if !matches!(other, Ty::Placeholder(_) | Ty::Var(_) | Ty::Union(_)) {
                out.push((name.clone(), QualTy::cst(other.clone())));
            }
        }
        (Ty::Fun(g), Ty::Fun(c)) => {
            for (gp, cp) in g.params.iter().zip(c.params.iter()) {
                match_placeholders(&gp.ty.ty, &cp.ty.ty, out);
            }
            match_placeholders(&g.codomain.ty, &c.codomain.ty, out);
        }
        (
            Ty::BoundGeneric {
                bindings: g_bind, ..
            },
            Ty::BoundGeneric {
                bindings: c_bind, ..
            },
        ) => {
            for ((_, g), (_, c)) in g_bind.iter().zip(c_bind.iter()) {
                match_placeholders(&g.ty, &c.ty, out);
            }
        }
        (Ty::Meta(g), Ty::Meta(c)) => match_placeholders(g, c, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_ops_map_to_instructions() {
        assert!(matches!(
            binding_inst(BindOp::Copy, Value::Int(1), Value::Reg(RegId(0))),
            Inst::Copy { .. }
        ));
        assert!(matches!(
            binding_inst(BindOp::Move, Value::Int(1), Value::Reg(RegId(0))),
            Inst::Move { .. }
        ));
        assert!(matches!(
            binding_inst(BindOp::Alias, Value::Int(1), Value::Reg(RegId(0))),
            Inst::Bind { .. }
        ));
    }

    #[test]
    fn builtin_op_names() {
        assert_eq!(builtin_op_name(&AirTypeKind::Int, InfixOp::Add), "int_add");
        assert_eq!(builtin_op_name(&AirTypeKind::Float, InfixOp::Lt), "float_lt");
        assert_eq!(builtin_op_name(&AirTypeKind::Bool, InfixOp::And), "bool_and");
    }

    #[test]
    fn placeholder_matching_collects_bindings() {
        let generic = Ty::Fun(aven_sema::ty::FunTy {
            placeholders: vec!["T".to_string()],
            params: vec![aven_sema::ty::FunTyParam {
                label: None,
                ty: QualTy::bare(Ty::Placeholder("T".to_string())),
            }],
            codomain: Box::new(QualTy::bare(Ty::Placeholder("T".to_string()))),
        });
        let concrete = Ty::Fun(aven_sema::ty::FunTy {
            placeholders: Vec::new(),
            params: vec![aven_sema::ty::FunTyParam {
                label: None,
                ty: QualTy::cst(Ty::int()),
            }],
            codomain: Box::new(QualTy::cst(Ty::int())),
        });
        let mut out = Vec::new();
        match_placeholders(&generic, &concrete, &mut out);
        out.dedup_by(|a, b| a.0 == b.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "T");
        assert_eq!(out[0].1.ty, Ty::int());
    }
}
