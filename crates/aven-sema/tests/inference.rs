//! End-to-end semantic analysis tests: the full pass pipeline over small
//! programs, checking inferred types, qualifier discipline, overload
//! resolution, and error reporting.

use aven_parser::ast::*;
use aven_parser::parse;
use aven_sema::ty::{QualSet, QualTy, Ty};
use aven_sema::{analyze, SemaResult};

fn run(source: &str) -> (Module, SemaResult) {
    let parsed = parse(source, "test");
    assert!(
        !parsed.issues.has_errors(),
        "parse errors: {:?}",
        parsed.issues.iter().collect::<Vec<_>>()
    );
    let result = analyze(&parsed.module);
    (parsed.module, result)
}

fn run_ok(source: &str) -> (Module, SemaResult) {
    let (module, result) = run(source);
    assert!(
        !result.issues.has_errors(),
        "unexpected sema errors: {:?}",
        result.issues.iter().collect::<Vec<_>>()
    );
    (module, result)
}

/// The reified type of the declaration named `name`.
fn type_of_decl(result: &SemaResult, name: &str) -> QualTy {
    let decl = result
        .decls
        .decls()
        .find(|d| d.name == name)
        .unwrap_or_else(|| panic!("no decl named {name}"));
    result
        .decl_types
        .get(&decl.id)
        .unwrap_or_else(|| panic!("no type for {name}"))
        .clone()
}

/// Find the first select expression `<owner>.<member>` in the module.
fn find_select(module: &Module, member: &str) -> NodeId {
    fn in_expr(expr: &Expr, member: &str) -> Option<NodeId> {
        match expr {
            Expr::Select(e) if e.member == member => Some(e.id),
            Expr::Select(e) => in_expr(&e.owner, member),
            Expr::Call(e) => in_expr(&e.callee, member)
                .or_else(|| e.args.iter().find_map(|a| in_expr(&a.value, member))),
            Expr::Infix(e) => in_expr(&e.lhs, member).or_else(|| in_expr(&e.rhs, member)),
            Expr::Enclosed { inner, .. } => in_expr(inner, member),
            _ => None,
        }
    }
    fn in_stmt(stmt: &Stmt, member: &str) -> Option<NodeId> {
        match stmt {
            Stmt::Decl(Decl::Prop(p)) => {
                p.initializer.as_ref().and_then(|(_, e)| in_expr(e, member))
            }
            Stmt::Expr(e) => in_expr(e, member),
            Stmt::Binding(b) => {
                in_expr(&b.lvalue, member).or_else(|| in_expr(&b.rvalue, member))
            }
            _ => None,
        }
    }
    module
        .stmts
        .iter()
        .find_map(|s| in_stmt(s, member))
        .unwrap_or_else(|| panic!("no select of {member}"))
}

/// Find the first call whose callee is the identifier `name`.
fn find_call(module: &Module, name: &str) -> NodeId {
    fn in_expr(expr: &Expr, name: &str) -> Option<NodeId> {
        match expr {
            Expr::Call(e) => {
                if matches!(e.callee.as_ref(), Expr::Ident(i) if i.name == name) {
                    Some(e.id)
                } else {
                    e.args.iter().find_map(|a| in_expr(&a.value, name))
                }
            }
            _ => None,
        }
    }
    fn in_stmt(stmt: &Stmt, name: &str) -> Option<NodeId> {
        match stmt {
            Stmt::Decl(Decl::Prop(p)) => {
                p.initializer.as_ref().and_then(|(_, e)| in_expr(e, name))
            }
            Stmt::Expr(e) => in_expr(e, name),
            _ => None,
        }
    }
    module
        .stmts
        .iter()
        .find_map(|s| in_stmt(s, name))
        .unwrap_or_else(|| panic!("no call of {name}"))
}

// ── Literals and bindings ───────────────────────────────────────────────

#[test]
fn untyped_let_defaults_to_cst() {
    let (_, result) = run_ok("let x = 42");
    assert_eq!(type_of_decl(&result, "x"), QualTy::cst(Ty::int()));
}

#[test]
fn string_and_bool_literals() {
    let (_, result) = run_ok("let s = \"hi\"\nlet b = true");
    assert_eq!(type_of_decl(&result, "s"), QualTy::cst(Ty::string()));
    assert_eq!(type_of_decl(&result, "b"), QualTy::cst(Ty::bool()));
}

#[test]
fn move_into_mutable_storage_is_accepted() {
    let (_, result) = run_ok("let x: @mut Int = 0\nx <- 3");
    assert_eq!(type_of_decl(&result, "x"), QualTy::mutable(Ty::int()));
}

#[test]
fn move_into_constant_storage_is_rejected() {
    let source = "let x: @cst Int = 0\nx <- 3";
    let (_, result) = run(source);
    let qualifier_errors: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.code == "E0403")
        .collect();
    assert_eq!(qualifier_errors.len(), 1, "{:?}", result.issues.iter().collect::<Vec<_>>());
    // the error points at the `<-` operator
    let span = qualifier_errors[0].span;
    assert_eq!(&source[span.to_range()], "<-");
}

#[test]
fn copy_between_mismatched_types_is_rejected() {
    let (_, result) = run("let x: @cst Int = 0\nlet y: @cst Bool = x");
    assert!(result.issues.iter().any(|i| i.code == "E0401"));
}

#[test]
fn alias_requires_mutable_lvalue() {
    let (_, result) = run("let x: @cst Int = 0\nlet y: @cst Int &- x");
    assert!(result.issues.iter().any(|i| i.code == "E0403"));
}

#[test]
fn alias_of_constant_rvalue_is_accepted() {
    // the rvalue may be any variant; the lvalue acquires @mut
    let (_, result) = run_ok("let x: @cst Int = 0\nlet y: @mut Int &- x");
    assert_eq!(type_of_decl(&result, "y"), QualTy::mutable(Ty::int()));
}

// ── Conditions ──────────────────────────────────────────────────────────

#[test]
fn condition_must_be_bool() {
    let (_, result) = run("if 1 { }");
    assert!(result.issues.has_errors());
}

#[test]
fn comparison_condition_is_fine() {
    run_ok("let x = 1\nif x < 2 { } else { }");
}

#[test]
fn while_condition_is_checked() {
    run_ok("var n: @mut Int = 0\nwhile n < 10 { n <- n + 1 }");
}

// ── Functions and generics ──────────────────────────────────────────────

#[test]
fn return_type_checks_against_codomain() {
    run_ok("fun f(_ x: Int) -> Int { return = x }");
}

#[test]
fn return_type_mismatch_is_rejected() {
    let (_, result) = run("fun f(_ x: Int) -> Bool { return = x }");
    assert!(result.issues.has_errors());
}

#[test]
fn generic_identity_specializes_per_call() {
    let (_, result) = run_ok(
        "fun id<T>(_ v: T) -> T { return = v }\nlet a = id(1)\nlet b = id(\"x\")",
    );
    assert_eq!(type_of_decl(&result, "a"), QualTy::cst(Ty::int()));
    assert_eq!(type_of_decl(&result, "b"), QualTy::cst(Ty::string()));
}

#[test]
fn call_argument_mismatch_is_rejected() {
    let (_, result) = run("fun f(_ x: Int) -> Int { return = x }\nf(true)");
    assert!(result.issues.has_errors());
}

#[test]
fn overload_resolution_picks_matching_alternative() {
    let (module, result) = run_ok(
        "fun f(_ x: Int) -> Int { return = x }\nfun f(_ x: Bool) -> Bool { return = x }\nlet r = f(true)",
    );
    // the call's type is Bool
    assert_eq!(type_of_decl(&result, "r"), QualTy::cst(Ty::bool()));
    // the Bool overload was selected
    let call = find_call(&module, "f");
    let Stmt::Decl(Decl::Prop(prop)) = &module.stmts[2] else {
        panic!("expected let r");
    };
    let Some((_, Expr::Call(call_expr))) = &prop.initializer else {
        panic!("expected call initializer");
    };
    let Expr::Ident(callee) = call_expr.callee.as_ref() else {
        panic!("expected ident callee");
    };
    let chosen = result
        .selections
        .get(&callee.id)
        .expect("overload selection recorded");
    let chosen_fun = result.decls.decl(*chosen);
    assert_eq!(chosen_fun.name, "f");
    let _ = call;
    // the chosen overload is the Bool one: its parameter signature was Bool
    let ty = result.decl_types.get(chosen).expect("overload type");
    let Ty::Fun(fun) = &ty.ty else { panic!("expected fn type") };
    assert_eq!(fun.codomain.ty, Ty::bool());
}

#[test]
fn empty_overload_set_reports_no_candidate() {
    let (_, result) = run(
        "fun f(_ x: Int) -> Int { return = x }\nfun f(_ x: Bool) -> Bool { return = x }\nf(\"s\")",
    );
    assert!(result.issues.iter().any(|i| i.code == "E0406" || i.code == "E0401"));
}

// ── Structs, members, construction ──────────────────────────────────────

#[test]
fn struct_construction_and_member_select() {
    let (module, result) = run_ok(
        "struct Pair<A, B> { let fst: A\nlet snd: B }\nlet p = Pair(fst := 1, snd := true)\np.fst",
    );
    let select = find_select(&module, "fst");
    let ty = result.types.get(select).expect("select typed");
    assert_eq!(*ty, QualTy::cst(Ty::int()));
}

#[test]
fn member_on_wrong_type_is_rejected() {
    let (_, result) = run("let x = 1\nx.fst");
    assert!(result.issues.iter().any(|i| i.code == "E0404"));
}

#[test]
fn unknown_member_is_rejected() {
    let (_, result) = run("struct P { let v: Int }\nlet p = P(v := 1)\np.w");
    assert!(result.issues.iter().any(|i| i.code == "E0404"));
}

#[test]
fn explicit_constructor_is_selected() {
    let (module, result) = run_ok(
        "struct P { let v: Int\nnew(_ start: Int) { } }\nlet p = P(0)",
    );
    let call = find_call(&module, "P");
    let chosen = result.selections.get(&call).expect("ctor selection");
    assert!(matches!(
        result.decls.decl(*chosen).kind,
        aven_sema::decls::DeclKind::Fun {
            kind: FunKind::Constructor
        }
    ));
}

#[test]
fn method_select_types_as_function() {
    let (module, result) = run_ok(
        "struct C { let n: Int\nfun get() -> Int { return = n } }\nlet c = C(n := 1)\nlet g = c.get",
    );
    let select = find_select(&module, "get");
    let ty = result.types.get(select).expect("select typed");
    assert!(matches!(ty.ty, Ty::Fun(_)), "got {ty}");
}

#[test]
fn method_call_through_owner() {
    let (_, result) = run_ok(
        "struct C { let n: Int\nfun get() -> Int { return = n } }\nlet c = C(n := 1)\nlet v = c.get()",
    );
    assert_eq!(type_of_decl(&result, "v"), QualTy::cst(Ty::int()));
}

// ── Casts ───────────────────────────────────────────────────────────────

#[test]
fn cast_takes_the_written_type() {
    let (_, result) = run_ok("let x = 1\nlet y = x as @cst Float");
    assert_eq!(type_of_decl(&result, "y"), QualTy::cst(Ty::float()));
}

// ── Qualifier defaulting ────────────────────────────────────────────────

#[test]
fn unannotated_storage_prefers_cst() {
    let (_, result) = run_ok("let x: Int = 1");
    assert_eq!(type_of_decl(&result, "x").quals, QualSet::CST);
}

#[test]
fn move_forces_mut_on_literal_union() {
    // the literal's union shrinks to its @mut member; storage stays legal
    run_ok("var x: @mut Int <- 3");
}

// ── Error recovery ──────────────────────────────────────────────────────

#[test]
fn undefined_symbol_does_not_cascade() {
    let (_, result) = run("let x = missing");
    let errors: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.severity == aven_common::Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].code, "E0301");
}

#[test]
fn duplicate_decl_reported_once() {
    let (_, result) = run("let x = 1\nlet x = 2");
    assert!(result.issues.iter().any(|i| i.code == "E0201"));
}
