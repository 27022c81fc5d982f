//! Parser integration tests: AST shapes, precedence, recovery, round-trips.

use aven_parser::ast::*;
use aven_parser::{parse, unparse};

fn parse_ok(source: &str) -> Module {
    let result = parse(source, "test");
    assert!(
        !result.issues.has_errors(),
        "unexpected parse errors for {source:?}: {:?}",
        result.issues.iter().collect::<Vec<_>>()
    );
    result.module
}

/// Parse, unparse, re-parse, unparse again; the renderings must agree.
fn assert_round_trip(source: &str) {
    let first = unparse(&parse_ok(source));
    let second = unparse(&parse_ok(&first));
    assert_eq!(first, second, "unparse is not a fixpoint for {source:?}");
}

// ── Declarations ────────────────────────────────────────────────────────

#[test]
fn let_with_initializer() {
    let module = parse_ok("let x = 42");
    assert_eq!(module.stmts.len(), 1);
    let Stmt::Decl(Decl::Prop(prop)) = &module.stmts[0] else {
        panic!("expected a property declaration");
    };
    assert_eq!(prop.name, "x");
    assert!(!prop.mutable);
    let Some((BindOp::Copy, Expr::IntLit { value: 42, .. })) = &prop.initializer else {
        panic!("expected a copy initializer of 42");
    };
}

#[test]
fn var_with_sign_and_move_initializer() {
    let module = parse_ok("var x: @mut Int <- 0");
    let Stmt::Decl(Decl::Prop(prop)) = &module.stmts[0] else {
        panic!("expected a property declaration");
    };
    assert!(prop.mutable);
    assert!(matches!(prop.initializer, Some((BindOp::Move, _))));
    let Some(Sign::Qualified(qualified)) = &prop.sign else {
        panic!("expected a qualified signature");
    };
    assert_eq!(qualified.quals.len(), 1);
    assert_eq!(qualified.quals[0].0, Qual::Mut);
}

#[test]
fn fun_with_generics_and_unlabeled_param() {
    let module = parse_ok("fun id<T>(_ v: T) -> T { return = v }");
    let Stmt::Decl(Decl::Fun(fun)) = &module.stmts[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(fun.name, "id");
    assert_eq!(fun.kind, FunKind::Regular);
    assert_eq!(fun.generic_params.len(), 1);
    assert_eq!(fun.generic_params[0].name, "T");
    assert_eq!(fun.params.len(), 1);
    assert_eq!(fun.params[0].label, None);
    assert_eq!(fun.params[0].name, "v");
    let body = fun.body.as_ref().expect("function body");
    let Stmt::Return(ret) = &body.stmts[0] else {
        panic!("expected a return statement");
    };
    assert!(matches!(ret.binding, Some((BindOp::Copy, _))));
}

#[test]
fn struct_with_members() {
    let module = parse_ok("struct Pair<A, B> { let fst: A\nlet snd: B }");
    let Stmt::Decl(Decl::Struct(decl)) = &module.stmts[0] else {
        panic!("expected a struct declaration");
    };
    assert_eq!(decl.name, "Pair");
    assert_eq!(decl.generic_params.len(), 2);
    assert_eq!(decl.body.stmts.len(), 2);
}

#[test]
fn constructor_and_destructor_in_struct() {
    let module = parse_ok("struct S { new(_ v: Int) { }\ndel() { } }");
    let Stmt::Decl(Decl::Struct(decl)) = &module.stmts[0] else {
        panic!("expected a struct declaration");
    };
    let kinds: Vec<_> = decl
        .body
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Decl(Decl::Fun(f)) => f.kind,
            other => panic!("expected function members, found {other:?}"),
        })
        .collect();
    assert_eq!(kinds, [FunKind::Constructor, FunKind::Destructor]);
}

#[test]
fn attribute_on_function() {
    let module = parse_ok("@air_name(entry) fun main() { }");
    let Stmt::Decl(Decl::Fun(fun)) = &module.stmts[0] else {
        panic!("expected a function declaration");
    };
    assert_eq!(fun.attrs.len(), 1);
    assert_eq!(fun.attrs[0].name, "air_name");
    assert_eq!(fun.attrs[0].args, ["entry"]);
}

#[test]
fn static_modifier_on_member() {
    let module = parse_ok("struct S { static fun f() { } }");
    let Stmt::Decl(Decl::Struct(decl)) = &module.stmts[0] else {
        panic!("expected a struct declaration");
    };
    let Stmt::Decl(Decl::Fun(fun)) = &decl.body.stmts[0] else {
        panic!("expected a function member");
    };
    assert_eq!(fun.modifiers.len(), 1);
    assert_eq!(fun.modifiers[0].kind, Modifier::Static);
}

#[test]
fn union_cases() {
    let module = parse_ok("union Either { case Int\ncase Bool }");
    let Stmt::Decl(Decl::Union(decl)) = &module.stmts[0] else {
        panic!("expected a union declaration");
    };
    assert_eq!(decl.body.stmts.len(), 2);
    assert!(decl
        .body
        .stmts
        .iter()
        .all(|s| matches!(s, Stmt::Decl(Decl::UnionCase(_)))));
}

// ── Statements ──────────────────────────────────────────────────────────

#[test]
fn binding_statement_operators() {
    let module = parse_ok("x := 1\ny &- x\nz <- y");
    let ops: Vec<_> = module
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Binding(b) => b.op,
            other => panic!("expected binding statements, found {other:?}"),
        })
        .collect();
    assert_eq!(ops, [BindOp::Copy, BindOp::Alias, BindOp::Move]);
}

#[test]
fn if_else_chain() {
    let module = parse_ok("if a { } else if b { } else { }");
    let Stmt::If(if_stmt) = &module.stmts[0] else {
        panic!("expected an if statement");
    };
    let Some(else_branch) = &if_stmt.else_branch else {
        panic!("expected an else branch");
    };
    let Stmt::If(nested) = else_branch.as_ref() else {
        panic!("expected an else-if chain");
    };
    assert!(nested.else_branch.is_some());
}

#[test]
fn while_statement() {
    let module = parse_ok("while x < 10 { x <- x + 1 }");
    let Stmt::While(while_stmt) = &module.stmts[0] else {
        panic!("expected a while statement");
    };
    assert!(matches!(while_stmt.cond, Expr::Infix(_)));
    assert_eq!(while_stmt.body.stmts.len(), 1);
}

#[test]
fn expression_statement() {
    let module = parse_ok("p.fst");
    let Stmt::Expr(Expr::Select(select)) = &module.stmts[0] else {
        panic!("expected a select expression statement");
    };
    assert_eq!(select.member, "fst");
}

#[test]
fn semicolons_separate_statements() {
    let module = parse_ok("let x: @cst Int = 0; x <- 3");
    assert_eq!(module.stmts.len(), 2);
}

// ── Expressions ─────────────────────────────────────────────────────────

#[test]
fn precedence_mul_over_add() {
    let module = parse_ok("a + b * c");
    let Stmt::Expr(Expr::Infix(add)) = &module.stmts[0] else {
        panic!("expected an infix expression");
    };
    assert_eq!(add.op, InfixOp::Add);
    let Expr::Infix(mul) = add.rhs.as_ref() else {
        panic!("expected `b * c` on the right");
    };
    assert_eq!(mul.op, InfixOp::Mul);
}

#[test]
fn precedence_and_over_or() {
    let module = parse_ok("a or b and c");
    let Stmt::Expr(Expr::Infix(or)) = &module.stmts[0] else {
        panic!("expected an infix expression");
    };
    assert_eq!(or.op, InfixOp::Or);
    let Expr::Infix(and) = or.rhs.as_ref() else {
        panic!("expected `b and c` on the right");
    };
    assert_eq!(and.op, InfixOp::And);
}

#[test]
fn comparison_does_not_chain() {
    let result = parse(" a < b < c", "test");
    assert!(result.issues.has_errors());
}

#[test]
fn cast_binds_tighter_than_addition() {
    let module = parse_ok("a + b as Int");
    let Stmt::Expr(Expr::Infix(add)) = &module.stmts[0] else {
        panic!("expected an infix expression");
    };
    assert!(matches!(add.rhs.as_ref(), Expr::Cast(_)));
}

#[test]
fn reference_equality_parses() {
    let module = parse_ok("a === b");
    let Stmt::Expr(Expr::Infix(infix)) = &module.stmts[0] else {
        panic!("expected an infix expression");
    };
    assert_eq!(infix.op, InfixOp::RefEq);
}

#[test]
fn call_with_labeled_args() {
    let module = parse_ok("Pair(fst := 1, snd := true)");
    let Stmt::Expr(Expr::Call(call)) = &module.stmts[0] else {
        panic!("expected a call expression");
    };
    assert_eq!(call.args.len(), 2);
    assert_eq!(call.args[0].label.as_deref(), Some("fst"));
    assert_eq!(call.args[0].op, BindOp::Copy);
    assert_eq!(call.args[1].label.as_deref(), Some("snd"));
}

#[test]
fn call_with_positional_arg() {
    let module = parse_ok("id(1)");
    let Stmt::Expr(Expr::Call(call)) = &module.stmts[0] else {
        panic!("expected a call expression");
    };
    assert_eq!(call.args.len(), 1);
    assert_eq!(call.args[0].label, None);
    assert_eq!(call.args[0].op, BindOp::Copy);
}

#[test]
fn subscript_expression() {
    let module = parse_ok("xs[0]");
    assert!(matches!(&module.stmts[0], Stmt::Expr(Expr::Subscript(_))));
}

#[test]
fn literals() {
    let module = parse_ok("[1, 2.5, \"s\", true, nullref]");
    let Stmt::Expr(Expr::ArrayLit { elements, .. }) = &module.stmts[0] else {
        panic!("expected an array literal");
    };
    assert_eq!(elements.len(), 5);
    assert!(matches!(elements[1], Expr::FloatLit { .. }));
    assert!(matches!(elements[4], Expr::NullRef { .. }));
}

#[test]
fn map_and_set_literals() {
    let module = parse_ok("let m = {1: true, 2: false}\nlet s = {1, 2, 3}");
    let Stmt::Decl(Decl::Prop(m)) = &module.stmts[0] else {
        panic!("expected a property declaration");
    };
    assert!(matches!(
        m.initializer.as_ref().map(|(_, e)| e),
        Some(Expr::MapLit { .. })
    ));
    let Stmt::Decl(Decl::Prop(s)) = &module.stmts[1] else {
        panic!("expected a property declaration");
    };
    assert!(matches!(
        s.initializer.as_ref().map(|(_, e)| e),
        Some(Expr::SetLit { .. })
    ));
}

#[test]
fn duplicate_map_keys_reported() {
    let result = parse("let m = {1: true, 1: false}", "test");
    assert!(result
        .issues
        .iter()
        .any(|i| i.message.contains("duplicate key")));
}

#[test]
fn lambda_expression() {
    let module = parse_ok("let f = fun (_ x: Int) -> Int { return = x }");
    let Stmt::Decl(Decl::Prop(prop)) = &module.stmts[0] else {
        panic!("expected a property declaration");
    };
    let Some((_, Expr::Lambda(lambda))) = &prop.initializer else {
        panic!("expected a lambda initializer");
    };
    assert!(lambda.fun.name.is_empty());
    assert_eq!(lambda.fun.params.len(), 1);
}

#[test]
fn nested_type_select() {
    let module = parse_ok("Outer::Inner");
    let Stmt::Expr(Expr::Select(select)) = &module.stmts[0] else {
        panic!("expected a select expression");
    };
    assert_eq!(select.member, "Inner");
}

// ── Recovery ────────────────────────────────────────────────────────────

#[test]
fn recovery_continues_after_bad_statement() {
    let result = parse("let $ = 1\nlet y = 2", "test");
    assert!(result.issues.has_errors());
    // the second statement still parses
    assert!(result.module.stmts.iter().any(|s| matches!(
        s,
        Stmt::Decl(Decl::Prop(p)) if p.name == "y"
    )));
}

#[test]
fn unexpected_token_produces_invalid_stmt() {
    let result = parse("let x = ]", "test");
    assert!(result.issues.has_errors());
}

// ── Round-trips ─────────────────────────────────────────────────────────

#[test]
fn round_trip_simple_declarations() {
    assert_round_trip("let x = 42");
    assert_round_trip("var y: @mut Int <- 0");
    assert_round_trip("x <- 3");
}

#[test]
fn round_trip_functions_and_structs() {
    assert_round_trip("fun id<T>(_ v: T) -> T { return := v }");
    assert_round_trip("struct Pair<A, B> { let fst: A\nlet snd: B }");
    assert_round_trip("let p = Pair(fst := 1, snd := true)\np.fst");
}

#[test]
fn round_trip_control_flow() {
    assert_round_trip("if a < b { x := 1 } else { x := 2 }");
    assert_round_trip("while not done { n <- n + 1 }");
}

#[test]
fn round_trip_signatures() {
    assert_round_trip("let f: (x: @cst Int) -> @mut Bool = g");
    assert_round_trip("let n: Outer::Inner = v");
}
