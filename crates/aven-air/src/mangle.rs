//! Stable symbol names.
//!
//! Every function's AIR identity is derived from its declaring scope
//! (parent names joined with `_`, anonymous scopes contributing a bare
//! `_`), its own name, and a compact encoding of its type. Bound generics
//! append `_<placeholder>_<code>` per binding in lexicographic placeholder
//! order, so two specializations differ exactly in their binding
//! suffixes. The `@air_name` attribute overrides all of it.

use aven_sema::decls::{CtxKind, DeclCtxId, DeclId, DeclTable};
use aven_sema::ty::{BuiltinTy, QualTy, Ty};

/// Mangle a function declaration at a given type (the declaration's own
/// type, or a `BoundGeneric` over it for a specialization).
pub fn mangle_function(
    table: &DeclTable,
    module_name: &str,
    decl: DeclId,
    ty: &Ty,
    air_name: Option<&str>,
) -> String {
    if let Some(name) = air_name {
        return name.to_string();
    }
    let info = table.decl(decl);
    let scope = scope_path(table, module_name, info.ctx.or_else(|| parent_of_opens(table, decl)));
    let name = if info.name.is_empty() { "_" } else { &info.name };
    format!("{scope}_{name}_{}", mangle_ty(ty))
}

/// For unattached declarations (lambdas), the scope is read off the
/// context the declaration opens.
fn parent_of_opens(table: &DeclTable, decl: DeclId) -> Option<DeclCtxId> {
    table.decl(decl).opens.and_then(|ctx| table.ctx(ctx).parent)
}

/// The `_`-joined path of scope names from the module root down to (and
/// including) `ctx`.
fn scope_path(table: &DeclTable, module_name: &str, ctx: Option<DeclCtxId>) -> String {
    let mut names = vec![module_name.to_string()];
    if let Some(ctx) = ctx {
        let mut chain = table.ancestors(ctx);
        chain.reverse(); // outermost first
        for scope in chain {
            match table.ctx(scope).kind {
                CtxKind::Module => {}
                CtxKind::Function(decl) | CtxKind::Nominal(decl) => {
                    let name = &table.decl(decl).name;
                    names.push(if name.is_empty() {
                        "_".to_string()
                    } else {
                        name.clone()
                    });
                }
                CtxKind::Extension(_) | CtxKind::Block(_) => names.push("_".to_string()),
            }
        }
    }
    names.join("_")
}

/// Encode a type: `a`/`n` for the tops, one letter per built-in scalar,
/// `N` + name for nominals, `F` + labeled params + `2` + codomain for
/// functions, placeholder names verbatim, `M` + inner for metatypes, and
/// `_<name>_<code>` suffixes for bound generics.
pub fn mangle_ty(ty: &Ty) -> String {
    match ty {
        Ty::Anything => "a".to_string(),
        Ty::Nothing => "n".to_string(),
        Ty::Builtin(BuiltinTy::Bool) => "b".to_string(),
        Ty::Builtin(BuiltinTy::Int) => "i".to_string(),
        Ty::Builtin(BuiltinTy::Float) => "f".to_string(),
        Ty::Builtin(BuiltinTy::String) => "s".to_string(),
        Ty::Placeholder(name) => name.clone(),
        Ty::Nominal(n) => format!("N{}", n.name),
        Ty::Fun(fun) => {
            let mut code = "F".to_string();
            for param in &fun.params {
                if let Some(label) = &param.label {
                    code.push_str(label);
                }
                code.push_str(&mangle_qual(&param.ty));
            }
            code.push('2');
            code.push_str(&mangle_qual(&fun.codomain));
            code
        }
        Ty::Meta(inner) => format!("M{}", mangle_ty(inner)),
        Ty::BoundGeneric { base, bindings } => {
            let mut code = mangle_ty(base);
            // bindings are stored sorted by placeholder name
            for (name, bound) in bindings {
                code.push('_');
                code.push_str(name);
                code.push('_');
                code.push_str(&mangle_qual(bound));
            }
            code
        }
        // unresolved leftovers only appear behind reported errors
        Ty::Var(_) | Ty::Union(_) => "a".to_string(),
    }
}

fn mangle_qual(qt: &QualTy) -> String {
    mangle_ty(&qt.ty)
}

/// Readable specialized name of a nominal AIR type, e.g. `Pair_Int_Bool`.
pub fn air_nominal_name(base: &str, bindings: &[(String, QualTy)]) -> String {
    let mut name = base.to_string();
    for (_, bound) in bindings {
        name.push('_');
        name.push_str(&type_name_segment(&bound.ty));
    }
    name
}

fn type_name_segment(ty: &Ty) -> String {
    match ty {
        Ty::Builtin(b) => b.name().to_string(),
        Ty::Nominal(n) => n.name.clone(),
        Ty::BoundGeneric { base, bindings } => match base.as_ref() {
            Ty::Nominal(n) => air_nominal_name(&n.name, bindings),
            _ => "Anything".to_string(),
        },
        Ty::Anything => "Anything".to_string(),
        Ty::Nothing => "Nothing".to_string(),
        Ty::Placeholder(name) => name.clone(),
        _ => "Anything".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aven_sema::ty::{FunTy, FunTyParam};

    #[test]
    fn scalar_codes() {
        assert_eq!(mangle_ty(&Ty::Anything), "a");
        assert_eq!(mangle_ty(&Ty::Nothing), "n");
        assert_eq!(mangle_ty(&Ty::bool()), "b");
        assert_eq!(mangle_ty(&Ty::int()), "i");
        assert_eq!(mangle_ty(&Ty::float()), "f");
        assert_eq!(mangle_ty(&Ty::string()), "s");
    }

    #[test]
    fn function_code_keeps_labels() {
        let fun = Ty::Fun(FunTy {
            placeholders: Vec::new(),
            params: vec![
                FunTyParam {
                    label: Some("fst".to_string()),
                    ty: QualTy::cst(Ty::int()),
                },
                FunTyParam {
                    label: None,
                    ty: QualTy::cst(Ty::bool()),
                },
            ],
            codomain: Box::new(QualTy::cst(Ty::Nothing)),
        });
        assert_eq!(mangle_ty(&fun), "Ffstib2n");
    }

    #[test]
    fn generic_code_uses_placeholder_names() {
        let fun = Ty::Fun(FunTy {
            placeholders: vec!["T".to_string()],
            params: vec![FunTyParam {
                label: None,
                ty: QualTy::bare(Ty::Placeholder("T".to_string())),
            }],
            codomain: Box::new(QualTy::bare(Ty::Placeholder("T".to_string()))),
        });
        assert_eq!(mangle_ty(&fun), "FT2T");
    }

    #[test]
    fn specializations_differ_in_binding_suffix_only() {
        let generic = Ty::Fun(FunTy {
            placeholders: vec!["T".to_string()],
            params: vec![FunTyParam {
                label: None,
                ty: QualTy::bare(Ty::Placeholder("T".to_string())),
            }],
            codomain: Box::new(QualTy::bare(Ty::Placeholder("T".to_string()))),
        });
        let with_int = Ty::BoundGeneric {
            base: Box::new(generic.clone()),
            bindings: vec![("T".to_string(), QualTy::cst(Ty::int()))],
        };
        let with_string = Ty::BoundGeneric {
            base: Box::new(generic),
            bindings: vec![("T".to_string(), QualTy::cst(Ty::string()))],
        };
        let int_code = mangle_ty(&with_int);
        let string_code = mangle_ty(&with_string);
        assert!(int_code.ends_with("_T_i"), "{int_code}");
        assert!(string_code.ends_with("_T_s"), "{string_code}");
        assert_eq!(
            int_code.trim_end_matches("_T_i"),
            string_code.trim_end_matches("_T_s")
        );
    }

    #[test]
    fn nominal_air_names_append_binding_types() {
        let bindings = vec![
            ("A".to_string(), QualTy::cst(Ty::int())),
            ("B".to_string(), QualTy::cst(Ty::bool())),
        ];
        assert_eq!(air_nominal_name("Pair", &bindings), "Pair_Int_Bool");
    }
}
