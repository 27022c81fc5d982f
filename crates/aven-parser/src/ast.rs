//! The Aven abstract syntax tree.
//!
//! A plain owned tree. Nodes fall into four kinds -- declarations,
//! statements, expressions, and type signatures -- and every node carries a
//! [`Span`] plus a module-unique [`NodeId`]. Inferred types do not live on
//! the nodes themselves; the semantic passes keep them in a side table keyed
//! by `NodeId`, so the tree stays immutable after parsing.

use std::fmt;

use aven_common::Span;

/// Identity of one AST node within its module.
///
/// Ids are dense and allocated in parse order, which makes them usable as
/// map keys for the pass-side tables (types, resolutions, captures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// ── Module ────────────────────────────────────────────────────────────

/// One source file worth of program.
///
/// The module is the root of the declaration-context tree; its top-level
/// statements become the body of the synthesized `main` function during
/// AIR emission.
#[derive(Debug)]
pub struct Module {
    /// Module name, derived from the file stem.
    pub name: String,
    pub stmts: Vec<Stmt>,
    /// Number of `NodeId`s allocated while parsing this module.
    pub node_count: u32,
}

// ── Statements ────────────────────────────────────────────────────────

/// A statement. Declarations appear in statement position, so they are a
/// statement kind here.
#[derive(Debug)]
pub enum Stmt {
    Decl(Decl),
    Brace(Block),
    If(IfStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Binding(BindingStmt),
    Expr(Expr),
    /// Placeholder emitted during error recovery.
    Invalid { id: NodeId, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl(d) => d.span(),
            Stmt::Brace(b) => b.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Binding(s) => s.span,
            Stmt::Expr(e) => e.span(),
            Stmt::Invalid { span, .. } => *span,
        }
    }
}

/// A brace-delimited statement list. Opens a lexical scope.
#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub struct IfStmt {
    pub id: NodeId,
    pub span: Span,
    pub cond: Expr,
    pub then_block: Block,
    /// `else` branch: either another `If` (else-if chain) or a `Brace`.
    pub else_branch: Option<Box<Stmt>>,
}

#[derive(Debug)]
pub struct WhileStmt {
    pub id: NodeId,
    pub span: Span,
    pub cond: Expr,
    pub body: Block,
}

/// `return` with an optional binding to the enclosing function's return
/// storage: `return <- x`, `return := x`, or the `return = x` sugar.
#[derive(Debug)]
pub struct ReturnStmt {
    pub id: NodeId,
    pub span: Span,
    pub binding: Option<(BindOp, Expr)>,
}

/// A binding statement `lvalue ⊕ rvalue` where `⊕` is one of the three
/// binding operators.
#[derive(Debug)]
pub struct BindingStmt {
    pub id: NodeId,
    pub span: Span,
    pub op: BindOp,
    pub op_span: Span,
    pub lvalue: Expr,
    pub rvalue: Expr,
}

/// The three binding operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOp {
    /// `:=` -- value copy.
    Copy,
    /// `&-` -- aliasing.
    Alias,
    /// `<-` -- ownership move.
    Move,
}

impl fmt::Display for BindOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindOp::Copy => write!(f, ":="),
            BindOp::Alias => write!(f, "&-"),
            BindOp::Move => write!(f, "<-"),
        }
    }
}

// ── Declarations ──────────────────────────────────────────────────────

/// A declaration node.
#[derive(Debug)]
pub enum Decl {
    Prop(PropDecl),
    Fun(FunDecl),
    Struct(StructDecl),
    Union(UnionDecl),
    Interface(InterfaceDecl),
    Extension(ExtensionDecl),
    UnionCase(UnionCaseDecl),
}

impl Decl {
    pub fn id(&self) -> NodeId {
        match self {
            Decl::Prop(d) => d.id,
            Decl::Fun(d) => d.id,
            Decl::Struct(d) => d.id,
            Decl::Union(d) => d.id,
            Decl::Interface(d) => d.id,
            Decl::Extension(d) => d.id,
            Decl::UnionCase(d) => d.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Prop(d) => d.span,
            Decl::Fun(d) => d.span,
            Decl::Struct(d) => d.span,
            Decl::Union(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::Extension(d) => d.span,
            Decl::UnionCase(d) => d.span,
        }
    }

    /// Declared name, if the declaration introduces one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Prop(d) => Some(&d.name),
            Decl::Fun(d) => Some(&d.name),
            Decl::Struct(d) => Some(&d.name),
            Decl::Union(d) => Some(&d.name),
            Decl::Interface(d) => Some(&d.name),
            Decl::Extension(_) | Decl::UnionCase(_) => None,
        }
    }
}

/// An `@name(arg, ...)` attribute attached to a declaration.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub span: Span,
    /// Attribute name without the `@`, e.g. `air_name`.
    pub name: String,
    pub args: Vec<String>,
}

/// Declaration modifiers restricted to members of nominal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Static,
    Mutating,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Static => write!(f, "static"),
            Modifier::Mutating => write!(f, "mutating"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModifierNode {
    pub span: Span,
    pub kind: Modifier,
}

/// A `let` or `var` property declaration.
#[derive(Debug)]
pub struct PropDecl {
    pub id: NodeId,
    pub span: Span,
    pub attrs: Vec<Attribute>,
    pub modifiers: Vec<ModifierNode>,
    /// `var` is reassignable; `let` is not.
    pub mutable: bool,
    pub name: String,
    pub name_span: Span,
    pub sign: Option<Sign>,
    pub initializer: Option<(BindOp, Expr)>,
}

/// What flavor of callable a `FunDecl` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunKind {
    /// A free function. Retagged to `Method` by the parse finalizer when
    /// the declaration sits inside a nominal type or extension.
    Regular,
    Method,
    /// `new(...)` inside a nominal type.
    Constructor,
    /// `del()` inside a nominal type.
    Destructor,
}

#[derive(Debug)]
pub struct FunDecl {
    pub id: NodeId,
    pub span: Span,
    pub attrs: Vec<Attribute>,
    pub modifiers: Vec<ModifierNode>,
    pub kind: FunKind,
    pub name: String,
    pub name_span: Span,
    pub generic_params: Vec<GenericParamDecl>,
    pub params: Vec<ParamDecl>,
    pub codomain: Option<Sign>,
    /// Interface methods have no body.
    pub body: Option<Block>,
}

/// A `<T>` generic placeholder declaration.
#[derive(Debug)]
pub struct GenericParamDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
}

/// A function parameter `label name: Sign`. A label of `_` means the
/// argument is passed positionally; a single identifier doubles as both
/// label and name.
#[derive(Debug)]
pub struct ParamDecl {
    pub id: NodeId,
    pub span: Span,
    pub label: Option<String>,
    pub name: String,
    pub name_span: Span,
    pub sign: Option<Sign>,
}

#[derive(Debug)]
pub struct StructDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub name_span: Span,
    pub generic_params: Vec<GenericParamDecl>,
    pub body: Block,
}

#[derive(Debug)]
pub struct UnionDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub name_span: Span,
    pub generic_params: Vec<GenericParamDecl>,
    pub body: Block,
}

#[derive(Debug)]
pub struct InterfaceDecl {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub name_span: Span,
    pub generic_params: Vec<GenericParamDecl>,
    pub body: Block,
}

/// `extension Name { ... }`. Only legal at module top level.
#[derive(Debug)]
pub struct ExtensionDecl {
    pub id: NodeId,
    pub span: Span,
    pub subject: String,
    pub subject_span: Span,
    pub body: Block,
}

/// `case Sign` inside a union body.
#[derive(Debug)]
pub struct UnionCaseDecl {
    pub id: NodeId,
    pub span: Span,
    pub sign: Sign,
}

// ── Expressions ───────────────────────────────────────────────────────

/// An expression node. Every kind has an inferred type once the semantic
/// passes have run (looked up by `NodeId` in the sema result).
#[derive(Debug)]
pub enum Expr {
    BoolLit { id: NodeId, span: Span, value: bool },
    IntLit { id: NodeId, span: Span, value: i64 },
    FloatLit { id: NodeId, span: Span, value: f64 },
    StrLit { id: NodeId, span: Span, value: String },
    NullRef { id: NodeId, span: Span },
    Ident(IdentExpr),
    Select(SelectExpr),
    Call(CallExpr),
    Subscript(SubscriptExpr),
    Infix(InfixExpr),
    Prefix(PrefixExpr),
    Cast(CastExpr),
    Lambda(LambdaExpr),
    ArrayLit { id: NodeId, span: Span, elements: Vec<Expr> },
    SetLit { id: NodeId, span: Span, elements: Vec<Expr> },
    MapLit { id: NodeId, span: Span, entries: Vec<(Expr, Expr)> },
    /// A parenthesized expression.
    Enclosed { id: NodeId, span: Span, inner: Box<Expr> },
    /// Placeholder emitted during error recovery.
    Invalid { id: NodeId, span: Span },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::BoolLit { id, .. }
            | Expr::IntLit { id, .. }
            | Expr::FloatLit { id, .. }
            | Expr::StrLit { id, .. }
            | Expr::NullRef { id, .. }
            | Expr::ArrayLit { id, .. }
            | Expr::SetLit { id, .. }
            | Expr::MapLit { id, .. }
            | Expr::Enclosed { id, .. }
            | Expr::Invalid { id, .. } => *id,
            Expr::Ident(e) => e.id,
            Expr::Select(e) => e.id,
            Expr::Call(e) => e.id,
            Expr::Subscript(e) => e.id,
            Expr::Infix(e) => e.id,
            Expr::Prefix(e) => e.id,
            Expr::Cast(e) => e.id,
            Expr::Lambda(e) => e.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::BoolLit { span, .. }
            | Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::NullRef { span, .. }
            | Expr::ArrayLit { span, .. }
            | Expr::SetLit { span, .. }
            | Expr::MapLit { span, .. }
            | Expr::Enclosed { span, .. }
            | Expr::Invalid { span, .. } => *span,
            Expr::Ident(e) => e.span,
            Expr::Select(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Subscript(e) => e.span,
            Expr::Infix(e) => e.span,
            Expr::Prefix(e) => e.span,
            Expr::Cast(e) => e.span,
            Expr::Lambda(e) => e.span,
        }
    }
}

#[derive(Debug)]
pub struct IdentExpr {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
}

/// `owner.member` or `Owner::Member`. The owner is resolved by the name
/// binder; the member is left for type inference, since which declaration
/// it names depends on the owner's inferred type.
#[derive(Debug)]
pub struct SelectExpr {
    pub id: NodeId,
    pub span: Span,
    pub owner: Box<Expr>,
    pub member: String,
    pub member_span: Span,
}

#[derive(Debug)]
pub struct CallExpr {
    pub id: NodeId,
    pub span: Span,
    pub callee: Box<Expr>,
    pub args: Vec<CallArg>,
}

/// One call or subscript argument, with its passing policy:
/// `x`, `label := x`, `label &- x`, or `label <- x`.
#[derive(Debug)]
pub struct CallArg {
    pub id: NodeId,
    pub span: Span,
    pub label: Option<String>,
    pub op: BindOp,
    pub value: Expr,
}

#[derive(Debug)]
pub struct SubscriptExpr {
    pub id: NodeId,
    pub span: Span,
    pub callee: Box<Expr>,
    pub args: Vec<CallArg>,
}

/// Infix operators, one variant per precedence-class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Or,
    And,
    Eq,
    Ne,
    RefEq,
    RefNe,
    Is,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl InfixOp {
    /// Name of the operator function this infix form dispatches to.
    pub fn fun_name(self) -> &'static str {
        match self {
            InfixOp::Or => "or",
            InfixOp::And => "and",
            InfixOp::Eq => "==",
            InfixOp::Ne => "!=",
            InfixOp::RefEq => "===",
            InfixOp::RefNe => "!==",
            InfixOp::Is => "is",
            InfixOp::Lt => "<",
            InfixOp::Le => "<=",
            InfixOp::Gt => ">",
            InfixOp::Ge => ">=",
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
        }
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fun_name())
    }
}

#[derive(Debug)]
pub struct InfixExpr {
    pub id: NodeId,
    pub span: Span,
    pub op: InfixOp,
    pub op_span: Span,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Plus,
    Minus,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Not => write!(f, "not"),
            PrefixOp::Plus => write!(f, "+"),
            PrefixOp::Minus => write!(f, "-"),
        }
    }
}

#[derive(Debug)]
pub struct PrefixExpr {
    pub id: NodeId,
    pub span: Span,
    pub op: PrefixOp,
    pub operand: Box<Expr>,
}

/// The three cast forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `as` -- static cast.
    Static,
    /// `as!` -- forced cast.
    Forced,
    /// `as?` -- conditional cast.
    Conditional,
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastKind::Static => write!(f, "as"),
            CastKind::Forced => write!(f, "as!"),
            CastKind::Conditional => write!(f, "as?"),
        }
    }
}

#[derive(Debug)]
pub struct CastExpr {
    pub id: NodeId,
    pub span: Span,
    pub kind: CastKind,
    pub operand: Box<Expr>,
    pub sign: Sign,
}

/// An anonymous function in expression position.
#[derive(Debug)]
pub struct LambdaExpr {
    pub id: NodeId,
    pub span: Span,
    pub fun: Box<FunDecl>,
}

// ── Type signatures ───────────────────────────────────────────────────

/// A written type signature.
#[derive(Debug)]
pub enum Sign {
    Ident(IdentSign),
    Nested(NestedSign),
    ImplicitNested(ImplicitNestedSign),
    Fun(FunSign),
    Qualified(QualifiedSign),
    /// Placeholder emitted during error recovery.
    Invalid { id: NodeId, span: Span },
}

impl Sign {
    pub fn id(&self) -> NodeId {
        match self {
            Sign::Ident(s) => s.id,
            Sign::Nested(s) => s.id,
            Sign::ImplicitNested(s) => s.id,
            Sign::Fun(s) => s.id,
            Sign::Qualified(s) => s.id,
            Sign::Invalid { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Sign::Ident(s) => s.span,
            Sign::Nested(s) => s.span,
            Sign::ImplicitNested(s) => s.span,
            Sign::Fun(s) => s.span,
            Sign::Qualified(s) => s.span,
            Sign::Invalid { span, .. } => *span,
        }
    }
}

/// `Name` or `Name<Args>`. `Self` parses to the name `Self`.
#[derive(Debug)]
pub struct IdentSign {
    pub id: NodeId,
    pub span: Span,
    pub name: String,
    pub args: Vec<Sign>,
}

/// `Owner::Member`.
#[derive(Debug)]
pub struct NestedSign {
    pub id: NodeId,
    pub span: Span,
    pub owner: Box<Sign>,
    pub member: String,
    pub member_span: Span,
}

/// `::Member` -- the owner is implied by the enclosing nominal type.
#[derive(Debug)]
pub struct ImplicitNestedSign {
    pub id: NodeId,
    pub span: Span,
    pub member: String,
}

/// `(label: Sign, ...) -> Sign`.
#[derive(Debug)]
pub struct FunSign {
    pub id: NodeId,
    pub span: Span,
    pub params: Vec<SignParam>,
    pub codomain: Box<Sign>,
}

#[derive(Debug)]
pub struct SignParam {
    pub span: Span,
    pub label: Option<String>,
    pub sign: Sign,
}

/// The written aliasing qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qual {
    Cst,
    Mut,
}

impl fmt::Display for Qual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qual::Cst => write!(f, "@cst"),
            Qual::Mut => write!(f, "@mut"),
        }
    }
}

/// `@cst Sign` / `@mut Sign` (several qualifiers may be stacked).
#[derive(Debug)]
pub struct QualifiedSign {
    pub id: NodeId,
    pub span: Span,
    pub quals: Vec<(Qual, Span)>,
    pub inner: Box<Sign>,
}
