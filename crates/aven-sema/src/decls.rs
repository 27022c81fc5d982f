//! Declaration contexts and the declaration table.
//!
//! The lexical structure of a module is an id-linked tree of
//! [`DeclCtx`] values rooted at the module context. Parent links are plain
//! ids, so the tree is trivially acyclic and nothing owns anything twice.
//! Named declarations live in a flat table and are *attached* to at most
//! one context; a rejected duplicate keeps its entry but never gets a
//! context, which is how later passes recognise it as invalid.

use aven_common::Span;
use aven_parser::ast::{FunKind, NodeId};
use rustc_hash::FxHashMap;

/// Identity of a declaration in the [`DeclTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Identity of a declaration context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclCtxId(pub u32);

/// What kind of entity a declaration introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `let` / `var`, including nominal-type stored properties.
    Prop { mutable: bool },
    Param,
    GenericParam,
    Fun { kind: FunKind },
    Struct,
    Union,
    Interface,
    UnionCase,
}

impl DeclKind {
    /// Function names are overloadable within a context; nothing else is.
    pub fn overloadable(self) -> bool {
        matches!(self, DeclKind::Fun { .. })
    }

    /// Whether this declaration names a type.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            DeclKind::Struct | DeclKind::Union | DeclKind::Interface | DeclKind::GenericParam
        )
    }
}

/// One named declaration.
#[derive(Debug)]
pub struct DeclInfo {
    pub id: DeclId,
    /// AST node that declared it.
    pub node: NodeId,
    pub name: String,
    pub kind: DeclKind,
    /// Span of the declared name, for diagnostics.
    pub span: Span,
    /// Context the declaration is attached to. `None` for declarations
    /// rejected as duplicates or unnamed.
    pub ctx: Option<DeclCtxId>,
    /// Context this declaration opens (functions and nominal types).
    pub opens: Option<DeclCtxId>,
}

/// What opened a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxKind {
    Module,
    Function(DeclId),
    Nominal(DeclId),
    /// An `extension` block; carries its AST node.
    Extension(NodeId),
    /// A brace statement; carries its AST node.
    Block(NodeId),
}

/// One lexical scope.
#[derive(Debug)]
pub struct DeclCtx {
    pub id: DeclCtxId,
    pub parent: Option<DeclCtxId>,
    pub kind: CtxKind,
    /// Attached declarations in declaration order.
    pub decls: Vec<DeclId>,
}

/// The module's declarations and contexts, built by the parse finalizer
/// and read by every later pass.
#[derive(Debug)]
pub struct DeclTable {
    decls: Vec<DeclInfo>,
    ctxs: Vec<DeclCtx>,
    /// AST declaration node -> declaration id.
    by_node: FxHashMap<NodeId, DeclId>,
    /// Scope-opening AST node (block, extension) -> its context.
    ctx_by_node: FxHashMap<NodeId, DeclCtxId>,
}

impl DeclTable {
    /// Create a table holding just the module root context.
    pub fn new() -> Self {
        Self {
            decls: Vec::new(),
            ctxs: vec![DeclCtx {
                id: DeclCtxId(0),
                parent: None,
                kind: CtxKind::Module,
                decls: Vec::new(),
            }],
            by_node: FxHashMap::default(),
            ctx_by_node: FxHashMap::default(),
        }
    }

    pub fn module_ctx(&self) -> DeclCtxId {
        DeclCtxId(0)
    }

    /// Open a child context.
    pub fn new_ctx(&mut self, parent: DeclCtxId, kind: CtxKind) -> DeclCtxId {
        let id = DeclCtxId(self.ctxs.len() as u32);
        if let CtxKind::Block(node) | CtxKind::Extension(node) = kind {
            self.ctx_by_node.insert(node, id);
        }
        self.ctxs.push(DeclCtx {
            id,
            parent: Some(parent),
            kind,
            decls: Vec::new(),
        });
        id
    }

    /// Context opened by a block or extension AST node.
    pub fn ctx_of_node(&self, node: NodeId) -> Option<DeclCtxId> {
        self.ctx_by_node.get(&node).copied()
    }

    /// Record a declaration without attaching it to any context.
    pub fn new_decl(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        kind: DeclKind,
        span: Span,
    ) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(DeclInfo {
            id,
            node,
            name: name.into(),
            kind,
            span,
            ctx: None,
            opens: None,
        });
        self.by_node.insert(node, id);
        id
    }

    /// Attach a declaration to a context, making it findable by name.
    pub fn attach(&mut self, decl: DeclId, ctx: DeclCtxId) {
        debug_assert!(self.decls[decl.0 as usize].ctx.is_none());
        self.decls[decl.0 as usize].ctx = Some(ctx);
        self.ctxs[ctx.0 as usize].decls.push(decl);
    }

    pub fn set_opens(&mut self, decl: DeclId, ctx: DeclCtxId) {
        self.decls[decl.0 as usize].opens = Some(ctx);
    }

    pub fn decl(&self, id: DeclId) -> &DeclInfo {
        &self.decls[id.0 as usize]
    }

    pub fn ctx(&self, id: DeclCtxId) -> &DeclCtx {
        &self.ctxs[id.0 as usize]
    }

    pub fn decl_of_node(&self, node: NodeId) -> Option<DeclId> {
        self.by_node.get(&node).copied()
    }

    pub fn decls(&self) -> impl Iterator<Item = &DeclInfo> {
        self.decls.iter()
    }

    /// Declarations attached to `ctx` with the given name, in order.
    pub fn named_in(&self, ctx: DeclCtxId, name: &str) -> Vec<DeclId> {
        self.ctx(ctx)
            .decls
            .iter()
            .copied()
            .filter(|&d| self.decl(d).name == name)
            .collect()
    }

    /// Walk outward from `ctx` to the module root, inclusive.
    pub fn ancestors(&self, ctx: DeclCtxId) -> Vec<DeclCtxId> {
        let mut chain = vec![ctx];
        let mut cursor = ctx;
        while let Some(parent) = self.ctx(cursor).parent {
            chain.push(parent);
            cursor = parent;
        }
        chain
    }

    /// The innermost enclosing function context of `ctx`, if any,
    /// including `ctx` itself.
    pub fn enclosing_function(&self, ctx: DeclCtxId) -> Option<DeclId> {
        self.ancestors(ctx).into_iter().find_map(|c| match self.ctx(c).kind {
            CtxKind::Function(decl) => Some(decl),
            _ => None,
        })
    }

    /// The innermost enclosing nominal-type context of `ctx`, if any.
    pub fn enclosing_nominal(&self, ctx: DeclCtxId) -> Option<DeclId> {
        self.ancestors(ctx).into_iter().find_map(|c| match self.ctx(c).kind {
            CtxKind::Nominal(decl) => Some(decl),
            _ => None,
        })
    }
}

impl Default for DeclTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(0, 1)
    }

    #[test]
    fn module_root_exists() {
        let table = DeclTable::new();
        let root = table.module_ctx();
        assert_eq!(table.ctx(root).kind, CtxKind::Module);
        assert!(table.ctx(root).parent.is_none());
    }

    #[test]
    fn attach_makes_decl_findable() {
        let mut table = DeclTable::new();
        let root = table.module_ctx();
        let decl = table.new_decl(NodeId(0), "x", DeclKind::Prop { mutable: false }, span());
        assert!(table.named_in(root, "x").is_empty());
        table.attach(decl, root);
        assert_eq!(table.named_in(root, "x"), vec![decl]);
        assert_eq!(table.decl(decl).ctx, Some(root));
    }

    #[test]
    fn unattached_decl_has_no_context() {
        let mut table = DeclTable::new();
        let decl = table.new_decl(NodeId(1), "dup", DeclKind::Prop { mutable: false }, span());
        assert_eq!(table.decl(decl).ctx, None);
    }

    #[test]
    fn ancestors_walk_to_root() {
        let mut table = DeclTable::new();
        let root = table.module_ctx();
        let f = table.new_decl(NodeId(0), "f", DeclKind::Fun { kind: FunKind::Regular }, span());
        let fun_ctx = table.new_ctx(root, CtxKind::Function(f));
        let block_ctx = table.new_ctx(fun_ctx, CtxKind::Block(NodeId(1)));
        assert_eq!(table.ancestors(block_ctx), vec![block_ctx, fun_ctx, root]);
        assert_eq!(table.enclosing_function(block_ctx), Some(f));
        assert_eq!(table.enclosing_function(root), None);
    }

    #[test]
    fn overloadability() {
        assert!(DeclKind::Fun { kind: FunKind::Regular }.overloadable());
        assert!(!DeclKind::Prop { mutable: true }.overloadable());
        assert!(DeclKind::Struct.is_type());
    }
}
