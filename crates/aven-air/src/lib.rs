//! AIR -- the typed linear IR of the Aven compiler.
//!
//! A [`Unit`] owns mangled-name-keyed functions; a [`Function`] owns
//! labeled basic blocks and a monotone register allocator; a [`Block`]
//! owns instructions. Every block ends in exactly one terminator, every
//! function has one `entry` and one `exit` block, and all returns route
//! through `exit`, which performs the single `ret`.

pub mod builder;
pub mod lower;
pub mod mangle;

use std::fmt;

use rustc_hash::FxHashMap;

// ── Types ─────────────────────────────────────────────────────────────

/// Reference qualifiers carried into the IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AirQuals {
    None,
    Cst,
    Mut,
    Both,
}

impl fmt::Display for AirQuals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirQuals::None => Ok(()),
            AirQuals::Cst => write!(f, "@cst "),
            AirQuals::Mut => write!(f, "@mut "),
            AirQuals::Both => write!(f, "@cst @mut "),
        }
    }
}

/// A concrete AIR type. No inference variables or unions remain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AirType {
    pub quals: AirQuals,
    pub kind: AirTypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AirTypeKind {
    Anything,
    Nothing,
    Bool,
    Int,
    Float,
    String,
    /// A nominal type by its specialized, scope-qualified name.
    Nominal(std::string::String),
    Fun {
        params: Vec<AirType>,
        codomain: Box<AirType>,
    },
}

impl AirType {
    pub fn new(quals: AirQuals, kind: AirTypeKind) -> Self {
        Self { quals, kind }
    }

    pub fn nothing() -> Self {
        Self::new(AirQuals::None, AirTypeKind::Nothing)
    }

    pub fn anything() -> Self {
        Self::new(AirQuals::Cst, AirTypeKind::Anything)
    }

    pub fn is_nothing(&self) -> bool {
        self.kind == AirTypeKind::Nothing
    }
}

impl fmt::Display for AirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.quals, self.kind)
    }
}

impl fmt::Display for AirTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirTypeKind::Anything => write!(f, "Anything"),
            AirTypeKind::Nothing => write!(f, "Nothing"),
            AirTypeKind::Bool => write!(f, "Bool"),
            AirTypeKind::Int => write!(f, "Int"),
            AirTypeKind::Float => write!(f, "Float"),
            AirTypeKind::String => write!(f, "String"),
            AirTypeKind::Nominal(name) => write!(f, "{name}"),
            AirTypeKind::Fun { params, codomain } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {codomain}")
            }
        }
    }
}

// ── Values ────────────────────────────────────────────────────────────

/// A virtual register, local to one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegId(pub u32);

impl fmt::Display for RegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// An operand: a register, a literal, a function reference, or the null
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Reg(RegId),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(std::string::String),
    /// A reference to a function by mangled name.
    Fun(std::string::String),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Reg(reg) => write!(f, "{reg}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Fun(name) => write!(f, "@{name}"),
            Value::Null => write!(f, "nullref"),
        }
    }
}

// ── Instructions ──────────────────────────────────────────────────────

/// One AIR instruction. Value-producing instructions carry a destination
/// register; `branch`, `jump`, and `ret` are terminators.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Alloc { dst: RegId, ty: AirType },
    MakeRef { dst: RegId, ty: AirType },
    Extract { dst: RegId, src: Value, index: usize, ty: AirType },
    UnsafeCast { dst: RegId, value: Value, ty: AirType },
    RefEq { dst: RegId, lhs: Value, rhs: Value },
    RefNe { dst: RegId, lhs: Value, rhs: Value },
    Apply { dst: RegId, callee: Value, args: Vec<Value>, ty: AirType },
    PartialApply { dst: RegId, callee: Value, args: Vec<Value>, ty: AirType },
    Copy { src: Value, dst: Value },
    Move { src: Value, dst: Value },
    Bind { src: Value, dst: Value },
    Drop { value: Value },
    Branch { cond: Value, then_label: std::string::String, else_label: std::string::String },
    Jump { label: std::string::String },
    Ret { value: Option<Value> },
}

impl Inst {
    /// Whether this instruction ends a block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Branch { .. } | Inst::Jump { .. } | Inst::Ret { .. })
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Alloc { dst, ty } => write!(f, "{dst} = alloc {ty}"),
            Inst::MakeRef { dst, ty } => write!(f, "{dst} = make_ref {ty}"),
            Inst::Extract { dst, src, index, ty } => {
                write!(f, "{dst} = extract {src}, {index}, {ty}")
            }
            Inst::UnsafeCast { dst, value, ty } => {
                write!(f, "{dst} = unsafe_cast {value} to {ty}")
            }
            Inst::RefEq { dst, lhs, rhs } => write!(f, "{dst} = ref_eq {lhs}, {rhs}"),
            Inst::RefNe { dst, lhs, rhs } => write!(f, "{dst} = ref_ne {lhs}, {rhs}"),
            Inst::Apply { dst, callee, args, .. } => {
                write!(f, "{dst} = apply {callee}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                Ok(())
            }
            Inst::PartialApply { dst, callee, args, .. } => {
                write!(f, "{dst} = partial_apply {callee}")?;
                for arg in args {
                    write!(f, ", {arg}")?;
                }
                Ok(())
            }
            Inst::Copy { src, dst } => write!(f, "copy {src}, {dst}"),
            Inst::Move { src, dst } => write!(f, "move {src}, {dst}"),
            Inst::Bind { src, dst } => write!(f, "bind {src}, {dst}"),
            Inst::Drop { value } => write!(f, "drop {value}"),
            Inst::Branch { cond, then_label, else_label } => {
                write!(f, "branch {cond}, {then_label}, {else_label}")
            }
            Inst::Jump { label } => write!(f, "jump {label}"),
            Inst::Ret { value: Some(value) } => write!(f, "ret {value}"),
            Inst::Ret { value: None } => write!(f, "ret"),
        }
    }
}

// ── Blocks, functions, units ──────────────────────────────────────────

/// A basic block: a label and an instruction list ending in one
/// terminator.
#[derive(Debug, Clone)]
pub struct Block {
    pub label: std::string::String,
    pub insts: Vec<Inst>,
}

impl Block {
    pub fn new(label: impl Into<std::string::String>) -> Self {
        Self {
            label: label.into(),
            insts: Vec::new(),
        }
    }

    /// Whether the block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.insts.last().is_some_and(Inst::is_terminator)
    }
}

/// A function: parameters (pre-assigned to the first registers), a
/// codomain, and ordered blocks.
#[derive(Debug, Clone)]
pub struct Function {
    /// Mangled name.
    pub name: std::string::String,
    pub params: Vec<(std::string::String, AirType)>,
    pub codomain: AirType,
    pub blocks: Vec<Block>,
    next_reg: u32,
    label_uses: FxHashMap<std::string::String, u32>,
}

impl Function {
    pub fn new(
        name: impl Into<std::string::String>,
        params: Vec<(std::string::String, AirType)>,
        codomain: AirType,
    ) -> Self {
        // parameters occupy the first registers
        let next_reg = params.len() as u32;
        Self {
            name: name.into(),
            params,
            codomain,
            blocks: Vec::new(),
            next_reg,
            label_uses: FxHashMap::default(),
        }
    }

    /// Allocate the next register id.
    pub fn new_reg(&mut self) -> RegId {
        let reg = RegId(self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// The register a parameter was assigned.
    pub fn param_reg(&self, index: usize) -> RegId {
        RegId(index as u32)
    }

    /// Uniquify a block label by appending `#n` on reuse.
    pub fn fresh_label(&mut self, base: &str) -> std::string::String {
        let count = self.label_uses.entry(base.to_string()).or_insert(0);
        let label = if *count == 0 {
            base.to_string()
        } else {
            format!("{base}#{count}")
        };
        *count += 1;
        label
    }

    pub fn block(&self, label: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn block_mut(&mut self, label: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.label == label)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fun @{}(", self.name)?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "%{i}: {ty}")?;
            let _ = name;
        }
        writeln!(f, ") -> {} {{", self.codomain)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "  {inst}")?;
            }
        }
        write!(f, "}}")
    }
}

/// A compilation unit: functions in emission order, plus an intern table
/// of every structural type the emitter produced. Structurally equal
/// types share one entry.
#[derive(Debug, Default)]
pub struct Unit {
    functions: Vec<Function>,
    index: FxHashMap<std::string::String, usize>,
    types: Vec<AirType>,
    type_index: FxHashMap<AirType, u32>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function, interning every type it mentions. Names are
    /// unique; re-adding a name is a bug.
    pub fn push(&mut self, function: Function) {
        debug_assert!(
            !self.index.contains_key(&function.name),
            "duplicate function {}",
            function.name
        );
        for (_, ty) in &function.params {
            self.intern_type(ty.clone());
        }
        self.intern_type(function.codomain.clone());
        for block in &function.blocks {
            for inst in &block.insts {
                if let Inst::Alloc { ty, .. }
                | Inst::MakeRef { ty, .. }
                | Inst::Extract { ty, .. }
                | Inst::UnsafeCast { ty, .. }
                | Inst::Apply { ty, .. }
                | Inst::PartialApply { ty, .. } = inst
                {
                    self.intern_type(ty.clone());
                }
            }
        }
        self.index
            .insert(function.name.clone(), self.functions.len());
        self.functions.push(function);
    }

    /// Intern a type by structural identity, returning its id.
    pub fn intern_type(&mut self, ty: AirType) -> u32 {
        if let Some(&id) = self.type_index.get(&ty) {
            return id;
        }
        let id = self.types.len() as u32;
        self.type_index.insert(ty.clone(), id);
        self.types.push(ty);
        id
    }

    /// Interned types in first-use order.
    pub fn types(&self) -> impl Iterator<Item = &AirType> {
        self.types.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, function) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write!(f, "{function}")?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inst_display() {
        let make_ref = Inst::MakeRef {
            dst: RegId(1),
            ty: AirType::new(AirQuals::Cst, AirTypeKind::Int),
        };
        assert_eq!(make_ref.to_string(), "%1 = make_ref @cst Int");

        let copy = Inst::Copy {
            src: Value::Int(42),
            dst: Value::Reg(RegId(1)),
        };
        assert_eq!(copy.to_string(), "copy 42, %1");

        let jump = Inst::Jump {
            label: "exit".to_string(),
        };
        assert_eq!(jump.to_string(), "jump exit");

        let apply = Inst::Apply {
            dst: RegId(3),
            callee: Value::Fun("main_f_F2n".to_string()),
            args: vec![Value::Reg(RegId(2))],
            ty: AirType::nothing(),
        };
        assert_eq!(apply.to_string(), "%3 = apply @main_f_F2n, %2");
    }

    #[test]
    fn terminators() {
        assert!(Inst::Jump { label: "x".into() }.is_terminator());
        assert!(Inst::Ret { value: None }.is_terminator());
        assert!(Inst::Branch {
            cond: Value::Bool(true),
            then_label: "a".into(),
            else_label: "b".into()
        }
        .is_terminator());
        assert!(!Inst::Drop {
            value: Value::Reg(RegId(0))
        }
        .is_terminator());
    }

    #[test]
    fn labels_uniquify_with_hash_suffix() {
        let mut function = Function::new("f", Vec::new(), AirType::nothing());
        assert_eq!(function.fresh_label("then"), "then");
        assert_eq!(function.fresh_label("then"), "then#1");
        assert_eq!(function.fresh_label("then"), "then#2");
        assert_eq!(function.fresh_label("post"), "post");
    }

    #[test]
    fn registers_start_after_params() {
        let int = AirType::new(AirQuals::Cst, AirTypeKind::Int);
        let mut function = Function::new(
            "f",
            vec![("x".to_string(), int.clone()), ("y".to_string(), int)],
            AirType::nothing(),
        );
        assert_eq!(function.param_reg(0), RegId(0));
        assert_eq!(function.param_reg(1), RegId(1));
        assert_eq!(function.new_reg(), RegId(2));
    }

    #[test]
    fn unit_lookup_by_name() {
        let mut unit = Unit::new();
        unit.push(Function::new("a", Vec::new(), AirType::nothing()));
        unit.push(Function::new("b", Vec::new(), AirType::nothing()));
        assert!(unit.contains("a"));
        assert!(unit.function("b").is_some());
        assert!(unit.function("c").is_none());
        assert_eq!(unit.len(), 2);
    }

    #[test]
    fn type_interning_shares_structural_duplicates() {
        let mut unit = Unit::new();
        let int = AirType::new(AirQuals::Cst, AirTypeKind::Int);
        let first = unit.intern_type(int.clone());
        let again = unit.intern_type(int.clone());
        assert_eq!(first, again);
        let other = unit.intern_type(AirType::new(AirQuals::Mut, AirTypeKind::Int));
        assert_ne!(first, other);
        assert_eq!(unit.types().count(), 2);
    }
}
