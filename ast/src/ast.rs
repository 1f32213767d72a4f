//! The abstract syntax tree handed over by the parser.
//!
//! Nodes live in four arenas owned by [`Ast`] — expressions, lvalues,
//! type expressions and declarations — and reference each other through
//! copyable index handles (`ExpId`, `VarId`, `TyId`, `DecId`). Ownership
//! is strictly tree-shaped; the resolution edges the binder adds later
//! (a use site pointing at its declaration, a `break` pointing at its
//! loop) are plain `Option<DecId>` / `Option<ExpId>` slots inside the
//! node kinds, `None` until the binder fills them. That keeps the
//! back-references non-owning and cycle-free by construction.
//!
//! Passes are written as exhaustive matches over the kind enums; adding
//! a node variant breaks every pass at compile time, which is intended.

use location::Span;
use strtab::Symbol;
use strum_macros::{Display, EnumDiscriminants};

/// Handle into [`Ast::exps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpId(u32);

/// Handle into [`Ast::vars`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u32);

/// Handle into [`Ast::tys`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TyId(u32);

/// Handle into [`Ast::decs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecId(u32);

/// Binary operators. Comparison operators work on ints and strings,
/// arithmetic ones on ints only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Oper {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "=")]
    Eq,
    #[strum(serialize = "<>")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

impl Oper {
    pub fn is_comparison(self) -> bool {
        match self {
            Oper::Eq | Oper::Ne | Oper::Lt | Oper::Le | Oper::Gt | Oper::Ge => true,
            Oper::Add | Oper::Sub | Oper::Mul | Oper::Div => false,
        }
    }
}

/// One field initializer of a record literal, e.g. `head = 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInit {
    pub name: Symbol,
    pub init: ExpId,
    pub span: Span,
}

/// One field of a record (or attribute list) type, e.g. `head : int`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Symbol,
    pub type_name: TyId,
    pub span: Span,
}

/// A maximal run of consecutive declarations of one kind.
///
/// Function, type and method chunks are mutually visible: all their names
/// are registered before any body is visited, so siblings can refer to
/// one another. Var chunks are sequential; each initializer only sees the
/// declarations before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Fun(Vec<DecId>),
    Var(Vec<DecId>),
    Type(Vec<DecId>),
    Method(Vec<DecId>),
}

impl Chunk {
    pub fn decs(&self) -> &[DecId] {
        match self {
            Chunk::Fun(decs) | Chunk::Var(decs) | Chunk::Type(decs) | Chunk::Method(decs) => decs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exp {
    pub span: Span,
    pub kind: ExpKind,
}

#[derive(EnumDiscriminants, Debug, Clone, PartialEq, Eq)]
#[strum_discriminants(derive(Display))]
pub enum ExpKind {
    /// `nil`
    Nil,
    Int(i64),
    Str(String),
    /// An lvalue in expression position.
    Var(VarId),
    /// `f(a, b)`; `def` is filled by the binder.
    Call {
        name: Symbol,
        args: Vec<ExpId>,
        def: Option<DecId>,
    },
    /// `target.m(a, b)`; `def` is filled by the binder.
    MethodCall {
        name: Symbol,
        target: VarId,
        args: Vec<ExpId>,
        def: Option<DecId>,
    },
    Op {
        oper: Oper,
        left: ExpId,
        right: ExpId,
    },
    /// `t { a = 1, b = 2 }`; `def` points at the `type` declaration.
    Record {
        type_name: TyId,
        fields: Vec<FieldInit>,
        def: Option<DecId>,
    },
    /// `t[size] of init` where `t` names an array type.
    Array {
        type_name: TyId,
        size: ExpId,
        init: ExpId,
    },
    /// `new t`; `def` points at the `type` declaration of the class.
    Object {
        type_name: TyId,
        def: Option<DecId>,
    },
    /// `(e1; e2; ...)` — an empty sequence is the unit value `()`.
    Seq(Vec<ExpId>),
    Assign {
        var: VarId,
        exp: ExpId,
    },
    If {
        test: ExpId,
        then: ExpId,
        els: Option<ExpId>,
    },
    While {
        test: ExpId,
        body: ExpId,
    },
    For {
        var: DecId,
        hi: ExpId,
        body: ExpId,
    },
    /// `loop_` is filled by the binder with the innermost enclosing loop.
    Break {
        loop_: Option<ExpId>,
    },
    Let {
        chunks: Vec<Chunk>,
        body: ExpId,
    },
    /// `e : t` — an up-cast within the class hierarchy.
    Cast {
        exp: ExpId,
        ty: TyId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub span: Span,
    pub kind: VarKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// A bare identifier; `def` is filled by the binder.
    Simple { name: Symbol, def: Option<DecId> },
    /// `var.field`
    Field { var: VarId, name: Symbol },
    /// `var[index]`
    Subscript { var: VarId, index: ExpId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ty {
    pub span: Span,
    pub kind: TyKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TyKind {
    /// A type by name; `def` is filled by the binder, and stays `None`
    /// for the builtin names `int` and `string`.
    Name { name: Symbol, def: Option<DecId> },
    /// `{ a : int, b : string }`
    Record(Vec<Field>),
    /// `array of t` where `t` is a name type.
    Array(TyId),
    /// `class extends super { attributes and methods }`; `extends` is a
    /// name type, absent for direct subclasses of Object.
    Class {
        extends: Option<TyId>,
        chunks: Vec<Chunk>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dec {
    pub span: Span,
    pub kind: DecKind,
}

#[derive(EnumDiscriminants, Debug, Clone, PartialEq, Eq)]
#[strum_discriminants(derive(Display))]
pub enum DecKind {
    /// `function f(formals) : result = body`. A function without a body
    /// is a primitive provided by the runtime.
    Function {
        name: Symbol,
        formals: Vec<DecId>,
        result: Option<TyId>,
        body: Option<ExpId>,
    },
    /// `var x : t := init`. `escapable` defaults to true at parse time;
    /// the escape analyzer clears it and re-sets it on captured uses.
    Var {
        name: Symbol,
        type_name: Option<TyId>,
        init: Option<ExpId>,
        escapable: bool,
    },
    /// `type t = ty`
    Type { name: Symbol, ty: TyId },
    /// A method inside a class body; same shape as a function.
    Method {
        name: Symbol,
        formals: Vec<DecId>,
        result: Option<TyId>,
        body: Option<ExpId>,
    },
}

impl Dec {
    pub fn name(&self) -> Symbol {
        match &self.kind {
            DecKind::Function { name, .. }
            | DecKind::Var { name, .. }
            | DecKind::Type { name, .. }
            | DecKind::Method { name, .. } => *name,
        }
    }

    pub fn set_name(&mut self, new_name: Symbol) {
        match &mut self.kind {
            DecKind::Function { name, .. }
            | DecKind::Var { name, .. }
            | DecKind::Type { name, .. }
            | DecKind::Method { name, .. } => *name = new_name,
        }
    }
}

/// The arena owning every node of one program.
#[derive(Debug, Default)]
pub struct Ast {
    exps: Vec<Exp>,
    vars: Vec<Var>,
    tys: Vec<Ty>,
    decs: Vec<Dec>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn push_exp(&mut self, span: Span, kind: ExpKind) -> ExpId {
        let id = ExpId(self.exps.len() as u32);
        self.exps.push(Exp { span, kind });
        id
    }

    pub fn push_var(&mut self, span: Span, kind: VarKind) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Var { span, kind });
        id
    }

    pub fn push_ty(&mut self, span: Span, kind: TyKind) -> TyId {
        let id = TyId(self.tys.len() as u32);
        self.tys.push(Ty { span, kind });
        id
    }

    pub fn push_dec(&mut self, span: Span, kind: DecKind) -> DecId {
        let id = DecId(self.decs.len() as u32);
        self.decs.push(Dec { span, kind });
        id
    }

    pub fn exp_count(&self) -> usize {
        self.exps.len()
    }

    pub fn dec_count(&self) -> usize {
        self.decs.len()
    }
}

impl std::ops::Index<ExpId> for Ast {
    type Output = Exp;
    fn index(&self, id: ExpId) -> &Exp {
        &self.exps[id.0 as usize]
    }
}

impl std::ops::IndexMut<ExpId> for Ast {
    fn index_mut(&mut self, id: ExpId) -> &mut Exp {
        &mut self.exps[id.0 as usize]
    }
}

impl std::ops::Index<VarId> for Ast {
    type Output = Var;
    fn index(&self, id: VarId) -> &Var {
        &self.vars[id.0 as usize]
    }
}

impl std::ops::IndexMut<VarId> for Ast {
    fn index_mut(&mut self, id: VarId) -> &mut Var {
        &mut self.vars[id.0 as usize]
    }
}

impl std::ops::Index<TyId> for Ast {
    type Output = Ty;
    fn index(&self, id: TyId) -> &Ty {
        &self.tys[id.0 as usize]
    }
}

impl std::ops::IndexMut<TyId> for Ast {
    fn index_mut(&mut self, id: TyId) -> &mut Ty {
        &mut self.tys[id.0 as usize]
    }
}

impl std::ops::Index<DecId> for Ast {
    type Output = Dec;
    fn index(&self, id: DecId) -> &Dec {
        &self.decs[id.0 as usize]
    }
}

impl std::ops::IndexMut<DecId> for Ast {
    fn index_mut(&mut self, id: DecId) -> &mut Dec {
        &mut self.decs[id.0 as usize]
    }
}
