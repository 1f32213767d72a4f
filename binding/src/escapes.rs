//! Escape analysis.
//!
//! A variable escapes when it is used at a deeper nesting level than the
//! one it was declared at, which happens exactly when a nested function,
//! method or class body closes over it. Escaping variables must be kept
//! addressable in the enclosing frame; everything else may live in a
//! register.
//!
//! The pass runs on a bound tree. Every declaration is first marked
//! non-escaping, then each use compares the current nesting level with
//! the one recorded at the declaration and re-marks the declaration on a
//! mismatch. Unbound uses (from a program the binder rejected) are
//! simply skipped.

use ast::{Ast, Chunk, DecId, DecKind, ExpId, ExpKind, TyId, TyKind, VarId, VarKind};
use log::debug;
use strtab::Symbol;
use symtab::Scoped;

/// Recompute the `escapable` flag of every variable declaration in the
/// program rooted at `program`.
pub fn compute(ast: &mut Ast, program: ExpId) {
    debug!("computing escapes");
    let mut visitor = EscapesVisitor {
        ast,
        depth: 0,
        env: Scoped::new(),
    };
    visitor.exp(program);
}

struct EscapesVisitor<'a> {
    ast: &'a mut Ast,
    /// Current nesting level; bumped for every construct that opens a
    /// scope, not only for function bodies, mirroring the binder.
    depth: usize,
    env: Scoped<Symbol, (DecId, usize)>,
}

impl EscapesVisitor<'_> {
    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        self.env.enter_scope();
        f(self);
        self.env.leave_scope().expect("scope stack is balanced");
        self.depth -= 1;
    }

    fn set_escapable(&mut self, d: DecId, value: bool) {
        if let DecKind::Var { escapable, .. } = &mut self.ast[d].kind {
            *escapable = value;
        }
    }

    fn exp(&mut self, e: ExpId) {
        match self.ast[e].kind.clone() {
            ExpKind::Nil | ExpKind::Int(_) | ExpKind::Str(_) | ExpKind::Break { .. } => (),
            ExpKind::Var(v) => self.var(v),
            ExpKind::Call { args, .. } => {
                for arg in args {
                    self.exp(arg);
                }
            }
            ExpKind::MethodCall { target, args, .. } => {
                self.var(target);
                for arg in args {
                    self.exp(arg);
                }
            }
            ExpKind::Op { left, right, .. } => {
                self.exp(left);
                self.exp(right);
            }
            ExpKind::Record { fields, .. } => {
                for field in fields {
                    self.exp(field.init);
                }
            }
            ExpKind::Array { size, init, .. } => {
                self.exp(size);
                self.exp(init);
            }
            ExpKind::Object { .. } => (),
            ExpKind::Seq(exps) => {
                for exp in exps {
                    self.exp(exp);
                }
            }
            ExpKind::Assign { var, exp } => {
                self.var(var);
                self.exp(exp);
            }
            ExpKind::If { test, then, els } => {
                self.exp(test);
                self.nested(|v| v.exp(then));
                if let Some(els) = els {
                    self.nested(|v| v.exp(els));
                }
            }
            ExpKind::While { test, body } => {
                self.exp(test);
                self.nested(|v| v.exp(body));
            }
            ExpKind::For { var, hi, body } => {
                self.exp(hi);
                self.nested(|v| {
                    v.dec(var);
                    v.exp(body);
                });
            }
            ExpKind::Let { chunks, body } => {
                self.nested(|v| {
                    for chunk in &chunks {
                        v.chunk(chunk);
                    }
                    v.exp(body);
                });
            }
            ExpKind::Cast { exp, .. } => self.exp(exp),
        }
    }

    fn var(&mut self, v: VarId) {
        match self.ast[v].kind.clone() {
            VarKind::Simple { name, .. } => {
                if let Some(&(d, declared_depth)) = self.env.lookup(name) {
                    if declared_depth != self.depth {
                        self.set_escapable(d, true);
                    }
                }
            }
            VarKind::Field { var, .. } => self.var(var),
            VarKind::Subscript { var, index } => {
                self.var(var);
                self.exp(index);
            }
        }
    }

    fn chunk(&mut self, chunk: &Chunk) {
        for &d in chunk.decs() {
            self.dec(d);
        }
    }

    fn dec(&mut self, d: DecId) {
        match self.ast[d].kind.clone() {
            DecKind::Var { name, init, .. } => {
                // innocent until a deeper use proves otherwise
                self.set_escapable(d, false);
                self.env.insert(name, (d, self.depth));
                if let Some(init) = init {
                    self.exp(init);
                }
            }
            DecKind::Function { formals, body, .. } | DecKind::Method { formals, body, .. } => {
                self.nested(|v| {
                    for formal in formals {
                        v.dec(formal);
                    }
                    if let Some(body) = body {
                        v.exp(body);
                    }
                });
            }
            DecKind::Type { ty, .. } => self.ty(ty),
        }
    }

    fn ty(&mut self, t: TyId) {
        if let TyKind::Class { chunks, .. } = self.ast[t].kind.clone() {
            self.nested(|v| {
                for chunk in &chunks {
                    v.chunk(chunk);
                }
            });
        }
    }
}
