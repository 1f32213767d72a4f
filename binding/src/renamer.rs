//! Alpha-renaming.
//!
//! Runs on a bound tree and rewrites every declaration to a globally
//! unique name, then rewrites every bound use site to match through its
//! `def` back-reference. Afterwards scoping is irrelevant: equal names
//! mean the same declaration.
//!
//! Three kinds of declarations keep their source names: the entry point
//! (the runtime calls it by name), bodyless functions (primitives
//! provided by the runtime) and methods (looked up through their class,
//! where uniqueness per class is already guaranteed).

use ast::{Ast, Chunk, DecId, DecKind, ExpId, ExpKind, TyId, TyKind, VarId, VarKind};
use log::{debug, trace};
use std::collections::HashMap;
use strtab::Symbol;

use crate::ENTRY_POINT;

/// Rename every declaration in the program rooted at `program` and
/// rewrite all bound use sites. Idempotent only in the sense that a
/// second run still yields a consistently renamed tree; the names
/// themselves are fresh on every run.
pub fn rename(ast: &mut Ast, program: ExpId) {
    debug!("renaming program");
    let mut renamer = Renamer {
        ast,
        new_names: HashMap::new(),
    };
    renamer.exp(program);
}

struct Renamer<'a> {
    ast: &'a mut Ast,
    /// Fresh name per declaration, computed on first demand so that use
    /// sites visited before their declaration (mutual recursion) agree
    /// with it.
    new_names: HashMap<DecId, Symbol>,
}

impl Renamer<'_> {
    fn new_name(&mut self, d: DecId) -> Symbol {
        if let Some(&fresh) = self.new_names.get(&d) {
            return fresh;
        }
        let name = self.ast[d].name();
        let fresh = match &self.ast[d].kind {
            DecKind::Function { body, .. } if name.as_str() == ENTRY_POINT || body.is_none() => {
                name
            }
            DecKind::Method { .. } => name,
            _ => name.fresh(),
        };
        if fresh != name {
            trace!("renaming '{}' to '{}'", name, fresh);
        }
        self.new_names.insert(d, fresh);
        fresh
    }

    fn exp(&mut self, e: ExpId) {
        match self.ast[e].kind.clone() {
            ExpKind::Nil | ExpKind::Int(_) | ExpKind::Str(_) | ExpKind::Break { .. } => (),
            ExpKind::Var(v) => self.var(v),
            ExpKind::Call { args, def, .. } => {
                if let Some(def) = def {
                    let fresh = self.new_name(def);
                    if let ExpKind::Call { name, .. } = &mut self.ast[e].kind {
                        *name = fresh;
                    }
                }
                for arg in args {
                    self.exp(arg);
                }
            }
            ExpKind::MethodCall { target, args, .. } => {
                // methods keep their names, only the receiver is visited
                self.var(target);
                for arg in args {
                    self.exp(arg);
                }
            }
            ExpKind::Op { left, right, .. } => {
                self.exp(left);
                self.exp(right);
            }
            ExpKind::Record {
                type_name, fields, ..
            } => {
                self.ty(type_name);
                for field in fields {
                    self.exp(field.init);
                }
            }
            ExpKind::Array {
                type_name,
                size,
                init,
            } => {
                self.ty(type_name);
                self.exp(size);
                self.exp(init);
            }
            ExpKind::Object { type_name, .. } => self.ty(type_name),
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
                self.exp(then);
                if let Some(els) = els {
                    self.exp(els);
                }
            }
            ExpKind::While { test, body } => {
                self.exp(test);
                self.exp(body);
            }
            ExpKind::For { var, hi, body } => {
                self.dec(var);
                self.exp(hi);
                self.exp(body);
            }
            ExpKind::Let { chunks, body } => {
                for chunk in &chunks {
                    self.chunk(chunk);
                }
                self.exp(body);
            }
            ExpKind::Cast { exp, ty } => {
                self.exp(exp);
                self.ty(ty);
            }
        }
    }

    fn var(&mut self, v: VarId) {
        match self.ast[v].kind.clone() {
            VarKind::Simple { def, .. } => {
                if let Some(def) = def {
                    let fresh = self.new_name(def);
                    if let VarKind::Simple { name, .. } = &mut self.ast[v].kind {
                        *name = fresh;
                    }
                }
            }
            // field names live in the record type, not in a scope
            VarKind::Field { var, .. } => self.var(var),
            VarKind::Subscript { var, index } => {
                self.var(var);
                self.exp(index);
            }
        }
    }

    fn ty(&mut self, t: TyId) {
        match self.ast[t].kind.clone() {
            TyKind::Name { def, .. } => {
                // builtin names have no declaration and stay as they are
                if let Some(def) = def {
                    let fresh = self.new_name(def);
                    if let TyKind::Name { name, .. } = &mut self.ast[t].kind {
                        *name = fresh;
                    }
                }
            }
            TyKind::Record(fields) => {
                for field in fields {
                    self.ty(field.type_name);
                }
            }
            TyKind::Array(elem) => self.ty(elem),
            TyKind::Class { extends, chunks } => {
                if let Some(super_ty) = extends {
                    self.ty(super_ty);
                }
                for chunk in &chunks {
                    self.chunk(chunk);
                }
            }
        }
    }

    fn chunk(&mut self, chunk: &Chunk) {
        for &d in chunk.decs() {
            self.dec(d);
        }
    }

    fn dec(&mut self, d: DecId) {
        let fresh = self.new_name(d);
        self.ast[d].set_name(fresh);

        match self.ast[d].kind.clone() {
            DecKind::Var {
                type_name, init, ..
            } => {
                if let Some(t) = type_name {
                    self.ty(t);
                }
                if let Some(init) = init {
                    self.exp(init);
                }
            }
            DecKind::Function {
                formals,
                result,
                body,
                ..
            }
            | DecKind::Method {
                formals,
                result,
                body,
                ..
            } => {
                for formal in formals {
                    self.dec(formal);
                }
                if let Some(result) = result {
                    self.ty(result);
                }
                if let Some(body) = body {
                    self.exp(body);
                }
            }
            DecKind::Type { ty, .. } => self.ty(ty),
        }
    }
}
