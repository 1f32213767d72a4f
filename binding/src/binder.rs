//! The binder resolves every name to the declaration it refers to.
//!
//! Four independent namespaces are maintained (functions, types,
//! variables, methods); a name may be bound in several of them at once.
//! Scopes open and close together on the constructs that introduce them:
//! `let`, both branches of `if`, the bodies of `while` and `for`,
//! function and method declarations, and class bodies.
//!
//! Declarations arrive grouped in chunks. Function, type and method
//! chunks are registered header-first so siblings may refer to each
//! other (mutual recursion); `var` chunks are strictly sequential. A
//! name declared twice in the *same* chunk is a redefinition error; a
//! declaration in a later chunk merely shadows the earlier one.

use ast::{Ast, Chunk, DecId, DecKind, ExpId, ExpKind, TyId, TyKind, VarId, VarKind};
use diagnostics::{Diagnostics, Phase};
use failure::Fail;
use location::Span;
use log::debug;
use std::collections::HashMap;
use strtab::Symbol;
use symtab::{RedefinitionError, Scoped};

use crate::ENTRY_POINT;

/// Which namespace a binding error talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum NamespaceKind {
    #[strum(serialize = "variable")]
    Variable,
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "type")]
    Type,
    #[strum(serialize = "method")]
    Method,
}

#[derive(Debug, Fail)]
pub enum BindError {
    #[fail(display = "undeclared {}: {}", kind, name)]
    Undeclared { kind: NamespaceKind, name: Symbol },
    #[fail(
        display = "redefinition of {} '{}', first defined at {}",
        kind, name, first
    )]
    Redefinition {
        kind: NamespaceKind,
        name: Symbol,
        first: Span,
    },
    #[fail(display = "redefinition of the entry point '{}'", _0)]
    BadEntryPointRedefinition(Symbol),
    #[fail(display = "'break' outside any loop")]
    InvalidBreak,
}

/// Resolve all names in the program rooted at `program`, filling the
/// `def` and `loop_` slots in place. Errors go to `diagnostics`; the
/// traversal always completes so one run reports them all.
pub fn bind(ast: &mut Ast, program: ExpId, diagnostics: &Diagnostics) {
    debug!("binding program ({} declarations)", ast.dec_count());
    let mut binder = Binder {
        ast,
        diagnostics,
        scope_fun: Scoped::new(),
        scope_type: Scoped::new(),
        scope_var: Scoped::new(),
        scope_method: Scoped::new(),
        loops: Vec::new(),
        main_seen: false,
    };
    binder.exp(program);
}

struct Binder<'a> {
    ast: &'a mut Ast,
    diagnostics: &'a Diagnostics,
    scope_fun: Scoped<Symbol, DecId>,
    scope_type: Scoped<Symbol, DecId>,
    scope_var: Scoped<Symbol, DecId>,
    scope_method: Scoped<Symbol, DecId>,
    /// Innermost enclosing loop, for resolving `break`.
    loops: Vec<ExpId>,
    main_seen: bool,
}

fn is_builtin_type(name: Symbol) -> bool {
    name.as_str() == "int" || name.as_str() == "string"
}

impl Binder<'_> {
    fn error(&self, span: Span, err: &BindError) {
        self.diagnostics.error(Phase::Bind, span, err);
    }

    fn scope_begin(&mut self) {
        self.scope_fun.enter_scope();
        self.scope_type.enter_scope();
        self.scope_var.enter_scope();
        self.scope_method.enter_scope();
    }

    fn scope_end(&mut self) {
        self.scope_fun
            .leave_scope()
            .and_then(|()| self.scope_type.leave_scope())
            .and_then(|()| self.scope_var.leave_scope())
            .and_then(|()| self.scope_method.leave_scope())
            .expect("scope stack is balanced");
    }

    fn exp(&mut self, e: ExpId) {
        let span = self.ast[e].span;
        match self.ast[e].kind.clone() {
            ExpKind::Nil | ExpKind::Int(_) | ExpKind::Str(_) => (),
            ExpKind::Var(v) => self.var(v),
            ExpKind::Call { name, args, .. } => {
                match self.scope_fun.lookup(name).copied() {
                    Some(def) => {
                        if let ExpKind::Call { def: slot, .. } = &mut self.ast[e].kind {
                            *slot = Some(def);
                        }
                    }
                    None => self.error(
                        span,
                        &BindError::Undeclared {
                            kind: NamespaceKind::Function,
                            name,
                        },
                    ),
                }
                for arg in args {
                    self.exp(arg);
                }
            }
            ExpKind::MethodCall {
                name, target, args, ..
            } => {
                self.var(target);
                match self.scope_method.lookup(name).copied() {
                    Some(def) => {
                        if let ExpKind::MethodCall { def: slot, .. } = &mut self.ast[e].kind {
                            *slot = Some(def);
                        }
                    }
                    None => self.error(
                        span,
                        &BindError::Undeclared {
                            kind: NamespaceKind::Method,
                            name,
                        },
                    ),
                }
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
                let def = self.type_name(type_name);
                if let ExpKind::Record { def: slot, .. } = &mut self.ast[e].kind {
                    *slot = def;
                }
                for field in fields {
                    self.exp(field.init);
                }
            }
            ExpKind::Array {
                type_name,
                size,
                init,
            } => {
                self.type_name(type_name);
                self.exp(size);
                self.exp(init);
            }
            ExpKind::Object { type_name, .. } => {
                let def = self.type_name(type_name);
                if let ExpKind::Object { def: slot, .. } = &mut self.ast[e].kind {
                    *slot = def;
                }
            }
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
                self.scope_begin();
                self.exp(then);
                self.scope_end();
                if let Some(els) = els {
                    self.scope_begin();
                    self.exp(els);
                    self.scope_end();
                }
            }
            ExpKind::While { test, body } => {
                self.exp(test);
                self.scope_begin();
                self.loops.push(e);
                self.exp(body);
                self.loops.pop();
                self.scope_end();
            }
            ExpKind::For { var, hi, body } => {
                // the bounds are evaluated outside the loop variable's scope
                self.exp(hi);
                self.scope_begin();
                self.var_dec(var);
                self.loops.push(e);
                self.exp(body);
                self.loops.pop();
                self.scope_end();
            }
            ExpKind::Break { .. } => match self.loops.last().copied() {
                Some(target) => {
                    if let ExpKind::Break { loop_ } = &mut self.ast[e].kind {
                        *loop_ = Some(target);
                    }
                }
                None => self.error(span, &BindError::InvalidBreak),
            },
            ExpKind::Let { chunks, body } => {
                self.scope_begin();
                for chunk in &chunks {
                    self.chunk(chunk);
                }
                self.exp(body);
                self.scope_end();
            }
            ExpKind::Cast { exp, ty } => {
                self.exp(exp);
                self.ty(ty);
            }
        }
    }

    fn var(&mut self, v: VarId) {
        let span = self.ast[v].span;
        match self.ast[v].kind.clone() {
            VarKind::Simple { name, .. } => match self.scope_var.lookup(name).copied() {
                Some(def) => {
                    if let VarKind::Simple { def: slot, .. } = &mut self.ast[v].kind {
                        *slot = Some(def);
                    }
                }
                None => self.error(
                    span,
                    &BindError::Undeclared {
                        kind: NamespaceKind::Variable,
                        name,
                    },
                ),
            },
            // field names can only be checked against the record's type,
            // which is the type checker's business
            VarKind::Field { var, .. } => self.var(var),
            VarKind::Subscript { var, index } => {
                self.var(var);
                self.exp(index);
            }
        }
    }

    fn ty(&mut self, t: TyId) {
        match self.ast[t].kind.clone() {
            TyKind::Name { .. } => {
                self.type_name(t);
            }
            TyKind::Record(fields) => {
                for field in fields {
                    self.type_name(field.type_name);
                }
            }
            TyKind::Array(elem) => {
                self.type_name(elem);
            }
            TyKind::Class { extends, chunks } => {
                if let Some(super_ty) = extends {
                    self.type_name(super_ty);
                }
                self.scope_begin();
                for chunk in &chunks {
                    self.chunk(chunk);
                }
                self.scope_end();
            }
        }
    }

    /// Resolve a type used by name. The builtins `int` and `string` have
    /// no declaration and resolve to `None` without an error; a user
    /// declaration of the same name shadows them.
    fn type_name(&mut self, t: TyId) -> Option<DecId> {
        let span = self.ast[t].span;
        match self.ast[t].kind.clone() {
            TyKind::Name { name, .. } => {
                if let Some(def) = self.scope_type.lookup(name).copied() {
                    if let TyKind::Name { def: slot, .. } = &mut self.ast[t].kind {
                        *slot = Some(def);
                    }
                    return Some(def);
                }
                if !is_builtin_type(name) {
                    self.error(
                        span,
                        &BindError::Undeclared {
                            kind: NamespaceKind::Type,
                            name,
                        },
                    );
                }
                None
            }
            _ => {
                self.ty(t);
                None
            }
        }
    }

    fn chunk(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::Var(decs) => {
                for &d in decs {
                    self.var_dec(d);
                }
            }
            Chunk::Fun(decs) => {
                let bound = self.register_chunk(decs, NamespaceKind::Function);
                for d in bound {
                    self.routine_dec(d);
                }
            }
            Chunk::Type(decs) => {
                let bound = self.register_chunk(decs, NamespaceKind::Type);
                for d in bound {
                    self.type_dec(d);
                }
            }
            Chunk::Method(decs) => {
                let bound = self.register_chunk(decs, NamespaceKind::Method);
                for d in bound {
                    self.routine_dec(d);
                }
            }
        }
    }

    /// Phase one of a mutually recursive chunk: bind all names before
    /// any body is visited. Returns the declarations that survived
    /// duplicate detection, in source order.
    fn register_chunk(&mut self, decs: &[DecId], kind: NamespaceKind) -> Vec<DecId> {
        let mut seen: HashMap<Symbol, DecId> = HashMap::new();
        let mut bound = Vec::with_capacity(decs.len());
        for &d in decs {
            let name = self.ast[d].name();
            let span = self.ast[d].span;

            if kind == NamespaceKind::Function && !self.check_entry_point(d) {
                continue;
            }
            if let Some(&first) = seen.get(&name) {
                let first_span = self.ast[first].span;
                self.error(
                    span,
                    &BindError::Redefinition {
                        kind,
                        name,
                        first: first_span,
                    },
                );
                continue;
            }
            seen.insert(name, d);

            // shadow, don't define: an equally named binding from an
            // *earlier* chunk is not a redefinition
            match kind {
                NamespaceKind::Function => self.scope_fun.insert(name, d),
                NamespaceKind::Type => self.scope_type.insert(name, d),
                NamespaceKind::Method => self.scope_method.insert(name, d),
                NamespaceKind::Variable => unreachable!("var chunks are bound sequentially"),
            }
            bound.push(d);
        }
        bound
    }

    /// `_main` at top level is the entry point and may only be declared
    /// once per program. Returns false when the declaration must be
    /// dropped. A nested `_main` is an ordinary function.
    fn check_entry_point(&mut self, d: DecId) -> bool {
        let name = self.ast[d].name();
        if name.as_str() != ENTRY_POINT || self.scope_fun.depth() > 1 {
            return true;
        }
        if self.main_seen {
            let span = self.ast[d].span;
            self.error(span, &BindError::BadEntryPointRedefinition(name));
            return false;
        }
        self.main_seen = true;
        true
    }

    /// A function or method declaration: formals and body live in a
    /// fresh scope, the result type in the enclosing one's names.
    fn routine_dec(&mut self, d: DecId) {
        let (formals, result, body) = match self.ast[d].kind.clone() {
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
            } => (formals, result, body),
            _ => unreachable!("routine chunk holds only functions and methods"),
        };
        if let Some(result) = result {
            self.type_name(result);
        }
        self.scope_begin();
        for formal in formals {
            self.formal(formal);
        }
        if let Some(body) = body {
            self.exp(body);
        }
        self.scope_end();
    }

    /// Formals share one scope, so two formals with the same name clash.
    fn formal(&mut self, d: DecId) {
        let (name, type_name) = match self.ast[d].kind.clone() {
            DecKind::Var {
                name, type_name, ..
            } => (name, type_name),
            _ => unreachable!("formals are var declarations"),
        };
        if let Some(t) = type_name {
            self.type_name(t);
        }
        if let Err(RedefinitionError(first)) = self.scope_var.define(name, d) {
            let span = self.ast[d].span;
            let first_span = self.ast[first].span;
            self.error(
                span,
                &BindError::Redefinition {
                    kind: NamespaceKind::Variable,
                    name,
                    first: first_span,
                },
            );
        }
    }

    /// `var` declarations are sequential: the initializer is bound
    /// before the name becomes visible, so `var x := x` refers to an
    /// outer `x`.
    fn var_dec(&mut self, d: DecId) {
        let (name, type_name, init) = match self.ast[d].kind.clone() {
            DecKind::Var {
                name,
                type_name,
                init,
                ..
            } => (name, type_name, init),
            _ => unreachable!("var chunk holds only var declarations"),
        };
        if let Some(t) = type_name {
            self.type_name(t);
        }
        if let Some(init) = init {
            self.exp(init);
        }
        self.scope_var.insert(name, d);
    }

    fn type_dec(&mut self, d: DecId) {
        let ty = match self.ast[d].kind.clone() {
            DecKind::Type { ty, .. } => ty,
            _ => unreachable!("type chunk holds only type declarations"),
        };
        self.ty(ty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ast::{Field, FieldInit, Oper};

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn span(line: u32) -> Span {
        Span::at(line, 1)
    }

    fn use_var(ast: &mut Ast, line: u32, name: &str) -> ExpId {
        let v = ast.push_var(
            span(line),
            VarKind::Simple {
                name: sym(name),
                def: None,
            },
        );
        ast.push_exp(span(line), ExpKind::Var(v))
    }

    fn int(ast: &mut Ast, value: i64) -> ExpId {
        ast.push_exp(span(1), ExpKind::Int(value))
    }

    fn var_dec(ast: &mut Ast, line: u32, name: &str, init: ExpId) -> DecId {
        ast.push_dec(
            span(line),
            DecKind::Var {
                name: sym(name),
                type_name: None,
                init: Some(init),
                escapable: true,
            },
        )
    }

    fn fun_dec(ast: &mut Ast, line: u32, name: &str, body: Option<ExpId>) -> DecId {
        ast.push_dec(
            span(line),
            DecKind::Function {
                name: sym(name),
                formals: Vec::new(),
                result: None,
                body,
            },
        )
    }

    fn let_exp(ast: &mut Ast, chunks: Vec<Chunk>, body: ExpId) -> ExpId {
        ast.push_exp(span(1), ExpKind::Let { chunks, body })
    }

    fn bind_program(ast: &mut Ast, program: ExpId) -> Diagnostics {
        let diagnostics = Diagnostics::buffered();
        bind(ast, program, &diagnostics);
        diagnostics
    }

    fn messages(diagnostics: &Diagnostics) -> Vec<String> {
        diagnostics.records().iter().map(|r| r.message.clone()).collect()
    }

    #[test]
    fn undeclared_variable_is_reported() {
        let mut ast = Ast::new();
        let program = use_var(&mut ast, 1, "x");

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(vec!["undeclared variable: x"], messages(&diagnostics));
    }

    #[test]
    fn undeclared_function_is_reported() {
        let mut ast = Ast::new();
        let program = ast.push_exp(
            span(1),
            ExpKind::Call {
                name: sym("f"),
                args: Vec::new(),
                def: None,
            },
        );

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(vec!["undeclared function: f"], messages(&diagnostics));
    }

    #[test]
    fn declared_variable_use_binds_to_its_declaration() {
        let mut ast = Ast::new();
        let one = int(&mut ast, 1);
        let x = var_dec(&mut ast, 1, "x", one);
        let body = use_var(&mut ast, 2, "x");
        let program = let_exp(&mut ast, vec![Chunk::Var(vec![x])], body);

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());

        let v = match ast[body].kind {
            ExpKind::Var(v) => v,
            _ => unreachable!(),
        };
        match ast[v].kind {
            VarKind::Simple { def, .. } => assert_eq!(Some(x), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn var_initializer_sees_only_earlier_declarations() {
        // let var x := 1  var x := x in x end
        // the second initializer refers to the first x, the body to the
        // second
        let mut ast = Ast::new();
        let one = int(&mut ast, 1);
        let first = var_dec(&mut ast, 1, "x", one);
        let init = use_var(&mut ast, 2, "x");
        let second = var_dec(&mut ast, 2, "x", init);
        let body = use_var(&mut ast, 3, "x");
        let program = let_exp(&mut ast, vec![Chunk::Var(vec![first, second])], body);

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());

        let init_var = match ast[init].kind {
            ExpKind::Var(v) => v,
            _ => unreachable!(),
        };
        match ast[init_var].kind {
            VarKind::Simple { def, .. } => assert_eq!(Some(first), def),
            _ => unreachable!(),
        }
        let body_var = match ast[body].kind {
            ExpKind::Var(v) => v,
            _ => unreachable!(),
        };
        match ast[body_var].kind {
            VarKind::Simple { def, .. } => assert_eq!(Some(second), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn duplicate_function_in_one_chunk_is_a_redefinition() {
        let mut ast = Ast::new();
        let body1 = int(&mut ast, 0);
        let body2 = int(&mut ast, 0);
        let f1 = fun_dec(&mut ast, 1, "f", Some(body1));
        let f2 = fun_dec(&mut ast, 2, "f", Some(body2));
        let unit = ast.push_exp(span(3), ExpKind::Seq(Vec::new()));
        let program = let_exp(&mut ast, vec![Chunk::Fun(vec![f1, f2])], unit);

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(
            vec!["redefinition of function 'f', first defined at 1.1"],
            messages(&diagnostics)
        );
    }

    #[test]
    fn same_name_in_a_later_chunk_shadows_instead_of_clashing() {
        // two separate function chunks both declaring f: the call in the
        // body binds to the later one
        let mut ast = Ast::new();
        let body1 = int(&mut ast, 0);
        let body2 = int(&mut ast, 0);
        let f1 = fun_dec(&mut ast, 1, "f", Some(body1));
        let f2 = fun_dec(&mut ast, 2, "f", Some(body2));
        let call = ast.push_exp(
            span(3),
            ExpKind::Call {
                name: sym("f"),
                args: Vec::new(),
                def: None,
            },
        );
        let program = let_exp(
            &mut ast,
            vec![Chunk::Fun(vec![f1]), Chunk::Fun(vec![f2])],
            call,
        );

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[call].kind {
            ExpKind::Call { def, .. } => assert_eq!(Some(f2), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn mutually_recursive_functions_bind_within_one_chunk() {
        // function even() = odd()  function odd() = even()
        let mut ast = Ast::new();
        let call_odd = ast.push_exp(
            span(1),
            ExpKind::Call {
                name: sym("odd"),
                args: Vec::new(),
                def: None,
            },
        );
        let call_even = ast.push_exp(
            span(2),
            ExpKind::Call {
                name: sym("even"),
                args: Vec::new(),
                def: None,
            },
        );
        let even = fun_dec(&mut ast, 1, "even", Some(call_odd));
        let odd = fun_dec(&mut ast, 2, "odd", Some(call_even));
        let unit = ast.push_exp(span(3), ExpKind::Seq(Vec::new()));
        let program = let_exp(&mut ast, vec![Chunk::Fun(vec![even, odd])], unit);

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[call_odd].kind {
            ExpKind::Call { def, .. } => assert_eq!(Some(odd), def),
            _ => unreachable!(),
        }
        match ast[call_even].kind {
            ExpKind::Call { def, .. } => assert_eq!(Some(even), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn break_outside_a_loop_is_reported() {
        let mut ast = Ast::new();
        let program = ast.push_exp(span(1), ExpKind::Break { loop_: None });

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(vec!["'break' outside any loop"], messages(&diagnostics));
    }

    #[test]
    fn break_binds_to_the_innermost_loop() {
        let mut ast = Ast::new();
        let brk = ast.push_exp(span(2), ExpKind::Break { loop_: None });
        let test = int(&mut ast, 1);
        let inner = ast.push_exp(span(2), ExpKind::While { test, body: brk });
        let outer_test = int(&mut ast, 1);
        let program = ast.push_exp(
            span(1),
            ExpKind::While {
                test: outer_test,
                body: inner,
            },
        );

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[brk].kind {
            ExpKind::Break { loop_ } => assert_eq!(Some(inner), loop_),
            _ => unreachable!(),
        }
    }

    #[test]
    fn for_variable_is_confined_to_the_loop_body() {
        // for i := 1 to 10 do i; followed by a use of i outside
        let mut ast = Ast::new();
        let lo = int(&mut ast, 1);
        let i = var_dec(&mut ast, 1, "i", lo);
        let hi = int(&mut ast, 10);
        let body = use_var(&mut ast, 1, "i");
        let for_exp = ast.push_exp(span(1), ExpKind::For { var: i, hi, body });
        let after = use_var(&mut ast, 2, "i");
        let program = ast.push_exp(span(1), ExpKind::Seq(vec![for_exp, after]));

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(vec!["undeclared variable: i"], messages(&diagnostics));

        let body_var = match ast[body].kind {
            ExpKind::Var(v) => v,
            _ => unreachable!(),
        };
        match ast[body_var].kind {
            VarKind::Simple { def, .. } => assert_eq!(Some(i), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn second_top_level_main_is_an_entry_point_redefinition() {
        let mut ast = Ast::new();
        let body1 = int(&mut ast, 0);
        let body2 = int(&mut ast, 0);
        let m1 = fun_dec(&mut ast, 1, "_main", Some(body1));
        let m2 = fun_dec(&mut ast, 2, "_main", Some(body2));
        let unit = ast.push_exp(span(3), ExpKind::Seq(Vec::new()));
        let program = let_exp(
            &mut ast,
            vec![Chunk::Fun(vec![m1]), Chunk::Fun(vec![m2])],
            unit,
        );

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(
            vec!["redefinition of the entry point '_main'"],
            messages(&diagnostics)
        );
    }

    #[test]
    fn nested_main_is_an_ordinary_function() {
        // a function named _main inside another function's body clashes
        // with nothing
        let mut ast = Ast::new();
        let body_top = int(&mut ast, 0);
        let top = fun_dec(&mut ast, 1, "_main", Some(body_top));

        let inner_body = int(&mut ast, 0);
        let inner = fun_dec(&mut ast, 2, "_main", Some(inner_body));
        let unit = ast.push_exp(span(2), ExpKind::Seq(Vec::new()));
        let inner_let = let_exp(&mut ast, vec![Chunk::Fun(vec![inner])], unit);
        let host = fun_dec(&mut ast, 2, "host", Some(inner_let));

        let outer_unit = ast.push_exp(span(3), ExpKind::Seq(Vec::new()));
        let program = let_exp(
            &mut ast,
            vec![Chunk::Fun(vec![top]), Chunk::Fun(vec![host])],
            outer_unit,
        );

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
    }

    #[test]
    fn builtin_type_names_resolve_without_declaration() {
        // var x : int := 1
        let mut ast = Ast::new();
        let int_ty = ast.push_ty(
            span(1),
            TyKind::Name {
                name: sym("int"),
                def: None,
            },
        );
        let one = int(&mut ast, 1);
        let x = ast.push_dec(
            span(1),
            DecKind::Var {
                name: sym("x"),
                type_name: Some(int_ty),
                init: Some(one),
                escapable: true,
            },
        );
        let body = use_var(&mut ast, 2, "x");
        let program = let_exp(&mut ast, vec![Chunk::Var(vec![x])], body);

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[int_ty].kind {
            TyKind::Name { def, .. } => assert_eq!(None, def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn undeclared_type_is_reported() {
        let mut ast = Ast::new();
        let ty = ast.push_ty(
            span(1),
            TyKind::Name {
                name: sym("list"),
                def: None,
            },
        );
        let size = int(&mut ast, 3);
        let init = int(&mut ast, 0);
        let program = ast.push_exp(
            span(1),
            ExpKind::Array {
                type_name: ty,
                size,
                init,
            },
        );

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(vec!["undeclared type: list"], messages(&diagnostics));
    }

    #[test]
    fn mutually_recursive_types_bind_within_one_chunk() {
        // type tree = {value: int, children: forest}
        // type forest = array of tree
        let mut ast = Ast::new();
        let forest_use = ast.push_ty(
            span(1),
            TyKind::Name {
                name: sym("forest"),
                def: None,
            },
        );
        let int_use = ast.push_ty(
            span(1),
            TyKind::Name {
                name: sym("int"),
                def: None,
            },
        );
        let tree_body = ast.push_ty(
            span(1),
            TyKind::Record(vec![
                Field {
                    name: sym("value"),
                    type_name: int_use,
                    span: span(1),
                },
                Field {
                    name: sym("children"),
                    type_name: forest_use,
                    span: span(1),
                },
            ]),
        );
        let tree_dec = ast.push_dec(
            span(1),
            DecKind::Type {
                name: sym("tree"),
                ty: tree_body,
            },
        );
        let tree_use = ast.push_ty(
            span(2),
            TyKind::Name {
                name: sym("tree"),
                def: None,
            },
        );
        let forest_body = ast.push_ty(span(2), TyKind::Array(tree_use));
        let forest_dec = ast.push_dec(
            span(2),
            DecKind::Type {
                name: sym("forest"),
                ty: forest_body,
            },
        );
        let unit = ast.push_exp(span(3), ExpKind::Seq(Vec::new()));
        let program = let_exp(
            &mut ast,
            vec![Chunk::Type(vec![tree_dec, forest_dec])],
            unit,
        );

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[forest_use].kind {
            TyKind::Name { def, .. } => assert_eq!(Some(forest_dec), def),
            _ => unreachable!(),
        }
        match ast[tree_use].kind {
            TyKind::Name { def, .. } => assert_eq!(Some(tree_dec), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn duplicate_formals_clash() {
        let mut ast = Ast::new();
        let a1 = ast.push_dec(
            span(1),
            DecKind::Var {
                name: sym("a"),
                type_name: None,
                init: None,
                escapable: true,
            },
        );
        let a2 = ast.push_dec(
            span(1),
            DecKind::Var {
                name: sym("a"),
                type_name: None,
                init: None,
                escapable: true,
            },
        );
        let body = int(&mut ast, 0);
        let f = ast.push_dec(
            span(1),
            DecKind::Function {
                name: sym("f"),
                formals: vec![a1, a2],
                result: None,
                body: Some(body),
            },
        );
        let unit = ast.push_exp(span(2), ExpKind::Seq(Vec::new()));
        let program = let_exp(&mut ast, vec![Chunk::Fun(vec![f])], unit);

        let diagnostics = bind_program(&mut ast, program);
        assert_eq!(1, diagnostics.count());
        assert!(messages(&diagnostics)[0].starts_with("redefinition of variable 'a'"));
    }

    #[test]
    fn record_literal_binds_its_type_declaration() {
        let mut ast = Ast::new();
        let int_use = ast.push_ty(
            span(1),
            TyKind::Name {
                name: sym("int"),
                def: None,
            },
        );
        let point_body = ast.push_ty(
            span(1),
            TyKind::Record(vec![Field {
                name: sym("x"),
                type_name: int_use,
                span: span(1),
            }]),
        );
        let point = ast.push_dec(
            span(1),
            DecKind::Type {
                name: sym("point"),
                ty: point_body,
            },
        );
        let point_use = ast.push_ty(
            span(2),
            TyKind::Name {
                name: sym("point"),
                def: None,
            },
        );
        let one = int(&mut ast, 1);
        let literal = ast.push_exp(
            span(2),
            ExpKind::Record {
                type_name: point_use,
                fields: vec![FieldInit {
                    name: sym("x"),
                    init: one,
                    span: span(2),
                }],
                def: None,
            },
        );
        let program = let_exp(&mut ast, vec![Chunk::Type(vec![point])], literal);

        let diagnostics = bind_program(&mut ast, program);
        assert!(!diagnostics.errored());
        match ast[literal].kind {
            ExpKind::Record { def, .. } => assert_eq!(Some(point), def),
            _ => unreachable!(),
        }
    }

    #[test]
    fn one_run_reports_all_errors_in_order() {
        let mut ast = Ast::new();
        let x = use_var(&mut ast, 1, "x");
        let y = use_var(&mut ast, 2, "y");
        let op = ast.push_exp(
            span(1),
            ExpKind::Op {
                oper: Oper::Add,
                left: x,
                right: y,
            },
        );

        let diagnostics = bind_program(&mut ast, op);
        assert_eq!(
            vec!["undeclared variable: x", "undeclared variable: y"],
            messages(&diagnostics)
        );
    }
}
