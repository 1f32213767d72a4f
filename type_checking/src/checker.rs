//! The type checker.
//!
//! Walks a bound tree, computes a type for every expression, lvalue,
//! type expression and declaration, and reports violations through
//! [`Diagnostics`]. Results are memoized into a [`TypeAnalysis`] side
//! table keyed by the arena handles, which the caller keeps for later
//! stages.
//!
//! Declarations are checked chunk-wise like the binder binds them:
//! function and type chunks get all their headers elaborated before any
//! body, so mutually recursive definitions see each other's signatures.
//! A `type` declaration starts as an unbound named type and is bound to
//! its right-hand side in the body phase; recursive occurrences inside
//! that right-hand side refer to the named type itself.
//!
//! Anything that failed earlier (an unresolved name, a malformed
//! operand) types as `Unknown`, which is compatible with every type, so
//! each fault is reported exactly once.

use ast::{Ast, Chunk, DecId, DecKind, ExpId, ExpKind, Oper, TyId, TyKind, VarId, VarKind};
use diagnostics::{Diagnostics, Phase};
use failure::Fail;
use location::Span;
use log::debug;
use std::collections::HashMap;
use strtab::Symbol;

use crate::type_system::{FieldDef, TypeId, TypeSystem, TypeValue};

#[derive(Debug, Fail)]
pub enum TypeError {
    #[fail(display = "type mismatch: {}: {}, {}: {}", lhs, lhs_ty, rhs, rhs_ty)]
    Mismatch {
        lhs: String,
        lhs_ty: String,
        rhs: String,
        rhs_ty: String,
    },
    #[fail(display = "cannot compare two nil expressions")]
    AmbiguousNil,
    #[fail(display = "not a record type: {}", ty)]
    NotARecord { ty: String },
    #[fail(display = "not an array type: {}", ty)]
    NotAnArray { ty: String },
    #[fail(display = "not a class type: {}", ty)]
    NotAClass { ty: String },
    #[fail(display = "unknown field: {}", name)]
    UnknownField { name: Symbol },
    #[fail(display = "field '{}' initialized out of declaration order", name)]
    FieldOutOfOrder { name: Symbol },
    #[fail(display = "cyclic type alias: {}", name)]
    CyclicTypeAlias { name: Symbol },
}

/// The computed types, keyed by arena handle. Populated during
/// [`check`]; a missing entry means the node was never reached.
#[derive(Debug, Default)]
pub struct TypeAnalysis {
    exp_types: HashMap<ExpId, TypeId>,
    var_types: HashMap<VarId, TypeId>,
    ty_types: HashMap<TyId, TypeId>,
    dec_types: HashMap<DecId, TypeId>,
}

impl TypeAnalysis {
    pub fn new() -> Self {
        TypeAnalysis::default()
    }

    pub fn exp_type(&self, e: ExpId) -> Option<TypeId> {
        self.exp_types.get(&e).copied()
    }

    pub fn var_type(&self, v: VarId) -> Option<TypeId> {
        self.var_types.get(&v).copied()
    }

    pub fn ty_type(&self, t: TyId) -> Option<TypeId> {
        self.ty_types.get(&t).copied()
    }

    pub fn dec_type(&self, d: DecId) -> Option<TypeId> {
        self.dec_types.get(&d).copied()
    }
}

/// Check the program rooted at `program`. Requires a bound tree; the
/// traversal always completes and reports every violation it finds.
pub fn check(
    ast: &Ast,
    program: ExpId,
    ts: &mut TypeSystem,
    diagnostics: &Diagnostics,
) -> TypeAnalysis {
    debug!("type checking program");
    let mut checker = TypeChecker {
        ast,
        ts,
        diagnostics,
        analysis: TypeAnalysis::new(),
    };
    checker.exp_type(program);
    checker.analysis
}

struct TypeChecker<'a> {
    ast: &'a Ast,
    ts: &'a mut TypeSystem,
    diagnostics: &'a Diagnostics,
    analysis: TypeAnalysis,
}

impl TypeChecker<'_> {
    fn error(&self, span: Span, err: &TypeError) {
        self.diagnostics.error(Phase::Type, span, err);
    }

    /// Report unless `lhs_ty` and `rhs_ty` can meet. The descriptions
    /// name the two sides in the message.
    fn check_compat(&self, span: Span, lhs: &str, lhs_ty: TypeId, rhs: &str, rhs_ty: TypeId) {
        if self.ts.compatible(lhs_ty, rhs_ty) {
            return;
        }
        let err = TypeError::Mismatch {
            lhs: lhs.to_string(),
            lhs_ty: self.ts.display(lhs_ty).to_string(),
            rhs: rhs.to_string(),
            rhs_ty: self.ts.display(rhs_ty).to_string(),
        };
        self.error(span, &err);
    }

    fn exp_type(&mut self, e: ExpId) -> TypeId {
        if let Some(ty) = self.analysis.exp_type(e) {
            return ty;
        }
        let ty = self.visit_exp(e);
        self.analysis.exp_types.insert(e, ty);
        ty
    }

    fn visit_exp(&mut self, e: ExpId) -> TypeId {
        let ast = self.ast;
        let span = ast[e].span;
        match &ast[e].kind {
            ExpKind::Nil => self.ts.new_nil(),
            ExpKind::Int(_) => TypeSystem::INT,
            ExpKind::Str(_) => TypeSystem::STRING,
            ExpKind::Var(v) => self.var_type(*v),
            ExpKind::Call { args, def, .. } => {
                for &arg in args {
                    self.exp_type(arg);
                }
                match def {
                    Some(d) => self.routine_result(*d),
                    None => TypeSystem::UNKNOWN,
                }
            }
            ExpKind::MethodCall {
                target, args, def, ..
            } => {
                self.var_type(*target);
                for &arg in args {
                    self.exp_type(arg);
                }
                match def {
                    Some(d) => self.routine_result(*d),
                    None => TypeSystem::UNKNOWN,
                }
            }
            ExpKind::Op { oper, left, right } => {
                let left_ty = self.exp_type(*left);
                let right_ty = self.exp_type(*right);
                self.check_op(span, *oper, left_ty, right_ty);
                TypeSystem::INT
            }
            ExpKind::Record { fields, def, .. } => self.record_exp(span, fields, *def),
            ExpKind::Array {
                type_name,
                size,
                init,
            } => {
                let array_ty = self.ty_type(*type_name);
                let size_ty = self.exp_type(*size);
                let init_ty = self.exp_type(*init);
                self.check_compat(span, "array size", size_ty, "expected", TypeSystem::INT);
                match self.ts[self.ts.actual(array_ty)].clone() {
                    TypeValue::Array { elem } => {
                        self.check_compat(span, "array initializer", init_ty, "element", elem)
                    }
                    TypeValue::Unknown => (),
                    _ => {
                        let err = TypeError::NotAnArray {
                            ty: self.ts.display(array_ty).to_string(),
                        };
                        self.error(span, &err);
                    }
                }
                array_ty
            }
            ExpKind::Object { def, .. } => {
                let ty = match def {
                    Some(d) => self.dec_type(*d),
                    None => TypeSystem::UNKNOWN,
                };
                match self.ts[self.ts.actual(ty)] {
                    TypeValue::Class { .. } | TypeValue::Unknown => (),
                    _ => {
                        let err = TypeError::NotAClass {
                            ty: self.ts.display(ty).to_string(),
                        };
                        self.error(span, &err);
                    }
                }
                ty
            }
            // a sequence takes the type of its last expression; the
            // empty sequence is the unit value
            ExpKind::Seq(exps) => {
                let mut ty = TypeSystem::VOID;
                for &exp in exps {
                    ty = self.exp_type(exp);
                }
                ty
            }
            ExpKind::Assign { var, exp } => {
                let var_ty = self.var_type(*var);
                let exp_ty = self.exp_type(*exp);
                self.check_compat(span, "assigned variable", var_ty, "value", exp_ty);
                var_ty
            }
            ExpKind::If { test, then, els } => {
                let test_ty = self.exp_type(*test);
                self.check_compat(span, "condition", test_ty, "expected", TypeSystem::INT);
                let then_ty = self.exp_type(*then);
                match els {
                    Some(els) => {
                        let else_ty = self.exp_type(*els);
                        self.check_compat(span, "then clause", then_ty, "else clause", else_ty);
                    }
                    None => self.check_compat(
                        span,
                        "then clause without else",
                        then_ty,
                        "expected",
                        TypeSystem::VOID,
                    ),
                }
                then_ty
            }
            ExpKind::While { test, body } => {
                // memoized up front so `break` inside the body can refer
                // to the loop's type
                self.analysis.exp_types.insert(e, TypeSystem::VOID);
                let test_ty = self.exp_type(*test);
                self.check_compat(span, "condition", test_ty, "expected", TypeSystem::INT);
                let body_ty = self.exp_type(*body);
                self.check_compat(span, "loop body", body_ty, "expected", TypeSystem::VOID);
                TypeSystem::VOID
            }
            ExpKind::For { var, hi, body } => {
                self.analysis.exp_types.insert(e, TypeSystem::VOID);
                let var_ty = self.dec_type(*var);
                self.check_compat(span, "loop variable", var_ty, "expected", TypeSystem::INT);
                let hi_ty = self.exp_type(*hi);
                self.check_compat(span, "upper bound", hi_ty, "expected", TypeSystem::INT);
                let body_ty = self.exp_type(*body);
                self.check_compat(span, "loop body", body_ty, "expected", TypeSystem::VOID);
                TypeSystem::VOID
            }
            ExpKind::Break { loop_ } => match loop_ {
                Some(l) => self.exp_type(*l),
                None => TypeSystem::UNKNOWN,
            },
            ExpKind::Let { chunks, body } => {
                for chunk in chunks {
                    self.chunk(chunk);
                }
                let body_ty = self.exp_type(*body);
                self.check_compat(span, "let body", body_ty, "expected", TypeSystem::VOID);
                TypeSystem::VOID
            }
            ExpKind::Cast { exp, ty } => {
                self.exp_type(*exp);
                self.ty_type(*ty)
            }
        }
    }

    fn check_op(&mut self, span: Span, oper: Oper, left_ty: TypeId, right_ty: TypeId) {
        if self.ts.is_nil(left_ty) && self.ts.is_nil(right_ty) {
            self.error(span, &TypeError::AmbiguousNil);
            return;
        }
        if oper.is_comparison() {
            // comparisons accept two ints, two strings, or (for
            // equality on records and classes) two compatible operands
            if self.ts.is_int(left_ty) {
                self.check_compat(span, "right operand", right_ty, "expected", TypeSystem::INT);
            } else if self.ts.is_string(left_ty) {
                self.check_compat(
                    span,
                    "right operand",
                    right_ty,
                    "expected",
                    TypeSystem::STRING,
                );
            } else {
                self.check_compat(span, "left operand", left_ty, "right operand", right_ty);
            }
        } else {
            self.check_compat(span, "left operand", left_ty, "expected", TypeSystem::INT);
            self.check_compat(span, "right operand", right_ty, "expected", TypeSystem::INT);
        }
    }

    fn record_exp(&mut self, span: Span, fields: &[ast::FieldInit], def: Option<DecId>) -> TypeId {
        let dec_ty = match def {
            Some(d) => self.dec_type(d),
            None => TypeSystem::UNKNOWN,
        };
        let declared = match self.ts[self.ts.actual(dec_ty)].clone() {
            TypeValue::Record { fields } => fields,
            TypeValue::Unknown => {
                for field in fields {
                    self.exp_type(field.init);
                }
                return dec_ty;
            }
            _ => {
                let err = TypeError::NotARecord {
                    ty: self.ts.display(dec_ty).to_string(),
                };
                self.error(span, &err);
                for field in fields {
                    self.exp_type(field.init);
                }
                return dec_ty;
            }
        };

        // initializers must name the declared fields in declaration
        // order, so the ordinal position is checked alongside the type
        for (position, field) in fields.iter().enumerate() {
            let init_ty = self.exp_type(field.init);
            match declared.iter().position(|d| d.name == field.name) {
                None => self.error(field.span, &TypeError::UnknownField { name: field.name }),
                Some(index) => {
                    if index != position {
                        self.error(
                            field.span,
                            &TypeError::FieldOutOfOrder { name: field.name },
                        );
                    }
                    self.check_compat(
                        field.span,
                        "field initializer",
                        init_ty,
                        "declared field",
                        declared[index].ty,
                    );
                }
            }
        }
        dec_ty
    }

    fn var_type(&mut self, v: VarId) -> TypeId {
        if let Some(ty) = self.analysis.var_type(v) {
            return ty;
        }
        let ty = self.visit_var(v);
        self.analysis.var_types.insert(v, ty);
        ty
    }

    fn visit_var(&mut self, v: VarId) -> TypeId {
        let ast = self.ast;
        let span = ast[v].span;
        match &ast[v].kind {
            VarKind::Simple { def, .. } => match def {
                Some(d) => self.dec_type(*d),
                None => TypeSystem::UNKNOWN,
            },
            VarKind::Field { var, name } => {
                let subject = self.var_type(*var);
                let actual = self.ts.actual(subject);
                match &self.ts[actual] {
                    TypeValue::Record { .. } => match self.ts.field_type(actual, *name) {
                        Some(ty) => ty,
                        None => {
                            self.error(span, &TypeError::UnknownField { name: *name });
                            TypeSystem::UNKNOWN
                        }
                    },
                    TypeValue::Class { .. } => match self.ts.attr_type(actual, *name) {
                        Some(ty) => ty,
                        None => {
                            self.error(span, &TypeError::UnknownField { name: *name });
                            TypeSystem::UNKNOWN
                        }
                    },
                    TypeValue::Unknown => TypeSystem::UNKNOWN,
                    _ => {
                        let err = TypeError::NotARecord {
                            ty: self.ts.display(subject).to_string(),
                        };
                        self.error(span, &err);
                        TypeSystem::UNKNOWN
                    }
                }
            }
            VarKind::Subscript { var, index } => {
                let subject = self.var_type(*var);
                let index_ty = self.exp_type(*index);
                self.check_compat(span, "index", index_ty, "expected", TypeSystem::INT);
                match self.ts[self.ts.actual(subject)] {
                    TypeValue::Array { elem } => elem,
                    TypeValue::Unknown => TypeSystem::UNKNOWN,
                    _ => {
                        let err = TypeError::NotAnArray {
                            ty: self.ts.display(subject).to_string(),
                        };
                        self.error(span, &err);
                        TypeSystem::UNKNOWN
                    }
                }
            }
        }
    }

    fn ty_type(&mut self, t: TyId) -> TypeId {
        if let Some(ty) = self.analysis.ty_type(t) {
            return ty;
        }
        let ty = self.visit_ty(t);
        self.analysis.ty_types.insert(t, ty);
        ty
    }

    fn visit_ty(&mut self, t: TyId) -> TypeId {
        let ast = self.ast;
        match &ast[t].kind {
            TyKind::Name { name, def } => match def {
                Some(d) => self.dec_type(*d),
                None if name.as_str() == "int" => TypeSystem::INT,
                None if name.as_str() == "string" => TypeSystem::STRING,
                None => TypeSystem::UNKNOWN,
            },
            TyKind::Record(fields) => {
                let defs = fields
                    .iter()
                    .map(|field| FieldDef {
                        name: field.name,
                        ty: self.ty_type(field.type_name),
                    })
                    .collect();
                self.ts.new_record(defs)
            }
            TyKind::Array(elem) => {
                let elem_ty = self.ty_type(*elem);
                self.ts.new_array(elem_ty)
            }
            TyKind::Class { extends, chunks } => self.class_ty(ast[t].span, extends, chunks),
        }
    }

    fn class_ty(&mut self, span: Span, extends: &Option<TyId>, chunks: &[Chunk]) -> TypeId {
        let super_class = match extends {
            Some(super_name) => {
                let ty = self.ty_type(*super_name);
                let actual = self.ts.actual(ty);
                match self.ts[actual] {
                    TypeValue::Class { .. } => actual,
                    TypeValue::Unknown => TypeSystem::OBJECT,
                    _ => {
                        let err = TypeError::NotAClass {
                            ty: self.ts.display(ty).to_string(),
                        };
                        self.error(span, &err);
                        TypeSystem::OBJECT
                    }
                }
            }
            None => TypeSystem::OBJECT,
        };

        let ast = self.ast;
        let mut attrs = Vec::new();
        let mut methods = Vec::new();
        for chunk in chunks {
            match chunk {
                Chunk::Var(decs) => {
                    for &d in decs {
                        attrs.push(FieldDef {
                            name: ast[d].name(),
                            ty: self.dec_type(d),
                        });
                    }
                }
                Chunk::Method(decs) => {
                    for &d in decs {
                        methods.push(FieldDef {
                            name: ast[d].name(),
                            ty: self.dec_type(d),
                        });
                    }
                    for &d in decs {
                        self.routine_body(d);
                    }
                }
                _ => unreachable!("class bodies hold only attributes and methods"),
            }
        }
        self.ts.new_class(Some(super_class), attrs, methods)
    }

    fn dec_type(&mut self, d: DecId) -> TypeId {
        if let Some(ty) = self.analysis.dec_type(d) {
            return ty;
        }
        let ty = self.visit_dec_header(d);
        self.analysis.dec_types.insert(d, ty);
        ty
    }

    /// The declaration's type from its signature only; bodies are
    /// checked separately by [`TypeChecker::chunk`] once every header
    /// of the chunk is known.
    fn visit_dec_header(&mut self, d: DecId) -> TypeId {
        let ast = self.ast;
        let span = ast[d].span;
        match &ast[d].kind {
            DecKind::Var {
                type_name, init, ..
            } => match (type_name, init) {
                (None, Some(init)) => self.exp_type(*init),
                (Some(t), init) => {
                    let declared = self.ty_type(*t);
                    if let Some(init) = init {
                        let init_ty = self.exp_type(*init);
                        self.check_compat(span, "declared type", declared, "initializer", init_ty);
                    }
                    declared
                }
                // a formal the parser left unannotated
                (None, None) => TypeSystem::UNKNOWN,
            },
            DecKind::Function {
                formals, result, ..
            }
            | DecKind::Method {
                formals, result, ..
            } => {
                let formal_defs: Vec<FieldDef> = formals
                    .iter()
                    .map(|&f| FieldDef {
                        name: ast[f].name(),
                        ty: self.dec_type(f),
                    })
                    .collect();
                let result_ty = match result {
                    Some(t) => self.ty_type(*t),
                    None => TypeSystem::VOID,
                };
                self.ts.new_function(formal_defs, result_ty)
            }
            DecKind::Type { name, .. } => self.ts.new_named(*name),
        }
    }

    fn routine_result(&mut self, d: DecId) -> TypeId {
        let ty = self.dec_type(d);
        match &self.ts[ty] {
            TypeValue::Function { result, .. } => *result,
            _ => TypeSystem::UNKNOWN,
        }
    }

    fn routine_body(&mut self, d: DecId) {
        let ast = self.ast;
        let body = match &ast[d].kind {
            DecKind::Function {
                body: Some(body), ..
            }
            | DecKind::Method {
                body: Some(body), ..
            } => *body,
            _ => return,
        };
        let body_ty = self.exp_type(body);
        let result_ty = self.routine_result(d);
        self.check_compat(ast[d].span, "body", body_ty, "declared result", result_ty);
    }

    fn type_dec_body(&mut self, d: DecId) {
        let named = self.dec_type(d);
        let ast = self.ast;
        if let DecKind::Type { name, ty } = &ast[d].kind {
            let underlying = self.ty_type(*ty);
            // `type a = b  type b = a` would close a named cycle and
            // make every later `actual` walk diverge. Refuse it here
            // and poison the alias instead.
            if self.ts.names_reach(underlying, named) {
                self.error(ast[d].span, &TypeError::CyclicTypeAlias { name: *name });
                self.ts.bind_named(named, TypeSystem::UNKNOWN);
            } else {
                self.ts.bind_named(named, underlying);
            }
        }
    }

    /// Chunks check the way they bind: headers first, then bodies.
    fn chunk(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::Var(decs) => {
                for &d in decs {
                    self.dec_type(d);
                }
            }
            Chunk::Fun(decs) | Chunk::Method(decs) => {
                for &d in decs {
                    self.dec_type(d);
                }
                for &d in decs {
                    self.routine_body(d);
                }
            }
            Chunk::Type(decs) => {
                for &d in decs {
                    self.dec_type(d);
                }
                for &d in decs {
                    self.type_dec_body(d);
                }
            }
        }
    }
}
