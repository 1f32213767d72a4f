//! The arena of types and the queries defined on them.
//!
//! Types are interned into a [`TypeSystem`] and addressed by copyable
//! [`TypeId`] handles; all structural queries (actual type, field
//! lookup, compatibility, class ancestry) go through the arena. The
//! builtins exist exactly once, so comparing their handles is comparing
//! the types. `nil` and named types are deliberately *not* shared: each
//! `nil` literal and each `type` declaration gets its own entry.

use itertools::Itertools;
use std::fmt;
use strtab::Symbol;

/// Handle into [`TypeSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

/// A named, typed slot: record field, class attribute or method entry,
/// function formal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Symbol,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeValue {
    Int,
    String,
    /// The type of expressions computed for their effect only.
    Void,
    /// The type of one `nil` literal; compatible with any record or
    /// class type but with no concrete type of its own.
    Nil,
    /// The poison type standing in for anything that already failed to
    /// bind or to check. Compatible with everything, so a single error
    /// is reported once instead of cascading.
    Unknown,
    Array {
        elem: TypeId,
    },
    Record {
        fields: Vec<FieldDef>,
    },
    Function {
        formals: Vec<FieldDef>,
        result: TypeId,
    },
    /// A `type` declaration. `binding` is filled once the right-hand
    /// side has been elaborated; until then the name may be referred to
    /// but not inspected, which is what recursive types need.
    Named {
        name: Symbol,
        binding: Option<TypeId>,
    },
    /// `class_id`s are handed out in elaboration order, so in a sound
    /// hierarchy every class has a strictly smaller id than all of its
    /// subclasses.
    Class {
        class_id: u32,
        super_class: Option<TypeId>,
        attrs: Vec<FieldDef>,
        methods: Vec<FieldDef>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Member {
    Attr,
    Method,
}

pub struct TypeSystem {
    types: Vec<TypeValue>,
    next_class_id: u32,
}

impl Default for TypeSystem {
    fn default() -> Self {
        TypeSystem::new()
    }
}

impl TypeSystem {
    pub const INT: TypeId = TypeId(0);
    pub const STRING: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const UNKNOWN: TypeId = TypeId(3);
    /// The root of the class hierarchy; every class without an
    /// `extends` clause derives from it.
    pub const OBJECT: TypeId = TypeId(4);

    pub fn new() -> Self {
        let mut ts = TypeSystem {
            types: vec![
                TypeValue::Int,
                TypeValue::String,
                TypeValue::Void,
                TypeValue::Unknown,
            ],
            next_class_id: 0,
        };
        let object = ts.new_class(None, Vec::new(), Vec::new());
        debug_assert_eq!(Self::OBJECT, object);
        ts
    }

    fn push(&mut self, value: TypeValue) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(value);
        id
    }

    /// A fresh `nil` type. One per literal: two nils must not compare
    /// equal by handle, their meaning comes from the context.
    pub fn new_nil(&mut self) -> TypeId {
        self.push(TypeValue::Nil)
    }

    pub fn new_array(&mut self, elem: TypeId) -> TypeId {
        self.push(TypeValue::Array { elem })
    }

    pub fn new_record(&mut self, fields: Vec<FieldDef>) -> TypeId {
        self.push(TypeValue::Record { fields })
    }

    pub fn new_function(&mut self, formals: Vec<FieldDef>, result: TypeId) -> TypeId {
        self.push(TypeValue::Function { formals, result })
    }

    pub fn new_named(&mut self, name: Symbol) -> TypeId {
        self.push(TypeValue::Named {
            name,
            binding: None,
        })
    }

    pub fn new_class(
        &mut self,
        super_class: Option<TypeId>,
        attrs: Vec<FieldDef>,
        methods: Vec<FieldDef>,
    ) -> TypeId {
        let class_id = self.next_class_id;
        self.next_class_id += 1;
        self.push(TypeValue::Class {
            class_id,
            super_class,
            attrs,
            methods,
        })
    }

    /// Bind a named type to its elaborated right-hand side. Each named
    /// type is bound exactly once.
    pub fn bind_named(&mut self, named: TypeId, target: TypeId) {
        match &mut self.types[named.0 as usize] {
            TypeValue::Named { binding, .. } => {
                debug_assert!(binding.is_none(), "named type bound twice");
                *binding = Some(target);
            }
            other => panic!("bind_named on {:?}", other),
        }
    }

    /// Whether the chain of named indirections starting at `from`
    /// passes through `target`. `bind_named` callers use this to refuse
    /// closing an alias cycle, which keeps every `actual` walk finite.
    pub fn names_reach(&self, from: TypeId, target: TypeId) -> bool {
        let mut id = from;
        loop {
            if id == target {
                return true;
            }
            match self[id] {
                TypeValue::Named {
                    binding: Some(next),
                    ..
                } => id = next,
                _ => return false,
            }
        }
    }

    /// Strip named indirections. An unbound named type (a recursive
    /// definition under construction) is its own actual type.
    pub fn actual(&self, id: TypeId) -> TypeId {
        let mut id = id;
        while let TypeValue::Named {
            binding: Some(target),
            ..
        } = self[id]
        {
            id = target;
        }
        id
    }

    pub fn is_int(&self, id: TypeId) -> bool {
        self.actual(id) == Self::INT
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        self.actual(id) == Self::STRING
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        self.actual(id) == Self::VOID
    }

    pub fn is_nil(&self, id: TypeId) -> bool {
        matches!(self[self.actual(id)], TypeValue::Nil)
    }

    pub fn is_unknown(&self, id: TypeId) -> bool {
        matches!(self[self.actual(id)], TypeValue::Unknown)
    }

    /// Whether a value of type `b` is acceptable where `a` is expected.
    /// The relation is symmetric: it answers "can these two meet", the
    /// caller decides who was expected.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        let a = self.actual(a);
        let b = self.actual(b);
        if a == b {
            return true;
        }
        match (&self[a], &self[b]) {
            (TypeValue::Unknown, _) | (_, TypeValue::Unknown) => true,
            // two nils are *not* compatible with each other; without a
            // record or class on one side there is nothing to agree on
            (TypeValue::Nil, TypeValue::Record { .. })
            | (TypeValue::Nil, TypeValue::Class { .. })
            | (TypeValue::Record { .. }, TypeValue::Nil)
            | (TypeValue::Class { .. }, TypeValue::Nil) => true,
            (TypeValue::Record { fields: a_fields }, TypeValue::Record { fields: b_fields }) => {
                a_fields.len() == b_fields.len()
                    && a_fields
                        .iter()
                        .zip(b_fields)
                        .all(|(x, y)| x.name == y.name && self.field_compatible(x.ty, y.ty))
            }
            (TypeValue::Class { .. }, TypeValue::Class { .. }) => {
                self.common_root(a, b).is_some()
            }
            _ => false,
        }
    }

    /// Field-wise compatibility for structural record comparison:
    /// identical actual types, or `nil` against anything.
    fn field_compatible(&self, a: TypeId, b: TypeId) -> bool {
        let a = self.actual(a);
        let b = self.actual(b);
        a == b || matches!(self[a], TypeValue::Nil) || matches!(self[b], TypeValue::Nil)
    }

    pub fn field_index(&self, record: TypeId, name: Symbol) -> Option<usize> {
        match &self[self.actual(record)] {
            TypeValue::Record { fields } => fields.iter().position(|f| f.name == name),
            _ => None,
        }
    }

    pub fn field_type(&self, record: TypeId, name: Symbol) -> Option<TypeId> {
        match &self[self.actual(record)] {
            TypeValue::Record { fields } => {
                fields.iter().find(|f| f.name == name).map(|f| f.ty)
            }
            _ => None,
        }
    }

    /// Attribute lookup through the superclass chain.
    pub fn attr_type(&self, class: TypeId, name: Symbol) -> Option<TypeId> {
        self.member_type(class, name, Member::Attr)
    }

    /// Method lookup through the superclass chain.
    pub fn method_type(&self, class: TypeId, name: Symbol) -> Option<TypeId> {
        self.member_type(class, name, Member::Method)
    }

    fn member_type(&self, class: TypeId, name: Symbol, member: Member) -> Option<TypeId> {
        let mut current = self.actual(class);
        loop {
            match &self[current] {
                TypeValue::Class {
                    super_class,
                    attrs,
                    methods,
                    ..
                } => {
                    let members = match member {
                        Member::Attr => attrs,
                        Member::Method => methods,
                    };
                    if let Some(found) = members.iter().find(|m| m.name == name) {
                        return Some(found.ty);
                    }
                    current = self.actual((*super_class)?);
                }
                _ => return None,
            }
        }
    }

    /// The closest common ancestor of two classes, if both sit in the
    /// same hierarchy. The ancestry of a class includes itself, so the
    /// common root of a class and its superclass is the superclass.
    pub fn common_root(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let a_chain = self.ancestry(a)?;
        for candidate in self.ancestry(b)? {
            if a_chain.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// The class itself followed by its superclasses up to the root.
    /// `None` when the type is not a class.
    fn ancestry(&self, class: TypeId) -> Option<Vec<TypeId>> {
        let mut chain = Vec::new();
        let mut current = self.actual(class);
        loop {
            match &self[current] {
                TypeValue::Class { super_class, .. } => {
                    chain.push(current);
                    match super_class {
                        Some(parent) => current = self.actual(*parent),
                        None => return Some(chain),
                    }
                }
                _ => return None,
            }
        }
    }

    /// A hierarchy is sound when every class was elaborated after all
    /// of its ancestors, i.e. ids strictly decrease walking up. An
    /// inheritance cycle revisits a class and fails this check.
    pub fn sound(&self, class: TypeId) -> bool {
        let mut current = self.actual(class);
        let mut current_id = match self[current] {
            TypeValue::Class { class_id, .. } => class_id,
            _ => return false,
        };
        loop {
            match &self[current] {
                TypeValue::Class {
                    class_id,
                    super_class,
                    ..
                } => {
                    if *class_id > current_id {
                        return false;
                    }
                    current_id = *class_id;
                    match super_class {
                        Some(parent) => current = self.actual(*parent),
                        None => return true,
                    }
                }
                _ => return false,
            }
        }
    }

    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { ts: self, id }
    }
}

impl std::ops::Index<TypeId> for TypeSystem {
    type Output = TypeValue;
    fn index(&self, id: TypeId) -> &TypeValue {
        &self.types[id.0 as usize]
    }
}

pub struct TypeDisplay<'t> {
    ts: &'t TypeSystem,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ts[self.id] {
            TypeValue::Int => write!(f, "int"),
            TypeValue::String => write!(f, "string"),
            TypeValue::Void => write!(f, "void"),
            TypeValue::Nil => write!(f, "nil"),
            TypeValue::Unknown => write!(f, "?"),
            TypeValue::Array { elem } => write!(f, "array of {}", self.ts.display(*elem)),
            TypeValue::Record { fields } => write!(
                f,
                "{{ {} }}",
                fields
                    .iter()
                    .map(|field| format!("{} : {}", field.name, self.ts.display(field.ty)))
                    .join(", ")
            ),
            TypeValue::Function { formals, result } => write!(
                f,
                "({}) -> {}",
                formals
                    .iter()
                    .map(|formal| self.ts.display(formal.ty).to_string())
                    .join(", "),
                self.ts.display(*result)
            ),
            TypeValue::Named { name, .. } => write!(f, "{}", name),
            TypeValue::Class { class_id, .. } => write!(f, "class #{}", class_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn builtins_are_their_own_actual_types() {
        let ts = TypeSystem::new();
        assert_eq!(TypeSystem::INT, ts.actual(TypeSystem::INT));
        assert!(ts.is_int(TypeSystem::INT));
        assert!(ts.is_string(TypeSystem::STRING));
        assert!(ts.is_void(TypeSystem::VOID));
        assert!(!ts.is_int(TypeSystem::STRING));
    }

    #[test]
    fn actual_follows_named_chains() {
        let mut ts = TypeSystem::new();
        let a = ts.new_named(sym("a"));
        let b = ts.new_named(sym("b"));
        ts.bind_named(b, TypeSystem::INT);
        ts.bind_named(a, b);

        assert_eq!(TypeSystem::INT, ts.actual(a));
        assert!(ts.is_int(a));
    }

    #[test]
    fn unbound_named_type_is_its_own_actual() {
        let mut ts = TypeSystem::new();
        let a = ts.new_named(sym("a"));
        assert_eq!(a, ts.actual(a));
    }

    #[test]
    fn names_reach_sees_through_bound_aliases() {
        let mut ts = TypeSystem::new();
        let a = ts.new_named(sym("a"));
        let b = ts.new_named(sym("b"));
        ts.bind_named(a, b);

        // binding b back to a would close a cycle
        assert!(ts.names_reach(a, b));
        assert!(ts.names_reach(a, a));
        assert!(!ts.names_reach(b, a));
        assert!(!ts.names_reach(TypeSystem::INT, a));
    }

    #[test]
    fn each_nil_is_fresh_but_compatible_with_records() {
        let mut ts = TypeSystem::new();
        let n1 = ts.new_nil();
        let n2 = ts.new_nil();
        assert_ne!(n1, n2);
        // two nils do not make a type
        assert!(!ts.compatible(n1, n2));

        let rec = ts.new_record(vec![FieldDef {
            name: sym("x"),
            ty: TypeSystem::INT,
        }]);
        assert!(ts.compatible(n1, rec));
        assert!(ts.compatible(rec, n1));
        // nil against a value type stays incompatible
        assert!(!ts.compatible(n1, TypeSystem::INT));
    }

    #[test]
    fn unknown_is_compatible_with_everything() {
        let mut ts = TypeSystem::new();
        let n = ts.new_nil();
        assert!(ts.compatible(TypeSystem::UNKNOWN, TypeSystem::INT));
        assert!(ts.compatible(TypeSystem::STRING, TypeSystem::UNKNOWN));
        assert!(ts.compatible(TypeSystem::UNKNOWN, n));
    }

    #[test]
    fn records_compare_structurally_in_field_order() {
        let mut ts = TypeSystem::new();
        let a = ts.new_record(vec![
            FieldDef {
                name: sym("x"),
                ty: TypeSystem::INT,
            },
            FieldDef {
                name: sym("y"),
                ty: TypeSystem::STRING,
            },
        ]);
        let same = ts.new_record(vec![
            FieldDef {
                name: sym("x"),
                ty: TypeSystem::INT,
            },
            FieldDef {
                name: sym("y"),
                ty: TypeSystem::STRING,
            },
        ]);
        let reordered = ts.new_record(vec![
            FieldDef {
                name: sym("y"),
                ty: TypeSystem::STRING,
            },
            FieldDef {
                name: sym("x"),
                ty: TypeSystem::INT,
            },
        ]);
        let shorter = ts.new_record(vec![FieldDef {
            name: sym("x"),
            ty: TypeSystem::INT,
        }]);

        assert!(ts.compatible(a, same));
        assert!(!ts.compatible(a, reordered));
        assert!(!ts.compatible(a, shorter));
    }

    #[test]
    fn arrays_are_compatible_by_identity_only() {
        let mut ts = TypeSystem::new();
        let a = ts.new_array(TypeSystem::INT);
        let b = ts.new_array(TypeSystem::INT);
        assert!(ts.compatible(a, a));
        // same shape, distinct declarations
        assert!(!ts.compatible(a, b));
    }

    #[test]
    fn field_lookup_respects_declaration_order() {
        let mut ts = TypeSystem::new();
        let rec = ts.new_record(vec![
            FieldDef {
                name: sym("head"),
                ty: TypeSystem::INT,
            },
            FieldDef {
                name: sym("tail"),
                ty: TypeSystem::STRING,
            },
        ]);
        assert_eq!(Some(0), ts.field_index(rec, sym("head")));
        assert_eq!(Some(1), ts.field_index(rec, sym("tail")));
        assert_eq!(None, ts.field_index(rec, sym("missing")));
        assert_eq!(Some(TypeSystem::INT), ts.field_type(rec, sym("head")));
    }

    #[test]
    fn classes_share_the_object_root() {
        let mut ts = TypeSystem::new();
        let a = ts.new_class(Some(TypeSystem::OBJECT), Vec::new(), Vec::new());
        let b = ts.new_class(Some(TypeSystem::OBJECT), Vec::new(), Vec::new());
        let a_child = ts.new_class(Some(a), Vec::new(), Vec::new());

        assert_eq!(Some(TypeSystem::OBJECT), ts.common_root(a, b));
        assert_eq!(Some(a), ts.common_root(a, a_child));
        assert!(ts.compatible(a, a_child));
        assert!(ts.compatible(a, b));
    }

    #[test]
    fn attribute_lookup_walks_the_super_chain() {
        let mut ts = TypeSystem::new();
        let base = ts.new_class(
            Some(TypeSystem::OBJECT),
            vec![FieldDef {
                name: sym("x"),
                ty: TypeSystem::INT,
            }],
            Vec::new(),
        );
        let derived = ts.new_class(
            Some(base),
            vec![FieldDef {
                name: sym("y"),
                ty: TypeSystem::STRING,
            }],
            Vec::new(),
        );

        assert_eq!(Some(TypeSystem::INT), ts.attr_type(derived, sym("x")));
        assert_eq!(Some(TypeSystem::STRING), ts.attr_type(derived, sym("y")));
        assert_eq!(None, ts.attr_type(base, sym("y")));
    }

    #[test]
    fn elaboration_order_makes_hierarchies_sound() {
        let mut ts = TypeSystem::new();
        let base = ts.new_class(Some(TypeSystem::OBJECT), Vec::new(), Vec::new());
        let derived = ts.new_class(Some(base), Vec::new(), Vec::new());
        assert!(ts.sound(TypeSystem::OBJECT));
        assert!(ts.sound(base));
        assert!(ts.sound(derived));

        // a class extending one elaborated later is not sound
        let late = ts.new_class(Some(TypeSystem::OBJECT), Vec::new(), Vec::new());
        let early = ts.new_class(Some(late), Vec::new(), Vec::new());
        // artificial: point `late` at `early` to close a cycle
        if let TypeValue::Class { super_class, .. } = &mut ts.types[late.0 as usize] {
            *super_class = Some(early);
        }
        assert!(!ts.sound(late));
    }

    #[test]
    fn display_renders_source_like_types() {
        let mut ts = TypeSystem::new();
        let arr = ts.new_array(TypeSystem::INT);
        assert_eq!("array of int", ts.display(arr).to_string());

        let rec = ts.new_record(vec![
            FieldDef {
                name: sym("x"),
                ty: TypeSystem::INT,
            },
            FieldDef {
                name: sym("s"),
                ty: TypeSystem::STRING,
            },
        ]);
        assert_eq!("{ x : int, s : string }", ts.display(rec).to_string());

        let f = ts.new_function(
            vec![FieldDef {
                name: sym("a"),
                ty: TypeSystem::INT,
            }],
            TypeSystem::VOID,
        );
        assert_eq!("(int) -> void", ts.display(f).to_string());
    }
}
