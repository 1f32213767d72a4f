use std::collections::HashMap;

/// SymbolTable associates a Symbol `S` with a stored value `T`.
pub type SymbolTable<S, T> = HashMap<S, T>;

/// Scoped implements scoping for SymbolTable.
///
/// Lookups search the scope stack innermost-first, so an inner definition
/// shadows an outer one with the same symbol. The table starts out with a
/// single root scope that can never be left.
///
/// The binder runs one instance per namespace (functions, types,
/// variables, methods); instances are never cross-queried.
pub struct Scoped<S, T>
where
    S: std::hash::Hash + Eq + Copy,
{
    root: SymbolTable<S, T>,
    scopes: Vec<SymbolTable<S, T>>,
}

#[derive(Debug)]
pub struct CannotLeaveRootScopeError;

/// Returned by `define` when the symbol is already bound in the current
/// scope; carries the previous value so callers can cite the first
/// definition.
#[derive(Debug, PartialEq)]
pub struct RedefinitionError<T>(pub T);

impl<S, T> Default for Scoped<S, T>
where
    S: std::hash::Hash + Eq + Copy,
{
    fn default() -> Self {
        Scoped::new()
    }
}

impl<S, T> Scoped<S, T>
where
    S: std::hash::Hash + Eq + Copy,
{
    pub fn new() -> Self {
        Scoped {
            root: SymbolTable::new(),
            scopes: Vec::new(),
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(SymbolTable::new())
    }

    pub fn leave_scope(&mut self) -> Result<(), CannotLeaveRootScopeError> {
        self.scopes.pop().ok_or(CannotLeaveRootScopeError)?;
        Ok(())
    }

    /// Number of scopes below the root. 0 means we are at top level.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `sym` in the current scope, refusing to overwrite an existing
    /// binding in that same scope.
    pub fn define(&mut self, sym: S, val: T) -> Result<(), RedefinitionError<T>>
    where
        T: Copy,
    {
        let scope = self.current_scope();
        if let Some(&previous) = scope.get(&sym) {
            return Err(RedefinitionError(previous));
        }
        scope.insert(sym, val);
        Ok(())
    }

    /// Bind `sym` in the current scope unconditionally, shadowing any
    /// previous binding there (used for sequential `var` declarations).
    pub fn insert(&mut self, sym: S, val: T) {
        self.current_scope().insert(sym, val);
    }

    /// Innermost visible binding for `sym`, if any.
    pub fn lookup(&self, sym: S) -> Option<&T> {
        for scope in self.scopes.iter().rev() {
            if let Some(val) = scope.get(&sym) {
                return Some(val);
            }
        }
        self.root.get(&sym)
    }

    pub fn is_defined(&self, sym: S) -> bool {
        self.lookup(sym).is_some()
    }

    fn current_scope(&mut self) -> &mut SymbolTable<S, T> {
        match self.scopes.last_mut() {
            Some(scope) => scope,
            None => &mut self.root,
        }
    }
}
