//! Process-wide string table with amortised O(1) intern on hit
//!
//! Interned strings live for the whole process; the table is never
//! evicted, so a `Symbol` can hand out `&'static str` and compare by
//! pointer identity.
//!
//! [1]: https://users.rust-lang.org/t/get-ref-to-just-inserted-hashset-element/13021

use lazy_static::lazy_static;
use std::{
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// An interned identifier.
///
/// Two symbols are equal iff they were interned from the same spelling;
/// equality and hashing go through the pointer, ordering goes through the
/// textual form so iteration order is stable and meaningful in output.
#[derive(Debug, Clone, Copy, Eq)]
pub struct Symbol(&'static str);

impl Symbol {
    /// Intern `value`, returning the canonical symbol for that spelling.
    pub fn new(value: &str) -> Symbol {
        Symbol(STRING_TABLE.lock().unwrap().intern(value))
    }

    /// A symbol guaranteed to differ from every symbol handed out so far:
    /// the base spelling plus a globally unique numeric suffix.
    pub fn fresh(self) -> Symbol {
        let n = FRESH_COUNTER.fetch_add(1, Ordering::Relaxed);
        Symbol::new(&format!("{}_{}", self.0, n))
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }

    fn as_raw(self) -> *const str {
        self.0 as *const str
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_raw().hash(state)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Symbol) -> bool {
        self.as_raw() as *const u8 as usize == other.as_raw() as *const u8 as usize
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Symbol) -> std::cmp::Ordering {
        self.0.cmp(other.0)
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Symbol) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
struct StringTable {
    entries: HashSet<&'static str>,
}

impl StringTable {
    fn intern(&mut self, value: &str) -> &'static str {
        if let Some(interned) = self.entries.get(value) {
            return interned;
        }
        let leaked: &'static str = Box::leak(value.to_owned().into_boxed_str());
        self.entries.insert(leaked);
        leaked
    }
}

lazy_static! {
    static ref STRING_TABLE: Mutex<StringTable> = Mutex::new(StringTable::default());
}

static FRESH_COUNTER: AtomicUsize = AtomicUsize::new(0);
