use rustc_hash::{FxHashMap, FxHashSet};

use crate::kind::Kind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub kind: Kind,
    /// Line of the binding's first assignment.
    pub line: usize,
}

pub type Globals = FxHashMap<String, Symbol>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Local(Kind),
    Global(Kind),
    /// A global that exists but is defined below the reading function.
    Later(usize),
    Missing,
}

/// Names visible while inferring one function body, or the module itself
/// when there is no enclosing global scope.
#[derive(Debug)]
pub struct Scope<'g> {
    globals: Option<&'g Globals>,
    start_line: usize,
    locals: FxHashMap<String, Symbol>,
    global_decls: FxHashSet<String>,
    globals_read: FxHashSet<String>,
}

impl Scope<'static> {
    pub fn module() -> Self {
        Self {
            globals: None,
            start_line: 0,
            locals: FxHashMap::default(),
            global_decls: FxHashSet::default(),
            globals_read: FxHashSet::default(),
        }
    }
}

impl<'g> Scope<'g> {
    pub fn function(globals: &'g Globals, start_line: usize) -> Self {
        Self {
            globals: Some(globals),
            start_line,
            locals: FxHashMap::default(),
            global_decls: FxHashSet::default(),
            globals_read: FxHashSet::default(),
        }
    }

    pub fn is_module(&self) -> bool {
        self.globals.is_none()
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        if !self.global_decls.contains(name)
            && let Some(symbol) = self.locals.get(name)
        {
            return Lookup::Local(symbol.kind.clone());
        }
        match self.globals.and_then(|globals| globals.get(name)) {
            Some(symbol) if symbol.line < self.start_line => Lookup::Global(symbol.kind.clone()),
            Some(symbol) => Lookup::Later(symbol.line),
            None => Lookup::Missing,
        }
    }

    pub fn declare(&mut self, name: &str, kind: Kind, line: usize) {
        self.locals
            .insert(name.to_string(), Symbol { kind, line });
    }

    pub fn remove(&mut self, name: &str) {
        self.locals.remove(name);
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    pub fn declare_global(&mut self, name: &str) {
        self.global_decls.insert(name.to_string());
    }

    pub fn is_declared_global(&self, name: &str) -> bool {
        self.global_decls.contains(name)
    }

    pub fn mark_global_read(&mut self, name: &str) {
        self.globals_read.insert(name.to_string());
    }

    pub fn was_global_read(&self, name: &str) -> bool {
        self.globals_read.contains(name)
    }

    pub fn into_symbols(self) -> FxHashMap<String, Symbol> {
        self.locals
    }
}
