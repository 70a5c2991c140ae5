use std::collections::{HashMap, HashSet};

/// Where a name lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    /// The function currently being compiled, loaded with `OpCurrentClosure`.
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
    pub immutable: bool,
    /// Module of a `Builtin` symbol; 0 (core) otherwise.
    pub module_index: u8,
}

/// Names visible in one function (or the program root).
///
/// Tables nest through an owned `outer` link: entering a function moves the
/// current table into the new table's `outer`, leaving moves it back out.
///
/// Blocks do not get a table of their own. `enter_block`/`leave_block` hide
/// names defined inside a block once it closes, while slot indices keep
/// counting up so a block never reuses a live slot.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    free_symbols: Vec<Symbol>,
    num_definitions: usize,
    /// Bindings shadowed by `define_builtin`, restored by `remove_builtin`.
    builtin_removals: HashMap<String, Vec<Symbol>>,
    /// One frame per open block: the names defined in it and what they hid.
    blocks: Vec<Vec<(String, Option<Symbol>)>>,
    /// Definitions made by a module's source, keyed `module.name`. They take
    /// slots like any global but are not names of the importing program.
    members: HashMap<String, Symbol>,
    /// Slots of this table that hold a module handle.
    module_slots: HashSet<usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.outer.is_none()
    }

    pub fn define(&mut self, name: &str, immutable: bool) -> Symbol {
        let scope = if self.is_root() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
            immutable,
            module_index: 0,
        };
        self.num_definitions += 1;

        let prior = self.store.insert(name.to_string(), symbol.clone());
        if let Some(block) = self.blocks.last_mut() {
            block.push((name.to_string(), prior));
        }
        symbol
    }

    /// Defines `name` of `module` as `module.name`, outside the program's
    /// own names.
    pub fn define_member(&mut self, module: &str, name: &str, immutable: bool) -> Symbol {
        let qualified = format!("{}.{}", module, name);
        let scope = if self.is_root() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: qualified.clone(),
            scope,
            index: self.num_definitions,
            immutable,
            module_index: 0,
        };
        self.num_definitions += 1;
        self.members.insert(qualified, symbol.clone());
        symbol
    }

    /// Records that `symbol`, defined in this table, holds a module handle.
    pub fn mark_module(&mut self, symbol: &Symbol) {
        self.module_slots.insert(symbol.index);
    }

    /// Whether `name` currently resolves to a binding marked by
    /// `mark_module`. A parameter, local or later definition of the same name
    /// hides the module.
    pub fn is_module(&self, name: &str) -> bool {
        match self.store.get(name) {
            Some(symbol) => self.binds_module(symbol),
            None => self.outer.as_ref().is_some_and(|outer| outer.is_module(name)),
        }
    }

    fn binds_module(&self, symbol: &Symbol) -> bool {
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Local => self.module_slots.contains(&symbol.index),
            SymbolScope::Free => match (self.free_symbols.get(symbol.index), &self.outer) {
                (Some(original), Some(outer)) => outer.binds_module(original),
                _ => false,
            },
            SymbolScope::Builtin | SymbolScope::Function => false,
        }
    }

    /// Installs builtin `index` of module `module_index` under `name`.
    ///
    /// An existing binding of `name` in this table is stashed and comes back
    /// when the builtin is removed.
    pub fn define_builtin(&mut self, index: usize, name: &str, module_index: u8) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
            immutable: true,
            module_index,
        };
        if let Some(prior) = self.store.insert(name.to_string(), symbol.clone()) {
            self.builtin_removals
                .entry(name.to_string())
                .or_default()
                .push(prior);
        }
        symbol
    }

    /// Undoes the most recent `define_builtin(name)`.
    ///
    /// A binding that replaced the builtin in the meantime (a definition made
    /// by `import m.*`) is left in place.
    pub fn remove_builtin(&mut self, name: &str) {
        let prior = self
            .builtin_removals
            .get_mut(name)
            .and_then(|stack| stack.pop());
        if self
            .builtin_removals
            .get(name)
            .is_some_and(|stack| stack.is_empty())
        {
            self.builtin_removals.remove(name);
        }

        let current_is_builtin = self
            .store
            .get(name)
            .is_some_and(|s| s.scope == SymbolScope::Builtin);
        if !current_is_builtin {
            return;
        }
        match prior {
            Some(symbol) => {
                self.store.insert(name.to_string(), symbol);
            }
            None => {
                self.store.remove(name);
            }
        }
    }

    /// Binds `name` to the function whose body this table belongs to.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
            immutable: true,
            module_index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
            immutable: original.immutable,
            module_index: 0,
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Looks `name` up here and then outward.
    ///
    /// A `Local`, `Free` or `Function` symbol found in an enclosing function
    /// is captured: it is appended to `free_symbols` and rebound here as
    /// `Free`, so later lookups hit the capture directly.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name).or_else(|| self.members.get(name)) {
            return Some(symbol.clone());
        }
        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free | SymbolScope::Function => {
                Some(self.define_free(symbol))
            }
        }
    }

    /// Whether `name` resolves anywhere, without capturing it.
    pub fn is_resolvable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// The binding `name` resolves to, without capturing it. A capture made
    /// earlier is reported as the `Free` symbol it became.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.store
            .get(name)
            .or_else(|| self.members.get(name))
            .or_else(|| self.outer.as_ref()?.lookup(name))
    }

    /// Looks `name` up in this table only.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.store.get(name)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.store.values()
    }

    /// A definition made by `module`'s source during a qualified import.
    pub fn member(&self, module: &str, name: &str) -> Option<&Symbol> {
        self.members.get(&format!("{}.{}", module, name))
    }

    pub fn members(&self) -> impl Iterator<Item = &Symbol> {
        self.members.values()
    }

    /// Captured symbols, in first-reference order, as seen by the enclosing table.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    pub fn enter_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    pub fn leave_block(&mut self) {
        let Some(defined) = self.blocks.pop() else {
            return;
        };
        for (name, prior) in defined.into_iter().rev() {
            match prior {
                Some(symbol) => {
                    self.store.insert(name, symbol);
                }
                None => {
                    self.store.remove(&name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            scope,
            index,
            immutable: false,
            module_index: 0,
        }
    }

    #[test]
    fn test_define_global_and_local() {
        let mut global = SymbolTable::new();
        assert_eq!(global.define("a", false), sym("a", SymbolScope::Global, 0));
        assert_eq!(global.define("b", false), sym("b", SymbolScope::Global, 1));

        let mut local = SymbolTable::new_enclosed(global);
        assert_eq!(local.define("c", false), sym("c", SymbolScope::Local, 0));
        assert_eq!(local.resolve("a"), Some(sym("a", SymbolScope::Global, 0)));
    }

    #[test]
    fn test_resolve_promotes_free_in_first_reference_order() {
        let mut global = SymbolTable::new();
        global.define("g", false);

        let mut first = SymbolTable::new_enclosed(global);
        first.define("x", false);
        first.define("y", true);
        first.define("z", false);

        let mut second = SymbolTable::new_enclosed(first);
        for name in ["x", "y", "x", "z", "g"] {
            second.resolve(name).unwrap();
        }

        let free: Vec<&str> = second
            .free_symbols()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(free, vec!["x", "y", "z"]);

        let y = second.resolve("y").unwrap();
        assert_eq!(y.scope, SymbolScope::Free);
        assert_eq!(y.index, 1);
        assert!(y.immutable);
        assert_eq!(second.resolve("g").unwrap().scope, SymbolScope::Global);
    }

    #[test]
    fn test_nested_free_promotion_chains_outward() {
        let mut global = SymbolTable::new();
        global.define("unused", false);
        let mut first = SymbolTable::new_enclosed(global);
        first.define("a", false);
        let second = SymbolTable::new_enclosed(first);
        let mut third = SymbolTable::new_enclosed(second);

        let a = third.resolve("a").unwrap();
        assert_eq!(a.scope, SymbolScope::Free);

        // the middle table captured `a` as well, and `third` captured that
        let second = third.outer.as_ref().unwrap();
        assert_eq!(second.free_symbols()[0].scope, SymbolScope::Local);
        assert_eq!(third.free_symbols()[0].scope, SymbolScope::Free);
    }

    #[test]
    fn test_unresolvable() {
        let mut global = SymbolTable::new();
        let mut local = SymbolTable::new_enclosed(SymbolTable::new());
        assert_eq!(global.resolve("nope"), None);
        assert_eq!(local.resolve("nope"), None);
        assert!(local.free_symbols().is_empty());
    }

    #[test]
    fn test_builtin_shadowing_restores_prior_binding() {
        let mut table = SymbolTable::new();
        let user = table.define("sqrt", false);

        table.define_builtin(0, "sqrt", 5);
        table.define_builtin(3, "sqrt", 9);
        assert_eq!(table.resolve("sqrt").unwrap().module_index, 9);

        table.remove_builtin("sqrt");
        let restored = table.resolve("sqrt").unwrap();
        assert_eq!(restored.scope, SymbolScope::Builtin);
        assert_eq!(restored.module_index, 5);

        table.remove_builtin("sqrt");
        assert_eq!(table.resolve("sqrt"), Some(user));
    }

    #[test]
    fn test_remove_builtin_without_prior_unbinds() {
        let mut table = SymbolTable::new();
        table.define_builtin(1, "now", 2);
        table.remove_builtin("now");
        assert!(table.resolve("now").is_none());
    }

    #[test]
    fn test_builtins_resolve_unchanged_through_nesting() {
        let mut global = SymbolTable::new();
        global.define_builtin(0, "len", 0);
        let mut local = SymbolTable::new_enclosed(global);
        let len = local.resolve("len").unwrap();
        assert_eq!(len.scope, SymbolScope::Builtin);
        assert!(local.free_symbols().is_empty());
    }

    #[test]
    fn test_function_name_is_captured_as_free() {
        let mut outer = SymbolTable::new_enclosed(SymbolTable::new());
        outer.define_function_name("fib");
        let mut inner = SymbolTable::new_enclosed(outer);
        let fib = inner.resolve("fib").unwrap();
        assert_eq!(fib.scope, SymbolScope::Free);
        assert_eq!(inner.free_symbols()[0].scope, SymbolScope::Function);
    }

    #[test]
    fn test_block_hides_names_but_keeps_slots() {
        let mut table = SymbolTable::new();
        table.define("x", false);
        table.enter_block();
        let inner = table.define("x", true);
        let y = table.define("y", false);
        assert_eq!(inner.index, 1);
        assert_eq!(y.index, 2);
        table.leave_block();

        assert_eq!(table.resolve("x").unwrap().index, 0);
        assert!(table.resolve("y").is_none());
        assert_eq!(table.define("z", false).index, 3);
        assert_eq!(table.num_definitions(), 4);
    }

    #[test]
    fn test_members_take_slots_but_stay_out_of_symbols() {
        let mut table = SymbolTable::new();
        table.define("x", false);
        let pi = table.define_member("math", "PI", true);
        assert_eq!(pi.index, 1);
        assert_eq!(pi.name, "math.PI");
        assert_eq!(table.symbols().count(), 1);
        assert_eq!(table.member("math", "PI"), Some(&pi));

        let mut inner = SymbolTable::new_enclosed(table);
        let resolved = inner.resolve("math.PI").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Global);
        assert!(inner.free_symbols().is_empty());
    }

    #[test]
    fn test_lookup_does_not_capture() {
        let mut outer = SymbolTable::new_enclosed(SymbolTable::new());
        outer.define("a", false);
        let inner = SymbolTable::new_enclosed(outer);
        assert_eq!(inner.lookup("a").unwrap().scope, SymbolScope::Local);
        assert!(inner.free_symbols().is_empty());
        assert!(inner.lookup("b").is_none());
    }

    #[test]
    fn test_module_binding_is_tracked_by_slot() {
        let mut table = SymbolTable::new();
        let handle = table.define("color", true);
        table.mark_module(&handle);
        assert!(table.is_module("color"));

        let mut inner = SymbolTable::new_enclosed(table);
        assert!(inner.is_module("color"));
        inner.define("color", false);
        assert!(!inner.is_module("color"));

        let mut outer = inner.outer.take().map(|t| *t).unwrap();
        outer.define("color", false);
        assert!(!outer.is_module("color"));
    }

    #[test]
    fn test_captured_module_binding_is_still_a_module() {
        let mut outer = SymbolTable::new_enclosed(SymbolTable::new());
        let handle = outer.define("time", true);
        outer.mark_module(&handle);
        outer.define("other", false);

        let mut inner = SymbolTable::new_enclosed(outer);
        assert_eq!(inner.resolve("time").unwrap().scope, SymbolScope::Free);
        assert_eq!(inner.resolve("other").unwrap().scope, SymbolScope::Free);
        assert!(inner.is_module("time"));
        assert!(!inner.is_module("other"));
    }

    #[test]
    fn test_member_in_function_is_local() {
        let mut table = SymbolTable::new_enclosed(SymbolTable::new());
        let member = table.define_member("math", "PI", true);
        assert_eq!(member.scope, SymbolScope::Local);
        assert_eq!(table.num_definitions(), 1);
    }
}
