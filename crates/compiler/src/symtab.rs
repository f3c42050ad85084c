//! Lexically-scoped symbol table.
//!
//! Implemented as an arena of scope records, each holding its parent's
//! index rather than an owned/`Rc` pointer — a flat `Vec` avoids the
//! ownership-cycle problems a tree of parent pointers would otherwise
//! hit in Rust, per the source design's recommendation. Scope "kind" is
//! an enum tag, not a string, so the checker's `break`/`continue`/
//! `return` validity walks are exhaustive matches rather than string
//! comparisons.

use crate::ast::{Param, Stmt, VarKind};
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Func,
    If,
    Else,
    Loop,
}

/// What a name in scope refers to, for the checker's purposes. Borrows
/// from the `Program` being checked, so the symbol table cannot outlive
/// the AST it indexes.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    Var { kind: VarKind, ty: Type },
    Param { ty: Type },
    Func { decl: &'a Stmt },
}

impl<'a> Symbol<'a> {
    pub fn ty(&self) -> Type {
        match self {
            Symbol::Var { ty, .. } => *ty,
            Symbol::Param { ty } => *ty,
            Symbol::Func { decl } => match decl {
                Stmt::FuncDecl { return_type, .. } => *return_type,
                _ => unreachable!("Symbol::Func must wrap a FuncDecl"),
            },
        }
    }

    pub fn params(&self) -> &'a [Param] {
        match self {
            Symbol::Func { decl } => match decl {
                Stmt::FuncDecl { params, .. } => params,
                _ => unreachable!("Symbol::Func must wrap a FuncDecl"),
            },
            _ => &[],
        }
    }
}

struct Scope<'a> {
    kind: ScopeKind,
    parent: Option<usize>,
    names: HashMap<String, Symbol<'a>>,
}

/// The full scope tree built up during checking. `global` (index 0)
/// always exists; every other scope is pushed as the checker descends
/// into a function body, if-branch or loop body and popped on the way
/// back out.
pub struct SymbolTable<'a> {
    scopes: Vec<Scope<'a>>,
    current: usize,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                parent: None,
                names: HashMap::new(),
            }],
            current: 0,
        }
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scopes[self.current].kind
    }

    /// Push a new child scope and make it current. Returns the pushed
    /// scope's index so the caller can assert symmetry, though callers
    /// typically just call `pop` once done.
    pub fn push(&mut self, kind: ScopeKind) -> usize {
        let idx = self.scopes.len();
        self.scopes.push(Scope {
            kind,
            parent: Some(self.current),
            names: HashMap::new(),
        });
        self.current = idx;
        idx
    }

    /// Pop back to the current scope's parent.
    pub fn pop(&mut self) {
        self.current = self.scopes[self.current]
            .parent
            .expect("cannot pop the global scope");
    }

    /// Insert a name into the *current* scope. Rejected if the name
    /// already exists in that same scope; shadowing a parent scope's
    /// name is fine.
    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol<'a>) -> Result<(), String> {
        let name = name.into();
        let scope = &mut self.scopes[self.current];
        if scope.names.contains_key(&name) {
            return Err(name);
        }
        scope.names.insert(name, symbol);
        Ok(())
    }

    /// Walk upward from the current scope to the root looking for `name`.
    pub fn lookup(&self, name: &str) -> Option<Symbol<'a>> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let scope = &self.scopes[i];
            if let Some(sym) = scope.names.get(name) {
                return Some(*sym);
            }
            idx = scope.parent;
        }
        None
    }

    /// Walk upward from the current scope to the root looking for the
    /// nearest ancestor (or self) with the given kind.
    pub fn enclosing(&self, kind: ScopeKind) -> bool {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            if self.scopes[i].kind == kind {
                return true;
            }
            idx = self.scopes[i].parent;
        }
        false
    }

    /// The declared return type of the nearest enclosing function scope,
    /// found via its `Symbol::Func` marker stored under the reserved
    /// name `"$func"`.
    pub fn enclosing_function(&self) -> Option<Symbol<'a>> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let scope = &self.scopes[i];
            if scope.kind == ScopeKind::Func {
                if let Some(sym) = scope.names.get("$func") {
                    return Some(*sym);
                }
            }
            idx = scope.parent;
        }
        None
    }
}

impl Default for SymbolTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn shadowing_parent_scope_is_allowed() {
        let mut table = SymbolTable::new();
        table
            .insert(
                "x",
                Symbol::Var {
                    kind: VarKind::Var,
                    ty: Type::Int,
                },
            )
            .unwrap();
        table.push(ScopeKind::If);
        table
            .insert(
                "x",
                Symbol::Var {
                    kind: VarKind::Var,
                    ty: Type::Bool,
                },
            )
            .unwrap();
        assert_eq!(table.lookup("x").unwrap().ty(), Type::Bool);
        table.pop();
        assert_eq!(table.lookup("x").unwrap().ty(), Type::Int);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        table
            .insert(
                "x",
                Symbol::Var {
                    kind: VarKind::Var,
                    ty: Type::Int,
                },
            )
            .unwrap();
        let err = table.insert(
            "x",
            Symbol::Var {
                kind: VarKind::Var,
                ty: Type::Float,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn enclosing_walks_to_root() {
        let mut table = SymbolTable::new();
        table.push(ScopeKind::Func);
        table.push(ScopeKind::Loop);
        table.push(ScopeKind::If);
        assert!(table.enclosing(ScopeKind::Loop));
        assert!(table.enclosing(ScopeKind::Func));
        assert!(!table.enclosing(ScopeKind::Else));
    }
}
