//! Compile-time scope stack and function table
//!
//! Czar has no garbage collector: every heap allocation is freed by
//! generated code at the end of the scope that owns it, in reverse
//! declaration order. This module is the type checker's model of that
//! bookkeeping. Nothing here runs at Czar-program runtime; it exists purely
//! to tell `typechecker.rs` and `lowering.rs` which variables need a
//! destructor call injected and in what order, including across an early
//! `return` that unwinds several frames at once.

use std::collections::HashMap;

use crate::ast::FnDecl;
use crate::types::Type;

/// What the checker knows about one binding.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub ty: Type,
    pub mutable: bool,
    /// Set when `ty` is a struct-valued binding under the implicit-pointer
    /// model: ownership was established here and a destructor call is owed
    /// at scope exit unless `was_freed` is set first.
    pub needs_free: bool,
    pub was_freed: bool,
}

impl VarInfo {
    pub fn new(ty: Type, mutable: bool, needs_free: bool) -> Self {
        VarInfo { ty, mutable, needs_free, was_freed: false }
    }
}

/// One lexical scope: a function body, an `if`/`while` block, or a nested
/// `{ }` block. `owners` records declaration order so cleanup can run LIFO.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: usize,
    pub variables: HashMap<String, VarInfo>,
    pub owners: Vec<String>,
}

impl Frame {
    fn new(id: usize) -> Self {
        Frame { id, variables: HashMap::new(), owners: Vec::new() }
    }

    pub fn declare(&mut self, name: &str, info: VarInfo) {
        if info.needs_free {
            self.owners.push(name.to_string());
        }
        self.variables.insert(name.to_string(), info);
    }

    /// Names still owed a destructor call, in LIFO (reverse-declaration)
    /// order, as of right now.
    pub fn pending_frees(&self) -> Vec<String> {
        self.owners
            .iter()
            .rev()
            .filter(|name| {
                self.variables
                    .get(name.as_str())
                    .is_some_and(|info| info.needs_free && !info.was_freed)
            })
            .cloned()
            .collect()
    }
}

/// Stack of active frames for the function currently being checked, innermost
/// last. Variable lookup walks outward; cleanup on early return walks every
/// active frame innermost-first, exactly mirroring the nested C blocks the
/// code generator emits.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    next_id: usize,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    pub fn push(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.frames.push(Frame::new(id));
        id
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("scope stack is never empty while checking a function body")
    }

    pub fn declare(&mut self, name: &str, info: VarInfo) {
        self.current().declare(name, info);
    }

    /// Look up a binding by walking frames from innermost to outermost.
    pub fn lookup(&self, name: &str) -> Option<&VarInfo> {
        self.frames.iter().rev().find_map(|frame| frame.variables.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut VarInfo> {
        self.frames.iter_mut().rev().find_map(|frame| frame.variables.get_mut(name))
    }

    /// Mark a binding as freed, searching innermost to outermost, so a later
    /// use can be flagged as a use-after-free the way the type checker's
    /// `was_freed` tracking expects.
    pub fn mark_freed(&mut self, name: &str) -> bool {
        if let Some(info) = self.lookup_mut(name) {
            info.was_freed = true;
            true
        } else {
            false
        }
    }

    /// Every name owed a destructor call across every active frame,
    /// innermost-first — the list an early `return` must free before
    /// control leaves the function.
    pub fn pending_frees_all_frames(&self) -> Vec<String> {
        self.frames.iter().rev().flat_map(Frame::pending_frees).collect()
    }
}

/// Dispatch key: `(Some(receiver_type), method_name)` for a `T:method` or
/// extension method, `(None, name)` for a plain free function.
pub type FnKey = (Option<String>, String);

/// `(receiver_type, method_name) -> FnDecl`, built in one pre-pass over the
/// program before any body is checked, so forward references and mutual
/// recursion resolve without a second pass.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<FnKey, FnDecl>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable::default()
    }

    /// Registers a declaration under its own key and, if it turns out to be
    /// an extension method (first param named `self`), under the receiver
    /// key too — so `obj.method()` and a hypothetical `T:method()` call both
    /// resolve to the same `FnDecl`. Returns the key that was already
    /// occupied, if any (first-wins: the caller keeps the earlier entry).
    pub fn register(&mut self, decl: FnDecl) -> Option<FnKey> {
        let key: FnKey = (decl.receiver_type.clone(), decl.name.clone());
        if self.functions.contains_key(&key) {
            return Some(key);
        }
        if let Some(receiver) = decl.extension_receiver() {
            let ext_key: FnKey = (Some(receiver.to_string()), decl.name.clone());
            if !self.functions.contains_key(&ext_key) {
                self.functions.insert(ext_key, decl.clone());
            }
        }
        self.functions.insert(key, decl);
        None
    }

    pub fn lookup(&self, receiver: Option<&str>, name: &str) -> Option<&FnDecl> {
        self.functions.get(&(receiver.map(str::to_string), name.to_string()))
    }

    /// Resolve a method call site: prefer an explicit `T:method`/extension
    /// match on the receiver's struct type, falling back to a free function
    /// of the same name when the receiver carries no such method (matching
    /// the spec's single dispatch table rather than inheritance lookup).
    pub fn resolve_method(&self, receiver_type: &str, method: &str) -> Option<&FnDecl> {
        self.lookup(Some(receiver_type), method).or_else(|| self.lookup(None, method))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FnDecl> {
        self.functions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, Param};

    fn decl(name: &str, receiver_type: Option<&str>, self_param: bool) -> FnDecl {
        let mut params = Vec::new();
        if self_param {
            params.push(Param {
                name: "self".into(),
                ty: Type::named(receiver_type.unwrap_or("Point")),
                default: None,
                mut_: false,
            });
        }
        FnDecl {
            name: name.to_string(),
            receiver_type: receiver_type.map(str::to_string),
            params,
            return_type: Type::named("void"),
            body: Block { statements: vec![] },
            pub_: false,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn lookup_walks_frames_innermost_first() {
        let mut stack = ScopeStack::new();
        stack.push();
        stack.declare("x", VarInfo::new(Type::named("i32"), false, false));
        stack.push();
        stack.declare("x", VarInfo::new(Type::named("bool"), false, false));
        assert_eq!(stack.lookup("x").unwrap().ty, Type::named("bool"));
        stack.pop();
        assert_eq!(stack.lookup("x").unwrap().ty, Type::named("i32"));
    }

    #[test]
    fn pending_frees_are_lifo() {
        let mut frame = Frame::new(0);
        frame.declare("a", VarInfo::new(Type::named("Point"), false, true));
        frame.declare("b", VarInfo::new(Type::named("Point"), false, true));
        frame.declare("c", VarInfo::new(Type::named("i32"), false, false));
        assert_eq!(frame.pending_frees(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn freed_variable_drops_out_of_pending_frees() {
        let mut stack = ScopeStack::new();
        stack.push();
        stack.declare("a", VarInfo::new(Type::named("Point"), false, true));
        assert!(stack.mark_freed("a"));
        assert!(stack.current().pending_frees().is_empty());
    }

    #[test]
    fn pending_frees_all_frames_spans_active_scopes_innermost_first() {
        let mut stack = ScopeStack::new();
        stack.push();
        stack.declare("outer", VarInfo::new(Type::named("Point"), false, true));
        stack.push();
        stack.declare("inner", VarInfo::new(Type::named("Point"), false, true));
        assert_eq!(
            stack.pending_frees_all_frames(),
            vec!["inner".to_string(), "outer".to_string()]
        );
    }

    #[test]
    fn function_table_register_is_first_wins() {
        let mut table = FunctionTable::new();
        assert!(table.register(decl("area", Some("Rect"), true)).is_none());
        let collided = table.register(decl("area", Some("Rect"), true));
        assert_eq!(collided, Some((Some("Rect".to_string()), "area".to_string())));
    }

    #[test]
    fn resolve_method_prefers_receiver_match_over_free_function() {
        let mut table = FunctionTable::new();
        table.register(decl("describe", None, false));
        table.register(decl("describe", Some("Point"), true));
        let resolved = table.resolve_method("Point", "describe").unwrap();
        assert_eq!(resolved.receiver_type.as_deref(), Some("Point"));
    }

    #[test]
    fn resolve_method_falls_back_to_free_function() {
        let mut table = FunctionTable::new();
        table.register(decl("describe", None, false));
        let resolved = table.resolve_method("Point", "describe").unwrap();
        assert_eq!(resolved.receiver_type, None);
    }

    #[test]
    fn extension_method_is_also_reachable_under_its_receiver_key() {
        let mut table = FunctionTable::new();
        table.register(decl("double", None, true));
        assert!(table.lookup(None, "double").is_some());
        let via_receiver = table.lookup(Some("Point"), "double");
        assert!(via_receiver.is_some(), "extension methods must be registered under their derived receiver key too");
        assert_eq!(via_receiver.unwrap().name, "double");
    }

    #[test]
    fn same_named_methods_on_different_structs_do_not_collide() {
        let mut table = FunctionTable::new();
        assert!(table.register(decl("area", Some("Rect"), true)).is_none());
        assert!(table.register(decl("area", Some("Circle"), true)).is_none());
        assert_eq!(table.resolve_method("Rect", "area").unwrap().receiver_type.as_deref(), Some("Rect"));
        assert_eq!(table.resolve_method("Circle", "area").unwrap().receiver_type.as_deref(), Some("Circle"));
    }
}
