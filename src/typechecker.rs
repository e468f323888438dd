//! Type checker for Czar
//!
//! Walks the AST with the scope stack described in `scope.rs`, resolving
//! types, validating mutability, and tracking heap ownership at compile
//! time. Diagnostics accumulate; a stage boundary in `lib.rs` halts the
//! pipeline only if the accumulated list contains an error. Missing-return
//! checking on non-void control-flow paths is intentionally not
//! implemented here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::scope::{FunctionTable, ScopeStack, VarInfo};
use crate::types::Type;

pub fn check(program: &Program, file: &Path, diags: &mut Diagnostics) {
    let mut checker = Checker::new(program, file.to_path_buf(), diags);
    checker.check_program(program);
}

struct Checker<'d> {
    file: PathBuf,
    structs: HashMap<String, StructDecl>,
    functions: FunctionTable,
    diags: &'d mut Diagnostics,
}

impl<'d> Checker<'d> {
    fn new(program: &Program, file: PathBuf, diags: &'d mut Diagnostics) -> Self {
        let structs = program.structs.iter().map(|s| (s.name.clone(), s.clone())).collect();
        Checker { file, structs, functions: FunctionTable::new(), diags }
    }

    fn err(&mut self, line: usize, column: usize, message: impl Into<String>) {
        let file = self.file.clone();
        self.diags.error(&file, line, column, message);
    }

    fn warn(&mut self, line: usize, column: usize, message: impl Into<String>) {
        let file = self.file.clone();
        self.diags.warning(&file, line, column, message);
    }

    fn check_program(&mut self, program: &Program) {
        // Pre-pass: build the dispatch table before any body is checked so
        // forward references and mutual recursion resolve.
        for decl in &program.functions {
            self.register_function(decl.clone());
        }
        for decl in &program.functions {
            self.check_fn(decl);
        }
    }

    fn register_function(&mut self, decl: FnDecl) {
        if let Some(receiver) = &decl.receiver_type {
            if (decl.name == "new" || decl.name == "free") && decl.params.len() != 1 {
                self.err(
                    decl.line,
                    decl.column,
                    format!(
                        "constructor/destructor '{}:{}' must take exactly one parameter (the receiver)",
                        receiver, decl.name
                    ),
                );
            }
        }
        // First registration wins; duplicates are silently shadowed, matching
        // the documented first-wins policy (no diagnostic).
        self.functions.register(decl);
    }

    fn check_fn(&mut self, decl: &FnDecl) {
        let mut scope = ScopeStack::new();
        scope.push();
        for param in &decl.params {
            // Parameters are always borrows: ownership of a heap allocation
            // is established only by the declaration that contains the
            // `new`/struct-literal/`clone` expression, never by receiving it.
            scope.declare(&param.name, VarInfo::new(param.ty.clone(), param.mut_, false));
        }
        self.check_block(&decl.body, &mut scope, &decl.return_type);
        scope.pop();
    }

    fn check_block(&mut self, block: &Block, scope: &mut ScopeStack, return_type: &Type) {
        for stmt in &block.statements {
            self.check_stmt(stmt, scope, return_type);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt, scope: &mut ScopeStack, return_type: &Type) {
        match stmt {
            Stmt::Return { value, line, column } => {
                match value {
                    Some(expr) => {
                        let ty = self.infer(expr, scope);
                        if let Some(ty) = ty {
                            if !self.types_compatible(return_type, &ty) {
                                self.err(
                                    *line,
                                    *column,
                                    format!(
                                        "return type mismatch: function returns '{}' but expression has type '{}'",
                                        return_type.display(),
                                        ty.display()
                                    ),
                                );
                            }
                        }
                    }
                    None => {
                        if !return_type.is_void() {
                            self.err(*line, *column, format!("expected a return value of type '{}'", return_type.display()));
                        }
                    }
                }
            }
            Stmt::VarDecl { name, ty, init, mutable, line, column, .. } => {
                let inferred = init.as_ref().and_then(|e| self.infer(e, scope));
                let declared_ty = match (ty, &inferred) {
                    (Some(t), Some(actual)) => {
                        if !self.types_compatible(t, actual) {
                            self.err(
                                *line,
                                *column,
                                format!(
                                    "declared type '{}' does not match initializer type '{}'",
                                    t.display(),
                                    actual.display()
                                ),
                            );
                        }
                        t.clone()
                    }
                    (Some(t), None) => t.clone(),
                    (None, Some(actual)) => actual.clone(),
                    (None, None) => Type::named("void"),
                };
                let needs_free = init.as_ref().is_some_and(|e| Self::allocates(e));
                scope.declare(name, VarInfo::new(declared_ty, *mutable, needs_free));
            }
            Stmt::ExprStmt { expr, .. } => {
                self.infer(expr, scope);
            }
            Stmt::If { cond, then_branch, else_branch, line, column } => {
                if let Some(ty) = self.infer(cond, scope) {
                    if !matches!(ty, Type::Named(ref n) if n == "bool") {
                        self.err(*line, *column, format!("if condition must be 'bool', found '{}'", ty.display()));
                    }
                }
                scope.push();
                self.check_block(then_branch, scope, return_type);
                scope.pop();
                if let Some(else_stmt) = else_branch {
                    self.check_stmt(else_stmt, scope, return_type);
                }
            }
            Stmt::Block { block, .. } => {
                scope.push();
                self.check_block(block, scope, return_type);
                scope.pop();
            }
            Stmt::While { cond, body, line, column } => {
                if let Some(ty) = self.infer(cond, scope) {
                    if !matches!(ty, Type::Named(ref n) if n == "bool") {
                        self.err(*line, *column, format!("while condition must be 'bool', found '{}'", ty.display()));
                    }
                }
                scope.push();
                self.check_block(body, scope, return_type);
                scope.pop();
            }
            Stmt::Free { name, line, column } => {
                match scope.lookup(name).cloned() {
                    Some(info) if info.was_freed => {
                        self.err(*line, *column, format!("'{name}' was already freed"));
                    }
                    Some(info) if !info.needs_free => {
                        self.err(*line, *column, format!("'{name}' does not own a heap allocation and cannot be freed"));
                    }
                    Some(_) => {
                        scope.mark_freed(name);
                    }
                    None => {
                        self.err(*line, *column, format!("undefined identifier '{name}'"));
                    }
                }
            }
            Stmt::Discard { expr, .. } => {
                self.infer(expr, scope);
            }
            Stmt::Defer { stmt, .. } => {
                self.check_stmt(stmt, scope, return_type);
            }
        }
    }

    /// True when an initializer expression performs a fresh heap allocation
    /// and therefore establishes ownership (`needs_free = true`), per the
    /// pointer/value discipline rules: `new`, a struct literal (implicit
    /// heap-allocate-and-copy), and `clone` all allocate; a bare identifier,
    /// field access, or call result are borrows.
    fn allocates(expr: &Expr) -> bool {
        matches!(expr, Expr::NewHeap { .. } | Expr::StructLiteral { .. } | Expr::Clone { .. })
    }

    /// Structural equality, with one deliberate relaxation: a bare struct
    /// name and a pointer to that same struct name are treated as
    /// compatible, since the implicit-pointer model means both are the same
    /// C representation (`T*`) regardless of which spelling the source used.
    fn types_compatible(&self, declared: &Type, actual: &Type) -> bool {
        if declared == actual {
            return true;
        }
        match (declared.struct_name(), actual.struct_name()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn infer(&mut self, expr: &Expr, scope: &mut ScopeStack) -> Option<Type> {
        match expr {
            Expr::Int { .. } => Some(Type::named("i32")),
            Expr::Bool { .. } => Some(Type::named("bool")),
            Expr::String { .. } => Some(Type::named("string")),
            Expr::Char { .. } => Some(Type::named("char")),
            Expr::Null { .. } => None,
            Expr::Ident { name, line, column } => match scope.lookup(name).cloned() {
                Some(info) if info.was_freed => {
                    self.err(*line, *column, format!("use of '{name}' after it was freed"));
                    None
                }
                Some(info) => Some(info.ty),
                None => {
                    self.err(*line, *column, format!("undefined identifier '{name}'"));
                    None
                }
            },
            Expr::Binary { op, left, right, line, column } => self.infer_binary(*op, left, right, *line, *column, scope),
            Expr::Unary { op, operand, line, column } => self.infer_unary(*op, operand, *line, *column, scope),
            Expr::Assign { target, value, line, column } => {
                let target_ty = self.check_assignable(target, scope, *line, *column);
                let value_ty = self.infer(value, scope);
                if let (Some(t), Some(v)) = (&target_ty, &value_ty) {
                    if !self.types_compatible(t, v) {
                        self.err(*line, *column, format!("cannot assign '{}' to a binding of type '{}'", v.display(), t.display()));
                    }
                }
                target_ty
            }
            Expr::CompoundAssign { target, value, line, column, .. } => {
                let target_ty = self.check_assignable(target, scope, *line, *column);
                if let Some(t) = &target_ty {
                    if t.is_pointer() {
                        self.err(*line, *column, "pointer arithmetic is forbidden".to_string());
                    }
                }
                self.infer(value, scope);
                target_ty
            }
            Expr::Call { callee, args, line, column } => self.infer_call(callee, args, *line, *column, scope),
            Expr::Field { object, field, line, column } => {
                let obj_ty = self.infer(object, scope)?;
                let Some(struct_name) = obj_ty.struct_name() else {
                    self.err(*line, *column, format!("'{}' is not a struct type", obj_ty.display()));
                    return None;
                };
                let Some(decl) = self.structs.get(struct_name) else {
                    self.err(*line, *column, format!("unknown struct '{struct_name}'"));
                    return None;
                };
                match decl.fields.iter().find(|(name, _)| name == field) {
                    Some((_, ty)) => Some(ty.clone()),
                    None => {
                        self.err(*line, *column, format!("struct '{struct_name}' has no field '{field}'"));
                        None
                    }
                }
            }
            Expr::Index { object, index, line, column } => {
                let obj_ty = self.infer(object, scope)?;
                let Type::Array { element, size } = &obj_ty else {
                    self.err(*line, *column, format!("cannot index non-array type '{}'", obj_ty.display()));
                    return None;
                };
                if let Some(k) = index.as_const_int() {
                    if k < 0 || k as usize >= *size {
                        self.err(*line, *column, format!("index {k} out of bounds for array of size {size}"));
                    }
                }
                self.infer(index, scope);
                Some((**element).clone())
            }
            Expr::StructLiteral { type_name, fields, line, column } => {
                self.check_struct_fields(type_name, fields, *line, *column, scope);
                Some(Type::named(type_name.clone()))
            }
            Expr::NewHeap { type_name, fields, line, column } => {
                self.check_struct_fields(type_name, fields, *line, *column, scope);
                Some(Type::pointer(Type::named(type_name.clone()), crate::types::PointerFlags::clone_only()))
            }
            Expr::Clone { expr, target_type, .. } => {
                let inner = self.infer(expr, scope);
                match target_type {
                    Some(t) => Some(t.clone()),
                    None => inner.map(|t| match t.struct_name() {
                        Some(name) => Type::pointer(Type::named(name.to_string()), crate::types::PointerFlags::clone_only()),
                        None => t,
                    }),
                }
            }
            Expr::Cast { target_type, expr, .. } => {
                self.infer(expr, scope);
                Some(target_type.clone())
            }
            Expr::MethodRef { .. } => None,
            Expr::StaticMethodCall { type_name, method, args, line, column } => {
                let Some(decl) = self.functions.lookup(Some(type_name), method).cloned() else {
                    self.err(*line, *column, format!("no static method '{type_name}::{method}'"));
                    for arg in args {
                        self.infer(arg, scope);
                    }
                    return None;
                };
                // No receiver synthesis: every declared parameter, including
                // a leading `self`-named one if present, is supplied explicitly.
                self.check_args(&decl, args, *line, *column, scope, false);
                Some(decl.return_type.clone())
            }
            Expr::NullCheck { operand, line, column } => {
                let ty = self.infer(operand, scope);
                if let Some(t) = &ty {
                    if !t.is_pointer() {
                        self.warn(*line, *column, "'!!' used on a non-pointer value".to_string());
                    }
                }
                ty
            }
            Expr::MutArg { expr, .. } => self.infer(expr, scope),
            Expr::NamedArg { value, .. } => self.infer(value, scope),
            Expr::IsCheck { expr, .. } => {
                self.infer(expr, scope);
                Some(Type::named("bool"))
            }
            Expr::TypeOf { expr, .. } => {
                self.infer(expr, scope);
                Some(Type::named("string"))
            }
            // Only produced by the lowering pass, which runs after type
            // checking; never encountered here.
            Expr::ResolvedCall { .. } => None,
        }
    }

    fn check_assignable(&mut self, target: &Expr, scope: &mut ScopeStack, line: usize, column: usize) -> Option<Type> {
        match target {
            Expr::Ident { name, .. } => match scope.lookup(name).cloned() {
                Some(info) => {
                    if !info.mutable {
                        self.err(line, column, format!("cannot assign to immutable binding '{name}'"));
                    }
                    Some(info.ty)
                }
                None => {
                    self.err(line, column, format!("undefined identifier '{name}'"));
                    None
                }
            },
            Expr::Field { object, .. } => {
                if let Expr::Ident { name, .. } = object.as_ref() {
                    if let Some(info) = scope.lookup(name) {
                        if !info.mutable {
                            self.err(line, column, format!("cannot assign to a field of immutable binding '{name}'"));
                        }
                    }
                }
                self.infer(target, scope)
            }
            _ => self.infer(target, scope),
        }
    }

    fn check_struct_fields(&mut self, type_name: &str, fields: &[FieldInit], line: usize, column: usize, scope: &mut ScopeStack) {
        let Some(decl) = self.structs.get(type_name).cloned() else {
            self.err(line, column, format!("unknown struct '{type_name}'"));
            for f in fields {
                self.infer(&f.value, scope);
            }
            return;
        };
        for f in fields {
            let value_ty = self.infer(&f.value, scope);
            match decl.fields.iter().find(|(name, _)| name == &f.name) {
                Some((_, field_ty)) => {
                    if let Some(actual) = &value_ty {
                        if !self.types_compatible(field_ty, actual) {
                            self.err(
                                line,
                                column,
                                format!(
                                    "field '{}' expects type '{}' but got '{}'",
                                    f.name,
                                    field_ty.display(),
                                    actual.display()
                                ),
                            );
                        }
                    }
                }
                None => self.err(line, column, format!("struct '{type_name}' has no field '{}'", f.name)),
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, left: &Expr, right: &Expr, line: usize, column: usize, scope: &mut ScopeStack) -> Option<Type> {
        let lt = self.infer(left, scope);
        let rt = self.infer(right, scope);
        if matches!(op, BinOp::Add | BinOp::Sub) {
            if lt.as_ref().is_some_and(Type::is_pointer) || rt.as_ref().is_some_and(Type::is_pointer) {
                self.err(line, column, "pointer arithmetic is forbidden".to_string());
                return None;
            }
        }
        match op {
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::EqEq | BinOp::Ne | BinOp::LogAnd | BinOp::LogOr => {
                Some(Type::named("bool"))
            }
            _ => lt.or(rt),
        }
    }

    fn infer_unary(&mut self, op: UnOp, operand: &Expr, line: usize, column: usize, scope: &mut ScopeStack) -> Option<Type> {
        let ty = self.infer(operand, scope);
        match op {
            UnOp::Not => Some(Type::named("bool")),
            UnOp::Addr => ty.map(|t| Type::pointer(t, crate::types::PointerFlags::NONE)),
            UnOp::Deref => match ty {
                Some(Type::Pointer { to, .. }) => Some(*to),
                Some(other) => {
                    self.err(line, column, format!("cannot dereference non-pointer type '{}'", other.display()));
                    None
                }
                None => None,
            },
            UnOp::Neg | UnOp::BitNot => ty,
        }
    }

    fn infer_call(&mut self, callee: &Expr, args: &[Expr], line: usize, column: usize, scope: &mut ScopeStack) -> Option<Type> {
        match callee {
            Expr::Ident { name, .. } => {
                let Some(decl) = self.functions.lookup(None, name).cloned() else {
                    self.err(line, column, format!("undefined function '{name}'"));
                    for arg in args {
                        self.infer(arg, scope);
                    }
                    return None;
                };
                self.check_args(&decl, args, line, column, scope, false);
                Some(decl.return_type.clone())
            }
            Expr::MethodRef { object, method, .. } => {
                let obj_ty = self.infer(object, scope);
                let Some(receiver) = obj_ty.as_ref().and_then(Type::struct_name) else {
                    self.err(line, column, format!("method '{method}' called on a non-struct value"));
                    for arg in args {
                        self.infer(arg, scope);
                    }
                    return None;
                };
                let Some(decl) = self.functions.resolve_method(receiver, method).cloned() else {
                    self.err(line, column, format!("no method '{receiver}:{method}'"));
                    for arg in args {
                        self.infer(arg, scope);
                    }
                    return None;
                };
                self.check_method_auto_addressing(&decl, object, obj_ty.as_ref(), line, column);
                self.check_args(&decl, args, line, column, scope, true);
                Some(decl.return_type.clone())
            }
            _ => {
                self.infer(callee, scope);
                for arg in args {
                    self.infer(arg, scope);
                }
                None
            }
        }
    }

    fn check_method_auto_addressing(&mut self, decl: &FnDecl, _object: &Expr, obj_ty: Option<&Type>, _line: usize, _column: usize) {
        // Auto-addressing: a pointer-expecting receiver paired with a
        // non-pointer variable is resolved by the emitter inserting `&obj`;
        // nothing to diagnose here beyond what call-site mutability already
        // covers for an explicit `self` parameter.
        let _ = (decl, obj_ty);
    }

    fn check_args(&mut self, decl: &FnDecl, args: &[Expr], line: usize, column: usize, scope: &mut ScopeStack, skip_receiver: bool) {
        let params: Vec<&Param> = if skip_receiver && decl.params.first().is_some_and(|p| p.name == "self") {
            decl.params.iter().skip(1).collect()
        } else {
            decl.params.iter().collect()
        };
        match resolve_call_args(&params, args) {
            Ok(resolved) => {
                for (param, arg) in params.iter().zip(resolved.iter()) {
                    if let Some(arg_expr) = arg {
                        let arg_ty = self.infer(arg_expr, scope);
                        if let Some(actual) = arg_ty {
                            if !self.types_compatible(&param.ty, &actual) && !matches!(arg_expr, Expr::Null { .. }) {
                                self.err(
                                    line,
                                    column,
                                    format!(
                                        "argument '{}' expects type '{}' but got '{}'",
                                        param.name,
                                        param.ty.display(),
                                        actual.display()
                                    ),
                                );
                            }
                        }
                        let passed_mut = matches!(arg_expr, Expr::MutArg { .. });
                        if passed_mut && !param.mut_ {
                            self.warn(line, column, format!("'mut' argument passed to non-mut parameter '{}' is ignored", param.name));
                        }
                    }
                }
            }
            Err(msg) => self.err(line, column, msg),
        }
        for arg in args {
            if let Expr::NamedArg { value, .. } = arg {
                self.infer(value, scope);
            }
        }
    }
}

/// Named/positional argument resolution (spec §4.3): positional arguments
/// must all precede named ones; for each parameter in declaration order,
/// prefer a matching named argument, else the next unconsumed positional,
/// else the parameter's default. No parameter may be bound twice.
pub fn resolve_call_args<'a>(params: &[&Param], args: &'a [Expr]) -> Result<Vec<Option<&'a Expr>>, String> {
    let mut positional = Vec::new();
    let mut named: HashMap<&str, &Expr> = HashMap::new();
    let mut seen_named = false;
    for arg in args {
        match arg {
            Expr::NamedArg { name, value, .. } => {
                seen_named = true;
                if named.insert(name.as_str(), value.as_ref()).is_some() {
                    return Err(format!("argument '{name}' bound more than once"));
                }
            }
            other => {
                if seen_named {
                    return Err("positional arguments must precede named arguments".to_string());
                }
                positional.push(other);
            }
        }
    }
    let mut positional = positional.into_iter();
    let mut resolved = Vec::with_capacity(params.len());
    for param in params {
        if let Some(value) = named.remove(param.name.as_str()) {
            resolved.push(Some(value));
        } else if let Some(value) = positional.next() {
            resolved.push(Some(value));
        } else if let Some(default) = &param.default {
            resolved.push(Some(default));
        } else {
            return Err(format!("missing required argument '{}'", param.name));
        }
    }
    if positional.next().is_some() {
        return Err("too many positional arguments".to_string());
    }
    if let Some(unused) = named.keys().next() {
        return Err(format!("no parameter named '{unused}'"));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;
    use std::path::Path;

    fn check_source(src: &str) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let tokens = lex(src, Path::new("t.cz"), &mut diags);
        let program = parse(tokens, Path::new("t.cz"), &mut diags);
        check(&program, Path::new("t.cz"), &mut diags);
        diags
    }

    #[test]
    fn var_decl_type_mismatch_is_an_error() {
        let diags = check_source("fn f() { let x: bool = 1 }");
        assert!(diags.has_errors());
    }

    #[test]
    fn pointer_arithmetic_is_rejected() {
        let diags = check_source("struct P { i32 x } fn f(mut P p) { let y = p + 1 }");
        assert!(diags.has_errors());
    }

    #[test]
    fn use_after_free_is_detected() {
        let diags = check_source("struct P { i32 x } fn f() { let p = new P { x: 1 } free p return p.x }");
        assert!(diags.has_errors());
    }

    #[test]
    fn array_constant_index_out_of_bounds_is_an_error() {
        let diags = check_source("fn f([i32; 3] a) { let x = a[5] }");
        assert!(diags.has_errors());
    }

    #[test]
    fn array_constant_index_in_bounds_is_fine() {
        let diags = check_source("fn f([i32; 3] a) { let x = a[1] }");
        assert!(!diags.has_errors());
    }

    #[test]
    fn assign_to_immutable_binding_is_an_error() {
        let diags = check_source("fn f() { let x = 1 x = 2 }");
        assert!(diags.has_errors());
    }

    #[test]
    fn assign_to_mutable_binding_is_fine() {
        let diags = check_source("fn f() { var x = 1 x = 2 }");
        assert!(!diags.has_errors());
    }

    #[test]
    fn named_and_default_argument_resolution_fills_gaps() {
        let a = Param { name: "a".into(), ty: Type::named("i32"), default: None, mut_: false };
        let b = Param { name: "b".into(), ty: Type::named("i32"), default: Some(Expr::Int { value: 5, line: 1, column: 1 }), mut_: false };
        let c = Param { name: "c".into(), ty: Type::named("i32"), default: Some(Expr::Int { value: 10, line: 1, column: 1 }), mut_: false };
        let params = vec![&a, &b, &c];
        let args = vec![
            Expr::Int { value: 2, line: 1, column: 1 },
            Expr::NamedArg { name: "c".into(), value: Box::new(Expr::Int { value: 20, line: 1, column: 1 }), line: 1, column: 1 },
        ];
        let resolved = resolve_call_args(&params, &args).unwrap();
        assert!(matches!(resolved[0], Some(Expr::Int { value: 2, .. })));
        assert!(matches!(resolved[1], Some(Expr::Int { value: 5, .. })));
        assert!(matches!(resolved[2], Some(Expr::Int { value: 20, .. })));
    }

    #[test]
    fn double_binding_an_argument_is_an_error() {
        let a = Param { name: "a".into(), ty: Type::named("i32"), default: None, mut_: false };
        let params = vec![&a];
        let args = vec![
            Expr::Int { value: 1, line: 1, column: 1 },
            Expr::NamedArg { name: "a".into(), value: Box::new(Expr::Int { value: 2, line: 1, column: 1 }), line: 1, column: 1 },
        ];
        assert!(resolve_call_args(&params, &args).is_err());
    }

    #[test]
    fn positional_after_named_is_rejected() {
        let a = Param { name: "a".into(), ty: Type::named("i32"), default: None, mut_: false };
        let b = Param { name: "b".into(), ty: Type::named("i32"), default: None, mut_: false };
        let params = vec![&a, &b];
        let args = vec![
            Expr::NamedArg { name: "a".into(), value: Box::new(Expr::Int { value: 1, line: 1, column: 1 }), line: 1, column: 1 },
            Expr::Int { value: 2, line: 1, column: 1 },
        ];
        assert!(resolve_call_args(&params, &args).is_err());
    }

    #[test]
    fn missing_required_argument_is_an_error() {
        let a = Param { name: "a".into(), ty: Type::named("i32"), default: None, mut_: false };
        let params = vec![&a];
        assert!(resolve_call_args(&params, &[]).is_err());
    }

    #[test]
    fn mut_argument_to_non_mut_parameter_is_a_warning_not_an_error() {
        let diags = check_source("struct P { i32 x } fn take(P p) i32 { return p.x } fn f(mut P q) i32 { return take(mut q) }");
        assert!(!diags.has_errors());
        assert!(diags.iter().any(|d| !d.is_error()));
    }

    #[test]
    fn constructor_with_extra_parameters_is_rejected() {
        let diags = check_source("struct P { i32 x } fn P:new(self, i32 extra) { }");
        assert!(diags.has_errors());
    }
}
