//! AST-to-AST lowering pass
//!
//! Runs after type checking and before code generation. Performs purely
//! syntactic normalization that the emitter depends on; it introduces no new
//! semantic information (the type checker has already validated everything
//! here). Four things happen:
//!
//! 1. `else { if ... }` is flattened into `else if ...` so the emitter only
//!    ever has to handle a genuine `else if` chain or a terminal block.
//! 2. Every block gets an explicit, ordered cleanup list: the heap-owning
//!    bindings declared directly in that block, LIFO.
//! 3. `Call` whose callee is a `MethodRef`, `StaticMethodCall`, or a plain
//!    `Ident` naming a registered function is rewritten into
//!    `Expr::ResolvedCall`.
//! 4. `#defer stmt` is rewritten into the owning block's deferred-statement
//!    list, to run LIFO immediately before that block's ordinary cleanup.

use std::collections::HashMap;

use crate::ast::*;
use crate::scope::FunctionTable;
use crate::types::Type;

pub struct LoweredProgram {
    pub structs: Vec<StructDecl>,
    pub directives: Vec<Directive>,
    pub functions: Vec<LoweredFn>,
}

pub struct LoweredFn {
    pub decl: FnDecl,
    pub body: LoweredBlock,
}

#[derive(Default)]
pub struct LoweredBlock {
    pub statements: Vec<LoweredStmt>,
    /// Owning bindings declared directly in this block, LIFO (reverse
    /// declaration order) — deferred statements run first, then these.
    pub cleanup: Vec<String>,
    pub deferred: Vec<LoweredStmt>,
}

pub enum LoweredStmt {
    Return {
        value: Option<Expr>,
        /// Every owning binding across every still-open frame, innermost
        /// first — what an early return must free before it leaves.
        cleanup_all: Vec<String>,
        line: usize,
        column: usize,
    },
    VarDecl {
        name: String,
        ty: Option<Type>,
        init: Option<Expr>,
        mutable: bool,
        needs_free: bool,
        line: usize,
        column: usize,
    },
    ExprStmt(Expr),
    If {
        cond: Expr,
        then_branch: LoweredBlock,
        else_branch: Option<Box<LoweredStmt>>,
        line: usize,
        column: usize,
    },
    Block(LoweredBlock),
    While {
        cond: Expr,
        body: LoweredBlock,
        line: usize,
        column: usize,
    },
    Free(String),
    Discard(Expr),
}

struct Lowerer<'a> {
    functions: &'a FunctionTable,
    structs: &'a [StructDecl],
    /// Owning-binding names per currently open frame, outermost first;
    /// mirrors the type checker's scope stack for the cleanup-on-return walk.
    frames: Vec<Vec<String>>,
    /// Declared/inferred type of every local visible at the current point,
    /// rebuilt per function — lets method/static calls resolve by receiver
    /// type instead of by bare name. Deliberately mirrors the code
    /// generator's own `infer_type`/`var_types` (see DESIGN.md) rather than
    /// sharing it, since the two stages work over different AST shapes
    /// (`Expr` pre- and post-lowering).
    var_types: HashMap<String, Type>,
}

pub fn lower(program: &Program) -> LoweredProgram {
    let mut functions = FunctionTable::new();
    for decl in &program.functions {
        functions.register(decl.clone());
    }
    let mut lowerer = Lowerer { functions: &functions, structs: &program.structs, frames: Vec::new(), var_types: HashMap::new() };
    LoweredProgram {
        structs: program.structs.clone(),
        directives: program.directives.clone(),
        functions: program.functions.iter().map(|decl| lowerer.lower_fn(decl)).collect(),
    }
}

impl<'a> Lowerer<'a> {
    fn lower_fn(&mut self, decl: &FnDecl) -> LoweredFn {
        self.frames.clear();
        self.var_types.clear();
        for param in &decl.params {
            self.var_types.insert(param.name.clone(), param.ty.clone());
        }
        let body = self.lower_block(&decl.body);
        LoweredFn { decl: decl.clone(), body }
    }

    /// Mirrors the code generator's own expression-type inference (see the
    /// field doc on `var_types`): enough to resolve a method call's receiver
    /// type at lowering time without re-running the type checker.
    fn infer_type(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Int { .. } => Some(Type::named("i32")),
            Expr::Bool { .. } => Some(Type::named("bool")),
            Expr::String { .. } => Some(Type::named("string")),
            Expr::Char { .. } => Some(Type::named("char")),
            Expr::Null { .. } => None,
            Expr::Ident { name, .. } => self.var_types.get(name).cloned(),
            Expr::StructLiteral { type_name, .. } | Expr::NewHeap { type_name, .. } => Some(Type::named(type_name.clone())),
            Expr::Clone { target_type, expr, .. } => target_type.clone().or_else(|| self.infer_type(expr)),
            Expr::Cast { target_type, .. } => Some(target_type.clone()),
            Expr::Field { object, field, .. } => {
                let object_ty = self.infer_type(object)?;
                let struct_name = object_ty.struct_name()?;
                let decl = self.structs.iter().find(|s| s.name == struct_name)?;
                decl.fields.iter().find(|(n, _)| n == field).map(|(_, ty)| ty.clone())
            }
            Expr::Unary { op: UnOp::Deref, operand, .. } => match self.infer_type(operand)? {
                Type::Pointer { to, .. } => Some(*to),
                other => Some(other),
            },
            Expr::Unary { op: UnOp::Addr, operand, .. } => {
                self.infer_type(operand).map(|t| Type::pointer(t, crate::types::PointerFlags::NONE))
            }
            Expr::ResolvedCall { function, receiver_type, .. } => {
                self.functions.lookup(receiver_type.as_deref(), function).map(|d| d.return_type.clone())
            }
            _ => None,
        }
    }

    fn lower_block(&mut self, block: &Block) -> LoweredBlock {
        self.frames.push(Vec::new());
        let mut statements = Vec::new();
        let mut pending_defers = Vec::new();
        for stmt in &block.statements {
            if let Stmt::Defer { stmt: inner, .. } = stmt {
                // Lowered immediately (so e.g. a deferred `free` still
                // removes its binding from `owners`), but held back from
                // `statements` for LIFO emission at scope exit.
                pending_defers.push(self.lower_stmt(inner));
                continue;
            }
            statements.push(self.lower_stmt(stmt));
        }
        let cleanup = self.frames.pop().unwrap_or_default().into_iter().rev().collect();
        LoweredBlock { statements, cleanup, deferred: pending_defers.into_iter().rev().collect() }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> LoweredStmt {
        match stmt {
            Stmt::Return { value, line, column } => {
                let cleanup_all =
                    self.frames.iter().rev().flat_map(|frame| frame.iter().rev().cloned()).collect();
                LoweredStmt::Return {
                    value: value.as_ref().map(|e| self.lower_expr(e)),
                    cleanup_all,
                    line: *line,
                    column: *column,
                }
            }
            Stmt::VarDecl { name, ty, init, mutable, line, column, .. } => {
                let needs_free = init.as_ref().is_some_and(Self::allocates);
                if needs_free {
                    self.frames.last_mut().expect("lower_block always pushes a frame first").push(name.clone());
                }
                let lowered_init = init.as_ref().map(|e| self.lower_expr(e));
                let resolved_ty = ty.clone().or_else(|| lowered_init.as_ref().and_then(|e| self.infer_type(e)));
                if let Some(resolved_ty) = &resolved_ty {
                    self.var_types.insert(name.clone(), resolved_ty.clone());
                }
                LoweredStmt::VarDecl {
                    name: name.clone(),
                    ty: ty.clone(),
                    init: lowered_init,
                    mutable: *mutable,
                    needs_free,
                    line: *line,
                    column: *column,
                }
            }
            Stmt::ExprStmt { expr, .. } => LoweredStmt::ExprStmt(self.lower_expr(expr)),
            Stmt::If { cond, then_branch, else_branch, line, column } => {
                let cond = self.lower_expr(cond);
                let then_branch = self.lower_block(then_branch);
                let else_branch = else_branch.as_ref().map(|e| Box::new(self.lower_else(e)));
                LoweredStmt::If { cond, then_branch, else_branch, line: *line, column: *column }
            }
            Stmt::Block { block, .. } => LoweredStmt::Block(self.lower_block(block)),
            Stmt::While { cond, body, line, column } => {
                let cond = self.lower_expr(cond);
                let body = self.lower_block(body);
                LoweredStmt::While { cond, body, line: *line, column: *column }
            }
            Stmt::Free { name, .. } => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.retain(|owned| owned != name);
                }
                LoweredStmt::Free(name.clone())
            }
            Stmt::Discard { expr, .. } => LoweredStmt::Discard(self.lower_expr(expr)),
            Stmt::Defer { stmt, .. } => self.lower_stmt(stmt),
        }
    }

    /// Flattens `else { if ... }` (a block containing exactly one `If`) into
    /// a bare `If`, so the emitter sees a genuine `else if` chain either way.
    fn lower_else(&mut self, stmt: &Stmt) -> LoweredStmt {
        if let Stmt::Block { block, .. } = stmt {
            if let [single @ Stmt::If { .. }] = block.statements.as_slice() {
                return self.lower_stmt(single);
            }
        }
        self.lower_stmt(stmt)
    }

    fn allocates(expr: &Expr) -> bool {
        matches!(expr, Expr::NewHeap { .. } | Expr::StructLiteral { .. } | Expr::Clone { .. })
    }

    fn lower_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Binary { op, left, right, line, column } => Expr::Binary {
                op: *op,
                left: Box::new(self.lower_expr(left)),
                right: Box::new(self.lower_expr(right)),
                line: *line,
                column: *column,
            },
            Expr::Unary { op, operand, line, column } => {
                Expr::Unary { op: *op, operand: Box::new(self.lower_expr(operand)), line: *line, column: *column }
            }
            Expr::Assign { target, value, line, column } => Expr::Assign {
                target: Box::new(self.lower_expr(target)),
                value: Box::new(self.lower_expr(value)),
                line: *line,
                column: *column,
            },
            Expr::CompoundAssign { op, target, value, line, column } => Expr::CompoundAssign {
                op: *op,
                target: Box::new(self.lower_expr(target)),
                value: Box::new(self.lower_expr(value)),
                line: *line,
                column: *column,
            },
            Expr::Field { object, field, line, column } => {
                Expr::Field { object: Box::new(self.lower_expr(object)), field: field.clone(), line: *line, column: *column }
            }
            Expr::Index { object, index, line, column } => Expr::Index {
                object: Box::new(self.lower_expr(object)),
                index: Box::new(self.lower_expr(index)),
                line: *line,
                column: *column,
            },
            Expr::StructLiteral { type_name, fields, line, column } => Expr::StructLiteral {
                type_name: type_name.clone(),
                fields: self.lower_fields(fields),
                line: *line,
                column: *column,
            },
            Expr::NewHeap { type_name, fields, line, column } => Expr::NewHeap {
                type_name: type_name.clone(),
                fields: self.lower_fields(fields),
                line: *line,
                column: *column,
            },
            Expr::Clone { expr, target_type, line, column } => Expr::Clone {
                expr: Box::new(self.lower_expr(expr)),
                target_type: target_type.clone(),
                line: *line,
                column: *column,
            },
            Expr::Cast { target_type, expr, line, column } => {
                Expr::Cast { target_type: target_type.clone(), expr: Box::new(self.lower_expr(expr)), line: *line, column: *column }
            }
            Expr::NullCheck { operand, line, column } => {
                Expr::NullCheck { operand: Box::new(self.lower_expr(operand)), line: *line, column: *column }
            }
            Expr::MutArg { expr, line, column } => Expr::MutArg { expr: Box::new(self.lower_expr(expr)), line: *line, column: *column },
            Expr::NamedArg { name, value, line, column } => {
                Expr::NamedArg { name: name.clone(), value: Box::new(self.lower_expr(value)), line: *line, column: *column }
            }
            Expr::IsCheck { expr, ty, line, column } => {
                Expr::IsCheck { expr: Box::new(self.lower_expr(expr)), ty: ty.clone(), line: *line, column: *column }
            }
            Expr::TypeOf { expr, line, column } => Expr::TypeOf { expr: Box::new(self.lower_expr(expr)), line: *line, column: *column },
            Expr::Call { callee, args, line, column } => self.lower_call(callee, args, *line, *column),
            // `T:method(args)` carries its own argument list (unlike
            // `MethodRef`, which only ever appears as a `Call` callee), so
            // it is a complete node in its own right and needs its own
            // lowering arm rather than going through `lower_call`. Per the
            // dispatch table's static-call rule there is no receiver
            // synthesis and no free-function fallback: the lookup is keyed
            // strictly on the named type.
            Expr::StaticMethodCall { type_name, method, args, line, column } => {
                let args: Vec<Expr> = args.iter().map(|a| self.lower_expr(a)).collect();
                let resolved = self.functions.lookup(Some(type_name), method);
                let function = resolved.map(|d| d.name.clone()).unwrap_or_else(|| method.clone());
                Expr::ResolvedCall {
                    function,
                    receiver: None,
                    receiver_type: Some(type_name.clone()),
                    args,
                    line: *line,
                    column: *column,
                }
            }
            other => other.clone(),
        }
    }

    fn lower_fields(&mut self, fields: &[FieldInit]) -> Vec<FieldInit> {
        fields.iter().map(|f| FieldInit { name: f.name.clone(), value: self.lower_expr(&f.value) }).collect()
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], line: usize, column: usize) -> Expr {
        let args: Vec<Expr> = args.iter().map(|a| self.lower_expr(a)).collect();
        match callee {
            Expr::MethodRef { object, method, .. } => {
                let receiver = self.lower_expr(object);
                let receiver_struct = self.infer_type(&receiver).as_ref().and_then(Type::struct_name).map(str::to_string);
                let resolved = receiver_struct
                    .as_deref()
                    .and_then(|rt| self.functions.resolve_method(rt, method))
                    .or_else(|| self.functions.lookup(None, method));
                let function = resolved.map(|d| d.name.clone()).unwrap_or_else(|| method.clone());
                let receiver_type = resolved.and_then(|d| d.dispatch_receiver().map(str::to_string));
                Expr::ResolvedCall { function, receiver: Some(Box::new(receiver)), receiver_type, args, line, column }
            }
            Expr::Ident { name, .. } => {
                Expr::ResolvedCall { function: name.clone(), receiver: None, receiver_type: None, args, line, column }
            }
            other => {
                // Anything else (e.g. a resolved call used as a higher-order
                // value) is left as a plain call around its lowered callee.
                let callee = self.lower_expr(other);
                Expr::Call { callee: Box::new(callee), args, line, column }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::lex;
    use crate::parser::parse;
    use std::path::Path;

    fn lower_source(src: &str) -> LoweredProgram {
        let mut diags = Diagnostics::new();
        let tokens = lex(src, Path::new("t.cz"), &mut diags);
        let program = parse(tokens, Path::new("t.cz"), &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        lower(&program)
    }

    #[test]
    fn elseif_chain_flattens_wrapped_block() {
        let lowered = lower_source("fn f() { if true { } else { if false { } else { } } }");
        let LoweredStmt::If { else_branch: Some(branch), .. } = &lowered.functions[0].body.statements[0] else {
            panic!("expected if");
        };
        assert!(matches!(**branch, LoweredStmt::If { .. }));
    }

    #[test]
    fn cleanup_list_is_lifo() {
        let lowered = lower_source("struct P { i32 x } fn f() { let a = new P { x: 1 } let b = new P { x: 2 } }");
        assert_eq!(lowered.functions[0].body.cleanup, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn freed_binding_drops_out_of_cleanup() {
        let lowered = lower_source("struct P { i32 x } fn f() { let a = new P { x: 1 } free a }");
        assert!(lowered.functions[0].body.cleanup.is_empty());
    }

    #[test]
    fn early_return_collects_all_open_frames_innermost_first() {
        let lowered = lower_source(
            "struct P { i32 x } fn f() i32 { let a = new P { x: 1 } if true { let b = new P { x: 2 } return b.x } return a.x }",
        );
        let LoweredStmt::If { then_branch, .. } = &lowered.functions[0].body.statements[1] else {
            panic!("expected if");
        };
        let LoweredStmt::Return { cleanup_all, .. } = &then_branch.statements[1] else {
            panic!("expected return");
        };
        assert_eq!(cleanup_all, &vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn method_call_resolves_to_resolved_call_with_receiver() {
        let lowered = lower_source("struct P { i32 x } fn P:get(self) i32 { return self.x } fn f(P p) i32 { return p:get() }");
        let LoweredStmt::Return { value: Some(Expr::ResolvedCall { function, receiver, receiver_type, .. }), .. } =
            &lowered.functions[1].body.statements[0]
        else {
            panic!("expected resolved call");
        };
        assert_eq!(function, "get");
        assert!(receiver.is_some());
        assert_eq!(receiver_type.as_deref(), Some("P"));
    }

    #[test]
    fn free_function_call_resolves_with_no_receiver() {
        let lowered = lower_source("fn add(i32 a, i32 b) i32 { return a + b } fn f() i32 { return add(1, 2) }");
        let LoweredStmt::Return { value: Some(Expr::ResolvedCall { receiver, receiver_type, .. }), .. } =
            &lowered.functions[1].body.statements[0]
        else {
            panic!("expected resolved call");
        };
        assert!(receiver.is_none());
        assert!(receiver_type.is_none());
    }

    #[test]
    fn static_method_call_resolves_with_no_receiver() {
        let lowered =
            lower_source("struct P { i32 x } fn P:new(self) { } fn f() i32 { let p = new P { x: 1 } P::new(p) return p.x }");
        let LoweredStmt::ExprStmt(Expr::ResolvedCall { function, receiver, receiver_type, .. }) =
            &lowered.functions[1].body.statements[1]
        else {
            panic!("expected resolved static call");
        };
        assert_eq!(function, "new");
        assert!(receiver.is_none());
        assert_eq!(receiver_type.as_deref(), Some("P"));
    }

    #[test]
    fn same_named_method_resolves_per_receiver_struct() {
        let lowered = lower_source(
            "struct Rect { i32 w } struct Circle { i32 r } \
             fn Rect:area(self) i32 { return self.w } \
             fn Circle:area(self) i32 { return self.r } \
             fn f(Rect r, Circle c) i32 { return r:area() + c:area() }",
        );
        let LoweredStmt::Return { value: Some(Expr::Binary { left, right, .. }), .. } = &lowered.functions[2].body.statements[0] else {
            panic!("expected a binary return");
        };
        let Expr::ResolvedCall { receiver_type: left_ty, .. } = left.as_ref() else { panic!("expected resolved call") };
        let Expr::ResolvedCall { receiver_type: right_ty, .. } = right.as_ref() else { panic!("expected resolved call") };
        assert_eq!(left_ty.as_deref(), Some("Rect"));
        assert_eq!(right_ty.as_deref(), Some("Circle"));
    }

    #[test]
    fn defer_runs_before_ordinary_cleanup_in_declaration_reverse_order() {
        let lowered = lower_source("struct P { i32 x } fn f() { let a = new P { x: 1 } #defer free a #defer discard 1 }");
        assert_eq!(lowered.functions[0].body.deferred.len(), 2);
    }
}
