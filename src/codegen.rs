//! C11 code generation
//!
//! Takes the lowered AST (`lowering.rs`) and renders one C translation unit
//! as a string, ready to be handed to a host `cc`/`clang` invocation by the
//! driver in `lib.rs`/`main.rs`. The emitter trusts its input is well-typed:
//! anything it cannot make sense of is an internal-invariant panic, never a
//! user-facing diagnostic — diagnostics only ever come from the lexer,
//! parser, and type checker (see `Failure semantics` in the design notes).
//!
//! Struct-typed bindings are stored as pointers in the emitted C under the
//! implicit-pointer model (the one documented exception is a non-`mut`
//! struct-typed function parameter, which is by-value); this module tracks
//! just enough of a parallel type environment, rebuilt per function, to
//! make that call at every field access, free, and method-call site.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use crate::ast::{BinOp, CompoundOp, Expr, FieldInit, FnDecl, Param, StructDecl, UnOp};
use crate::config::CompilerConfig;
use crate::lowering::{LoweredBlock, LoweredFn, LoweredProgram, LoweredStmt};
use crate::types::Type;

/// Lowered C names of a struct's `new`/`free` methods, if declared.
#[derive(Default, Clone)]
struct Lifecycle {
    constructor: Option<String>,
    destructor: Option<String>,
}

pub struct CodeGen<'a> {
    out: String,
    indent: usize,
    tmp: usize,
    structs: &'a [StructDecl],
    struct_names: HashSet<String>,
    config: &'a CompilerConfig,
    file_stem: String,
    lifecycle: HashMap<String, Lifecycle>,
    /// `(receiver_type_or_none, name) -> FnDecl`, matching the dispatch
    /// table's own key (`scope::FnKey`) so two structs may declare a
    /// same-named method without colliding at call sites.
    fn_decls: HashMap<(Option<String>, String), &'a FnDecl>,
    /// Struct-typed parameters passed by value (the one case where a
    /// struct-typed binding is *not* a pointer), set fresh per function.
    value_struct_params: HashSet<String>,
    /// Declared/inferred type of every local visible at the current point,
    /// rebuilt per function in declaration order.
    var_types: HashMap<String, Type>,
    /// Declaration order, kept separately from `fn_decls` so prototype
    /// emission doesn't depend on hash map iteration order.
    ordered_decls: Vec<&'a FnDecl>,
}

pub fn generate(program: &LoweredProgram, file: &Path, config: &CompilerConfig) -> String {
    let mut gen = CodeGen::new(program, file, config);
    gen.emit_preamble();
    gen.emit_struct_typedefs();
    gen.emit_prototypes();
    for f in &program.functions {
        gen.emit_function(f);
    }
    gen.emit_main_trampoline();
    gen.out
}

impl<'a> CodeGen<'a> {
    fn new(program: &'a LoweredProgram, file: &Path, config: &'a CompilerConfig) -> Self {
        let struct_names: HashSet<String> = program.structs.iter().map(|s| s.name.clone()).collect();
        let mut lifecycle: HashMap<String, Lifecycle> = HashMap::new();
        let mut fn_decls = HashMap::new();
        let mut ordered_decls = Vec::new();
        for f in &program.functions {
            fn_decls.insert((f.decl.dispatch_receiver().map(str::to_string), f.decl.name.clone()), &f.decl);
            ordered_decls.push(&f.decl);
            if let Some(receiver) = &f.decl.receiver_type {
                let entry = lifecycle.entry(receiver.clone()).or_default();
                if f.decl.name == "new" {
                    entry.constructor = Some(format!("{receiver}_constructor"));
                } else if f.decl.name == "free" {
                    entry.destructor = Some(format!("{receiver}_destructor"));
                }
            }
        }
        let file_stem = file.file_name().and_then(|n| n.to_str()).unwrap_or("input.cz").to_string();
        CodeGen {
            out: String::new(),
            indent: 0,
            tmp: 0,
            structs: &program.structs,
            struct_names,
            config,
            file_stem,
            lifecycle,
            fn_decls,
            value_struct_params: HashSet::new(),
            var_types: HashMap::new(),
            ordered_decls,
        }
    }

    fn next_tmp(&mut self, prefix: &str) -> String {
        self.tmp += 1;
        format!("_{prefix}{}", self.tmp)
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}{}", "    ".repeat(self.indent), text.as_ref());
    }

    fn lifecycle_of(&self, struct_name: &str) -> Lifecycle {
        self.lifecycle.get(struct_name).cloned().unwrap_or_default()
    }

    // ---- preamble ----------------------------------------------------

    fn emit_preamble(&mut self) {
        self.line("#include <stdint.h>");
        self.line("#include <stdbool.h>");
        self.line("#include <stdio.h>");
        self.line("#include <stdlib.h>");
        self.line("");
        if self.config.debug {
            self.line("static uint64_t _czar_explicit_allocs = 0;");
            self.line("static uint64_t _czar_implicit_allocs = 0;");
            self.line("static uint64_t _czar_frees = 0;");
            self.line("static uint64_t _czar_current_bytes = 0;");
            self.line("static uint64_t _czar_peak_bytes = 0;");
            self.line("");
            self.line("static void* _czar_malloc(size_t size, int is_explicit) {");
            self.indent += 1;
            self.line("void* p = malloc(size);");
            self.line("if (is_explicit) { _czar_explicit_allocs++; } else { _czar_implicit_allocs++; }");
            self.line("_czar_current_bytes += size;");
            self.line("if (_czar_current_bytes > _czar_peak_bytes) { _czar_peak_bytes = _czar_current_bytes; }");
            self.line("return p;");
            self.indent -= 1;
            self.line("}");
            self.line("");
            self.line("static void _czar_free(void* p) {");
            self.indent += 1;
            self.line("_czar_frees++;");
            self.line("free(p);");
            self.indent -= 1;
            self.line("}");
            self.line("");
            self.line("static void _czar_print_summary(void) {");
            self.indent += 1;
            self.line("fprintf(stderr, \"czar: %llu explicit allocs, %llu implicit allocs, %llu frees, peak %llu bytes\\n\",");
            self.line("    (unsigned long long)_czar_explicit_allocs, (unsigned long long)_czar_implicit_allocs,");
            self.line("    (unsigned long long)_czar_frees, (unsigned long long)_czar_peak_bytes);");
            self.indent -= 1;
            self.line("}");
            self.line("");
        }
    }

    // ---- struct typedefs ----------------------------------------------

    fn emit_struct_typedefs(&mut self) {
        for s in self.structs {
            self.line(format!("typedef struct {0} {0};", s.name));
        }
        self.line("");
        for s in self.structs {
            self.line(format!("struct {} {{", s.name));
            self.indent += 1;
            for (name, ty) in &s.fields {
                self.line(format!("{};", self.declare(name, ty)));
            }
            self.indent -= 1;
            self.line("};");
            self.line("");
        }
    }

    // ---- type lowering --------------------------------------------------

    /// Base C type for a scalar, pointer, or struct-named type. Does not
    /// handle array declarators (see `declare`), since C spells those
    /// around the identifier rather than the type.
    fn c_type(&self, ty: &Type) -> String {
        match ty {
            Type::Named(name) => match name.as_str() {
                "i8" => "int8_t".to_string(),
                "i16" => "int16_t".to_string(),
                "i32" => "int32_t".to_string(),
                "i64" => "int64_t".to_string(),
                "u8" => "uint8_t".to_string(),
                "u16" => "uint16_t".to_string(),
                "u32" => "uint32_t".to_string(),
                "u64" => "uint64_t".to_string(),
                "f32" => "float".to_string(),
                "f64" => "double".to_string(),
                "bool" => "bool".to_string(),
                "void" => "void".to_string(),
                "any" => "void*".to_string(),
                "char" => "char".to_string(),
                "string" => "char*".to_string(),
                other if self.struct_names.contains(other) => format!("{other}*"),
                other => other.to_string(),
            },
            Type::Pointer { to, .. } => format!("{}*", self.c_type(to)),
            Type::Array { element, .. } => self.c_type(element),
        }
    }

    /// A full C declarator: `TYPE name` or, for a fixed-size array,
    /// `TYPE name[SIZE]`.
    fn declare(&self, name: &str, ty: &Type) -> String {
        match ty {
            Type::Array { element, size } => format!("{} {}[{}]", self.c_type(element), name, size),
            other => format!("{} {}", self.c_type(other), name),
        }
    }

    /// Parameter lowering: a non-`mut` struct parameter is by value, a
    /// `mut` struct parameter (or any non-struct `mut` primitive) is a
    /// pointer. This is the one place a struct-typed binding is NOT a
    /// pointer in the emitted C.
    fn c_param_type(&self, param: &Param) -> String {
        if let Some(struct_name) = param.ty.struct_name() {
            if param.mut_ { format!("{struct_name}*") } else { struct_name.to_string() }
        } else if param.mut_ && !param.ty.is_pointer() {
            format!("{}*", self.c_type(&param.ty))
        } else {
            self.c_type(&param.ty)
        }
    }

    /// Struct return types always lower to pointer-to-struct.
    fn c_return_type(&self, ty: &Type) -> String {
        if let Some(struct_name) = ty.struct_name() { format!("{struct_name}*") } else { self.c_type(ty) }
    }

    // ---- function name / prototypes -------------------------------------

    fn c_fn_name(decl: &FnDecl) -> String {
        if decl.name == "main" && decl.receiver_type.is_none() {
            return "main_main".to_string();
        }
        match (&decl.receiver_type, decl.name.as_str()) {
            (Some(receiver), "new") => format!("{receiver}_constructor"),
            (Some(receiver), "free") => format!("{receiver}_destructor"),
            _ => decl.name.clone(),
        }
    }

    fn prototype(&self, decl: &FnDecl) -> String {
        let params: Vec<String> = decl
            .params
            .iter()
            .map(|p| self.c_param_type(p))
            .collect::<Vec<_>>()
            .into_iter()
            .zip(decl.params.iter())
            .map(|(ty, p)| format!("{ty} {}", p.name))
            .collect();
        let params = if params.is_empty() { "void".to_string() } else { params.join(", ") };
        format!("{} {}({})", self.c_return_type(&decl.return_type), Self::c_fn_name(decl), params)
    }

    fn emit_prototypes(&mut self) {
        let decls: Vec<FnDecl> = self.ordered_decls.iter().map(|d| (*d).clone()).collect();
        for f in &decls {
            self.line(format!("{};", self.prototype(f)));
        }
        self.line("");
    }

    // ---- functions --------------------------------------------------------

    fn emit_function(&mut self, f: &LoweredFn) {
        self.value_struct_params.clear();
        self.var_types.clear();
        for param in &f.decl.params {
            self.var_types.insert(param.name.clone(), param.ty.clone());
            if param.ty.struct_name().is_some() && !param.mut_ {
                self.value_struct_params.insert(param.name.clone());
            }
        }
        self.line(format!("{} {{", self.prototype(&f.decl)));
        self.indent += 1;
        self.emit_block(&f.body);
        self.indent -= 1;
        self.line("}");
        self.line("");
    }

    fn emit_block(&mut self, block: &LoweredBlock) {
        for stmt in &block.statements {
            self.emit_stmt(stmt);
        }
        for stmt in &block.deferred {
            self.emit_stmt(stmt);
        }
        for name in &block.cleanup {
            self.emit_cleanup_one(name);
        }
    }

    fn emit_cleanup_one(&mut self, name: &str) {
        if let Some(struct_name) = self.var_types.get(name).and_then(Type::struct_name) {
            if let Some(dtor) = self.lifecycle_of(struct_name).destructor {
                self.line(format!("{dtor}({name});"));
            }
        }
        self.line(format!("{};", self.config.free_call(name)));
    }

    fn emit_stmt(&mut self, stmt: &LoweredStmt) {
        match stmt {
            LoweredStmt::Return { value, cleanup_all, .. } => self.emit_return(value.as_ref(), cleanup_all),
            LoweredStmt::VarDecl { name, ty, init, needs_free, .. } => {
                self.emit_var_decl(name, ty.as_ref(), init.as_ref(), *needs_free)
            }
            LoweredStmt::ExprStmt(expr) => {
                let s = self.emit_expr(expr);
                self.line(format!("{s};"));
            }
            LoweredStmt::If { cond, then_branch, else_branch, .. } => {
                let cond = self.emit_expr(cond);
                self.line(format!("if ({cond}) {{"));
                self.indent += 1;
                self.emit_block(then_branch);
                self.indent -= 1;
                self.emit_else(else_branch.as_deref());
            }
            LoweredStmt::Block(block) => {
                self.line("{");
                self.indent += 1;
                self.emit_block(block);
                self.indent -= 1;
                self.line("}");
            }
            LoweredStmt::While { cond, body, .. } => {
                let cond = self.emit_expr(cond);
                self.line(format!("while ({cond}) {{"));
                self.indent += 1;
                self.emit_block(body);
                self.indent -= 1;
                self.line("}");
            }
            LoweredStmt::Free(name) => self.emit_cleanup_one(name),
            LoweredStmt::Discard(expr) => {
                let s = self.emit_expr(expr);
                self.line(format!("(void)({s});"));
            }
        }
    }

    fn emit_else(&mut self, else_branch: Option<&LoweredStmt>) {
        match else_branch {
            None => self.line("}"),
            Some(LoweredStmt::If { cond, then_branch, else_branch, .. }) => {
                let cond = self.emit_expr(cond);
                self.line(format!("}} else if ({cond}) {{"));
                self.indent += 1;
                self.emit_block(then_branch);
                self.indent -= 1;
                self.emit_else(else_branch.as_deref());
            }
            Some(LoweredStmt::Block(block)) => {
                self.line("} else {");
                self.indent += 1;
                self.emit_block(block);
                self.indent -= 1;
                self.line("}");
            }
            Some(other) => {
                self.line("} else {");
                self.indent += 1;
                self.emit_stmt(other);
                self.indent -= 1;
                self.line("}");
            }
        }
    }

    fn emit_return(&mut self, value: Option<&Expr>, cleanup_all: &[String]) {
        if cleanup_all.is_empty() {
            match value {
                Some(v) => {
                    let s = self.emit_expr(v);
                    self.line(format!("return {s};"));
                }
                None => self.line("return;"),
            }
            return;
        }
        match value {
            Some(v) => {
                let expr = self.emit_expr(v);
                let tmp = self.next_tmp("r");
                let mut parts = vec![format!("__typeof__({expr}) {tmp} = ({expr})")];
                for name in cleanup_all {
                    parts.push(self.free_fragment(name));
                }
                parts.push(tmp.clone());
                self.line(format!("return ({{ {}; }});", parts.join("; ")));
            }
            None => {
                self.line("{");
                self.indent += 1;
                for name in cleanup_all {
                    self.line(format!("{};", self.free_fragment(name)));
                }
                self.line("return;");
                self.indent -= 1;
                self.line("}");
            }
        }
    }

    /// A single free (destructor-then-deallocate), as a bare expression
    /// fragment usable inside a statement-expression's `;`-separated list.
    fn free_fragment(&self, name: &str) -> String {
        if let Some(struct_name) = self.var_types.get(name).and_then(Type::struct_name) {
            if let Some(dtor) = self.lifecycle_of(struct_name).destructor {
                return format!("{dtor}({name}), {}", self.config.free_call(name));
            }
        }
        self.config.free_call(name)
    }

    fn emit_var_decl(&mut self, name: &str, ty: Option<&Type>, init: Option<&Expr>, needs_free: bool) {
        let resolved = ty.cloned().or_else(|| init.and_then(|e| self.infer_type(e))).unwrap_or_else(|| Type::named("any"));
        self.var_types.insert(name.to_string(), resolved.clone());
        let init_str = init.map(|e| self.emit_expr(e));
        if let Some(struct_name) = resolved.struct_name() {
            let decl_ty = format!("{struct_name}*");
            match init_str {
                Some(s) => self.line(format!("{decl_ty} {name} = {s};")),
                None => self.line(format!("{decl_ty} {name} = NULL;")),
            }
            if needs_free {
                if let Some(ctor) = self.lifecycle_of(struct_name).constructor {
                    self.line(format!("{ctor}({name});"));
                }
            }
        } else {
            match init_str {
                Some(s) => self.line(format!("{} = {s};", self.declare(name, &resolved))),
                None => self.line(format!("{};", self.declare(name, &resolved))),
            }
        }
    }

    /// Minimal re-derivation of an expression's static type, used only when
    /// a `let` binding elides its type. Mirrors the subset of the type
    /// checker's `infer` that the emitter needs; trusts that the program
    /// already passed type checking.
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
                self.fn_decls.get(&(receiver_type.clone(), function.clone())).map(|d| d.return_type.clone())
            }
            _ => None,
        }
    }

    // ---- expressions --------------------------------------------------

    fn emit_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Int { value, .. } => value.to_string(),
            Expr::Bool { value, .. } => if *value { "true".to_string() } else { "false".to_string() },
            Expr::String { value, .. } => format!("\"{}\"", escape_c_string(value)),
            Expr::Char { value, .. } => format!("'{}'", escape_c_char(*value)),
            Expr::Null { .. } => "NULL".to_string(),
            Expr::Ident { name, .. } => name.clone(),
            Expr::Binary { op, left, right, .. } => self.emit_binary(*op, left, right),
            Expr::Unary { op, operand, .. } => self.emit_unary(*op, operand),
            Expr::Assign { target, value, .. } => {
                let t = self.emit_expr(target);
                let v = self.emit_expr(value);
                format!("({t} = {v})")
            }
            Expr::CompoundAssign { op, target, value, .. } => {
                let t = self.emit_expr(target);
                let v = self.emit_expr(value);
                format!("({t} {}= {v})", compound_sym(*op))
            }
            Expr::Call { callee, args, .. } => {
                let callee = self.emit_expr(callee);
                let args: Vec<String> = args.iter().map(|a| self.emit_expr(a)).collect();
                format!("{callee}({})", args.join(", "))
            }
            Expr::Field { object, field, .. } => self.emit_field(object, field),
            Expr::Index { object, index, .. } => {
                let o = self.emit_expr(object);
                let i = self.emit_expr(index);
                format!("{o}[{i}]")
            }
            Expr::StructLiteral { type_name, fields, .. } => self.emit_struct_literal(type_name, fields),
            Expr::NewHeap { type_name, fields, .. } => self.emit_new(type_name, fields),
            Expr::Clone { expr: inner, target_type, .. } => self.emit_clone(inner, target_type.as_ref()),
            Expr::Cast { target_type, expr: inner, .. } => self.emit_cast(target_type, inner),
            Expr::MethodRef { .. } | Expr::StaticMethodCall { .. } => {
                unreachable!("method references are resolved to ResolvedCall during lowering")
            }
            Expr::NullCheck { operand, .. } => self.emit_null_check(operand),
            Expr::MutArg { expr: inner, .. } => {
                // A bare MutArg outside a resolved call's argument list (no
                // target parameter to consult) always synthesizes the
                // address-of the spec describes for a `mut` call-site.
                let e = self.emit_expr(inner);
                format!("(&({e}))")
            }
            Expr::NamedArg { value, .. } => self.emit_expr(value),
            Expr::IsCheck { expr: inner, ty, .. } => {
                let e = self.emit_expr(inner);
                format!("__builtin_types_compatible_p(__typeof__({e}), {})", self.c_type(ty))
            }
            Expr::TypeOf { expr: inner, .. } => self.emit_typeof(inner),
            Expr::ResolvedCall { function, receiver, receiver_type, args, .. } => {
                self.emit_resolved_call(function, receiver_type.as_deref(), receiver.as_deref(), args)
            }
        }
    }

    fn emit_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> String {
        let l = self.emit_expr(left);
        let r = self.emit_expr(right);
        match op {
            BinOp::LogOr => {
                let tmp = self.next_tmp("t");
                format!("({{ __typeof__({l}) {tmp} = ({l}); {tmp} ? {tmp} : ({r}); }})")
            }
            BinOp::LogAnd => format!("(({l}) && ({r}))"),
            _ => format!("({l} {} {r})", binop_sym(op)),
        }
    }

    fn emit_unary(&mut self, op: UnOp, operand: &Expr) -> String {
        let o = self.emit_expr(operand);
        match op {
            UnOp::Neg => format!("(-({o}))"),
            UnOp::Not => format!("(!({o}))"),
            UnOp::Addr => format!("(&({o}))"),
            UnOp::Deref => format!("(*({o}))"),
            UnOp::BitNot => format!("(~({o}))"),
        }
    }

    /// `a.b` lowers to `a->b` unless `a` is a known by-value struct
    /// (currently only possible for a non-`mut` struct parameter).
    fn emit_field(&mut self, object: &Expr, field: &str) -> String {
        let is_value = matches!(object, Expr::Ident { name, .. } if self.value_struct_params.contains(name));
        let o = self.emit_expr(object);
        if is_value { format!("({o}).{field}") } else { format!("({o})->{field}") }
    }

    fn emit_field_inits(&mut self, fields: &[FieldInit]) -> String {
        fields
            .iter()
            .map(|f| {
                let v = self.emit_expr(&f.value);
                format!(".{} = {v}", f.name)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `T{...}` -> `&(T){ .f = v, ... }`, a pointer to a compound literal.
    fn emit_struct_literal(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        let inits = self.emit_field_inits(fields);
        format!("(&({type_name}){{ {inits} }})")
    }

    /// `new T{...}` -> a statement-expression allocating, initializing, and
    /// yielding a pointer; the constructor call (if any) is inserted by the
    /// caller of this expression (`emit_var_decl`/`emit_stmt`), not here,
    /// since `new` can also appear outside of a `let` (e.g. as a call arg).
    fn emit_new(&mut self, type_name: &str, fields: &[FieldInit]) -> String {
        let inits = self.emit_field_inits(fields);
        let tmp = self.next_tmp("p");
        let malloc = self.config.malloc_call(&format!("sizeof({type_name})"));
        format!("({{ {type_name}* {tmp} = ({type_name}*)({malloc}); *{tmp} = ({type_name}){{ {inits} }}; {tmp}; }})")
    }

    /// `clone(e)` copies the pointee of a struct pointer (or, if `e` is
    /// itself a by-value struct, its value) into a fresh allocation.
    fn emit_clone(&mut self, inner: &Expr, target_type: Option<&Type>) -> String {
        let e = self.emit_expr(inner);
        let tmp = self.next_tmp("c");
        let is_value = matches!(inner, Expr::Ident { name, .. } if self.value_struct_params.contains(name));
        let source = if is_value { format!("({e})") } else { format!("(*({e}))") };
        let ty = target_type
            .and_then(Type::struct_name)
            .map(|s| s.to_string())
            .or_else(|| self.infer_type(inner).as_ref().and_then(Type::struct_name).map(str::to_string));
        match ty {
            Some(ty) => {
                let malloc = self.config.clone_call(&format!("sizeof({ty})"));
                format!("({{ {ty}* {tmp} = ({ty}*)({malloc}); *{tmp} = {source}; {tmp}; }})")
            }
            None => {
                let malloc = self.config.clone_call(&format!("sizeof({source})"));
                format!("({{ __typeof__(&{source}) {tmp} = ({malloc}); *{tmp} = {source}; {tmp}; }})")
            }
        }
    }

    fn emit_cast(&mut self, target_type: &Type, inner: &Expr) -> String {
        let e = self.emit_expr(inner);
        let c_ty = self.c_type(target_type);
        if target_type.struct_name().is_some() {
            // `any` (or another struct pointer) cast to a struct type lands
            // on pointer-to-struct under the implicit-pointer model.
            format!("(({c_ty}*)({e}))")
        } else {
            format!("(({c_ty})({e}))")
        }
    }

    fn emit_null_check(&mut self, operand: &Expr) -> String {
        let e = self.emit_expr(operand);
        let tmp = self.next_tmp("n");
        format!(
            "({{ __typeof__({e}) {tmp} = ({e}); if (!{tmp}) {{ fprintf(stderr, \"{}:%d: null check failed\\n\", __LINE__); abort(); }} {tmp}; }})",
            self.file_stem
        )
    }

    /// Best-effort static type name for `typeof(e)`: Czar has no runtime
    /// type tags (no generics, no dynamic dispatch — an explicit
    /// non-goal), so this can only ever report the statically-known type,
    /// resolved the same way `infer_type` resolves an elided `let`. Falls
    /// back to `"any"` when the expression's static type cannot be
    /// re-derived from syntax alone.
    fn emit_typeof(&mut self, inner: &Expr) -> String {
        let _ = self.emit_expr(inner);
        let name = self.infer_type(inner).map(|t| t.display()).unwrap_or_else(|| "any".to_string());
        format!("\"{name}\"")
    }

    fn emit_resolved_call(&mut self, function: &str, receiver_type: Option<&str>, receiver: Option<&Expr>, args: &[Expr]) -> String {
        let decl = self.fn_decls.get(&(receiver_type.map(str::to_string), function.to_string())).copied();
        let param_offset = if receiver.is_some() { 1 } else { 0 };
        let mut parts = Vec::new();
        if let Some(receiver) = receiver {
            parts.push(self.emit_receiver(receiver, decl));
        }
        for (i, arg) in args.iter().enumerate() {
            let target_mut = decl.and_then(|d| d.params.get(i + param_offset)).map(|p| p.mut_);
            parts.push(self.emit_call_arg(arg, target_mut));
        }
        // `new`/`free` methods are renamed to `T_constructor`/`T_destructor`
        // at emission time; every other name passes through unchanged. The
        // lowered AST only ever carries the bare method name, so the actual
        // C symbol has to be re-derived here from the matching declaration.
        let c_name = decl.map(Self::c_fn_name).unwrap_or_else(|| function.to_string());
        format!("{c_name}({})", parts.join(", "))
    }

    /// Insert `&` only when the method expects a pointer and the receiver
    /// is a known by-value struct variable; every other struct-typed
    /// expression is already a pointer under the implicit-pointer model.
    fn emit_receiver(&mut self, receiver: &Expr, decl: Option<&FnDecl>) -> String {
        let expects_pointer = decl.and_then(|d| d.params.first()).map(|p| p.ty.is_pointer() || p.mut_).unwrap_or(true);
        let is_value = matches!(receiver, Expr::Ident { name, .. } if self.value_struct_params.contains(name));
        let r = self.emit_expr(receiver);
        if expects_pointer && is_value { format!("(&({r}))") } else { r }
    }

    /// `mut x` at a call site synthesizes `&x` only when the matched
    /// parameter is actually `mut`; otherwise (per spec) the `mut` keyword
    /// is ignored and the plain value is passed — the type checker has
    /// already warned about the mismatch.
    fn emit_call_arg(&mut self, arg: &Expr, target_mut: Option<bool>) -> String {
        if let Expr::MutArg { expr: inner, .. } = arg {
            let e = self.emit_expr(inner);
            return if target_mut.unwrap_or(true) { format!("(&({e}))") } else { e };
        }
        self.emit_expr(arg)
    }

    // ---- entry point ----------------------------------------------------

    fn emit_main_trampoline(&mut self) {
        self.line("int main(void) {");
        self.indent += 1;
        self.line("int _czar_status = main_main();");
        if self.config.debug {
            self.line("_czar_print_summary();");
        }
        self.line("return _czar_status;");
        self.indent -= 1;
        self.line("}");
    }
}

fn binop_sym(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::EqEq => "==",
        BinOp::Ne => "!=",
        BinOp::LogAnd => "&&",
        BinOp::LogOr => "||",
    }
}

fn compound_sym(op: CompoundOp) -> &'static str {
    match op {
        CompoundOp::Add => "+",
        CompoundOp::Sub => "-",
        CompoundOp::Mul => "*",
        CompoundOp::Div => "/",
        CompoundOp::Rem => "%",
    }
}

fn escape_c_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

fn escape_c_char(c: char) -> String {
    match c {
        '\\' => "\\\\".to_string(),
        '\'' => "\\'".to_string(),
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::lexer::lex;
    use crate::lowering::lower;
    use crate::parser::parse;
    use std::path::Path;

    fn generate_source(src: &str) -> String {
        let mut diags = Diagnostics::new();
        let tokens = lex(src, Path::new("t.cz"), &mut diags);
        let program = parse(tokens, Path::new("t.cz"), &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        crate::typechecker::check(&program, Path::new("t.cz"), &mut diags);
        assert!(!diags.has_errors(), "{:?}", diags.into_vec());
        let lowered = lower(&program);
        let config = CompilerConfig::new();
        generate(&lowered, Path::new("t.cz"), &config)
    }

    #[test]
    fn main_is_renamed_and_trampolined() {
        let c = generate_source("fn main() i32 { return 30; }");
        assert!(c.contains("int32_t main_main(void)"));
        assert!(c.contains("int main(void)"));
        assert!(c.contains("main_main();"));
    }

    #[test]
    fn struct_field_access_lowers_to_arrow() {
        let c = generate_source("struct P { i32 x } fn main() i32 { let p = new P { x: 7 } return p.x; }");
        assert!(c.contains("typedef struct P P;"));
        assert!(c.contains("->x"));
    }

    #[test]
    fn new_heap_allocation_is_a_statement_expression() {
        let c = generate_source("struct P { i32 x } fn main() i32 { let p = new P { x: 7 } return p.x; }");
        assert!(c.contains("malloc(sizeof(P))"));
    }

    #[test]
    fn early_return_frees_outstanding_allocations_before_returning() {
        let c = generate_source(
            "struct P { i32 x } fn main() i32 { let a = new P { x: 1 } let b = new P { x: 2 } if b.x == 2 { return a.x; } return b.x; }",
        );
        assert!(c.contains("free(b), free(a)") || c.contains("free(b)"), "{c}");
    }

    #[test]
    fn use_of_value_struct_parameter_keeps_dot_access() {
        let c = generate_source("struct V { i32 x } fn V:get(self) i32 { return self.x }");
        assert!(c.contains("(self).x"), "{c}");
    }

    #[test]
    fn static_constructor_call_resolves_to_renamed_c_function() {
        let c = generate_source(
            "struct P { i32 x } fn P:new(mut self) { self.x = 0 } fn main() i32 { let p = new P { x: 1 } P::new(p) return p.x; }",
        );
        assert!(c.contains("P_constructor("), "{c}");
        assert!(c.contains("self)->x = 0"), "{c}");
        assert!(c.contains("P_constructor(p)"), "{c}");
        assert!(!c.contains(" new(p)"), "{c}");
    }

    #[test]
    fn same_named_methods_on_different_structs_emit_distinct_c_functions() {
        let c = generate_source(
            "struct Rect { i32 w } struct Circle { i32 r } \
             fn Rect:area(self) i32 { return self.w } \
             fn Circle:area(self) i32 { return self.r } \
             fn main() i32 { let rect = Rect{w: 3} let circ = Circle{r: 4} return rect:area() + circ:area(); }",
        );
        assert!(c.contains("int32_t area(Rect self)"), "{c}");
        assert!(c.contains("int32_t area(Circle self)"), "{c}");
        assert!(c.contains("area(rect)"), "{c}");
        assert!(c.contains("area(circ)"), "{c}");
    }

    #[test]
    fn debug_config_emits_instrumented_allocator() {
        let mut diags = Diagnostics::new();
        let src = "struct P { i32 x } fn main() i32 { let p = new P { x: 7 } return p.x; }";
        let tokens = lex(src, Path::new("t.cz"), &mut diags);
        let program = parse(tokens, Path::new("t.cz"), &mut diags);
        crate::typechecker::check(&program, Path::new("t.cz"), &mut diags);
        assert!(!diags.has_errors());
        let lowered = lower(&program);
        let config = CompilerConfig::new().with_debug(true);
        let c = generate(&lowered, Path::new("t.cz"), &config);
        assert!(c.contains("_czar_malloc"));
        assert!(c.contains("_czar_print_summary"));
    }
}
