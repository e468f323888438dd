//! Abstract syntax tree for Czar
//!
//! Produced by the parser (`parser.rs`), decorated in place by the type
//! checker (`typechecker.rs`), and rewritten by the lowering pass
//! (`lowering.rs`) before the code generator ever sees it.

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub directives: Vec<Directive>,
    pub structs: Vec<StructDecl>,
    pub functions: Vec<FnDecl>,
}

impl Program {
    pub fn new() -> Self {
        Program { directives: Vec::new(), structs: Vec::new(), functions: Vec::new() }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Lower-cased directive name: `file`, `function`, `debug`, `defer`,
    /// `alloc`, `import`, `use`, `malloc`, `free`.
    pub kind: String,
    pub args: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub default: Option<Expr>,
    pub mut_: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub name: String,
    /// `Some(T)` for `fn T:method(...)`, `None` for a free function
    /// (which may still become an extension method if its first
    /// parameter is named `self`).
    pub receiver_type: Option<String>,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Block,
    pub pub_: bool,
    pub line: usize,
    pub column: usize,
}

impl FnDecl {
    /// An extension method is a free function whose first parameter is
    /// named `self`; the receiver type is derived from that parameter's
    /// declared type rather than from explicit `T:` syntax.
    pub fn extension_receiver(&self) -> Option<&str> {
        if self.receiver_type.is_some() {
            return None;
        }
        let first = self.params.first()?;
        if first.name == "self" {
            first.ty.struct_name()
        } else {
            None
        }
    }

    /// The type every call site should prepend a receiver argument for:
    /// either the explicit `T:` receiver or the inferred extension-method one.
    pub fn dispatch_receiver(&self) -> Option<&str> {
        self.receiver_type.as_deref().or_else(|| self.extension_receiver())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return { value: Option<Expr>, line: usize, column: usize },
    VarDecl {
        name: String,
        ty: Option<Type>,
        init: Option<Expr>,
        mutable: bool,
        /// Assigned by the type checker: index of the scope frame that owns
        /// this binding. `0` until resolved.
        scope_id: usize,
        line: usize,
        column: usize,
    },
    ExprStmt { expr: Expr, line: usize, column: usize },
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Box<Stmt>>,
        line: usize,
        column: usize,
    },
    /// A bare `{ ... }` block nested inside another block (distinct from
    /// the `If`'s `else` arm, which uses this variant when the `else` is
    /// itself a block rather than a chained `if`).
    Block { block: Block, line: usize, column: usize },
    While { cond: Expr, body: Block, line: usize, column: usize },
    Free { name: String, line: usize, column: usize },
    Discard { expr: Expr, line: usize, column: usize },
    Defer { stmt: Box<Stmt>, line: usize, column: usize },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Stmt::Return { line, .. }
            | Stmt::VarDecl { line, .. }
            | Stmt::ExprStmt { line, .. }
            | Stmt::If { line, .. }
            | Stmt::Block { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Free { line, .. }
            | Stmt::Discard { line, .. }
            | Stmt::Defer { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, Rem,
    BitAnd, BitOr, BitXor, Shl, Shr,
    Lt, Gt, Le, Ge, EqEq, Ne,
    LogAnd, LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg, Not, Addr, Deref, BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Add, Sub, Mul, Div, Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int { value: i64, line: usize, column: usize },
    Bool { value: bool, line: usize, column: usize },
    String { value: String, line: usize, column: usize },
    Char { value: char, line: usize, column: usize },
    Null { line: usize, column: usize },
    Ident { name: String, line: usize, column: usize },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr>, line: usize, column: usize },
    Unary { op: UnOp, operand: Box<Expr>, line: usize, column: usize },
    Assign { target: Box<Expr>, value: Box<Expr>, line: usize, column: usize },
    CompoundAssign { op: CompoundOp, target: Box<Expr>, value: Box<Expr>, line: usize, column: usize },
    Call { callee: Box<Expr>, args: Vec<Expr>, line: usize, column: usize },
    Field { object: Box<Expr>, field: String, line: usize, column: usize },
    Index { object: Box<Expr>, index: Box<Expr>, line: usize, column: usize },
    StructLiteral { type_name: String, fields: Vec<FieldInit>, line: usize, column: usize },
    NewHeap { type_name: String, fields: Vec<FieldInit>, line: usize, column: usize },
    Clone { expr: Box<Expr>, target_type: Option<Type>, line: usize, column: usize },
    Cast { target_type: Type, expr: Box<Expr>, line: usize, column: usize },
    /// `obj:method` or `obj.method` used as a call's callee (`Call.callee`);
    /// resolved to a concrete function by lowering (`lowering.rs`).
    MethodRef { object: Box<Expr>, method: String, line: usize, column: usize },
    StaticMethodCall { type_name: String, method: String, args: Vec<Expr>, line: usize, column: usize },
    NullCheck { operand: Box<Expr>, line: usize, column: usize },
    MutArg { expr: Box<Expr>, line: usize, column: usize },
    NamedArg { name: String, value: Box<Expr>, line: usize, column: usize },
    IsCheck { expr: Box<Expr>, ty: Type, line: usize, column: usize },
    TypeOf { expr: Box<Expr>, line: usize, column: usize },
    /// Produced only by lowering (`lowering.rs`): a `Call` whose callee was a
    /// `MethodRef`, `StaticMethodCall`, or plain function `Ident` has been
    /// resolved to the concrete `(function-name, receiver-expr, args)`
    /// triple the emitter needs. `receiver` is `Some` only for an
    /// instance-method call, where the emitter auto-addresses it if needed.
    /// `receiver_type` is the resolved function's dispatch key (`None` for a
    /// free function) and lets the code generator look the declaration back
    /// up without re-deriving it from the receiver expression.
    ResolvedCall { function: String, receiver: Option<Box<Expr>>, receiver_type: Option<String>, args: Vec<Expr>, line: usize, column: usize },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Int { line, .. }
            | Expr::Bool { line, .. }
            | Expr::String { line, .. }
            | Expr::Char { line, .. }
            | Expr::Null { line, .. }
            | Expr::Ident { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Assign { line, .. }
            | Expr::CompoundAssign { line, .. }
            | Expr::Call { line, .. }
            | Expr::Field { line, .. }
            | Expr::Index { line, .. }
            | Expr::StructLiteral { line, .. }
            | Expr::NewHeap { line, .. }
            | Expr::Clone { line, .. }
            | Expr::Cast { line, .. }
            | Expr::MethodRef { line, .. }
            | Expr::StaticMethodCall { line, .. }
            | Expr::NullCheck { line, .. }
            | Expr::MutArg { line, .. }
            | Expr::NamedArg { line, .. }
            | Expr::IsCheck { line, .. }
            | Expr::TypeOf { line, .. }
            | Expr::ResolvedCall { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            Expr::Int { column, .. }
            | Expr::Bool { column, .. }
            | Expr::String { column, .. }
            | Expr::Char { column, .. }
            | Expr::Null { column, .. }
            | Expr::Ident { column, .. }
            | Expr::Binary { column, .. }
            | Expr::Unary { column, .. }
            | Expr::Assign { column, .. }
            | Expr::CompoundAssign { column, .. }
            | Expr::Call { column, .. }
            | Expr::Field { column, .. }
            | Expr::Index { column, .. }
            | Expr::StructLiteral { column, .. }
            | Expr::NewHeap { column, .. }
            | Expr::Clone { column, .. }
            | Expr::Cast { column, .. }
            | Expr::MethodRef { column, .. }
            | Expr::StaticMethodCall { column, .. }
            | Expr::NullCheck { column, .. }
            | Expr::MutArg { column, .. }
            | Expr::NamedArg { column, .. }
            | Expr::IsCheck { column, .. }
            | Expr::TypeOf { column, .. }
            | Expr::ResolvedCall { column, .. } => *column,
        }
    }

    /// A compile-time-constant integer, if this expression is one.
    /// Used by the type checker for constant-index array bounds checks.
    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Expr::Int { value, .. } => Some(*value),
            Expr::Unary { op: UnOp::Neg, operand, .. } => operand.as_const_int().map(|v| -v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn int(value: i64) -> Expr {
        Expr::Int { value, line: 1, column: 1 }
    }

    #[test]
    fn explicit_receiver_wins_over_self_param() {
        let f = FnDecl {
            name: "area".into(),
            receiver_type: Some("Rect".into()),
            params: vec![Param { name: "self".into(), ty: Type::named("Rect"), default: None, mut_: false }],
            return_type: Type::named("i32"),
            body: Block { statements: vec![] },
            pub_: false,
            line: 1,
            column: 1,
        };
        assert_eq!(f.dispatch_receiver(), Some("Rect"));
        assert_eq!(f.extension_receiver(), None, "explicit receiver_type takes the self-param slot");
    }

    #[test]
    fn extension_method_inferred_from_self_param() {
        let f = FnDecl {
            name: "double".into(),
            receiver_type: None,
            params: vec![Param { name: "self".into(), ty: Type::named("Point"), default: None, mut_: false }],
            return_type: Type::named("void"),
            body: Block { statements: vec![] },
            pub_: false,
            line: 1,
            column: 1,
        };
        assert_eq!(f.extension_receiver(), Some("Point"));
        assert_eq!(f.dispatch_receiver(), Some("Point"));
    }

    #[test]
    fn free_function_has_no_receiver() {
        let f = FnDecl {
            name: "add".into(),
            receiver_type: None,
            params: vec![Param { name: "a".into(), ty: Type::named("i32"), default: None, mut_: false }],
            return_type: Type::named("i32"),
            body: Block { statements: vec![] },
            pub_: false,
            line: 1,
            column: 1,
        };
        assert_eq!(f.dispatch_receiver(), None);
    }

    #[test]
    fn as_const_int_handles_negation() {
        let neg = Expr::Unary { op: UnOp::Neg, operand: Box::new(int(5)), line: 1, column: 1 };
        assert_eq!(neg.as_const_int(), Some(-5));
        assert_eq!(int(7).as_const_int(), Some(7));
    }

    #[test]
    fn as_const_int_none_for_non_constant() {
        let ident = Expr::Ident { name: "x".into(), line: 1, column: 1 };
        assert_eq!(ident.as_const_int(), None);
    }
}
