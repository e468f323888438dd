//! Type representation for Czar
//!
//! Two types are equal iff structurally equal on names, pointer chains, and
//! array sizes (the derived `PartialEq` gives us exactly that). There are no
//! implicit conversions between unrelated types; casts are always explicit.

/// Flags carried by a `Pointer` type. The two bits are orthogonal:
/// `is_mut` says the callee may write through the pointer, `is_clone` marks
/// a pointer synthesized by the compiler for a heap allocation (it affects
/// whether the emitter inserts a dereference at use sites).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerFlags {
    pub is_mut: bool,
    pub is_clone: bool,
}

impl PointerFlags {
    pub const NONE: PointerFlags = PointerFlags { is_mut: false, is_clone: false };

    pub fn mut_only() -> Self {
        PointerFlags { is_mut: true, is_clone: false }
    }

    pub fn clone_only() -> Self {
        PointerFlags { is_mut: false, is_clone: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A primitive (`i8..i64`, `u8..u64`, `f32`, `f64`, `bool`, `void`, `any`)
    /// or a user struct name.
    Named(String),
    Pointer {
        to: Box<Type>,
        flags: PointerFlags,
    },
    Array {
        element: Box<Type>,
        size: usize,
    },
}

pub const PRIMITIVE_NAMES: &[&str] = &[
    "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "f32", "f64", "bool", "void", "any",
    "char", "string",
];

impl Type {
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named(name.into())
    }

    pub fn pointer(to: Type, flags: PointerFlags) -> Self {
        Type::Pointer { to: Box::new(to), flags }
    }

    pub fn array(element: Type, size: usize) -> Self {
        Type::Array { element: Box::new(element), size }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Named(name) if PRIMITIVE_NAMES.contains(&name.as_str()))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Named(name) if name == "void")
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    /// True for a bare `Named(struct)` type that is not itself a primitive —
    /// this is the type checker's signal that the implicit-pointer model
    /// applies (the variable will actually be stored as a `T*` in the
    /// emitted C).
    pub fn is_struct_name(&self, struct_names: &std::collections::HashSet<String>) -> bool {
        matches!(self, Type::Named(name) if struct_names.contains(name))
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::Named(name) if !PRIMITIVE_NAMES.contains(&name.as_str()) => Some(name),
            Type::Pointer { to, .. } => to.struct_name(),
            _ => None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Type::Named(name) => name.clone(),
            Type::Pointer { to, .. } => format!("*{}", to.display()),
            Type::Array { element, size } => format!("[{}; {}]", element.display(), size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_on_names() {
        assert_eq!(Type::named("i32"), Type::named("i32"));
        assert_ne!(Type::named("i32"), Type::named("i64"));
    }

    #[test]
    fn structural_equality_on_pointer_chains() {
        let a = Type::pointer(Type::named("Point"), PointerFlags::NONE);
        let b = Type::pointer(Type::named("Point"), PointerFlags::NONE);
        assert_eq!(a, b);

        let c = Type::pointer(Type::named("Point"), PointerFlags::mut_only());
        assert_ne!(a, c, "flags are part of the struct equality derive");
    }

    #[test]
    fn structural_equality_on_array_sizes() {
        let a = Type::array(Type::named("i32"), 4);
        let b = Type::array(Type::named("i32"), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn struct_name_unwraps_single_level_of_pointer() {
        let t = Type::pointer(Type::named("Point"), PointerFlags::NONE);
        assert_eq!(t.struct_name(), Some("Point"));
        assert_eq!(Type::named("i32").struct_name(), None);
    }
}
