//! Types, type schemes, and environments (spec §3.4).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub type VarId = u32;

#[derive(Debug, Clone)]
pub enum Type {
    Var(Rc<RefCell<VarCell>>),
    Const(&'static str),
    App(String, Vec<Type>),
    Fun(Box<Type>, Box<Type>),
    Record(Vec<(String, Type)>),
    Variant(String, Vec<Type>),
    Tuple(Vec<Type>),
    Ref(Box<Type>),
    Union(Vec<Type>),
    /// Recovery sentinel: unifies with anything, never reported again.
    Error,
}

#[derive(Debug, Clone)]
pub struct VarCell {
    pub id: VarId,
    pub level: u32,
    pub bound: Option<Type>,
}

impl Type {
    pub fn int() -> Type {
        Type::Const("Int")
    }
    pub fn float() -> Type {
        Type::Const("Float")
    }
    pub fn string() -> Type {
        Type::Const("String")
    }
    pub fn bool() -> Type {
        Type::Const("Bool")
    }
    pub fn unit() -> Type {
        Type::Const("Unit")
    }

    /// Follows `Var` forwarding chains to the representative type.
    pub fn prune(&self) -> Type {
        match self {
            Type::Var(cell) => {
                let bound = cell.borrow().bound.clone();
                match bound {
                    Some(t) => {
                        let pruned = t.prune();
                        cell.borrow_mut().bound = Some(pruned.clone());
                        pruned
                    }
                    None => self.clone(),
                }
            }
            other => other.clone(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.prune(), Type::Error)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self.prune(), other.prune()) {
            (Type::Var(a), Type::Var(b)) => a.borrow().id == b.borrow().id,
            (Type::Const(a), Type::Const(b)) => a == b,
            (Type::App(a, aa), Type::App(b, bb)) => a == b && aa == bb,
            (Type::Fun(a1, a2), Type::Fun(b1, b2)) => a1 == b1 && a2 == b2,
            (Type::Record(a), Type::Record(b)) => a == b,
            (Type::Variant(a, aa), Type::Variant(b, bb)) => a == b && aa == bb,
            (Type::Tuple(a), Type::Tuple(b)) => a == b,
            (Type::Ref(a), Type::Ref(b)) => a == b,
            (Type::Union(a), Type::Union(b)) => a == b,
            (Type::Error, Type::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prune() {
            Type::Var(cell) => write!(f, "'t{}", cell.borrow().id),
            Type::Const(name) => write!(f, "{name}"),
            Type::App(ctor, args) => {
                write!(f, "{ctor}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Fun(p, r) => write!(f, "({p}) -> {r}"),
            Type::Record(fields) => {
                write!(f, "{{")?;
                for (i, (n, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{n}: {t}")?;
                }
                write!(f, "}}")
            }
            Type::Variant(name, args) => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Type::Ref(inner) => write!(f, "Ref<{inner}>"),
            Type::Union(alts) => {
                for (i, a) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{a}")?;
                }
                Ok(())
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}

/// `quantified` names the variable ids that `instantiate` freshens; any
/// other free variable in `body` stays shared (monomorphic) across uses.
#[derive(Debug, Clone)]
pub struct TypeScheme {
    pub quantified: Vec<VarId>,
    pub body: Type,
}

impl TypeScheme {
    pub fn monomorphic(ty: Type) -> TypeScheme {
        TypeScheme {
            quantified: vec![],
            body: ty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeCtor {
    pub name: String,
    pub arity: usize,
}

/// Persistent (clone-on-extend) environment; shadowing is lexical because
/// extension returns a new map sharing the old one's storage via `Rc`.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    pub values: Rc<HashMap<String, TypeScheme>>,
    pub types: Rc<HashMap<String, TypeCtor>>,
    pub ctors: Rc<HashMap<String, TypeScheme>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_value(&self, name: String, scheme: TypeScheme) -> Self {
        let mut values = (*self.values).clone();
        values.insert(name, scheme);
        TypeEnv {
            values: Rc::new(values),
            types: self.types.clone(),
            ctors: self.ctors.clone(),
        }
    }

    pub fn extend_values(&self, bindings: impl IntoIterator<Item = (String, TypeScheme)>) -> Self {
        let mut values = (*self.values).clone();
        values.extend(bindings);
        TypeEnv {
            values: Rc::new(values),
            types: self.types.clone(),
            ctors: self.ctors.clone(),
        }
    }

    pub fn extend_type(&self, name: String, ctor: TypeCtor) -> Self {
        let mut types = (*self.types).clone();
        types.insert(name, ctor);
        TypeEnv {
            values: self.values.clone(),
            types: Rc::new(types),
            ctors: self.ctors.clone(),
        }
    }

    pub fn extend_ctor(&self, name: String, scheme: TypeScheme) -> Self {
        let mut ctors = (*self.ctors).clone();
        ctors.insert(name, scheme);
        TypeEnv {
            values: self.values.clone(),
            types: self.types.clone(),
            ctors: Rc::new(ctors),
        }
    }

    pub fn lookup_value(&self, name: &str) -> Option<&TypeScheme> {
        self.values.get(name)
    }

    pub fn lookup_ctor(&self, name: &str) -> Option<&TypeScheme> {
        self.ctors.get(name)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeCtor> {
        self.types.get(name)
    }
}

/// Black-box module-boundary lookup (spec §6.4, SPEC_FULL §11): consulted
/// for names absent from the local `TypeEnv` before reporting "undefined".
pub trait ModuleInterface {
    fn lookup_value(&self, name: &str) -> Option<TypeScheme>;
    fn lookup_type(&self, name: &str) -> Option<TypeCtor>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticModuleInterface {
    pub values: HashMap<String, TypeScheme>,
    pub types: HashMap<String, TypeCtor>,
}

impl ModuleInterface for StaticModuleInterface {
    fn lookup_value(&self, name: &str) -> Option<TypeScheme> {
        self.values.get(name).cloned()
    }
    fn lookup_type(&self, name: &str) -> Option<TypeCtor> {
        self.types.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_value_does_not_mutate_parent() {
        let env = TypeEnv::new();
        let env2 = env.extend_value("x".to_string(), TypeScheme::monomorphic(Type::int()));
        assert!(env.lookup_value("x").is_none());
        assert!(env2.lookup_value("x").is_some());
    }

    #[test]
    fn display_renders_function_type() {
        let ty = Type::Fun(Box::new(Type::int()), Box::new(Type::bool()));
        assert_eq!(ty.to_string(), "(Int) -> Bool");
    }
}
