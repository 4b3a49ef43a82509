//! Cross-module resolution context.
//!
//! Everything a body emission needs to resolve qualified names lives in a
//! [`Registry`] value that is threaded explicitly into every entry point.
//! There is no ambient global state: the registry is populated once by the
//! driver, then shared read-only, so any number of bodies can be emitted
//! concurrently against the same instance.

use hashbrown::HashMap;

use core::fmt;

use crate::types::Type;
use crate::values::{Bits, Builtin, Value};

/// Concrete parametric bindings for one monomorphized instantiation.
///
/// Order is the declaration order of the parametrics and is significant for
/// rendering; renders as `{N: u32:16, M: u32:8}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParametricEnv {
    bindings: Vec<(String, Value)>,
}

impl ParametricEnv {
    pub fn new(bindings: Vec<(String, Value)>) -> ParametricEnv {
        ParametricEnv { bindings }
    }

    /// Convenience for building an env one binding at a time.
    pub fn with(mut self, name: &str, value: Value) -> ParametricEnv {
        self.bindings.push((name.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl fmt::Display for ParametricEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// The identity of a resolved (monomorphized) user function.
///
/// This is what a `literal` pushes in callee position: enough to identify the
/// instantiation later, with no re-resolution at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnRef {
    pub name: String,
    pub bindings: ParametricEnv,
}

impl FnRef {
    pub fn new(name: &str, bindings: ParametricEnv) -> FnRef {
        FnRef {
            name: name.to_string(),
            bindings,
        }
    }
}

impl fmt::Display for FnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn:{}", self.name)?;
        if !self.bindings.is_empty() {
            write!(f, "{}", self.bindings)?;
        }
        Ok(())
    }
}

/// An enum definition: underlying type plus named members.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub underlying: Type,
    members: Vec<(String, Bits)>,
}

impl EnumDef {
    /// Builds a definition, coercing each member value to the underlying
    /// width and signedness.
    pub fn new(name: &str, underlying: Type, members: &[(&str, i64)]) -> EnumDef {
        let (signed, width) = match &underlying {
            Type::Bits { signed, width } => (*signed, *width),
            // A non-bits underlying type is a front-end bug; default is
            // harmless here because lookups, not construction, are checked.
            _ => (false, 0),
        };
        let members = members
            .iter()
            .map(|(member, raw)| {
                let bits = if signed {
                    Bits::sbits(width, *raw)
                } else {
                    Bits::ubits(width, *raw as u64)
                };
                (member.to_string(), bits)
            })
            .collect();
        EnumDef {
            name: name.to_string(),
            underlying,
            members,
        }
    }

    /// The member's value as bits of the underlying type.
    pub fn member(&self, name: &str) -> Option<&Bits> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, bits)| bits)
    }

    /// The enum's type annotation.
    pub fn ty(&self) -> Type {
        Type::Enum {
            name: self.name.clone(),
            underlying: Box::new(self.underlying.clone()),
        }
    }
}

/// A module-local function signature, as far as invocation resolution needs
/// one: its name and the names of its parametrics.
#[derive(Debug, Clone, Default)]
pub struct FnDecl {
    pub parametrics: Vec<String>,
}

/// The exported surface of an imported module.
#[derive(Debug, Clone, Default)]
pub struct ImportedModule {
    constants: HashMap<String, Value>,
    enums: HashMap<String, EnumDef>,
    functions: HashMap<String, FnDecl>,
}

impl ImportedModule {
    pub fn new() -> ImportedModule {
        ImportedModule::default()
    }

    pub fn with_constant(mut self, name: &str, value: Value) -> ImportedModule {
        self.constants.insert(name.to_string(), value);
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> ImportedModule {
        self.enums.insert(def.name.clone(), def);
        self
    }

    pub fn with_function(mut self, name: &str, decl: FnDecl) -> ImportedModule {
        self.functions.insert(name.to_string(), decl);
        self
    }
}

/// The read-only resolution context for one compilation session.
#[derive(Debug, Clone)]
pub struct Registry {
    constants: HashMap<String, Value>,
    enums: HashMap<String, EnumDef>,
    modules: HashMap<String, ImportedModule>,
    functions: HashMap<String, FnDecl>,
    builtins: HashMap<&'static str, Builtin>,
}

// Concurrent emissions share one registry; keep it shareable by construction.
static_assertions::assert_impl_all!(Registry: Send, Sync);

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Registry {
    pub fn new() -> Registry {
        let builtins = Builtin::ALL.iter().map(|b| (b.name(), *b)).collect();
        Registry {
            constants: HashMap::new(),
            enums: HashMap::new(),
            modules: HashMap::new(),
            functions: HashMap::new(),
            builtins,
        }
    }

    // === Population (driver-side, before any emission starts) ===

    pub fn add_constant(&mut self, name: &str, value: Value) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn add_enum(&mut self, def: EnumDef) {
        self.enums.insert(def.name.clone(), def);
    }

    pub fn add_module(&mut self, name: &str, module: ImportedModule) {
        self.modules.insert(name.to_string(), module);
    }

    pub fn add_function(&mut self, name: &str, decl: FnDecl) {
        self.functions.insert(name.to_string(), decl);
    }

    // === Lookups (emission-side, read-only) ===

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn builtin(&self, name: &str) -> Option<Builtin> {
        self.builtins.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&FnDecl> {
        self.functions.get(name)
    }

    pub fn module_function(&self, module: &str, name: &str) -> Option<&FnDecl> {
        self.modules.get(module)?.functions.get(name)
    }

    /// Resolves a qualified reference to its precomputed value.
    ///
    /// Lookup order: local enum member, imported constant, imported enum
    /// member (where `subject` has the form `module::Enum`).
    pub fn colon_ref(&self, subject: &str, member: &str) -> Option<Value> {
        if let Some(def) = self.enums.get(subject) {
            return def.member(member).cloned().map(Value::Bits);
        }
        if let Some(module) = self.modules.get(subject) {
            if let Some(value) = module.constants.get(member) {
                return Some(value.clone());
            }
        }
        if let Some((module, enum_name)) = subject.split_once("::") {
            let def = self.modules.get(module)?.enums.get(enum_name)?;
            return def.member(member).cloned().map(Value::Bits);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> Registry {
        let mut registry = Registry::new();
        registry.add_constant("K_FOO", Value::ubits(32, 100));
        registry.add_enum(EnumDef::new(
            "MyEnum",
            Type::u(23),
            &[("VAL_0", 0), ("VAL_1", 1), ("VAL_2", 2)],
        ));
        registry.add_module(
            "imported",
            ImportedModule::new()
                .with_constant("MY_CONST", Value::ubits(3, 2))
                .with_enum(EnumDef::new("ImportedEnum", Type::u(4), &[("VAL_3", 3)]))
                .with_function("widen", FnDecl::default()),
        );
        registry
    }

    #[test]
    fn local_constant_lookup() {
        let registry = sample_registry();
        assert_eq!(registry.constant("K_FOO"), Some(&Value::ubits(32, 100)));
        assert_eq!(registry.constant("missing"), None);
    }

    #[test]
    fn local_enum_member() {
        let registry = sample_registry();
        assert_eq!(
            registry.colon_ref("MyEnum", "VAL_1"),
            Some(Value::ubits(23, 1))
        );
        assert_eq!(registry.colon_ref("MyEnum", "VAL_9"), None);
    }

    #[test]
    fn imported_constant_and_enum_member() {
        let registry = sample_registry();
        assert_eq!(
            registry.colon_ref("imported", "MY_CONST"),
            Some(Value::ubits(3, 2))
        );
        assert_eq!(
            registry.colon_ref("imported::ImportedEnum", "VAL_3"),
            Some(Value::ubits(4, 3))
        );
    }

    #[test]
    fn builtin_table_is_populated() {
        let registry = Registry::new();
        assert_eq!(registry.builtin("assert_eq"), Some(Builtin::AssertEq));
        assert_eq!(registry.builtin("recv"), Some(Builtin::Recv));
        assert_eq!(registry.builtin("nope"), None);
    }

    #[test]
    fn parametric_env_display() {
        let env = ParametricEnv::default()
            .with("N", Value::ubits(32, 16))
            .with("M", Value::ubits(32, 8));
        assert_eq!(env.to_string(), "{N: u32:16, M: u32:8}");
        assert_eq!(ParametricEnv::default().to_string(), "{}");
        assert_eq!(env.lookup("N"), Some(&Value::ubits(32, 16)));
    }

    #[test]
    fn fn_ref_display() {
        let plain = FnRef::new("foo", ParametricEnv::default());
        assert_eq!(plain.to_string(), "fn:foo");
        let parametric = FnRef::new(
            "foo",
            ParametricEnv::default().with("N", Value::ubits(32, 16)),
        );
        assert_eq!(parametric.to_string(), "fn:foo{N: u32:16}");
    }
}
