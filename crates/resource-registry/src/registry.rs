//! Name-keyed, insertion-ordered registry of resources.

use tracing::debug;

use crate::error::{Error, Result};
use crate::resource::Resource;

/// Mapping from resource name to resource module.
///
/// Populated once at startup, then only read. Names are unique: a second
/// registration under an existing name fails and leaves the first module
/// in place.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: Vec<Box<dyn Resource>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource under its [`name`](Resource::name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] for an empty name and
    /// [`Error::DuplicateName`] if the name is already taken.
    pub fn register<R>(&mut self, resource: R) -> Result<()>
    where
        R: Resource + 'static,
    {
        self.register_boxed(Box::new(resource))
    }

    /// Registers an already boxed resource.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_boxed(&mut self, resource: Box<dyn Resource>) -> Result<()> {
        let name = resource.name();
        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        if self.has(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        debug!(resource = name, "registered resource");
        self.resources.push(resource);
        Ok(())
    }

    /// Returns the resource registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Resource> {
        self.resources
            .iter()
            .find(|r| r.name() == name)
            .map(Box::as_ref)
    }

    /// Returns `true` if a resource is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name() == name)
    }

    /// Returns registered names in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.name().to_string()).collect()
    }

    /// Iterates over registered resources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Resource> {
        self.resources.iter().map(Box::as_ref)
    }

    /// Number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Removes every resource. Only meant for test isolation.
    pub fn clear(&mut self) {
        self.resources.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;

    struct Named {
        name: &'static str,
        tag: u32,
    }

    impl Named {
        fn new(name: &'static str) -> Self {
            Self { name, tag: 0 }
        }
    }

    impl Resource for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn instructions(&self) -> Option<&str> {
            (self.tag > 0).then_some("tagged")
        }

        fn register_commands(&self, _program: &mut Program) {}
    }

    #[test]
    fn list_preserves_registration_order() {
        for order in [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"]] {
            let mut registry = ResourceRegistry::new();
            for name in order {
                registry.register(Named::new(name)).unwrap();
            }
            assert_eq!(registry.list(), order.to_vec());
        }
    }

    #[test]
    fn duplicate_name_is_rejected_and_first_module_kept() {
        let mut registry = ResourceRegistry::new();
        registry.register(Named { name: "a", tag: 0 }).unwrap();

        let err = registry.register(Named { name: "a", tag: 1 }).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref n) if n == "a"));
        assert_eq!(err.to_string(), "resource \"a\" is already registered");

        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").unwrap().instructions().is_none());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = ResourceRegistry::new();
        let err = registry.register(Named::new("")).unwrap_err();
        assert!(matches!(err, Error::InvalidName));
        assert!(registry.is_empty());
    }

    #[test]
    fn get_and_has_for_registered_names() {
        let mut registry = ResourceRegistry::new();
        registry.register(Named::new("openapi")).unwrap();
        registry.register(Named::new("nvim")).unwrap();

        for name in ["openapi", "nvim"] {
            assert!(registry.has(name));
            assert_eq!(registry.get(name).unwrap().name(), name);
        }
    }

    #[test]
    fn get_and_has_for_unregistered_names() {
        let mut registry = ResourceRegistry::new();
        registry.register(Named::new("openapi")).unwrap();

        for name in ["tmux", "", "OPENAPI", "openapi "] {
            assert!(!registry.has(name));
            assert!(registry.get(name).is_none());
        }
    }

    #[test]
    fn clear_unregisters_everything() {
        let mut registry = ResourceRegistry::new();
        registry.register(Named::new("a")).unwrap();
        registry.register(Named::new("b")).unwrap();

        registry.clear();

        assert!(registry.list().is_empty());
        assert!(!registry.has("a"));
        assert!(!registry.has("b"));

        registry.register(Named::new("a")).unwrap();
        assert_eq!(registry.list(), vec!["a"]);
    }

    #[test]
    fn iter_yields_modules_in_order() {
        let mut registry = ResourceRegistry::new();
        registry.register(Named::new("x")).unwrap();
        registry.register_boxed(Box::new(Named::new("y"))).unwrap();

        let names: Vec<_> = registry.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }
}
