//! Chain handlers: derived interception with an explicit override table.
//!
//! A [`ChainHandler`] wraps an existing handler and overrides any subset of
//! the 13 operations; everything without an override delegates to `next`.
//! Proxy listeners combine this with `ProxyMeta::rebuild_proxy` to graft
//! distortions onto a single conversion without disturbing the graph's base
//! handler.

use std::sync::Arc;

use crate::model::{PropertyDescriptor, Value};
use crate::Result;

use super::{ProxyHandler, TrapContext};

// Override closures receive the next handler first, so an override can wrap
// the delegated result rather than replace the operation wholesale.
type GetPrototypeFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<Value> + Send + Sync;
type SetPrototypeFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, Value) -> Result<bool> + Send + Sync;
type ExtensibleFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<bool> + Send + Sync;
type GetOwnDescFn = dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<Option<PropertyDescriptor>>
    + Send
    + Sync;
type DefineFn = dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &str, PropertyDescriptor) -> Result<bool>
    + Send
    + Sync;
type KeyBoolFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<bool> + Send + Sync;
type GetFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<Value> + Send + Sync;
type SetFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &str, Value) -> Result<bool> + Send + Sync;
type OwnKeysFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<Vec<String>> + Send + Sync;
type CallFn = dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, Value, &[Value]) -> Result<Value>
    + Send
    + Sync;
type ConstructFn =
    dyn Fn(&dyn ProxyHandler, &TrapContext<'_>, &[Value]) -> Result<Value> + Send + Sync;

/// A handler derived from another, with per-operation overrides — a fixed
/// virtual table, not open-ended dispatch.
pub struct ChainHandler {
    next: Arc<dyn ProxyHandler>,
    get_prototype_of: Option<Box<GetPrototypeFn>>,
    set_prototype_of: Option<Box<SetPrototypeFn>>,
    is_extensible: Option<Box<ExtensibleFn>>,
    prevent_extensions: Option<Box<ExtensibleFn>>,
    get_own_property_descriptor: Option<Box<GetOwnDescFn>>,
    define_property: Option<Box<DefineFn>>,
    has: Option<Box<KeyBoolFn>>,
    get: Option<Box<GetFn>>,
    set: Option<Box<SetFn>>,
    delete_property: Option<Box<KeyBoolFn>>,
    own_keys: Option<Box<OwnKeysFn>>,
    call: Option<Box<CallFn>>,
    construct: Option<Box<ConstructFn>>,
}

impl ChainHandler {
    pub fn new(next: Arc<dyn ProxyHandler>) -> Self {
        Self {
            next,
            get_prototype_of: None,
            set_prototype_of: None,
            is_extensible: None,
            prevent_extensions: None,
            get_own_property_descriptor: None,
            define_property: None,
            has: None,
            get: None,
            set: None,
            delete_property: None,
            own_keys: None,
            call: None,
            construct: None,
        }
    }

    /// The handler this chain delegates to.
    pub fn next(&self) -> &dyn ProxyHandler {
        self.next.as_ref()
    }

    pub fn override_get_prototype_of<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.get_prototype_of = Some(Box::new(f));
        self
    }

    pub fn override_set_prototype_of<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, Value) -> Result<bool> + Send + Sync + 'static,
    {
        self.set_prototype_of = Some(Box::new(f));
        self
    }

    pub fn override_is_extensible<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.is_extensible = Some(Box::new(f));
        self
    }

    pub fn override_prevent_extensions<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.prevent_extensions = Some(Box::new(f));
        self
    }

    pub fn override_get_own_property_descriptor<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<Option<PropertyDescriptor>>
            + Send
            + Sync
            + 'static,
    {
        self.get_own_property_descriptor = Some(Box::new(f));
        self
    }

    pub fn override_define_property<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str, PropertyDescriptor) -> Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.define_property = Some(Box::new(f));
        self
    }

    pub fn override_has<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<bool> + Send + Sync + 'static,
    {
        self.has = Some(Box::new(f));
        self
    }

    pub fn override_get<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<Value> + Send + Sync + 'static,
    {
        self.get = Some(Box::new(f));
        self
    }

    pub fn override_set<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str, Value) -> Result<bool>
            + Send
            + Sync
            + 'static,
    {
        self.set = Some(Box::new(f));
        self
    }

    pub fn override_delete_property<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &str) -> Result<bool> + Send + Sync + 'static,
    {
        self.delete_property = Some(Box::new(f));
        self
    }

    pub fn override_own_keys<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>) -> Result<Vec<String>> + Send + Sync + 'static,
    {
        self.own_keys = Some(Box::new(f));
        self
    }

    pub fn override_call<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, Value, &[Value]) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.call = Some(Box::new(f));
        self
    }

    pub fn override_construct<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&dyn ProxyHandler, &TrapContext<'_>, &[Value]) -> Result<Value>
            + Send
            + Sync
            + 'static,
    {
        self.construct = Some(Box::new(f));
        self
    }
}

impl ProxyHandler for ChainHandler {
    fn get_prototype_of(&self, cx: &TrapContext<'_>) -> Result<Value> {
        match &self.get_prototype_of {
            Some(f) => f(self.next(), cx),
            None => self.next.get_prototype_of(cx),
        }
    }

    fn set_prototype_of(&self, cx: &TrapContext<'_>, proto: Value) -> Result<bool> {
        match &self.set_prototype_of {
            Some(f) => f(self.next(), cx, proto),
            None => self.next.set_prototype_of(cx, proto),
        }
    }

    fn is_extensible(&self, cx: &TrapContext<'_>) -> Result<bool> {
        match &self.is_extensible {
            Some(f) => f(self.next(), cx),
            None => self.next.is_extensible(cx),
        }
    }

    fn prevent_extensions(&self, cx: &TrapContext<'_>) -> Result<bool> {
        match &self.prevent_extensions {
            Some(f) => f(self.next(), cx),
            None => self.next.prevent_extensions(cx),
        }
    }

    fn get_own_property_descriptor(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
    ) -> Result<Option<PropertyDescriptor>> {
        match &self.get_own_property_descriptor {
            Some(f) => f(self.next(), cx, key),
            None => self.next.get_own_property_descriptor(cx, key),
        }
    }

    fn define_property(
        &self,
        cx: &TrapContext<'_>,
        key: &str,
        desc: PropertyDescriptor,
    ) -> Result<bool> {
        match &self.define_property {
            Some(f) => f(self.next(), cx, key, desc),
            None => self.next.define_property(cx, key, desc),
        }
    }

    fn has(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        match &self.has {
            Some(f) => f(self.next(), cx, key),
            None => self.next.has(cx, key),
        }
    }

    fn get(&self, cx: &TrapContext<'_>, key: &str) -> Result<Value> {
        match &self.get {
            Some(f) => f(self.next(), cx, key),
            None => self.next.get(cx, key),
        }
    }

    fn set(&self, cx: &TrapContext<'_>, key: &str, value: Value) -> Result<bool> {
        match &self.set {
            Some(f) => f(self.next(), cx, key, value),
            None => self.next.set(cx, key, value),
        }
    }

    fn delete_property(&self, cx: &TrapContext<'_>, key: &str) -> Result<bool> {
        match &self.delete_property {
            Some(f) => f(self.next(), cx, key),
            None => self.next.delete_property(cx, key),
        }
    }

    fn own_keys(&self, cx: &TrapContext<'_>) -> Result<Vec<String>> {
        match &self.own_keys {
            Some(f) => f(self.next(), cx),
            None => self.next.own_keys(cx),
        }
    }

    fn call(&self, cx: &TrapContext<'_>, this: Value, args: &[Value]) -> Result<Value> {
        match &self.call {
            Some(f) => f(self.next(), cx, this, args),
            None => self.next.call(cx, this, args),
        }
    }

    fn construct(&self, cx: &TrapContext<'_>, args: &[Value]) -> Result<Value> {
        match &self.construct {
            Some(f) => f(self.next(), cx, args),
            None => self.next.construct(cx, args),
        }
    }
}
