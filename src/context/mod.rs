//! Per-request context — the parsed request plus type-safe extensions.
//!
//! Middleware communicates with downstream handlers through the
//! [`Extensions`] map. The bearer guard, for example, inserts the
//! authenticated [`Subject`](crate::auth::Subject) before forwarding, and
//! the protected handlers read it back out without the two ever naming each
//! other.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::Request;

/// Type-erased request extensions map — used to inject per-request state
/// into handlers without coupling middleware and handler types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value by type.
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove and return a value by type.
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Per-request context handed to handlers and middleware.
pub struct Context {
    request: Request,
    extensions: Extensions,
}

impl Context {
    /// Create a new context from a parsed request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            extensions: Extensions::new(),
        }
    }

    /// The underlying HTTP request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Read-only view of the extensions map.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable view of the extensions map, for middleware that injects state.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Deserialize the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
