//! Endpoint configuration.

use std::fmt;
use std::rc::Rc;

/// Configuration for an [`RpcSession`](crate::session::RpcSession).
#[derive(Clone)]
#[must_use]
pub struct SessionConfig {
    id_generator: Rc<dyn Fn() -> String>,
}

impl SessionConfig {
    /// Replaces the identifier generator used when auto-registering
    /// functions, promises and instances that cross the boundary without
    /// a prior id.
    ///
    /// Generated ids must be unique within the endpoint. The default
    /// produces ULID strings.
    pub fn with_id_generator(mut self, generator: impl Fn() -> String + 'static) -> Self {
        self.id_generator = Rc::new(generator);
        self
    }

    /// Produces a fresh unique id.
    pub(crate) fn generate_id(&self) -> String {
        (self.id_generator)()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id_generator: Rc::new(|| ulid::Ulid::new().to_string()),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig").finish_non_exhaustive()
    }
}
