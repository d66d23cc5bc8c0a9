//! Synchronous listener registries

/// Callback type stored by a [`Listeners`] registry
pub type Listener<E> = Box<dyn FnMut(&E) + Send>;

/// Ordered set of callbacks for one event kind
///
/// Events are delivered on the caller's thread, in registration order,
/// before `emit` returns.
pub struct Listeners<E> {
    handlers: Vec<Listener<E>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a callback
    pub fn add<F>(&mut self, handler: F)
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Deliver `event` to every callback, returning how many ran
    pub fn emit(&mut self, event: &E) -> usize {
        for handler in self.handlers.iter_mut() {
            handler(event);
        }
        self.handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();

        for id in 0..3 {
            let seen = seen.clone();
            listeners.add(move |value: &u32| seen.lock().unwrap().push((id, *value)));
        }

        assert_eq!(listeners.emit(&7), 3);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_emit_without_listeners() {
        let mut listeners: Listeners<String> = Listeners::default();
        assert!(listeners.is_empty());
        assert_eq!(listeners.emit(&"x".to_string()), 0);
    }
}
