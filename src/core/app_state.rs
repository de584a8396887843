/// Shared handle threaded through every service call. The store is the only
/// cross-request state; operations never share anything else.
#[derive(Debug, Clone)]
pub struct AppState<S> {
    pub store: S,
}

impl<S> AppState<S> {
    pub fn new(store: S) -> Self {
        AppState { store }
    }
}
