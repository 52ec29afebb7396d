//! Hot-swappable application handle.

use std::sync::Arc;

use arc_swap::ArcSwap;
use log::info;

use crate::app::pipeline::App;
use crate::app::response::WireResponse;
use crate::request::Request;

/// An [`App`] that can be replaced while requests are in flight.
///
/// Reads are lock-free. A request keeps the snapshot it loaded for its
/// whole lifetime, so a replacement only affects requests that start after it.
#[derive(Debug)]
pub struct SharedApp {
    current: ArcSwap<App>,
}

impl SharedApp {
    pub fn new(app: App) -> Self {
        Self {
            current: ArcSwap::from_pointee(app),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<App> {
        self.current.load_full()
    }

    /// Install `app` for all subsequent requests, returning the previous one.
    pub fn replace(&self, app: App) -> Arc<App> {
        let routes = app.router().len();
        let previous = self.current.swap(Arc::new(app));
        info!("Swapped in new app with {routes} route(s)");
        previous
    }

    pub fn handle(&self, request: &Request) -> WireResponse {
        self.current.load().handle(request)
    }
}

impl From<App> for SharedApp {
    fn from(app: App) -> Self {
        Self::new(app)
    }
}
