//! Shared application state passed to every connection handler.

use std::sync::Arc;

use crate::assets::Assets;
use crate::config::Config;
use crate::engine::PageRegistry;
use crate::sessions::SessionSlot;

/// Shared state for one server instance.
///
/// Cloneable: every clone refers to the same slot, pages and assets, so
/// independent servers (e.g. in tests) never share a session.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Static files, including the browser client.
    pub assets: Arc<Assets>,
    /// Pages the driver can switch between.
    pub pages: Arc<PageRegistry>,
    /// The single controller session, if one is connected.
    pub slot: SessionSlot,
}

impl AppState {
    pub fn new(config: Config, assets: Assets, pages: PageRegistry) -> Self {
        Self {
            config: Arc::new(config),
            assets: Arc::new(assets),
            pages: Arc::new(pages),
            slot: SessionSlot::new(),
        }
    }
}
