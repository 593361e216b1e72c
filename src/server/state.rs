use std::sync::Arc;

use crate::service::EngineService;
use crate::surface::MessageSurface;

#[derive(Clone)]
pub struct ServeState {
    pub(crate) service: Arc<EngineService>,
    pub(crate) surface: Arc<MessageSurface>,
}

impl ServeState {
    pub fn new(service: Arc<EngineService>) -> Self {
        let surface = Arc::new(MessageSurface::new(Arc::clone(&service)));
        Self { service, surface }
    }

    pub fn service(&self) -> &Arc<EngineService> {
        &self.service
    }
}
