use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::format::{SupportedFormat, TargetFormat};
use crate::routines::{Converter, ImageToPdf, PdfToWord, WordToPdf};

/// Registered (source, target) pairs and the routine handling each.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<(SupportedFormat, TargetFormat), Arc<dyn Converter>>,
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in routes. Legacy `.doc` is recognised but never routed.
    pub fn standard(config: &Config) -> Self {
        let mut table = Self::empty()
            .with_route(SupportedFormat::Docx, TargetFormat::Pdf, Arc::new(WordToPdf))
            .with_route(SupportedFormat::Pdf, TargetFormat::Docx, Arc::new(PdfToWord));
        if config.image_routes {
            let images: Arc<dyn Converter> = Arc::new(ImageToPdf);
            table = table
                .with_route(SupportedFormat::Png, TargetFormat::Pdf, images.clone())
                .with_route(SupportedFormat::Jpeg, TargetFormat::Pdf, images);
        }
        table
    }

    pub fn with_route(
        mut self,
        from: SupportedFormat,
        to: TargetFormat,
        converter: Arc<dyn Converter>,
    ) -> Self {
        self.routes.insert((from, to), converter);
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (SupportedFormat, TargetFormat)> + '_ {
        self.routes.keys().copied()
    }
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.routes.iter().map(|(k, v)| (k, v.name())))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    table: RoutingTable,
}

impl Dispatcher {
    pub fn new(table: RoutingTable) -> Self {
        Self { table }
    }

    pub fn route(&self, from: SupportedFormat, to: TargetFormat) -> Result<Arc<dyn Converter>, Error> {
        self.table
            .routes
            .get(&(from, to))
            .cloned()
            .ok_or(Error::NoRouteAvailable { from, to })
    }

    pub fn supports(&self, from: SupportedFormat, to: TargetFormat) -> bool {
        self.table.routes.contains_key(&(from, to))
    }
}
