//! Post-process filters
//!
//! Filters are looked up by the `f<name>` directive token in a registry that
//! is populated once at process start and read-only afterwards: the built-in
//! set plus any caller-supplied overrides. An unregistered name is skipped
//! silently by the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;

/// A named pixel-level post-process applied after resizing.
pub trait ImageFilter: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, image: DynamicImage) -> DynamicImage;
}

/// Gaussian blur.
pub struct Blur;

impl ImageFilter for Blur {
    fn name(&self) -> &str {
        "blur"
    }

    fn apply(&self, image: DynamicImage) -> DynamicImage {
        image.blur(10.0)
    }
}

/// Greyscale conversion.
pub struct Greyscale;

impl ImageFilter for Greyscale {
    fn name(&self) -> &str {
        "greyscale"
    }

    fn apply(&self, image: DynamicImage) -> DynamicImage {
        image.grayscale()
    }
}

/// Name-to-filter mapping, frozen after startup.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn ImageFilter>>,
}

impl FilterRegistry {
    /// Registry holding only the built-in filters.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(Blur));
        registry.register(Arc::new(Greyscale));
        registry
    }

    /// Register a filter under its own name. Later registrations shadow
    /// earlier ones, which is how caller-supplied overrides replace
    /// built-ins.
    pub fn register(&mut self, filter: Arc<dyn ImageFilter>) {
        self.filters.insert(filter.name().to_string(), filter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageFilter>> {
        self.filters.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}
