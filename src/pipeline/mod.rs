//! Transformation pipeline
//!
//! The stages run in a fixed order: fetch, identify, transform, filter,
//! optimize. Each stage takes the context by value and hands it back, and
//! every stage after fetch starts with an error check so a failed context
//! flows to the response writer untouched.
//!
//! Pixel work runs on the blocking thread pool; the async stages only do
//! I/O and bookkeeping.

use std::sync::Arc;
use std::time::Instant;

use crate::codec::ImageCodec;
use crate::context::RequestContext;
use crate::directive::Action;
use crate::error::PipelineError;
use crate::filters::FilterRegistry;
use crate::geometry::{self, Dimensions};
use crate::sources::SourceRegistry;

pub struct Pipeline {
    sources: Arc<SourceRegistry>,
    filters: Arc<FilterRegistry>,
    codec: Arc<dyn ImageCodec>,
}

impl Pipeline {
    pub fn new(
        sources: Arc<SourceRegistry>,
        filters: Arc<FilterRegistry>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self {
            sources,
            filters,
            codec,
        }
    }

    /// Run every stage over the context. Never returns early; an error set
    /// by one stage simply turns the rest into pass-throughs.
    pub async fn run(&self, mut ctx: RequestContext) -> RequestContext {
        ctx = self.fetch(ctx).await;
        ctx = self.identify(ctx).await;
        ctx = self.transform(ctx).await;
        ctx = self.filter(ctx).await;
        ctx = self.optimize(ctx).await;
        ctx
    }

    async fn fetch(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.is_error() {
            return ctx;
        }
        let started = Instant::now();

        let source = match self.sources.resolve(ctx.directive().source.as_deref()) {
            Ok(source) => source,
            Err(e) => {
                ctx.fail(e);
                return ctx;
            }
        };

        match source.fetch(ctx.source_path()).await {
            Ok(fetched) => {
                if let Some(seconds) = fetched.expiry_override {
                    ctx.set_expiry(seconds);
                }
                ctx.set_content(fetched.bytes);
                ctx.log_mut().timing(source.name(), started);
            }
            Err(e) => ctx.fail(e),
        }
        ctx
    }

    /// Extract metadata for JSON requests. Pixel requests learn dimensions
    /// inside the transform stage instead.
    async fn identify(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.is_error() || ctx.directive().action != Action::Json {
            return ctx;
        }
        let started = Instant::now();

        let Some(content) = ctx.content().cloned() else {
            return ctx;
        };
        let codec = Arc::clone(&self.codec);

        match run_blocking(move || codec.identify(&content)).await {
            Ok(metadata) => {
                ctx.set_metadata(metadata);
                ctx.log_mut().timing("identify", started);
            }
            Err(e) => ctx.fail(e),
        }
        ctx
    }

    async fn transform(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.is_error() {
            return ctx;
        }
        let directive = ctx.directive();
        let wants_geometry = match directive.action {
            Action::Resize | Action::Square | Action::Crop | Action::Pad => true,
            // A bounded original resolves to explicit dimensions at parse time
            Action::Original => directive.width.is_some() || directive.height.is_some(),
            Action::Json => false,
        };
        if !wants_geometry {
            return ctx;
        }
        let started = Instant::now();

        let Some(content) = ctx.content().cloned() else {
            return ctx;
        };
        let directive = ctx.directive().clone();
        let codec = Arc::clone(&self.codec);

        let result = run_blocking(move || {
            let metadata = codec.identify(&content)?;
            let source = Dimensions::new(metadata.width, metadata.height);
            let plan = geometry::plan_for(&directive, source);
            if plan.is_identity(source) {
                return Ok(None);
            }
            codec.transform(&content, &plan).map(Some)
        })
        .await;

        match result {
            Ok(Some(bytes)) => {
                ctx.replace_content(bytes.into());
                ctx.log_mut().timing("resize", started);
            }
            Ok(None) => {}
            Err(e) => ctx.fail(e),
        }
        ctx
    }

    async fn filter(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.is_error() || ctx.directive().action == Action::Json {
            return ctx;
        }
        let Some(name) = ctx.directive().filter.clone() else {
            return ctx;
        };
        let Some(filter) = self.filters.get(&name) else {
            ctx.log_mut().note(format!("unknown filter: {}", name));
            return ctx;
        };
        let started = Instant::now();

        let Some(content) = ctx.content().cloned() else {
            return ctx;
        };
        let codec = Arc::clone(&self.codec);

        match run_blocking(move || codec.apply_filter(&content, filter.as_ref())).await {
            Ok(bytes) => {
                ctx.replace_content(bytes.into());
                ctx.log_mut().timing("filter", started);
            }
            Err(e) => ctx.fail(e),
        }
        ctx
    }

    /// Final encode to the output format at the requested quality. This is
    /// the only lossy step; earlier stages exchange lossless intermediates.
    async fn optimize(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.is_error() || ctx.directive().action == Action::Json {
            return ctx;
        }
        let started = Instant::now();

        let Some(content) = ctx.content().cloned() else {
            return ctx;
        };
        let Some(format) = ctx.output_format() else {
            return ctx;
        };
        let quality = ctx.directive().quality;
        let codec = Arc::clone(&self.codec);

        match run_blocking(move || codec.encode(&content, format, quality)).await {
            Ok(bytes) => {
                ctx.replace_content(bytes.into());
                let saving = ctx.size_saving();
                ctx.log_mut().timing("optimize", started);
                ctx.log_mut().note(format!("saved: {:.1}%", saving));
            }
            Err(e) => ctx.fail(e),
        }
        ctx
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.sources)
            .field("filters", &self.filters)
            .finish()
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::codec(format!("blocking task: {}", e)))?
}
