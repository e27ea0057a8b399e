// Server module - Pingora ProxyHttp implementation
// Every request is answered directly in request_filter; nothing is proxied
// upstream.

pub mod special_endpoints;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};

use crate::codec::RasterCodec;
use crate::config::Config;
use crate::context::RequestContext;
use crate::filters::FilterRegistry;
use crate::metrics::Metrics;
use crate::pipeline::Pipeline;
use crate::response::{self, ImageResponse};
use crate::sources::SourceRegistry;

/// Per-request bookkeeping for the Pingora session.
pub struct ServiceContext {
    started: Instant,
}

/// SuzumeService implements the Pingora ProxyHttp trait.
/// Parses the directive, runs the pipeline, and writes the response.
pub struct SuzumeService {
    config: Arc<Config>,
    pipeline: Pipeline,
    metrics: Arc<Metrics>,
    start_time: Instant,
}

impl SuzumeService {
    pub fn new(config: Config) -> std::result::Result<Self, String> {
        let sources = Arc::new(SourceRegistry::from_config(&config)?);
        let filters = Arc::new(FilterRegistry::builtin());
        let pipeline = Pipeline::new(sources, filters, Arc::new(RasterCodec));

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            metrics: Arc::new(Metrics::new()),
            start_time: Instant::now(),
        })
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    async fn write_endpoint_response(
        &self,
        session: &mut Session,
        response: special_endpoints::EndpointResponse,
    ) -> Result<bool> {
        let mut header = ResponseHeader::build(response.status, None)?;
        header.insert_header("Content-Type", response.content_type)?;
        header.insert_header("Content-Length", response.body.len().to_string())?;
        session
            .write_response_header(Box::new(header), false)
            .await?;
        session
            .write_response_body(Some(response.body.into()), true)
            .await?;
        Ok(true)
    }

    async fn write_image_response(
        &self,
        session: &mut Session,
        response: ImageResponse,
        head_only: bool,
    ) -> Result<()> {
        let mut header = ResponseHeader::build(response.status, None)?;
        header.insert_header("Content-Type", response.content_type)?;
        header.insert_header("Content-Length", response.body.len().to_string())?;
        for (name, value) in response.headers {
            header.insert_header(name, value)?;
        }

        if head_only {
            session.write_response_header(Box::new(header), true).await?;
        } else {
            session
                .write_response_header(Box::new(header), false)
                .await?;
            session
                .write_response_body(Some(response.body), true)
                .await?;
        }
        Ok(())
    }

    fn record_metrics(&self, ctx: &RequestContext, status: u16, duration_ms: f64) {
        self.metrics.increment_request_count();
        self.metrics.increment_status_count(status);
        self.metrics
            .increment_action_count(ctx.directive().action.as_str());

        let source = ctx
            .directive()
            .source
            .as_deref()
            .unwrap_or(self.config.sources.default.as_str());
        self.metrics.increment_source_count(source);

        if let Some(error) = ctx.error() {
            self.metrics.increment_error_count(error.kind());
        }

        self.metrics.record_duration(duration_ms);
        self.metrics.record_bytes(
            ctx.original_byte_length() as u64,
            ctx.content_length() as u64,
        );
    }
}

#[async_trait]
impl ProxyHttp for SuzumeService {
    type CTX = ServiceContext;

    fn new_ctx(&self) -> Self::CTX {
        ServiceContext {
            started: Instant::now(),
        }
    }

    /// Never reached: request_filter answers every request.
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "all requests are answered in request_filter",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let path = req.uri.path().to_string();
        let method = req.method.to_string();

        if path == "/health" {
            let response = special_endpoints::handle_health(self.start_time);
            return self.write_endpoint_response(session, response).await;
        }

        if path == "/metrics" {
            let response = special_endpoints::handle_metrics(&self.metrics);
            return self.write_endpoint_response(session, response).await;
        }

        if method != "GET" && method != "HEAD" {
            let mut header = ResponseHeader::build(405, None)?;
            header.insert_header("Allow", "GET, HEAD")?;
            header.insert_header("Content-Length", "0")?;
            session.write_response_header(Box::new(header), true).await?;
            self.metrics.increment_status_count(405);
            return Ok(true);
        }

        let mut request = RequestContext::new(&path, &self.config);
        tracing::debug!(
            request_id = %request.request_id(),
            path = %path,
            action = request.directive().action.as_str(),
            "request accepted"
        );

        request = self.pipeline.run(request).await;

        let response = response::build(&request, &self.config).await;
        let status = response.status;
        let duration_ms = ctx.started.elapsed().as_secs_f64() * 1000.0;

        self.record_metrics(&request, status, duration_ms);
        self.write_image_response(session, response, method == "HEAD")
            .await?;

        let request_id = request.request_id().to_string();
        request.log_mut().flush(&request_id, &path, status);

        Ok(true)
    }
}
