use actix_web::{dev::{Service, ServiceRequest, ServiceResponse, Transform}, Error};
use leaky_bucket::RateLimiter;
use std::{task::{Context, Poll}, time::Duration};
use std::sync::Arc;
use futures::future::{ok, LocalBoxFuture, Ready};

use actix_web::error::InternalError;
use actix_web::http::StatusCode;

use crate::apis::schemas::Envelope;
use crate::configs::settings::Config;

// Global token bucket shared by every worker; a disabled limiter lets all requests through.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimitMiddleware {
    pub fn new(rate_per_interval: usize, max_capacity: usize, interval: Duration) -> Self {
        let limiter = RateLimiter::builder()
            .initial(max_capacity)
            .refill(rate_per_interval)
            .max(max_capacity)
            .interval(interval)
            .fair(false)
            .build();

        Self {
            limiter: Some(Arc::new(limiter)),
        }
    }

    pub fn disabled() -> Self {
        Self { limiter: None }
    }

    pub fn from_config(config: &Config) -> Self {
        if config.rate_limit_enabled {
            RateLimitMiddleware::new(
                config.rate_limit_tps,
                config.rate_limit_bucket_capacity,
                Duration::from_millis(config.rate_limit_refill_interval),
            )
        } else {
            RateLimitMiddleware::disabled()
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddlewareService {
            service,
            limiter: self.limiter.clone(),
        })
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    limiter: Option<Arc<RateLimiter>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Decide before calling the inner service so rejected requests never reach a handler
        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire(1) {
                log::warn!("Rate limit exceeded for {}", req.path());
                let response = Envelope::for_path(req.path()).failure(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
                let rejected: Error = InternalError::from_response("Rate limit exceeded", response).into();
                return Box::pin(async move { Err::<ServiceResponse<B>, Error>(rejected) });
            }
        }
        let fut = self.service.call(req);
        Box::pin(fut)
    }
}
