//! # Health-check abstraction and closure-backed implementation.
//!
//! A [`HealthCheck`] is a zero-argument async probe. It returns `Ok(true)` when
//! the component is fit, `Ok(false)` when it is not, and `Err(_)` when the probe
//! itself broke. The health monitor treats an error (or a timeout) exactly like
//! `Ok(false)`.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

/// Error type a probe may fail with.
pub type CheckError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared handle to a probe.
pub type HealthCheckRef = Arc<dyn HealthCheck>;

/// # Asynchronous boolean probe.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use faultguard::{CheckError, HealthCheck};
///
/// struct PortOpen(u16);
///
/// #[async_trait]
/// impl HealthCheck for PortOpen {
///     fn name(&self) -> &str { "port" }
///
///     async fn check(&self) -> Result<bool, CheckError> {
///         Ok(tokio::net::TcpStream::connect(("127.0.0.1", self.0)).await.is_ok())
///     }
/// }
/// ```
#[async_trait]
pub trait HealthCheck: Send + Sync + 'static {
    /// Stable, human-readable probe name.
    fn name(&self) -> &str;

    /// Executes the probe once.
    async fn check(&self) -> Result<bool, CheckError>;
}

/// Closure-backed probe.
///
/// Wraps `F: Fn() -> Fut`, producing a fresh future per execution.
pub struct HealthCheckFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HealthCheckFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the probe and returns it as a shared handle.
    ///
    /// ```rust
    /// use faultguard::{CheckError, HealthCheckFn, HealthCheckRef};
    ///
    /// let probe: HealthCheckRef = HealthCheckFn::arc("always-up", || async {
    ///     Ok::<_, CheckError>(true)
    /// });
    /// assert_eq!(probe.name(), "always-up");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> HealthCheck for HealthCheckFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, CheckError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<bool, CheckError> {
        (self.f)().await
    }
}
