//! Common stage capability and the tracing decorator wrapped around it.

use std::time::Instant;

/// One step of the assessment pipeline.
pub trait Stage<I: ?Sized> {
    type Output;
    type Error: std::fmt::Display;

    fn name(&self) -> &'static str;

    fn process(&self, input: &I) -> Result<Self::Output, Self::Error>;
}

impl<I: ?Sized, S: Stage<I> + ?Sized> Stage<I> for &S {
    type Output = S::Output;
    type Error = S::Error;

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process(&self, input: &I) -> Result<Self::Output, Self::Error> {
        (**self).process(input)
    }
}

/// Wraps a stage in a tracing span and records its duration and outcome.
pub struct Traced<S> {
    inner: S,
}

impl<S> Traced<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<I: ?Sized, S: Stage<I>> Stage<I> for Traced<S> {
    type Output = S::Output;
    type Error = S::Error;

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn process(&self, input: &I) -> Result<Self::Output, Self::Error> {
        let stage = self.inner.name();
        let _span = tracing::info_span!("stage", stage).entered();
        let started = Instant::now();

        let result = self.inner.process(input);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(stage, elapsed_ms, "Stage completed"),
            Err(e) => tracing::warn!(stage, elapsed_ms, error = %e, "Stage failed"),
        }
        result
    }
}

/// Run a plain closure as a traced stage.
pub fn run_traced<T, E, F>(stage: &'static str, f: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    let _span = tracing::info_span!("stage", stage).entered();
    let started = Instant::now();
    let result = f();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => tracing::debug!(stage, elapsed_ms, "Stage completed"),
        Err(e) => tracing::warn!(stage, elapsed_ms, error = %e, "Stage failed"),
    }
    result
}
