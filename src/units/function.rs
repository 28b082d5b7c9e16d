use crate::executor::ExecutionContext;
use crate::models::{
    AnalysisUnit, ExecutionInput, IntelligenceData, UnitFuture, UnitResult, ValidationOutcome,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

type ExecuteFn = Arc<dyn Fn(ExecutionInput, ExecutionContext) -> BoxFuture<'static, UnitResult> + Send + Sync>;
type ValidateFn =
    Arc<dyn Fn(ExecutionInput, ExecutionContext) -> BoxFuture<'static, ValidationOutcome> + Send + Sync>;
type CleanupFn = Arc<dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Analysis unit assembled from closures.
///
/// The closures receive owned copies of the input and context, so they can
/// move them into the returned future.
#[derive(Clone)]
pub struct FnUnit {
    execute: ExecuteFn,
    validate: Option<ValidateFn>,
    cleanup: Option<CleanupFn>,
}

impl FnUnit {
    pub fn new<F, Fut>(execute: F) -> Self
    where
        F: Fn(ExecutionInput, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = UnitResult> + Send + 'static,
    {
        Self {
            execute: Arc::new(move |input, ctx| execute(input, ctx).boxed()),
            validate: None,
            cleanup: None,
        }
    }

    pub fn with_validator<F, Fut>(mut self, validate: F) -> Self
    where
        F: Fn(ExecutionInput, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ValidationOutcome> + Send + 'static,
    {
        self.validate = Some(Arc::new(move |input, ctx| validate(input, ctx).boxed()));
        self
    }

    pub fn with_cleanup<F, Fut>(mut self, cleanup: F) -> Self
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.cleanup = Some(Arc::new(move |ctx| cleanup(ctx).boxed()));
        self
    }

    /// Unit that succeeds immediately with an empty `general` payload.
    pub fn noop() -> Arc<dyn AnalysisUnit> {
        Arc::new(FnUnit::new(|_input, _ctx| async {
            Ok(IntelligenceData::new("general", Vec::new()))
        }))
    }

    pub fn into_shared(self) -> Arc<dyn AnalysisUnit> {
        Arc::new(self)
    }
}

impl AnalysisUnit for FnUnit {
    fn validate<'a>(
        &'a self,
        input: &'a ExecutionInput,
        ctx: &'a ExecutionContext,
    ) -> Option<UnitFuture<'a, ValidationOutcome>> {
        let validate = self.validate.as_ref()?;
        Some(validate(input.clone(), ctx.clone()))
    }

    fn execute<'a>(
        &'a self,
        input: &'a ExecutionInput,
        ctx: &'a ExecutionContext,
    ) -> UnitFuture<'a, UnitResult> {
        (self.execute)(input.clone(), ctx.clone())
    }

    fn cleanup<'a>(&'a self, ctx: &'a ExecutionContext) -> Option<UnitFuture<'a, Result<(), String>>> {
        let cleanup = self.cleanup.as_ref()?;
        Some(cleanup(ctx.clone()))
    }
}
