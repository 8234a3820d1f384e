use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

use crate::{OpaqueError, opaque::MessageError};

/// Attach context to the error of a `Result`, or to the absence of a value
/// in an `Option`.
///
/// # Examples
///
/// ```
/// use jwkey_error::ErrorContext;
///
/// let err = "AQAB".parse::<u32>().context("parse exponent").unwrap_err();
/// assert_eq!(err.to_string(), "parse exponent: invalid digit found in string");
///
/// let err = None::<&str>.context("JWK is missing kid").unwrap_err();
/// assert_eq!(err.to_string(), "JWK is missing kid: value is absent");
/// ```
pub trait ErrorContext: sealed::SealedErrorContext {
    /// Type with the context attached.
    type Context;

    /// Attach a context.
    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static;

    /// Attach a context which is only created on failure.
    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext for Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.map_err(|error| error.context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.context(context()))
    }
}

impl<T> ErrorContext for Option<T> {
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| MessageError(ABSENT).context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| MessageError(ABSENT).context(context()))
    }
}

const ABSENT: &str = "value is absent";

/// Context and root cause helpers for any std error.
pub trait ErrorExt: sealed::SealedErrorExt {
    /// Wrap the error in a context, displayed as `{context}: {error}`.
    fn context<M>(self, context: M) -> OpaqueError
    where
        M: Display + Send + Sync + 'static;

    /// Same as [`ErrorExt::context`], creating the context lazily.
    fn with_context<C, F>(self, context: F) -> OpaqueError
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;

    /// Innermost error, found by following [`Error::source`].
    ///
    /// Returns the error itself if it has no source.
    fn root_cause(&self) -> &(dyn Error + 'static);
}

impl<E> ErrorExt for E
where
    E: Error + Send + Sync + 'static,
{
    fn context<M>(self, context: M) -> OpaqueError
    where
        M: Display + Send + Sync + 'static,
    {
        OpaqueError::from_std(ContextError {
            context,
            error: self,
        })
    }

    fn with_context<C, F>(self, context: F) -> OpaqueError
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.context(context())
    }

    fn root_cause(&self) -> &(dyn Error + 'static) {
        let mut cause: &(dyn Error + 'static) = self;
        while let Some(source) = cause.source() {
            cause = source;
        }
        cause
    }
}

/// An error together with the context it happened in
struct ContextError<C, E> {
    context: C,
    error: E,
}

impl<C: Display, E: Debug> Debug for ContextError<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextError")
            .field("context", &format_args!("{}", self.context))
            .field("error", &self.error)
            .finish()
    }
}

impl<C: Display, E: Display> Display for ContextError<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.error)
    }
}

impl<C: Display, E: Error + 'static> Error for ContextError<C, E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

mod sealed {
    pub trait SealedErrorContext {}

    impl<T, E> SealedErrorContext for Result<T, E> where E: std::error::Error + Send + Sync + 'static {}
    impl<T> SealedErrorContext for Option<T> {}

    pub trait SealedErrorExt {}

    impl<E> SealedErrorExt for E where E: std::error::Error + Send + Sync + 'static {}
}
