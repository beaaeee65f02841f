// Copyright 2026 Tether Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(clippy::all)]
//! The error type shared by the tether crates.
//!
//! Pool operations fail for three distinct reasons and callers react to each
//! differently: the remote peer broke (retry somewhere else), the caller
//! misused the API (a bug to surface loudly), or the pool machinery itself
//! failed. [ErrorSource] carries that blame direction next to the concrete
//! [ErrorType], and errors chain so a handler failure can still show the
//! connect failure buried under it.

pub use std::error::Error as ErrorTrait;
use std::borrow::Cow;
use std::fmt;
use std::result::Result as StdResult;

/// The boxed [Error], the desired way to pass [Error]
pub type BError = Box<Error>;
/// Syntax sugar for `std::Result<T, BError>`
pub type Result<T, E = BError> = StdResult<T, E>;

/// Who is to blame for an error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorSource {
    /// The remote peer the connection goes to
    Upstream,
    /// The caller of the API, e.g. releasing a connection to a pool that
    /// never leased it
    Caller,
    /// The internal logic
    Internal,
    /// Blame not (yet) assigned
    Unset,
}

impl ErrorSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Upstream => "Upstream",
            Self::Caller => "Caller",
            Self::Internal => "Internal",
            Self::Unset => "",
        }
    }
}

/// Predefined type of errors
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorType {
    // connect errors
    ConnectTimedout,
    ConnectRefused,
    ConnectNoRoute,
    HandshakeError,
    ConnectError, // catch all
    BindError,
    SocketError,
    // IO error on established connections
    ReadError,
    WriteError,
    ReadTimedout,
    WriteTimedout,
    ConnectionClosed,
    // pool errors
    /// The connection handed to `release()` was not leased from that pool
    MisusedRelease,
    /// The idle store refused to take the connection back
    PoolFull,
    /// A pool handler callback failed
    HandlerError,
    /// The health check itself failed (not the same as an unhealthy verdict)
    HealthCheckError,
    // other errors
    InternalError,
    // catch all
    UnknownError,
    /// Custom error with static string, for users to extend the types of
    /// errors. Runtime generated strings belong in the context instead.
    Custom(&'static str),
}

impl ErrorType {
    /// create a new type of error. Users should try to make `name` unique.
    pub const fn new(name: &'static str) -> Self {
        ErrorType::Custom(name)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::ConnectTimedout => "ConnectTimedout",
            ErrorType::ConnectRefused => "ConnectRefused",
            ErrorType::ConnectNoRoute => "ConnectNoRoute",
            ErrorType::HandshakeError => "HandshakeError",
            ErrorType::ConnectError => "ConnectError",
            ErrorType::BindError => "BindError",
            ErrorType::SocketError => "SocketError",
            ErrorType::ReadError => "ReadError",
            ErrorType::WriteError => "WriteError",
            ErrorType::ReadTimedout => "ReadTimedout",
            ErrorType::WriteTimedout => "WriteTimedout",
            ErrorType::ConnectionClosed => "ConnectionClosed",
            ErrorType::MisusedRelease => "MisusedRelease",
            ErrorType::PoolFull => "PoolFull",
            ErrorType::HandlerError => "HandlerError",
            ErrorType::HealthCheckError => "HealthCheckError",
            ErrorType::InternalError => "InternalError",
            ErrorType::UnknownError => "UnknownError",
            ErrorType::Custom(s) => s,
        }
    }
}

/// The struct that represents an error
#[derive(Debug)]
pub struct Error {
    /// the type of error
    pub etype: ErrorType,
    /// who is to blame for the error
    pub esource: ErrorSource,
    /// an arbitrary string that explains the context when the error happens
    pub context: Option<Cow<'static, str>>,
    /// the error that caused this one, when there is one
    pub cause: Option<Box<(dyn ErrorTrait + Send + Sync)>>,
}

impl Error {
    /// Create the error from all its parts. The `new`, `explain` and
    /// `because` constructors are the less verbose fronts of this.
    #[inline]
    pub fn create(
        etype: ErrorType,
        esource: ErrorSource,
        context: Option<Cow<'static, str>>,
        cause: Option<Box<dyn ErrorTrait + Send + Sync>>,
    ) -> BError {
        Box::new(Error {
            etype,
            esource,
            context,
            cause,
        })
    }

    /// Create an error of the given type, nothing else attached.
    #[inline]
    pub fn new(etype: ErrorType) -> BError {
        Self::create(etype, ErrorSource::Unset, None, None)
    }

    /// Create an error with a context string but no underlying cause.
    #[inline]
    pub fn explain<S: Into<Cow<'static, str>>>(etype: ErrorType, context: S) -> BError {
        Self::create(etype, ErrorSource::Unset, Some(context.into()), None)
    }

    /// Short for Err(Self::explain)
    #[inline]
    pub fn e_explain<T, S: Into<Cow<'static, str>>>(etype: ErrorType, context: S) -> Result<T> {
        Err(Self::explain(etype, context))
    }

    /// Create an error on top of a causing error, with context that the
    /// cause alone does not capture.
    /// ```
    /// use tether_error::{Error, ErrorType};
    ///
    /// let cause = Error::explain(ErrorType::ConnectRefused, "dial upstream").into_up();
    /// let err = Error::because(ErrorType::HandlerError, "on_created failed", cause);
    /// assert_eq!(err.root_etype(), &ErrorType::ConnectRefused);
    /// ```
    #[inline]
    pub fn because<S: Into<Cow<'static, str>>, E: Into<Box<dyn ErrorTrait + Send + Sync>>>(
        etype: ErrorType,
        context: S,
        cause: E,
    ) -> BError {
        Self::create(
            etype,
            ErrorSource::Unset,
            Some(context.into()),
            Some(cause.into()),
        )
    }

    pub fn etype(&self) -> &ErrorType {
        &self.etype
    }

    pub fn esource(&self) -> &ErrorSource {
        &self.esource
    }

    /// Blame the remote peer and return self.
    pub fn into_up(mut self: BError) -> BError {
        self.esource = ErrorSource::Upstream;
        self
    }

    /// Blame the caller and return self.
    pub fn into_caller(mut self: BError) -> BError {
        self.esource = ErrorSource::Caller;
        self
    }

    /// Blame the internal logic and return self.
    pub fn into_in(mut self: BError) -> BError {
        self.esource = ErrorSource::Internal;
        self
    }

    pub fn into_err<T>(self: BError) -> Result<T> {
        Err(self)
    }

    /// The [ErrorType] at the bottom of the cause chain.
    pub fn root_etype(&self) -> &ErrorType {
        let mut current = self;
        while let Some(under) = current.cause_error() {
            current = under;
        }
        &current.etype
    }

    /// The deepest cause of this error, which is the error itself when
    /// nothing is chained under it.
    pub fn root_cause(&self) -> &(dyn ErrorTrait + Send + Sync + 'static) {
        let mut current = self;
        loop {
            match current.cause.as_deref() {
                None => return current,
                Some(cause) => match cause.downcast_ref::<BError>() {
                    Some(under) => current = under.as_ref(),
                    // the chain ends at the first non-Error cause
                    None => return cause,
                },
            }
        }
    }

    fn cause_error(&self) -> Option<&Error> {
        self.cause
            .as_ref()
            .and_then(|c| c.downcast_ref::<BError>())
            .map(|e| e.as_ref())
    }

    // One hop of the display chain. The source bracket is printed only when
    // the blame direction shifts between hops: a release failure wrapping a
    // connect failure shows both directions, a purely internal chain shows
    // its source once.
    fn fmt_chain(&self, blamed: Option<ErrorSource>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.esource != ErrorSource::Unset && blamed != Some(self.esource) {
            write!(f, "[{}] ", self.esource.as_str())?;
        }
        f.write_str(self.etype.as_str())?;
        if let Some(context) = self.context.as_ref() {
            write!(f, ": {}", context)?;
        }
        match self.cause.as_ref() {
            None => Ok(()),
            Some(cause) => {
                f.write_str(": ")?;
                match cause.downcast_ref::<BError>() {
                    Some(under) => under.fmt_chain(Some(self.esource), f),
                    None => write!(f, "{}", cause),
                }
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_chain(None, f)
    }
}

impl ErrorTrait for Error {}

/// Helper trait to lift foreign errors into [Error] with context.
/// ```
/// use tether_error::{ErrorType, OrErr, Result};
///
/// fn set_nodelay() -> std::result::Result<(), std::io::Error> {
///     // ...
///     Ok(())
/// }
/// fn prepare() -> Result<()> {
///     set_nodelay().or_err(ErrorType::SocketError, "setting nodelay")
/// }
/// ```
pub trait OrErr<T, E> {
    /// Wrap the `Err(E)` into an [Error] of the given type, keeping `E` as
    /// the cause. Shortcut for map_err() + because().
    fn or_err(self, etype: ErrorType, context: &'static str) -> Result<T>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>;

    /// Like or_err(), but the context comes from a closure, which is useful
    /// for runtime built strings.
    fn or_err_with<C: Into<Cow<'static, str>>, F: FnOnce() -> C>(
        self,
        etype: ErrorType,
        context: F,
    ) -> Result<T>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>;
}

impl<T, E> OrErr<T, E> for StdResult<T, E> {
    fn or_err(self, etype: ErrorType, context: &'static str) -> Result<T>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>,
    {
        self.map_err(|e| Error::because(etype, context, e))
    }

    fn or_err_with<C: Into<Cow<'static, str>>, F: FnOnce() -> C>(
        self,
        etype: ErrorType,
        context: F,
    ) -> Result<T>
    where
        E: Into<Box<dyn ErrorTrait + Send + Sync>>,
    {
        self.map_err(|e| Error::because(etype, context(), e))
    }
}
