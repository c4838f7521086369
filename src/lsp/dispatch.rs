//! Safe request dispatch: error capture, panic isolation and cooperative
//! cancellation around every analysis call.

use std::any::Any;
use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::{self, ErrorCode};
use tracing::error;

/// The outcome returned for a cancelled request (`RequestCancelled`, -32800)
pub fn request_cancelled() -> jsonrpc::Error {
    jsonrpc::Error {
        code: ErrorCode::RequestCancelled,
        message: Cow::Borrowed("Request cancelled"),
        data: None,
    }
}

pub fn format_error(message: &str, detail: impl Display) -> String {
    format!("{}: {}", message, detail)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn settle<T, E: Display>(
    result: std::thread::Result<Result<T, E>>,
    fallback: T,
    context: &str,
) -> T {
    match result {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            error!("{}", format_error(context, e));
            fallback
        }
        Err(payload) => {
            error!("{}", format_error(context, panic_message(payload.as_ref())));
            fallback
        }
    }
}

/// Runs a synchronous operation.
///
/// Returns `Err(request_cancelled())` if `token` is cancelled before or after
/// the operation runs, the operation's value on success, and `fallback` when
/// the operation fails or panics. Failures are logged with `context`.
pub async fn run_safe<T, E, F>(
    operation: F,
    fallback: T,
    context: &str,
    token: &CancellationToken,
) -> jsonrpc::Result<T>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    // Give pending cancellations a chance to land first
    tokio::task::yield_now().await;
    if token.is_cancelled() {
        return Err(request_cancelled());
    }

    let result = std::panic::catch_unwind(AssertUnwindSafe(operation));
    if token.is_cancelled() {
        return Err(request_cancelled());
    }

    Ok(settle(result, fallback, context))
}

/// Runs an asynchronous operation; cancellation is also observed while the
/// operation is suspended.
pub async fn run_safe_async<T, E, Fut>(
    operation: Fut,
    fallback: T,
    context: &str,
    token: &CancellationToken,
) -> jsonrpc::Result<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    tokio::task::yield_now().await;
    if token.is_cancelled() {
        return Err(request_cancelled());
    }

    let result = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(request_cancelled()),
        result = AssertUnwindSafe(operation).catch_unwind() => result,
    };
    if token.is_cancelled() {
        return Err(request_cancelled());
    }

    Ok(settle(result, fallback, context))
}
