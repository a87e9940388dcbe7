// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded retry with a fixed backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub enum Attempted<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed with a retryable error.
    Exhausted { error: E, attempts: u32 },
    /// An attempt failed with an error not worth retrying.
    Aborted { error: E, attempts: u32 },
}

impl<T, E> Attempted<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Attempted::Succeeded { attempts, .. }
            | Attempted::Exhausted { attempts, .. }
            | Attempted::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Attempted::Succeeded { value, .. } => Ok(value),
            Attempted::Exhausted { error, .. } | Attempted::Aborted { error, .. } => Err(error),
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping `policy.backoff()`
/// between attempts. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, mut op: F, is_retryable: P) -> Attempted<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                return Attempted::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(error) if !is_retryable(&error) => {
                return Attempted::Aborted {
                    error,
                    attempts: attempt,
                }
            }
            Err(error) if attempt >= max => {
                return Attempted::Exhausted {
                    error,
                    attempts: attempt,
                }
            }
            Err(error) => {
                tracing::debug!(attempt, max, %error, "attempt failed, retrying");
                tokio::time::sleep(policy.backoff()).await;
                attempt += 1;
            }
        }
    }
}
