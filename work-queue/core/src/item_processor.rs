// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ProcessError;
use std::time::Duration;

/// Work performed by a worker on one token. Synchronous; the worker runs it
/// on a blocking thread and bounds it with a timeout.
pub trait ItemProcessor: Send + Sync + 'static {
    fn process(&self, token: &str) -> Result<u64, ProcessError>;
}

impl<F> ItemProcessor for F
where
    F: Fn(&str) -> Result<u64, ProcessError> + Send + Sync + 'static,
{
    fn process(&self, token: &str) -> Result<u64, ProcessError> {
        (self)(token)
    }
}

/// Treats the token as the URL of a tab separated list and counts the rows
/// whose URL column points at `target_host`
pub struct HostOccurrenceCounter {
    target_host: String,
    timeout: Duration,
}

impl HostOccurrenceCounter {
    pub fn new(target_host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target_host: target_host.into(),
            timeout,
        }
    }
}

impl ItemProcessor for HostOccurrenceCounter {
    fn process(&self, token: &str) -> Result<u64, ProcessError> {
        let to_error = |source| ProcessError::Fetch {
            url: token.to_string(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(to_error)?;
        let body = client
            .get(token)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(to_error)?;

        Ok(count_host_occurrences(&body, &self.target_host))
    }
}

/// Counts rows of a tab separated list (`id \t url \t ...`) whose URL, after
/// its `://` scheme separator, starts with `target_host`
pub fn count_host_occurrences(list: &str, target_host: &str) -> u64 {
    list.split('\n')
        .filter_map(|row| row.split('\t').nth(1))
        .filter_map(|url| url.find("://").map(|pos| &url[pos + 3..]))
        .filter(|rest| rest.starts_with(target_host))
        .count() as u64
}
