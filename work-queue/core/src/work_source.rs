// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::WorkSourceError;
use std::fs;
use std::time::Duration;
use tracing::info;

/// Supplies the initial, ordered work list. Called once, before the event
/// loop starts, and allowed to block.
pub trait WorkSource {
    fn fetch(&self) -> Result<Vec<String>, WorkSourceError>;
}

/// Downloads a newline separated list over HTTP(S)
pub struct HttpWorkSource {
    url: String,
    timeout: Duration,
}

impl HttpWorkSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl WorkSource for HttpWorkSource {
    fn fetch(&self) -> Result<Vec<String>, WorkSourceError> {
        let to_error = |source| WorkSourceError::Http {
            url: self.url.clone(),
            source,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(to_error)?;
        let body = client
            .get(&self.url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(to_error)?;

        let work = split_lines(&body);
        info!("Fetched {} work items from {}", work.len(), self.url);
        Ok(work)
    }
}

/// Reads a newline separated list from a local file
pub struct FileWorkSource {
    path: String,
}

impl FileWorkSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl WorkSource for FileWorkSource {
    fn fetch(&self) -> Result<Vec<String>, WorkSourceError> {
        let body = fs::read_to_string(&self.path).map_err(|source| WorkSourceError::Io {
            path: self.path.clone(),
            source,
        })?;

        let work = split_lines(&body);
        info!("Read {} work items from {}", work.len(), self.path);
        Ok(work)
    }
}

/// Fixed in-memory list
#[derive(Debug, Clone, Default)]
pub struct StaticWorkSource {
    work: Vec<String>,
}

impl StaticWorkSource {
    pub fn new<I, S>(work: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            work: work.into_iter().map(Into::into).collect(),
        }
    }
}

impl WorkSource for StaticWorkSource {
    fn fetch(&self) -> Result<Vec<String>, WorkSourceError> {
        Ok(self.work.clone())
    }
}

/// One token per `\n` separated line, keeping empty lines between separators
/// but not the empty segment after a trailing newline. A trailing `\r` is
/// stripped from each line.
pub fn split_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    if body.is_empty() || body.ends_with('\n') {
        lines.pop();
    }
    lines
}
