// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
use std::fmt;
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::time::Duration;

/// Per-connection one-shot deadline backed by a non-blocking `timerfd`.
/// Becomes readable once the deadline passes without a `reset`.
pub struct LivenessTimer {
    timer: TimerFd,
    timeout: Duration,
}

impl LivenessTimer {
    /// Creates the timer already armed with `timeout`
    pub fn new(timeout: Duration) -> io::Result<Self> {
        let timer = TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )?;
        let liveness = Self { timer, timeout };
        liveness.reset()?;
        Ok(liveness)
    }

    /// Pushes the deadline `timeout` into the future
    pub fn reset(&self) -> io::Result<()> {
        self.timer.set(
            Expiration::OneShot(TimeSpec::from_duration(self.timeout)),
            TimerSetTimeFlags::empty(),
        )?;
        Ok(())
    }

    /// Consumes a pending expiration, if any
    pub fn drain(&self) -> io::Result<()> {
        match self.timer.wait() {
            Ok(()) | Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn raw_fd(&self) -> RawFd {
        self.timer.as_fd().as_raw_fd()
    }
}

impl fmt::Debug for LivenessTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LivenessTimer")
            .field("fd", &self.raw_fd())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Source for LivenessTimer {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.raw_fd()).register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        SourceFd(&self.raw_fd()).reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        SourceFd(&self.raw_fd()).deregister(registry)
    }
}
