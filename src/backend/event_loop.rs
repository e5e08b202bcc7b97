//! Readiness multiplexer
//!
//! Wraps calloop around the display connection's file descriptor. The fd is
//! registered twice on duplicated descriptors: a read source that is always
//! armed and a write source that is only armed while outgoing requests are
//! stuck behind a full socket.

use std::os::unix::io::{AsFd, OwnedFd};
use std::time::Duration;

use bitflags::bitflags;
use calloop::generic::Generic;
use calloop::{EventLoop as CalLoop, Interest, LoopHandle, Mode, PostAction, RegistrationToken};
use log::{debug, trace};

use crate::error::Result;

bitflags! {
    /// Readiness reported by one multiplexer wait
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Readiness: u32 {
        const READABLE = 1;
        const WRITABLE = 1 << 1;
        const ERROR = 1 << 2;
    }
}

impl From<calloop::Readiness> for Readiness {
    fn from(readiness: calloop::Readiness) -> Self {
        let mut flags = Readiness::empty();
        flags.set(Readiness::READABLE, readiness.readable);
        flags.set(Readiness::WRITABLE, readiness.writable);
        flags.set(Readiness::ERROR, readiness.error);
        flags
    }
}

/// Multiplexer for a single descriptor
pub struct EventLoop {
    /// Calloop event loop; dispatch data accumulates fired readiness
    event_loop: CalLoop<'static, Readiness>,
    /// Token of the write-interest source
    write_token: RegistrationToken,
    /// Whether the write source is armed
    write_armed: bool,
}

impl EventLoop {
    /// Register `fd` for read/error interest. Write interest starts disarmed.
    pub fn new(fd: impl AsFd) -> Result<Self> {
        let event_loop: CalLoop<'static, Readiness> = CalLoop::try_new()?;
        let handle = event_loop.handle();

        let read_fd = fd.as_fd().try_clone_to_owned()?;
        Self::insert(&handle, read_fd, Interest::READ)?;

        let write_fd = fd.as_fd().try_clone_to_owned()?;
        let write_token = Self::insert(&handle, write_fd, Interest::WRITE)?;
        handle.disable(&write_token)?;

        Ok(Self {
            event_loop,
            write_token,
            write_armed: false,
        })
    }

    fn insert(
        handle: &LoopHandle<'static, Readiness>,
        fd: OwnedFd,
        interest: Interest,
    ) -> Result<RegistrationToken> {
        let token = handle
            .insert_source(Generic::new(fd, interest, Mode::Level), |readiness, _, fired| {
                *fired |= Readiness::from(readiness);
                Ok(PostAction::Continue)
            })
            .map_err(|e| e.error)?;
        Ok(token)
    }

    /// Watch for write readiness as well as read readiness
    pub fn arm_write(&mut self) -> Result<()> {
        if !self.write_armed {
            self.event_loop.handle().enable(&self.write_token)?;
            self.write_armed = true;
            debug!("Write interest armed");
        }
        Ok(())
    }

    /// Stop watching for write readiness
    pub fn disarm_write(&mut self) -> Result<()> {
        if self.write_armed {
            self.event_loop.handle().disable(&self.write_token)?;
            self.write_armed = false;
            debug!("Write interest disarmed");
        }
        Ok(())
    }

    /// Whether write interest is currently armed
    pub fn write_armed(&self) -> bool {
        self.write_armed
    }

    /// Block for at most one batch of readiness events.
    ///
    /// `None` waits indefinitely. An empty set means the timeout expired.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Readiness> {
        let mut fired = Readiness::empty();
        self.event_loop.dispatch(timeout, &mut fired)?;
        trace!("Multiplexer woke with {:?}", fired);
        Ok(fired)
    }
}
