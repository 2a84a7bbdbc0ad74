// Licensed under the Apache-2.0 license

use std::time::{Duration, Instant};

use hmac_fpga_bus::{RegAddr, RegData, RegisterBus, Transport, TransportError};
use hmac_fpga_registers::is_complete;

/// Shortest pause allowed between two status reads.
const MIN_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Pacing and deadline of the completion poll loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PollConfig {
    /// Pause between two status reads.
    pub interval: Duration,

    /// Give up once this much time has passed since the start bit was written.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    /// Interval actually slept; never zero so polling cannot flood the bus.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollState {
    Running,
    Done,
    TimedOut,
}

/// Tracks one computation from the start bit to DONE or the deadline.
pub struct CompletionPoller {
    config: PollConfig,
    start: Instant,
    state: PollState,
    polls: u32,
}

impl CompletionPoller {
    /// Begin tracking; call right after the start bit has been written.
    pub fn start(config: PollConfig) -> Self {
        Self {
            config,
            start: Instant::now(),
            state: PollState::Running,
            polls: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of status words observed so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Advance the state machine with a freshly read status word. Terminal
    /// states are sticky.
    pub fn observe(&mut self, status: RegData) -> PollState {
        if self.state != PollState::Running {
            return self.state;
        }
        self.polls = self.polls.saturating_add(1);
        if is_complete(status) {
            self.state = PollState::Done;
        } else if self.start.elapsed() > self.config.timeout {
            self.state = PollState::TimedOut;
        }
        self.state
    }

    pub fn completion(&self) -> Completion {
        Completion {
            state: self.state,
            polls: self.polls,
            elapsed: self.elapsed(),
        }
    }
}

/// Final state of a poll loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Completion {
    /// Either [`PollState::Done`] or [`PollState::TimedOut`].
    pub state: PollState,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Read the status register at `status_addr` until the accelerator reports
/// DONE and IDLE together, or until `config.timeout` has passed.
///
/// Transport failures end the loop immediately; a timeout is not an error
/// here and is reported through [`Completion::state`].
pub fn wait_for_completion<T: Transport>(
    bus: &mut RegisterBus<T>,
    status_addr: RegAddr,
    config: &PollConfig,
) -> Result<Completion, TransportError> {
    let mut poller = CompletionPoller::start(*config);
    loop {
        let status = bus.read_register(status_addr)?;
        if poller.observe(status) != PollState::Running {
            return Ok(poller.completion());
        }
        std::thread::sleep(config.effective_interval());
    }
}
