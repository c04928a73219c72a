//! Command mode session.
//!
//! The module leaves API mode and accepts text commands after it sees `+++`
//! framed by a period of silence (the guard time). The state machine is:
//!
//! ```text
//! Idle -> GuardWait -> SendingEscape -> AwaitingOk -> InCommandMode -> Exiting -> Idle
//!                                            |
//!                                            +-- timeout --> Idle
//! ```
//!
//! Until the first successful entry the module still runs its factory guard
//! time and may run at an unknown baud rate, so the first entry waits longer
//! and falls back to probing every standard baud rate.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::AckCodec;
use crate::commands::*;
use crate::error::*;
use crate::port::{Clock, SerialChannel};

/// Where the session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not in command mode.
    Idle,
    /// Keeping the line silent before `+++`.
    GuardWait,
    /// Writing `+++`.
    SendingEscape,
    /// Waiting for `OK\r`.
    AwaitingOk,
    /// Accepting AT commands.
    InCommandMode,
    /// `ATCN` sent, settling.
    Exiting,
}

/// Delays and deadlines used by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTiming {
    /// Guard time before the first entry (factory guard time is 1 s).
    pub first_guard: Duration,
    /// Guard time once `ATGT` has been programmed.
    pub guard: Duration,
    /// Acknowledgment deadline on the first entry and while probing.
    pub first_ack_timeout: Duration,
    /// Acknowledgment deadline afterwards.
    pub ack_timeout: Duration,
    /// Deadline for a register query reply.
    pub reply_timeout: Duration,
    /// Pause between writing `ATBD`/`ATWR` and `ATAC`.
    pub baud_write_delay: Duration,
    /// Pause before reopening the channel at a new baud rate.
    pub baud_switch_delay: Duration,
    /// Pause after writing the register list, before flushing.
    pub settle_after_write: Duration,
    /// Pause after `ATCN`, before flushing.
    pub settle_after_exit: Duration,
    /// Sleep between polls of the serial input.
    pub poll_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        SessionTiming {
            first_guard: Duration::from_millis(1000),
            guard: Duration::from_millis(10),
            first_ack_timeout: Duration::from_millis(1200),
            ack_timeout: Duration::from_millis(1000),
            reply_timeout: Duration::from_millis(1000),
            baud_write_delay: Duration::from_millis(60),
            baud_switch_delay: Duration::from_millis(200),
            settle_after_write: Duration::from_millis(200),
            settle_after_exit: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// Drives the command mode handshake over a borrowed serial channel.
pub struct CommandModeSession {
    clock: Arc<dyn Clock>,
    timing: SessionTiming,
    state: SessionState,
    codec: AckCodec,
    entered_once: bool,
}

impl CommandModeSession {
    /// Create a session that has never entered command mode.
    pub fn new(clock: Arc<dyn Clock>, timing: SessionTiming) -> Self {
        CommandModeSession {
            clock,
            timing,
            state: SessionState::Idle,
            codec: AckCodec::new(),
            entered_once: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether command mode has been entered successfully at least once.
    pub fn has_entered(&self) -> bool {
        self.entered_once
    }

    /// Timing in use.
    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    /// Enter command mode.
    ///
    /// Uses the long guard time and deadline until the first success.
    pub fn enter(&mut self, port: &mut dyn SerialChannel) -> CommandModeResult<()> {
        let (guard, timeout) = if self.entered_once {
            (self.timing.guard, self.timing.ack_timeout)
        } else {
            (self.timing.first_guard, self.timing.first_ack_timeout)
        };
        self.handshake(port, guard, timeout)
    }

    /// Send one command while in command mode.
    pub fn send(&mut self, port: &mut dyn SerialChannel, command: &AtCommand) -> CommandModeResult<()> {
        log::debug!("command mode > {}", command);
        port.write_all(&command.encode())?;
        Ok(())
    }

    /// Leave command mode and discard whatever the module echoed.
    pub fn exit(&mut self, port: &mut dyn SerialChannel) -> CommandModeResult<()> {
        self.state = SessionState::Exiting;
        self.send(port, &AtCommand::Exit)?;
        self.clock.sleep(self.timing.settle_after_exit);
        port.flush_io()?;
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Find the baud rate the module answers at, trying `configured` first.
    ///
    /// On success the channel is left open at the found rate and the module
    /// is in command mode.
    pub fn probe_baud(&mut self, port: &mut dyn SerialChannel, configured: u32) -> CommandModeResult<u32> {
        log::warn!("looking for the module's baud rate");
        let candidates = probe_order(configured);
        for &baud in &candidates {
            log::info!("checking baud {}", baud);
            port.reopen(baud)?;
            match self.handshake(port, self.timing.first_guard, self.timing.first_ack_timeout) {
                Ok(()) => return Ok(baud),
                Err(CommandModeError::HandshakeTimeout { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        log::error!("module did not answer at any baud rate");
        Err(CommandModeError::UnreachableDevice { tried: candidates })
    }

    /// Program a list of registers, apply them and write them to flash.
    ///
    /// On the first entry a failed handshake triggers baud probing; if the
    /// module was found at another rate it is switched to `configured` when
    /// that rate has a BD code. Returns the baud rate the channel ends at.
    pub fn program_registers(
        &mut self,
        port: &mut dyn SerialChannel,
        registers: &[(String, String)],
        configured: u32,
    ) -> CommandModeResult<u32> {
        let first_entry = !self.entered_once;

        match self.enter(port) {
            Ok(()) => {}
            Err(CommandModeError::HandshakeTimeout { .. }) if first_entry => {
                let found = self.probe_baud(port, configured)?;
                if found != configured {
                    self.switch_baud(port, found, configured)?;
                }
            }
            Err(e) => return Err(e),
        }

        port.flush_io()?;

        if first_entry {
            self.send(port, &AtCommand::GuardTime("A".to_string()))?;
        }
        for (register, value) in registers {
            self.send(port, &AtCommand::set(register.as_str(), value.as_str()))?;
        }
        self.send(port, &AtCommand::Apply)?;
        self.send(port, &AtCommand::Write)?;

        self.clock.sleep(self.timing.settle_after_write);
        port.flush_io()?;

        self.exit(port)?;
        Ok(port.baud_rate())
    }

    /// Read one register's raw reply.
    ///
    /// Returns `None` when the handshake or the reply times out.
    pub fn read_register(
        &mut self,
        port: &mut dyn SerialChannel,
        register: &str,
    ) -> CommandModeResult<Option<Vec<u8>>> {
        match self.enter(port) {
            Ok(()) => {}
            Err(CommandModeError::HandshakeTimeout { waited }) => {
                log::warn!("OK not received within {:?}, cannot read {}", waited, register);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        self.send(port, &AtCommand::query(register))?;
        self.state = SessionState::Exiting;
        self.send(port, &AtCommand::Exit)?;

        self.codec.clear();
        let deadline = self.clock.now() + self.timing.reply_timeout;
        loop {
            self.codec.push(&port.read_available()?);
            if let Some(reply) = self.codec.take_reply() {
                log::debug!("command mode < {}", String::from_utf8_lossy(&reply));
                self.state = SessionState::Idle;
                return Ok(Some(reply));
            }
            if self.clock.now() >= deadline {
                log::warn!("no reply to AT{} within {:?}", register, self.timing.reply_timeout);
                self.state = SessionState::Idle;
                return Ok(None);
            }
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    fn handshake(
        &mut self,
        port: &mut dyn SerialChannel,
        guard: Duration,
        timeout: Duration,
    ) -> CommandModeResult<()> {
        self.state = SessionState::GuardWait;
        self.clock.sleep(guard);

        self.state = SessionState::SendingEscape;
        self.codec.clear();
        if let Err(e) = self.send(port, &AtCommand::Enter) {
            self.state = SessionState::Idle;
            return Err(e);
        }

        self.state = SessionState::AwaitingOk;
        let start = self.clock.now();
        loop {
            let data = match port.read_available() {
                Ok(data) => data,
                Err(e) => {
                    self.state = SessionState::Idle;
                    return Err(e.into());
                }
            };
            self.codec.push(&data);
            if self.codec.is_acknowledged() {
                self.codec.clear();
                self.state = SessionState::InCommandMode;
                self.entered_once = true;
                return Ok(());
            }
            let waited = self.clock.now() - start;
            if waited > timeout {
                log::warn!("OK not received after +++ ({:?})", waited);
                self.state = SessionState::Idle;
                return Err(CommandModeError::HandshakeTimeout { waited });
            }
            self.clock.sleep(self.timing.poll_interval);
        }
    }

    fn switch_baud(&mut self, port: &mut dyn SerialChannel, found: u32, configured: u32) -> CommandModeResult<()> {
        let Some(code) = baud_code(configured) else {
            log::warn!(
                "'{}' is not a valid baud rate for the module, keeping {}",
                configured,
                found
            );
            return Ok(());
        };

        log::info!("programming the module for baud {}", configured);
        self.send(port, &AtCommand::BaudRate(code))?;
        self.send(port, &AtCommand::Write)?;
        self.clock.sleep(self.timing.baud_write_delay);
        self.send(port, &AtCommand::Apply)?;

        self.clock.sleep(self.timing.baud_switch_delay);
        port.reopen(configured)?;
        Ok(())
    }
}
