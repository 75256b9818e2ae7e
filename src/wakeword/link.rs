//! Transport between the front end and the wake-word process.
//!
//! Per forwarded output frame the front end sends three messages, in order,
//! each on its own well-known channel:
//!
//! | Channel            | Payload                                  |
//! |--------------------|------------------------------------------|
//! | `enhanced_audio`   | output frame as raw `f32` bytes          |
//! | `iteration`        | 4-byte iteration counter                 |
//! | `trigger_enable`   | 4-byte flag, `1` = triggering allowed    |
//!
//! and then waits, bounded, for one 4-byte signed keyword offset on
//! `keyword_offset`.  Zero means "no keyword".
//!
//! [`DatagramLink`] carries these over Unix datagram sockets: one datagram
//! per message, so boundaries are preserved without framing.  All values
//! use native byte order since both ends share the machine.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Socket file names inside the link directory.
pub const AUDIO_CHANNEL: &str = "enhanced_audio.sock";
pub const ITERATION_CHANNEL: &str = "iteration.sock";
pub const TRIGGER_CHANNEL: &str = "trigger_enable.sock";
pub const OFFSET_CHANNEL: &str = "keyword_offset.sock";

// ---------------------------------------------------------------------------
// SignalingError
// ---------------------------------------------------------------------------

/// The wake-word process could not be reached.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("failed to open channel {channel}: {source}")]
    Open {
        channel: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("send on {channel} failed: {source}")]
    Send {
        channel: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("receive on {channel} failed: {source}")]
    Receive {
        channel: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("short message on {channel}: {got} of {expected} bytes")]
    ShortMessage {
        channel: &'static str,
        got: usize,
        expected: usize,
    },
}

// ---------------------------------------------------------------------------
// WakeWordLink trait
// ---------------------------------------------------------------------------

/// One side of the frame / offset exchange with the wake-word process.
pub trait WakeWordLink: Send {
    /// Ship one output frame with its iteration number and trigger flag.
    fn send_frame(
        &mut self,
        frame: &[f32],
        iteration: i32,
        trigger_enabled: bool,
    ) -> Result<(), SignalingError>;

    /// Wait at most `timeout` for a keyword offset.
    ///
    /// `Ok(None)` means nothing arrived in time.  `Ok(Some(0))` is an
    /// explicit "no keyword" answer.
    fn receive_offset(&mut self, timeout: Duration) -> Result<Option<i32>, SignalingError>;
}

// ---------------------------------------------------------------------------
// DatagramLink
// ---------------------------------------------------------------------------

/// [`WakeWordLink`] over Unix datagram sockets in one directory.
///
/// The three outbound channels are addressed per send through a fresh
/// unbound socket, so nothing is held open towards the wake-word process.
/// The inbound offset socket stays bound for the lifetime of the link:
/// datagrams sent to an unbound path are dropped, not queued.
///
/// Replies that miss their wait are still queued on the offset socket.
/// Every [`send_frame`](WakeWordLink::send_frame) first discards them, so an
/// offset is only ever read for the frame just sent.
#[derive(Debug)]
pub struct DatagramLink {
    dir: PathBuf,
    audio_path: PathBuf,
    iteration_path: PathBuf,
    trigger_path: PathBuf,
    offset_path: PathBuf,
    offset_rx: UnixDatagram,
    /// `(device, inode)` of the socket file this link created.
    offset_id: (u64, u64),
    scratch: Vec<u8>,
}

impl DatagramLink {
    /// Bind the inbound offset channel in `dir`, creating the directory and
    /// replacing a stale socket file if present.
    pub fn bind(dir: impl AsRef<Path>) -> Result<Self, SignalingError> {
        let dir = dir.as_ref().to_path_buf();
        let open_err = |source: io::Error| SignalingError::Open {
            channel: OFFSET_CHANNEL,
            source,
        };

        std::fs::create_dir_all(&dir).map_err(open_err)?;
        let offset_path = dir.join(OFFSET_CHANNEL);
        match std::fs::remove_file(&offset_path) {
            Ok(()) => log::debug!("wakeword: removed stale {}", offset_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(open_err(e)),
        }
        let offset_rx = UnixDatagram::bind(&offset_path).map_err(open_err)?;
        let meta = std::fs::metadata(&offset_path).map_err(open_err)?;

        log::info!("wakeword: link bound in {}", dir.display());
        Ok(Self {
            audio_path: dir.join(AUDIO_CHANNEL),
            iteration_path: dir.join(ITERATION_CHANNEL),
            trigger_path: dir.join(TRIGGER_CHANNEL),
            offset_path,
            offset_rx,
            offset_id: (meta.dev(), meta.ino()),
            scratch: Vec::new(),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn send_to(channel: &'static str, path: &Path, payload: &[u8]) -> Result<(), SignalingError> {
        let socket = UnixDatagram::unbound().map_err(|source| SignalingError::Open { channel, source })?;
        let sent = socket
            .send_to(payload, path)
            .map_err(|source| SignalingError::Send { channel, source })?;
        if sent != payload.len() {
            return Err(SignalingError::ShortMessage {
                channel,
                got: sent,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    /// Read and drop every offset already waiting on the inbound socket.
    fn discard_late_offsets(&self) -> Result<usize, SignalingError> {
        let recv_err = |source: io::Error| SignalingError::Receive {
            channel: OFFSET_CHANNEL,
            source,
        };
        self.offset_rx.set_nonblocking(true).map_err(recv_err)?;

        let mut buf = [0u8; 4];
        let mut dropped = 0;
        let outcome = loop {
            match self.offset_rx.recv(&mut buf) {
                Ok(_) => dropped += 1,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(dropped),
                Err(e) => break Err(recv_err(e)),
            }
        };

        self.offset_rx.set_nonblocking(false).map_err(recv_err)?;
        outcome
    }
}

impl WakeWordLink for DatagramLink {
    fn send_frame(
        &mut self,
        frame: &[f32],
        iteration: i32,
        trigger_enabled: bool,
    ) -> Result<(), SignalingError> {
        let late = self.discard_late_offsets()?;
        if late > 0 {
            log::debug!("wakeword: dropped {late} late offset(s) before iteration {iteration}");
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.extend(frame.iter().flat_map(|s| s.to_ne_bytes()));
        let sent = Self::send_to(AUDIO_CHANNEL, &self.audio_path, &scratch);
        self.scratch = scratch;
        sent?;

        Self::send_to(ITERATION_CHANNEL, &self.iteration_path, &iteration.to_ne_bytes())?;
        Self::send_to(
            TRIGGER_CHANNEL,
            &self.trigger_path,
            &(trigger_enabled as i32).to_ne_bytes(),
        )
    }

    fn receive_offset(&mut self, timeout: Duration) -> Result<Option<i32>, SignalingError> {
        let recv_err = |source: io::Error| SignalingError::Receive {
            channel: OFFSET_CHANNEL,
            source,
        };
        // A zero Duration is rejected by set_read_timeout.
        let timeout = timeout.max(Duration::from_micros(1));
        self.offset_rx
            .set_read_timeout(Some(timeout))
            .map_err(recv_err)?;

        let mut buf = [0u8; 4];
        match self.offset_rx.recv(&mut buf) {
            Ok(4) => Ok(Some(i32::from_ne_bytes(buf))),
            Ok(got) => Err(SignalingError::ShortMessage {
                channel: OFFSET_CHANNEL,
                got,
                expected: 4,
            }),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(recv_err(e)),
        }
    }
}

impl Drop for DatagramLink {
    fn drop(&mut self) {
        // A later bind in the same directory owns the path now.
        let ours = std::fs::metadata(&self.offset_path)
            .map(|m| (m.dev(), m.ino()) == self.offset_id)
            .unwrap_or(false);
        if ours {
            let _ = std::fs::remove_file(&self.offset_path);
        }
    }
}

// ---------------------------------------------------------------------------
// MockLink  (test-only)
// ---------------------------------------------------------------------------

/// `(frame, iteration, trigger_enabled)` for every frame a [`MockLink`] sent.
#[cfg(test)]
pub type SentLog = std::sync::Arc<std::sync::Mutex<Vec<(Vec<f32>, i32, bool)>>>;

/// Records every frame sent and answers with a scripted offset.
///
/// Clone `sent` before boxing the link to inspect it afterwards.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockLink {
    pub sent: SentLog,
    /// Offsets returned in order; once exhausted, `default_offset` is used.
    pub offsets: std::collections::VecDeque<i32>,
    pub default_offset: Option<i32>,
    /// Fail every send.
    pub fail_sends: bool,
}

#[cfg(test)]
impl WakeWordLink for MockLink {
    fn send_frame(
        &mut self,
        frame: &[f32],
        iteration: i32,
        trigger_enabled: bool,
    ) -> Result<(), SignalingError> {
        if self.fail_sends {
            return Err(SignalingError::Send {
                channel: AUDIO_CHANNEL,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((frame.to_vec(), iteration, trigger_enabled));
        Ok(())
    }

    fn receive_offset(&mut self, _timeout: Duration) -> Result<Option<i32>, SignalingError> {
        Ok(self.offsets.pop_front().or(self.default_offset))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
