//! Typed channels over one System V message queue.
//!
//! All channels share a queue identified by a numeric key; a channel is a
//! positive message type. Sends and receives never block. The handle that
//! created the queue removes it on close.

use crate::error::QueueError;
use nix::errno::Errno;
use std::os::raw::{c_int, c_long, c_void};
use tracing::{debug, info, warn};
use vsp_common::consts::QUEUE_MSG_CAPACITY;

#[repr(C)]
struct MsgBuf {
    mtype: c_long,
    mtext: [u8; QUEUE_MSG_CAPACITY],
}

/// One channel of a message queue.
pub struct QueueChannel {
    msqid: c_int,
    key: i32,
    channel: i64,
    max_message: usize,
    owner: bool,
    buf: Box<MsgBuf>,
}

impl QueueChannel {
    /// Create a fresh queue for `key` and take ownership of its removal.
    ///
    /// A queue left on the key by a previous run is removed first, along
    /// with every message still in it.
    pub fn create(key: i32, channel: i64, max_message: usize) -> Result<Self, QueueError> {
        Self::check_channel(channel)?;
        let flags = libc::IPC_CREAT | libc::IPC_EXCL | 0o600;
        let mut msqid = unsafe { libc::msgget(key, flags) };
        if msqid < 0 && Errno::last() == Errno::EEXIST {
            warn!("Queue {:#x} already exists, replacing it", key);
            Self::remove_stale(key)?;
            msqid = unsafe { libc::msgget(key, flags) };
        }
        if msqid < 0 {
            return Err(QueueError::CreateFailed {
                key,
                source: Errno::last(),
            });
        }
        info!(
            "Created queue {:#x} (id {}) channel {} max {} bytes",
            key, msqid, channel, max_message
        );
        Ok(Self::with_id(msqid, key, channel, max_message, true))
    }

    fn remove_stale(key: i32) -> Result<(), QueueError> {
        let stale = unsafe { libc::msgget(key, 0) };
        if stale < 0 {
            return match Errno::last() {
                // Removed by someone else in the meantime
                Errno::ENOENT => Ok(()),
                errno => Err(QueueError::CreateFailed { key, source: errno }),
            };
        }
        let rc = unsafe { libc::msgctl(stale, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc < 0 {
            return match Errno::last() {
                Errno::EINVAL | Errno::EIDRM => Ok(()),
                errno => Err(QueueError::RemoveFailed { key, source: errno }),
            };
        }
        Ok(())
    }

    /// Open an existing queue without taking ownership.
    pub fn open(key: i32, channel: i64, max_message: usize) -> Result<Self, QueueError> {
        Self::check_channel(channel)?;
        let msqid = unsafe { libc::msgget(key, 0) };
        if msqid < 0 {
            return Err(match Errno::last() {
                Errno::ENOENT => QueueError::NotFound { key },
                errno => QueueError::OpenFailed { key, source: errno },
            });
        }
        debug!("Opened queue {:#x} (id {}) channel {}", key, msqid, channel);
        Ok(Self::with_id(msqid, key, channel, max_message, false))
    }

    fn check_channel(channel: i64) -> Result<(), QueueError> {
        // msgrcv treats non-positive types as "any" or "lowest"
        if channel <= 0 || c_long::try_from(channel).is_err() {
            return Err(QueueError::InvalidChannel(channel));
        }
        Ok(())
    }

    fn with_id(msqid: c_int, key: i32, channel: i64, max_message: usize, owner: bool) -> Self {
        Self {
            msqid,
            key,
            channel,
            max_message: max_message.min(QUEUE_MSG_CAPACITY),
            owner,
            buf: Box::new(MsgBuf {
                mtype: 0,
                mtext: [0; QUEUE_MSG_CAPACITY],
            }),
        }
    }

    /// Channel id.
    pub fn channel(&self) -> i64 {
        self.channel
    }

    /// Queue key.
    pub fn key(&self) -> i32 {
        self.key
    }

    /// Largest message this handle sends.
    pub fn max_message(&self) -> usize {
        self.max_message
    }

    /// Whether this handle removes the queue on close.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Enqueue one message on this channel without blocking.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), QueueError> {
        if bytes.len() > self.max_message {
            return Err(QueueError::TooLarge {
                len: bytes.len(),
                max: self.max_message,
            });
        }

        self.buf.mtype = self.channel as c_long;
        self.buf.mtext[..bytes.len()].copy_from_slice(bytes);

        loop {
            let rc = unsafe {
                libc::msgsnd(
                    self.msqid,
                    (&*self.buf as *const MsgBuf).cast::<c_void>(),
                    bytes.len(),
                    libc::IPC_NOWAIT,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            match Errno::last() {
                Errno::EINTR => continue,
                Errno::EAGAIN => {
                    return Err(QueueError::Full {
                        channel: self.channel,
                    });
                }
                errno => {
                    return Err(QueueError::SendFailed {
                        channel: self.channel,
                        source: errno,
                    });
                }
            }
        }
    }

    /// Dequeue the oldest message on this channel into `out`.
    ///
    /// Returns the number of bytes copied, or 0 when nothing is waiting.
    /// A message longer than `out` is truncated and a warning logged; the
    /// following messages are unaffected.
    pub fn recv(&mut self, out: &mut [u8]) -> Result<usize, QueueError> {
        let max = out.len().min(QUEUE_MSG_CAPACITY);
        let mut flags = libc::IPC_NOWAIT;

        loop {
            let rc = unsafe {
                libc::msgrcv(
                    self.msqid,
                    (&mut *self.buf as *mut MsgBuf).cast::<c_void>(),
                    max,
                    self.channel as c_long,
                    flags,
                )
            };
            if rc >= 0 {
                let n = rc as usize;
                out[..n].copy_from_slice(&self.buf.mtext[..n]);
                return Ok(n);
            }
            match Errno::last() {
                Errno::ENOMSG => return Ok(0),
                Errno::EINTR => continue,
                Errno::E2BIG if flags & libc::MSG_NOERROR == 0 => {
                    warn!(
                        "Message on channel {} exceeds {} bytes, truncating",
                        self.channel, max
                    );
                    flags |= libc::MSG_NOERROR;
                }
                errno => {
                    return Err(QueueError::RecvFailed {
                        channel: self.channel,
                        source: errno,
                    });
                }
            }
        }
    }

    /// Release the handle; the owner also removes the queue.
    pub fn close(mut self) -> Result<(), QueueError> {
        self.remove()
    }

    fn remove(&mut self) -> Result<(), QueueError> {
        if !self.owner {
            return Ok(());
        }
        self.owner = false;

        let rc = unsafe { libc::msgctl(self.msqid, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc == 0 {
            info!("Removed queue {:#x}", self.key);
            return Ok(());
        }
        match Errno::last() {
            // Another owner handle on the same key got there first
            Errno::EINVAL | Errno::EIDRM => {
                debug!("Queue {:#x} already removed", self.key);
                Ok(())
            }
            errno => Err(QueueError::RemoveFailed {
                key: self.key,
                source: errno,
            }),
        }
    }
}

impl Drop for QueueChannel {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for QueueChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueChannel")
            .field("key", &self.key)
            .field("msqid", &self.msqid)
            .field("channel", &self.channel)
            .field("max_message", &self.max_message)
            .field("owner", &self.owner)
            .finish()
    }
}
