//! Guarded byte streams
//!
//! A stream is authorized once, when it is created, and then forwards I/O
//! unchanged. Each guarded stream owns a tracker registration bound to the
//! canonical path it was authorized on, so it counts against the descriptor
//! ceiling and frees its slot when dropped.
//!
//! Linking two streams re-checks `write` on the destination before any byte
//! moves:
//!
//! ```no_run
//! use fsgate::prelude::*;
//!
//! # async fn example(gate: Gate) -> Result<(), GateError> {
//! let reader = gate.create_read_stream("/srv/in/report.csv").await?;
//! let mut writer = gate.create_write_stream("/srv/out/report.csv").await?;
//!
//! let copied = reader.pipe_to(&mut writer).await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tracing::debug;

use crate::canonical::ResolveMode;
use crate::error::GateError;
use crate::gate::{Gate, Operation};
use crate::permissions::PermissionKind;
use crate::tracker::{DescriptorId, HandleRegistration};

/// A reader authorized for `read` at creation
#[derive(Debug)]
pub struct GuardedReader<R> {
    inner: R,
    gate: Gate,
    registration: HandleRegistration,
}

/// A writer authorized for `write` at creation
#[derive(Debug)]
pub struct GuardedWriter<W> {
    inner: W,
    registration: HandleRegistration,
}

impl<R> GuardedReader<R> {
    /// Tracker identity of this stream
    pub fn id(&self) -> DescriptorId {
        self.registration.id()
    }

    /// Borrow the wrapped reader
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the reader, releasing the tracker slot
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> GuardedReader<R> {
    /// Copy everything into a guarded writer
    ///
    /// `write` is re-checked on the writer's tracked path first. On denial
    /// nothing is read or written.
    ///
    /// # Returns
    ///
    /// The number of bytes copied.
    pub async fn pipe_to<W>(mut self, dest: &mut GuardedWriter<W>) -> Result<u64, GateError>
    where
        W: AsyncWrite + Unpin,
    {
        let op = Operation::new("pipe").require_descriptor(dest.id(), PermissionKind::Write);
        self.gate.check(&op).await?;

        let copied = tokio::io::copy(&mut self.inner, &mut dest.inner).await?;
        dest.inner.flush().await?;
        debug!(from = %self.id(), to = %dest.id(), bytes = copied, "piped stream");
        Ok(copied)
    }

    /// Copy everything into an unguarded writer for `dest_path`
    ///
    /// `write` is checked on `dest_path` (which may not exist yet) first.
    pub async fn pipe_into<W>(mut self, dest: &mut W, dest_path: impl AsRef<Path>) -> Result<u64, GateError>
    where
        W: AsyncWrite + Unpin,
    {
        self.gate
            .check_path(
                "pipe",
                dest_path.as_ref(),
                ResolveMode::MissingOk,
                PermissionKind::Write,
            )
            .await?;

        let copied = tokio::io::copy(&mut self.inner, dest).await?;
        dest.flush().await?;
        debug!(from = %self.id(), bytes = copied, "piped stream");
        Ok(copied)
    }
}

impl<W> GuardedWriter<W> {
    /// Tracker identity of this stream
    pub fn id(&self) -> DescriptorId {
        self.registration.id()
    }

    /// Borrow the wrapped writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer, releasing the tracker slot
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for GuardedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for GuardedWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl Gate {
    /// Authorize `read` on `path` and wrap `reader`
    pub async fn guard_reader<R>(
        &self,
        path: impl AsRef<Path>,
        reader: R,
    ) -> Result<GuardedReader<R>, GateError> {
        let op = Operation::new("create_read_stream")
            .require_path(path.as_ref(), PermissionKind::Read);
        let (_, registration) = self.open_handle(&op).await?;
        Ok(GuardedReader {
            inner: reader,
            gate: self.clone(),
            registration,
        })
    }

    /// Authorize `write` on `path` (which may not exist yet) and wrap `writer`
    pub async fn guard_writer<W>(
        &self,
        path: impl AsRef<Path>,
        writer: W,
    ) -> Result<GuardedWriter<W>, GateError> {
        let op = Operation::new("create_write_stream")
            .require_creatable(path.as_ref(), PermissionKind::Write);
        let (_, registration) = self.open_handle(&op).await?;
        Ok(GuardedWriter {
            inner: writer,
            registration,
        })
    }

    /// Authorize `read` on `path` and open it
    ///
    /// The file opened is the canonical path that was authorized, not the
    /// requested one, so a link swapped after the check is not followed.
    pub async fn create_read_stream(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<GuardedReader<File>, GateError> {
        let op = Operation::new("create_read_stream")
            .require_path(path.as_ref(), PermissionKind::Read);
        let (authorization, registration) = self.open_handle(&op).await?;
        let file = match authorization.primary_path() {
            Some(canonical) => File::open(canonical).await?,
            None => return Err(no_path(&op)),
        };
        Ok(GuardedReader {
            inner: file,
            gate: self.clone(),
            registration,
        })
    }

    /// Authorize `write` on `path` and create or truncate it
    pub async fn create_write_stream(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<GuardedWriter<File>, GateError> {
        let op = Operation::new("create_write_stream")
            .require_creatable(path.as_ref(), PermissionKind::Write);
        let (authorization, registration) = self.open_handle(&op).await?;
        let file = match authorization.primary_path() {
            Some(canonical) => File::create(canonical).await?,
            None => return Err(no_path(&op)),
        };
        Ok(GuardedWriter {
            inner: file,
            registration,
        })
    }
}

fn no_path(op: &Operation) -> GateError {
    GateError::InvalidArgument {
        operation: op.name().to_string(),
        reason: "operation checks no path to open".to_string(),
    }
}
