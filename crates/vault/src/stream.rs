//! Lazy stream adapters: wrap a reader and transform bytes as they are read.

use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};

use tokio::io::{AsyncRead, ReadBuf};

use crate::{
    cfb::{Decryptor, Encryptor, Keystream},
    error::Result,
};

/// Reader adapter applying a [`Keystream`] to everything read through it.
///
/// Works as both a blocking [`io::Read`] and a tokio [`AsyncRead`].
pub struct CipherReader<R, K> {
    inner: R,
    keystream: K,
}

impl<R, K: Keystream> CipherReader<R, K> {
    pub fn new(inner: R, keystream: K) -> Self {
        Self { inner, keystream }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Plaintext in, ciphertext out.
pub fn encrypt_reader<R>(
    key: &[u8],
    iv: &[u8],
    plaintext: R,
) -> Result<CipherReader<R, Encryptor>> {
    Ok(CipherReader::new(plaintext, Encryptor::new(key, iv)?))
}

/// Ciphertext in, plaintext out.
pub fn decrypt_reader<R>(
    key: &[u8],
    iv: &[u8],
    ciphertext: R,
) -> Result<CipherReader<R, Decryptor>> {
    Ok(CipherReader::new(ciphertext, Decryptor::new(key, iv)?))
}

impl<R: io::Read, K: Keystream> io::Read for CipherReader<R, K> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = io::Read::read(&mut self.inner, buf)?;
        self.keystream.apply(&mut buf[..n]);
        Ok(n)
    }
}

impl<R, K> AsyncRead for CipherReader<R, K>
where
    R: AsyncRead + Unpin,
    K: Keystream + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        this.keystream.apply(&mut buf.filled_mut()[before..]);
        Poll::Ready(Ok(()))
    }
}
