pub mod csv;
pub mod json;

pub(crate) use self::counting::CountingWriter;

mod counting {
    use std::io::Write;

    /// Write adapter that counts bytes passed through to `inner`.
    pub(crate) struct CountingWriter<W: Write> {
        inner: W,
        bytes: u64,
    }

    impl<W: Write> CountingWriter<W> {
        pub(crate) fn new(inner: W) -> Self {
            Self { inner, bytes: 0 }
        }

        pub(crate) fn bytes_written(&self) -> u64 {
            self.bytes
        }
    }

    impl<W: Write> Write for CountingWriter<W> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let size = self.inner.write(buf)?;
            self.bytes = self.bytes.saturating_add(size as u64);
            Ok(size)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.inner.flush()
        }
    }
}
