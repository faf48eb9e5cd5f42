// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Logging bootstrap for daemon processes.
//!
//! Installs a `tracing-subscriber` formatter filtered by `RUST_LOG`. Calling
//! it more than once keeps the first subscriber.

use tracing_subscriber::{fmt, fmt::MakeWriter, EnvFilter};

/// Installs the global subscriber writing to stdout.
pub fn init() {
    init_with_writer(fmt::writer::BoxMakeWriter::new(std::io::stdout));
}

/// Installs the global subscriber writing to `writer`.
pub fn init_with_writer<W>(writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing::error;

    #[derive(Clone, Default)]
    struct BufMakeWriter {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl<'a> MakeWriter<'a> for BufMakeWriter {
        type Writer = BufWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufWriter {
                buf: self.buf.clone(),
            }
        }
    }

    struct BufWriter {
        buf: Arc<Mutex<Vec<u8>>>,
    }

    impl std::io::Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buf.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn captures_events() {
        let writer = BufMakeWriter::default();
        init_with_writer(writer.clone());
        // A second call must not panic.
        init();

        error!("captured");
        let output = String::from_utf8(writer.buf.lock().unwrap().clone()).unwrap();
        assert!(output.contains("captured"));
    }
}
