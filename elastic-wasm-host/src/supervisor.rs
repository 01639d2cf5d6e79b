//! Load → compile → instantiate → process, exactly once
//!
//! Any failure along the way is returned as a [`HostError`]; nothing is
//! retried.

use crate::context::HostContext;
use crate::error::HostError;
use crate::loader::{Completion, HostConfig, ModuleHost};
use crate::record::Record;
use std::path::Path;

/// Runs guest modules to completion
pub struct Supervisor {
    host: ModuleHost,
}

impl Supervisor {
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        Ok(Self {
            host: ModuleHost::new(config)?,
        })
    }

    /// Read a guest binary from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<u8>, HostError> {
        let path = path.as_ref();
        let wasm_bytes = std::fs::read(path).map_err(|source| HostError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            size = %format_size(wasm_bytes.len()),
            "WASM loaded"
        );
        Ok(wasm_bytes)
    }

    /// Compile, instantiate and invoke `process` once
    pub fn run<R: Record>(
        &self,
        wasm_bytes: &[u8],
        ctx: HostContext<R>,
    ) -> Result<Completion<R>, HostError> {
        let result = self.run_inner(wasm_bytes, ctx);
        match &result {
            Ok(completion) => {
                tracing::info!("Done. Return code: {}", completion.return_code);
            }
            Err(err) => {
                tracing::error!(phase = %err.phase(), error = %err, "Guest run failed");
            }
        }
        result
    }

    /// [`Supervisor::load`] followed by [`Supervisor::run`]
    pub fn run_file<R: Record>(
        &self,
        path: impl AsRef<Path>,
        ctx: HostContext<R>,
    ) -> Result<Completion<R>, HostError> {
        let wasm_bytes = Self::load(path)?;
        self.run(&wasm_bytes, ctx)
    }

    fn run_inner<R: Record>(
        &self,
        wasm_bytes: &[u8],
        ctx: HostContext<R>,
    ) -> Result<Completion<R>, HostError> {
        tracing::info!("Compiling module");
        let compiled = self.host.compile(wasm_bytes)?;

        let instance = compiled.instantiate(ctx)?;

        tracing::info!("Invoking process");
        instance.process()
    }
}

/// Human-readable byte count, e.g. `1.2 kB`
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];

    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    if value < 10.0 {
        format!("{value:.1} {unit}")
    } else {
        format!("{value:.0} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Event;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_run_logs_completion_once() {
        let wasm = wat::parse_str(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "malloc") (param i32) (result i32) (i32.const 1024))
                 (func (export "process") (result i32) (i32.const 7)))"#,
        )
        .unwrap();
        let supervisor = Supervisor::new(HostConfig::default()).unwrap();

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let completion = tracing::subscriber::with_default(subscriber, || {
            supervisor.run(&wasm, HostContext::new(Event::new()))
        })
        .unwrap();

        assert_eq!(completion.return_code, 7);
        assert_eq!(logs.contents().matches("Done. Return code: 7").count(), 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(999), "999 B");
        assert_eq!(format_size(1_200), "1.2 kB");
        assert_eq!(format_size(48_000), "48 kB");
        assert_eq!(format_size(3_500_000), "3.5 MB");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Supervisor::load("/nonexistent/guest.wasm").unwrap_err();
        assert!(matches!(err, HostError::Load { .. }));
    }
}
