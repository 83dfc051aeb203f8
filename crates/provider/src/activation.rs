//! Making candidate sources visible before they are read.
//!
//! On QEMU the firmware config entries only appear under `/sys` once the
//! `qemu_fw_cfg` kernel module is loaded.

use std::process::Command;

use crate::error::{Error, Result};

/// A step run once before any candidate source is read.
pub trait Activator: Send + Sync {
    fn activate(&self) -> Result<()>;
}

/// Loads a kernel module with `modprobe`.
#[derive(Debug, Clone)]
pub struct ModprobeActivator {
    program: String,
    module: String,
}

impl ModprobeActivator {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            program: "modprobe".to_string(),
            module: module.into(),
        }
    }

    /// Run `program` instead of `modprobe`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    fn failed(&self, message: impl Into<String>) -> Error {
        Error::Activation {
            module: self.module.clone(),
            message: message.into(),
        }
    }
}

impl Activator for ModprobeActivator {
    fn activate(&self) -> Result<()> {
        log::info!("loading kernel module {}", self.module);
        let output = Command::new(&self.program)
            .arg(&self.module)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    self.failed(format!("{} not found", self.program))
                } else {
                    self.failed(e.to_string())
                }
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(self.failed(format!("{} exited with {}", self.program, output.status)))
        } else {
            Err(self.failed(stderr))
        }
    }
}

/// For platforms where the sources are always visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActivation;

impl Activator for NoActivation {
    fn activate(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modprobe_success() {
        let activator = ModprobeActivator::new("qemu_fw_cfg").with_program("true");
        activator.activate().unwrap();
    }

    #[test]
    fn test_modprobe_nonzero_exit() {
        let activator = ModprobeActivator::new("qemu_fw_cfg").with_program("false");
        match activator.activate() {
            Err(Error::Activation { module, message }) => {
                assert_eq!(module, "qemu_fw_cfg");
                assert!(message.contains("exited"), "{message}");
            }
            other => panic!("expected Activation, got {other:?}"),
        }
    }

    #[test]
    fn test_modprobe_missing_program() {
        let activator =
            ModprobeActivator::new("qemu_fw_cfg").with_program("/nonexistent/modprobe");
        let err = activator.activate().unwrap_err();
        assert!(err.is_activation());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_no_activation() {
        NoActivation.activate().unwrap();
    }
}
