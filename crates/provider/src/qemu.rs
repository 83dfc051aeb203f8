//! QEMU firmware config (`-fw_cfg name=opt/...,file=...`).

use crate::activation::{Activator, ModprobeActivator};
use crate::source::CandidateSources;

/// Kernel module exposing fw_cfg entries under sysfs.
pub const QEMU_FIRMWARE_MODULE: &str = "qemu_fw_cfg";

/// Where the config blob may appear, newest naming convention first.
pub const QEMU_FIRMWARE_CONFIG_PATHS: [&str; 2] = [
    "/sys/firmware/qemu_fw_cfg/by_name/opt/org.flatcar-linux/config/raw",
    "/sys/firmware/qemu_fw_cfg/by_name/opt/com.coreos/config/raw",
];

/// The fw_cfg candidates behind `activator`.
pub fn firmware_config(activator: impl Activator + 'static) -> CandidateSources {
    CandidateSources::new(activator, QEMU_FIRMWARE_CONFIG_PATHS)
}

/// The fw_cfg candidates, loading [`QEMU_FIRMWARE_MODULE`] first.
pub fn default_sources() -> CandidateSources {
    firmware_config(ModprobeActivator::new(QEMU_FIRMWARE_MODULE))
}
