use anyhow::{Context as _, Result};
use provider::{CandidateSources, ModprobeActivator, NoActivation, qemu};
use std::fs;
use std::io::{self, Write};

use crate::Context;
use crate::cli::FetchConfigArgs;
use crate::settings::FirmwareSettings;
use crate::ui;

pub fn run(ctx: &Context, args: FetchConfigArgs) -> Result<()> {
    let located = sources_for(&ctx.settings.firmware)
        .locate()
        .context("Could not read QEMU firmware config")?;

    if located.source.is_none() {
        log::warn!("no config supplied through QEMU firmware config");
    }

    // An absent source is written as empty bytes, which `files` reads as "no config".
    match args.out {
        Some(out) => {
            fs::write(&out, &located.data)
                .with_context(|| format!("Could not write {}", out.display()))?;
            if ctx.quiet {
                return Ok(());
            }
            match &located.source {
                Some(source) => {
                    ui::success(&format!("Config written to {}", out.display()));
                    ui::kv("source", &source.display().to_string());
                    ui::kv("size", &ui::format_size(located.data.len() as u64));
                }
                None => ui::warn(&format!(
                    "No config supplied, wrote empty {}",
                    out.display()
                )),
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&located.data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn sources_for(firmware: &FirmwareSettings) -> CandidateSources {
    if firmware.activate {
        qemu::firmware_config(ModprobeActivator::new(firmware.module.clone()))
    } else {
        qemu::firmware_config(NoActivation)
    }
}
