// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The platform-support precondition: the early-signal native device node
//! must exist before the mediator is allowed to start. Grounded on
//! `original_source/hw/platform/ioc.c`'s `ioc_is_platform_supported`
//! (`stat(IOC_NP_ESIG, &st)`).

use std::path::{Path, PathBuf};

/// Well-known path whose existence signals that CBC has attached and the
/// host supports IOC. Doubles as the (disabled) `EarlySignal` channel's
/// device path, matching the original's `IOC_NP_ESIG` doing double duty.
pub fn early_signal_sentinel_path() -> PathBuf {
    PathBuf::from("/dev/cbc-early-signal")
}

/// Returns `true` iff `path` exists. A board that never attached CBC will
/// never create this node, which is this implementation's signal to
/// refuse to start rather than spin up threads against dead channels.
pub fn is_supported(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_unsupported() {
        assert!(!is_supported(Path::new("/nonexistent/ioc/sentinel/path")));
    }

    #[test]
    fn existing_path_is_supported() {
        let dir = std::env::temp_dir().join("ioc_mediator_platform_test_sentinel");
        std::fs::write(&dir, b"x").unwrap();
        assert!(is_supported(&dir));
        let _ = std::fs::remove_file(&dir);
    }
}
