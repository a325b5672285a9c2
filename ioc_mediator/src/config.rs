// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Parses the device-model-supplied init string, grounded on
//! `original_source/hw/platform/ioc.c`'s `ioc_parse`: a comma-separated
//! `"<virtual-uart-path>,<boot-reason>"` pair, where the boot reason is
//! parsed with base auto-detection (`strtoul(tmp, 0, 0)`).

use crate::error::Error;

/// Matches the original's `static char virtual_uart_path[32]` buffer: the
/// path (plus a NUL terminator) must fit in 32 bytes.
pub const VIRTUAL_UART_PATH_BUF_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitParams {
    pub virtual_uart_path: String,
    pub boot_reason: u32,
}

/// Parses `"<path>,<boot_reason>"`. Unlike the C original's `snprintf`
/// (which silently truncates an overlong path), an overlong path is a
/// hard error here -- see DESIGN.md's Open Question decision. A boot
/// reason of zero is rejected per spec §6/§8 (scenario S4).
pub fn parse_init_string(opts: &str) -> Result<InitParams, Error> {
    let mut parts = opts.splitn(2, ',');
    let path = parts.next().unwrap_or("");
    let reason_str = parts.next();

    if path.len() + 1 > VIRTUAL_UART_PATH_BUF_LEN {
        return Err(Error::VirtualUartPathTooLong {
            len: path.len(),
            max: VIRTUAL_UART_PATH_BUF_LEN - 1,
        });
    }

    let boot_reason = match reason_str {
        Some(s) => parse_boot_reason(s)?,
        None => 0,
    };

    if boot_reason == 0 {
        return Err(Error::MissingBootReason);
    }

    Ok(InitParams {
        virtual_uart_path: path.to_string(),
        boot_reason,
    })
}

/// Base-auto-detecting unsigned integer parse, matching `strtoul(s, 0, 0)`:
/// a `0x`/`0X` prefix means hex, a bare leading `0` (with more digits)
/// means octal, anything else is decimal.
fn parse_boot_reason(s: &str) -> Result<u32, Error> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    u32::from_str_radix(digits, radix).map_err(|_| Error::MissingBootReason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_boot_reason() {
        let params = parse_init_string("/tmp/vuart,1").unwrap();
        assert_eq!(params.virtual_uart_path, "/tmp/vuart");
        assert_eq!(params.boot_reason, 1);
    }

    #[test]
    fn parses_hex_boot_reason() {
        let params = parse_init_string("/tmp/vuart,0x10").unwrap();
        assert_eq!(params.boot_reason, 16);
    }

    #[test]
    fn parses_octal_boot_reason() {
        let params = parse_init_string("/tmp/vuart,010").unwrap();
        assert_eq!(params.boot_reason, 8);
    }

    #[test]
    fn zero_boot_reason_is_rejected() {
        assert!(matches!(
            parse_init_string("/tmp/vuart,0"),
            Err(Error::MissingBootReason)
        ));
    }

    #[test]
    fn missing_boot_reason_is_rejected() {
        assert!(matches!(
            parse_init_string("/tmp/vuart"),
            Err(Error::MissingBootReason)
        ));
    }

    #[test]
    fn overlong_path_is_rejected_rather_than_truncated() {
        let long_path = "/".to_string() + &"a".repeat(40);
        assert!(matches!(
            parse_init_string(&format!("{long_path},1")),
            Err(Error::VirtualUartPathTooLong { .. })
        ));
    }
}
