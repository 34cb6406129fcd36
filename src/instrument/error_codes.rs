//! Device error code table.
//!
//! The MAVO firmware reports faults as `ERROR = <n>`. The mapping from `n` to a
//! symbolic code and message is a fixed, total function: the 22 documented
//! fault codes map to their table entry, `0` maps to `NO_ERROR` and any other
//! integer maps to `UNKNOWN_ERROR`. Renumbering entries is a compatibility
//! break with existing error logs.

use serde::Serialize;
use std::fmt;

/// Symbolic code for the absence of an error.
pub const NO_ERROR: &str = "NO_ERROR";
/// Symbolic code for any number outside the documented table.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// Error number reported for a UART overrun, the only fault worth retrying.
pub const OVERRUN: i32 = 1;

const UNKNOWN_MESSAGE: &str = "Unknown error";

static ERROR_TABLE: &[(i32, &str, &str)] = &[
    // UART
    (1, "UART_ERR_OVE", "Overrun error: A new character was read in before the current character was picked up."),
    (2, "UART_ERR_FE", "Transmission error: stop bit not detected"),
    (3, "UART_ERR_PE", "Transmission error: parity error"),
    (4, "UART_ERR_BUFFOFL", "Receive buffer overrun"),
    (8, "UART_ERR_TIMEOUT", "Timeout, no frame end detected"),
    // A/D converter
    (17, "ADC_ERR_PHASE", "ADW Phase sequence not adhered to"),
    (18, "ADC_ERR_OFL", "Timeout during deintegration (= overflow)"),
    (19, "ADC_ERR_OVR", "Measuring range exceeded (= overrange)"),
    // EEPROM
    (21, "EEP_ERR_WRITE", "EEPROM Write error"),
    (22, "EEP_ERR_LOCKED", "Impermissible access to calibration data memory"),
    // Command interpreter
    (101, "SCPI_ERR__CMD_NOT_FOUND", "Error in header, command not supported"),
    (102, "SCPI_ERR__WRONG_PARA_COUNT", "Wrong number of parameters"),
    (103, "SCPI_ERR__WRONG_PARA_TYPE", "Unexpected parameter type"),
    (104, "SCPI_ERR__WRONG_PARA_UNITS", "Incorrect unit of measure for parameter"),
    (105, "SCPI_ERR__UNMATCHED_QUERY", "Query command not implemented"),
    (106, "SCPI_ERR__UNMATCHED_BRACKET", "Bracket error: The number of opening and closing brackets is not identical."),
    (107, "SCPI_ERR__INVALID_VALUE_LIST", "Setting value outside of permissible range"),
    (108, "SCPI_ERR__INVALID_NUM_SUFFIX", "Incorrect index value"),
    // Device / configuration
    (201, "SCPI_ERR__DEVICE_UNKNOWN", "Hardware is not supported by this firmware version"),
    (202, "SCPI_ERR__WRONG_SENSOR", "The connected sensor is not suitable for the requested measurement."),
    (203, "SCPI_ERR__RANGE_OVR", "Measuring Range exceeded"),
    (204, "SCPI_ERR__WRONG_PASSWORD", "Incorrect password"),
];

/// Fault family of a device error number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// Error number 0.
    None,
    /// UART framing faults (1-4, 8).
    Transport,
    /// A/D converter faults (17-19).
    Converter,
    /// Non-volatile memory faults (21-22).
    Memory,
    /// Malformed command sent by the host (101-108).
    Command,
    /// Hardware or configuration mismatch (201-204).
    Device,
    /// Any other non-zero number.
    Unknown,
}

/// A device error number together with its symbolic code and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedError {
    /// Raw number reported by the device.
    pub number: i32,
    /// Symbolic name, e.g. `UART_ERR_OVE`.
    pub code: &'static str,
    /// Human readable description.
    pub message: &'static str,
}

impl DecodedError {
    /// The decoded value of error number 0.
    pub const NONE: DecodedError = DecodedError {
        number: 0,
        code: NO_ERROR,
        message: "",
    };

    /// True for any non-zero error number.
    pub fn is_error(&self) -> bool {
        self.number != 0
    }

    /// True for a UART overrun, which warrants exactly one retry.
    pub fn is_overrun(&self) -> bool {
        self.number == OVERRUN
    }

    /// Fault family of this error.
    pub fn category(&self) -> ErrorCategory {
        match self.number {
            0 => ErrorCategory::None,
            _ if self.code == UNKNOWN_ERROR => ErrorCategory::Unknown,
            1..=8 => ErrorCategory::Transport,
            17..=19 => ErrorCategory::Converter,
            21..=22 => ErrorCategory::Memory,
            101..=108 => ErrorCategory::Command,
            201..=204 => ErrorCategory::Device,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl Default for DecodedError {
    fn default() -> Self {
        Self::NONE
    }
}

/// Formats as one error log line: `Error 019: ADC_ERR_OVR - <message>`.
impl fmt::Display for DecodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The sign is kept outside the three digit field so -1 renders as -001.
        let sign = if self.number < 0 { "-" } else { "" };
        write!(
            f,
            "Error {}{:03}: {} - {}",
            sign,
            self.number.unsigned_abs(),
            self.code,
            self.message
        )
    }
}

/// Decode a device error number. Never fails.
pub fn translate(number: i32) -> DecodedError {
    if number == 0 {
        return DecodedError::NONE;
    }
    ERROR_TABLE
        .iter()
        .find(|(n, _, _)| *n == number)
        .map(|&(number, code, message)| DecodedError {
            number,
            code,
            message,
        })
        .unwrap_or(DecodedError {
            number,
            code: UNKNOWN_ERROR,
            message: UNKNOWN_MESSAGE,
        })
}

/// All documented error numbers, in table order.
pub fn known_codes() -> impl Iterator<Item = i32> {
    ERROR_TABLE.iter().map(|(n, _, _)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_unique_numbers() {
        // 22 table entries plus NO_ERROR make the 23 defined codes
        let codes: Vec<i32> = known_codes().collect();
        assert_eq!(codes.len(), 22);
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted, codes);
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_exact_pairs() {
        let expected = [
            (0, "NO_ERROR", ""),
            (1, "UART_ERR_OVE", "Overrun error: A new character was read in before the current character was picked up."),
            (2, "UART_ERR_FE", "Transmission error: stop bit not detected"),
            (3, "UART_ERR_PE", "Transmission error: parity error"),
            (4, "UART_ERR_BUFFOFL", "Receive buffer overrun"),
            (8, "UART_ERR_TIMEOUT", "Timeout, no frame end detected"),
            (17, "ADC_ERR_PHASE", "ADW Phase sequence not adhered to"),
            (18, "ADC_ERR_OFL", "Timeout during deintegration (= overflow)"),
            (19, "ADC_ERR_OVR", "Measuring range exceeded (= overrange)"),
            (21, "EEP_ERR_WRITE", "EEPROM Write error"),
            (22, "EEP_ERR_LOCKED", "Impermissible access to calibration data memory"),
            (101, "SCPI_ERR__CMD_NOT_FOUND", "Error in header, command not supported"),
            (102, "SCPI_ERR__WRONG_PARA_COUNT", "Wrong number of parameters"),
            (103, "SCPI_ERR__WRONG_PARA_TYPE", "Unexpected parameter type"),
            (104, "SCPI_ERR__WRONG_PARA_UNITS", "Incorrect unit of measure for parameter"),
            (105, "SCPI_ERR__UNMATCHED_QUERY", "Query command not implemented"),
            (106, "SCPI_ERR__UNMATCHED_BRACKET", "Bracket error: The number of opening and closing brackets is not identical."),
            (107, "SCPI_ERR__INVALID_VALUE_LIST", "Setting value outside of permissible range"),
            (108, "SCPI_ERR__INVALID_NUM_SUFFIX", "Incorrect index value"),
            (201, "SCPI_ERR__DEVICE_UNKNOWN", "Hardware is not supported by this firmware version"),
            (202, "SCPI_ERR__WRONG_SENSOR", "The connected sensor is not suitable for the requested measurement."),
            (203, "SCPI_ERR__RANGE_OVR", "Measuring Range exceeded"),
            (204, "SCPI_ERR__WRONG_PASSWORD", "Incorrect password"),
        ];
        assert_eq!(expected.len(), 23);
        for (number, code, message) in expected {
            let decoded = translate(number);
            assert_eq!(decoded.number, number);
            assert_eq!(decoded.code, code, "code for {}", number);
            assert_eq!(decoded.message, message, "message for {}", number);
        }
    }

    #[test]
    fn test_zero_is_no_error() {
        let decoded = translate(0);
        assert_eq!(decoded.code, NO_ERROR);
        assert_eq!(decoded.message, "");
        assert!(!decoded.is_error());
        assert_eq!(decoded.category(), ErrorCategory::None);
    }

    #[test]
    fn test_unknown_numbers_hit_catch_all() {
        for number in [-1, 5, 7, 9, 16, 20, 23, 100, 109, 200, 205, 999, i32::MIN, i32::MAX] {
            let decoded = translate(number);
            assert_eq!(decoded.number, number);
            assert_eq!(decoded.code, UNKNOWN_ERROR);
            assert_eq!(decoded.message, "Unknown error");
            assert_eq!(decoded.category(), ErrorCategory::Unknown);
        }
    }

    #[test]
    fn test_translate_is_pure() {
        for number in -5..300 {
            assert_eq!(translate(number), translate(number));
        }
    }

    #[test]
    fn test_categories() {
        assert_eq!(translate(1).category(), ErrorCategory::Transport);
        assert_eq!(translate(8).category(), ErrorCategory::Transport);
        assert_eq!(translate(18).category(), ErrorCategory::Converter);
        assert_eq!(translate(22).category(), ErrorCategory::Memory);
        assert_eq!(translate(105).category(), ErrorCategory::Command);
        assert_eq!(translate(203).category(), ErrorCategory::Device);
        assert_eq!(translate(6).category(), ErrorCategory::Unknown);
    }

    #[test]
    fn test_only_overrun_is_retryable() {
        assert!(translate(1).is_overrun());
        for number in known_codes().filter(|n| *n != 1) {
            assert!(!translate(number).is_overrun());
        }
    }

    #[test]
    fn test_display_zero_pads() {
        assert_eq!(
            translate(2).to_string(),
            "Error 002: UART_ERR_FE - Transmission error: stop bit not detected"
        );
        assert_eq!(
            translate(107).to_string(),
            "Error 107: SCPI_ERR__INVALID_VALUE_LIST - Setting value outside of permissible range"
        );
        assert_eq!(translate(-1).to_string(), "Error -001: UNKNOWN_ERROR - Unknown error");
    }
}
