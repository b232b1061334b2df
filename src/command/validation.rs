use super::Command;

/// Checks if `value` contains an integer between 0 and 2000 that the DUT accepts.
///
/// Only trailing `\r`, `\n` and NUL are ignored. Leading or trailing spaces make the
/// value invalid, as does anything longer than four characters.
pub fn is_valid(value: &str) -> bool {
    let stripped = value.trim_end_matches(['\r', '\n', '\0']);

    if stripped.chars().count() > Command::MAX_DIGITS {
        return false;
    }
    if stripped.is_empty() || !stripped.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    stripped.parse::<u16>().is_ok_and(|v| v <= Command::MAX)
}
