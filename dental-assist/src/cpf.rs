//! CPF (Cadastro de Pessoas Físicas) handling.
//!
//! A CPF is eleven digits where the last two are check digits computed with
//! a weighted mod-11 sum over the preceding digits. Input may carry the usual
//! `XXX.XXX.XXX-XX` punctuation; anything that is not an ASCII digit is
//! ignored.

/// Keep only the ASCII digits of `input`.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Returns `true` when `cpf` has eleven digits, is not a run of one repeated
/// digit, and both check digits match.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = digits_only(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != 11 {
        return false;
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weighted mod-11 check digit over `prefix`.
///
/// Weights run from `prefix.len() + 1` down to 2; a result of 10 or 11
/// collapses to 0.
fn check_digit(prefix: &[u32]) -> u32 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();

    match 11 - (sum % 11) {
        10 | 11 => 0,
        r => r,
    }
}

/// Render an eleven-digit CPF as `XXX.XXX.XXX-XX`.
///
/// Inputs that do not reduce to exactly eleven digits come back digit-only.
pub fn format_cpf(cpf: &str) -> String {
    let digits = digits_only(cpf);
    if digits.len() != 11 {
        return digits;
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}
