//! Luhn checksum validation for order numbers

/// Check whether `number` is a syntactically valid order number.
///
/// ASCII spaces are stripped first (card numbers are often typed in
/// groups of four). The remainder must be non-empty, all digits, and
/// pass the Luhn checksum.
pub fn validate(number: &str) -> bool {
    let mut sum = 0u32;
    let mut count = 0usize;

    for ch in number.chars().rev() {
        if ch == ' ' {
            continue;
        }
        let Some(digit) = ch.to_digit(10) else {
            return false;
        };

        // Every second digit from the right is doubled.
        let mut d = digit;
        if count % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        count += 1;
    }

    count > 0 && sum % 10 == 0
}
