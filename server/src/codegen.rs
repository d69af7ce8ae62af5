// ── Short-code generation ──────────────────────────────────────────────────

const ALPHABET: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Encode a counter value as a lowercase alphabetic short code.
///
/// Uses bijective base-26 numeration, so every positive integer gets its own
/// code and there is no "zero" digit to produce ambiguous leading letters:
///
/// ```text
/// 1 → a    26 → z    27 → aa    702 → zz    703 → aaa
/// ```
///
/// Output length never decreases as `n` grows. `0` has no code and yields an
/// empty string; the store always increments before encoding.
pub fn encode(mut n: u64) -> String {
    let mut digits = Vec::new();

    while n > 0 {
        n -= 1;
        digits.push(ALPHABET[(n % 26) as usize]);
        n /= 26;
    }

    digits.reverse();
    // Every byte comes from ALPHABET, which is ASCII.
    digits.into_iter().map(char::from).collect()
}
