//! Extended-syntax escape decoding.
//!
//! "Extended" find/replace text (and the column delimiter string) is typed
//! with backslash escapes and decoded into literal characters before use:
//!
//! - `\n`, `\r`, `\t`, `\0`, `\\`
//! - `\xHH`: hexadecimal, up to 2 digits
//! - `\dDDD`: decimal, up to 3 digits
//! - `\oOOO`: octal, up to 3 digits
//! - `\bBBBBBBBB`: binary, up to 8 digits
//! - `\uHHHH`: hexadecimal, up to 4 digits (UTF-16 code unit)
//!
//! An escape with no valid digits, a trailing lone backslash, or a numeric
//! value that is not a Unicode scalar passes through verbatim. Decoding is a
//! pure function of the input string.

/// Decode extended-syntax escapes in `input` into literal characters.
///
/// # Examples
///
/// ```rust
/// use multireplace_core::decode_extended;
///
/// assert_eq!(decode_extended(r"a\tb"), "a\tb");
/// assert_eq!(decode_extended(r"\x41\d066\o103"), "ABC");
/// assert_eq!(decode_extended(r"\q"), r"\q"); // unknown escape passes through
/// ```
pub fn decode_extended(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('r') => {
                chars.next();
                out.push('\r');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some('0') => {
                chars.next();
                out.push('\0');
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some(marker @ ('x' | 'd' | 'o' | 'b' | 'u')) => {
                let (radix, max_digits) = match marker {
                    'x' => (16, 2),
                    'd' => (10, 3),
                    'o' => (8, 3),
                    'b' => (2, 8),
                    _ => (16, 4),
                };
                // Clone so an invalid escape can be emitted verbatim.
                let mut lookahead = chars.clone();
                lookahead.next(); // the marker
                match read_code(&mut lookahead, radix, max_digits) {
                    Some(code) => {
                        chars = lookahead;
                        out.push(code);
                    }
                    None => out.push('\\'),
                }
            }
            _ => out.push('\\'),
        }
    }

    out
}

/// Consume 1..=`max_digits` digits in `radix` and convert to a scalar.
fn read_code(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    radix: u32,
    max_digits: usize,
) -> Option<char> {
    let mut value: u32 = 0;
    let mut consumed = 0;
    while consumed < max_digits {
        let Some(digit) = chars.peek().and_then(|c| c.to_digit(radix)) else {
            break;
        };
        chars.next();
        value = value * radix + digit;
        consumed += 1;
    }
    if consumed == 0 {
        return None;
    }
    char::from_u32(value)
}
