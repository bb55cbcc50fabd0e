//! Filename sanitizer
//!
//! Turns episode and series titles into tokens that are safe to use as file
//! names on every platform.

use deunicode::deunicode;

/// Punctuation allowed in file names besides letters, digits and space
const ALLOWED_PUNCTUATION: &[char] = &['-', '_', '.', '(', ')'];

/// Sanitize a title for use in a file name.
///
/// Non-ASCII characters are transliterated to their closest ASCII
/// equivalent, anything outside letters, digits, space and `-_.()` is
/// dropped, and whitespace runs collapse to a single space. The function
/// never fails and `sanitize(&sanitize(x)) == sanitize(x)`.
///
/// # Examples
/// ```
/// use vix_core::sanitize::sanitize;
///
/// assert_eq!(sanitize("El señor de los cielos: ¿Quién?"), "El senor de los cielos Quien");
/// assert_eq!(sanitize("  a  /  b "), "a b");
/// ```
pub fn sanitize(title: &str) -> String {
    let ascii = deunicode(title);
    let kept: String = ascii
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || ALLOWED_PUNCTUATION.contains(c))
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
