//! Text normalization for extracted document text.
//!
//! Document-to-text extraction leaves behind byte-order marks, ligature glyphs,
//! mojibake from mis-decoded UTF-8 and ragged whitespace. Everything downstream
//! (prompts, heuristics, keyword matching) sees the cleaned text only.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Runs of horizontal whitespace
    static ref RE_HSPACE: Regex = Regex::new(r"[ \t]+").unwrap();

    /// Three or more line breaks (possibly with whitespace between them)
    static ref RE_MULTI_NEWLINE: Regex = Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap();
}

/// Presentation-form ligatures emitted by PDF text extraction.
const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

/// UTF-8 sequences that were decoded as Windows-1252 somewhere upstream.
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€¢", "\u{2022}"),
    ("â€¦", "..."),
    ("Ã©", "é"),
    ("Ã¨", "è"),
    ("Ã¡", "á"),
    ("Ã³", "ó"),
    ("Ã¶", "ö"),
    ("Ã¼", "ü"),
    ("Ã±", "ñ"),
    ("Â ", " "),
];

/// Cleans raw extracted text. Pure and total: the worst case is the input
/// with only its whitespace tidied.
pub fn normalize(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    text.push('\n');
                }
            }
            '\n' => text.push('\n'),
            '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' => text.push(' '),
            // byte-order mark, zero-width characters, soft hyphen
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{00AD}' => {}
            c if c.is_control() && c != '\u{9d}' => {}
            c => match LIGATURES.iter().find(|(lig, _)| *lig == c) {
                Some((_, expanded)) => text.push_str(expanded),
                None => text.push(c),
            },
        }
    }

    for (broken, fixed) in MOJIBAKE {
        if text.contains(broken) {
            text = text.replace(broken, fixed);
        }
    }
    // A stray U+009D that was not part of a mojibake quote is still a control char.
    text.retain(|c| c != '\u{9d}');

    let text = RE_HSPACE.replace_all(&text, " ");
    let text: Vec<&str> = text.lines().map(str::trim).collect();
    let text = text.join("\n");
    let text = RE_MULTI_NEWLINE.replace_all(&text, "\n\n");

    text.trim().to_string()
}
