//! Helvetica-Bold metrics and WinAnsi text encoding
//!
//! Helvetica-Bold is one of the 14 standard PDF fonts, so viewers supply
//! the glyphs and nothing has to be embedded. Widths come from the Adobe
//! AFM file and are in 1/1000ths of the em square.

/// PostScript name of the watermark face
pub const BASE_FONT: &str = "Helvetica-Bold";

/// Widths for WinAnsi codes 32..=255 (0 marks an unused code)
const HELVETICA_BOLD_WIDTHS: [u16; 224] = [
    // 32..47
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    // 48..63
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    // 64..79
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    // 80..95
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    // 96..111
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    // 112..127
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 0,
    // 128..143
    556, 0, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,
    // 144..159
    0, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 0, 500, 667,
    // 160..175
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    // 176..191
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    // 192..207
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    // 208..223
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    // 224..239
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    // 240..255
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

/// Encode text for a WinAnsiEncoding simple font.
///
/// Whitespace controls become spaces; characters WinAnsi cannot express
/// become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_code).collect()
}

fn win_ansi_code(ch: char) -> u8 {
    match ch {
        '\t' | '\n' | '\r' => b' ',
        ' '..='~' => ch as u8,
        '\u{a0}'..='\u{ff}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => b'?',
    }
}

/// Advance width of one WinAnsi code, in 1/1000 em
pub fn glyph_width(code: u8) -> u16 {
    if code < 32 {
        return 0;
    }
    HELVETICA_BOLD_WIDTHS[(code - 32) as usize]
}

/// Width of WinAnsi-encoded text at `font_size`, in points
pub fn text_width(encoded: &[u8], font_size: f64) -> f64 {
    let units: u32 = encoded.iter().map(|&b| glyph_width(b) as u32).sum();
    units as f64 * font_size / 1000.0
}

/// Escape bytes for a PDF literal string `( ... )`
pub fn escape_pdf_string(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len() + 2);
    for &b in bytes {
        match b {
            b'\\' | b'(' | b')' => {
                escaped.push(b'\\');
                escaped.push(b);
            }
            _ => escaped.push(b),
        }
    }
    escaped
}
