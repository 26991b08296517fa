use unicode_normalization::UnicodeNormalization as _;

/// The standard Type 1 faces used on the invoices. They are guaranteed to be
/// available in every PDF reader, so they are referenced by name and never embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinFont {
    Helvetica,
    HelveticaBold,
}

impl BuiltinFont {
    /// The PostScript name used as `BaseFont`.
    pub fn base_font(self) -> &'static str {
        match self {
            BuiltinFont::Helvetica => "Helvetica",
            BuiltinFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Width of an encoded glyph in thousandths of the font size.
    fn glyph_width(self, code: u8) -> u16 {
        let widths = match self {
            BuiltinFont::Helvetica => &HELVETICA_WIDTHS,
            BuiltinFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        match code {
            32..=126 => widths[(code - 32) as usize],
            // Outside of printable ASCII an average Latin glyph width is close enough
            _ => 556,
        }
    }

    /// The advance width of the text, in points, at the given font size.
    pub fn text_width(self, text: &str, font_size: f32) -> f32 {
        let total: u32 = encode_win_ansi(text)
            .into_iter()
            .map(|code| u32::from(self.glyph_width(code)))
            .sum();
        total as f32 * font_size / 1000.0
    }
}

// Advance widths of the characters 32 to 126, taken from the Adobe font metrics.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Encodes text into `WinAnsiEncoding` bytes after normalizing it in the NFC form.
/// Line breaks and tabs become spaces, other control characters are dropped and
/// characters without a code in the encoding are replaced by a question mark.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.nfc()
        .filter_map(|character| match character {
            // So that CRLF breaks give a single space
            '\r' => None,
            character if character.is_control() && character.is_whitespace() => Some(' '),
            character if character.is_control() => None,
            character => Some(character),
        })
        .map(|character| match win_ansi_code(character) {
            Some(code) => code,
            None => {
                log::warn!(
                    "Unable to encode the character {:?}, replacing it with '?'",
                    character
                );
                b'?'
            }
        })
        .collect()
}

fn win_ansi_code(character: char) -> Option<u8> {
    let code = match character {
        ' '..='~' | '\u{a0}'..='\u{ff}' => character as u32 as u8,
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
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
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
        _ => return None,
    };

    Some(code)
}

/// Breaks a single line of text into lines no wider than `maximum_width`, breaking
/// only between words. A word wider than the limit is kept whole on its own line.
pub fn wrap_words(text: &str, font: BuiltinFont, font_size: f32, maximum_width: f32) -> Vec<String> {
    let space_width = font.text_width(" ", font_size);
    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0.0;

    for word in text.split_whitespace() {
        let word_width = font.text_width(word, font_size);
        if current_line.is_empty() {
            current_line.push_str(word);
            current_width = word_width;
        } else if current_width + space_width + word_width <= maximum_width {
            current_line.push(' ');
            current_line.push_str(word);
            current_width += space_width + word_width;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line.push_str(word);
            current_width = word_width;
        }
    }
    lines.push(current_line);

    lines
}
