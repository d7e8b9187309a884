//! Convert IBM437 encoded strings to UTF-8

/// Conversion of legacy encoded names to UTF-8.
///
/// Zip tooling of the DOS era wrote file names in the OEM code page, which
/// by long-standing convention is taken to be IBM437.
pub(crate) trait FromCp437 {
    /// The associated conversion target
    type Target;

    /// Converts the data, treating it as IBM437
    fn from_cp437(self) -> Self::Target;
}

impl<'a> FromCp437 for &'a [u8] {
    type Target = String;

    fn from_cp437(self) -> Self::Target {
        self.iter().map(|b| to_char(*b)).collect()
    }
}

fn to_char(input: u8) -> char {
    match input {
        0x00..=0x7f => input as char,
        _ => CP437_HIGH[(input - 0x80) as usize],
    }
}

/// Code points 0x80..=0xff of IBM437.
static CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];
