//! `Content-Disposition` header construction (RFC 6266 / RFC 5987).

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::str::FromStr;

/// RFC 5987 `attr-char` minus alphanumerics; everything else is encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

const FALLBACK_NAME: &str = "download";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispositionMode {
    #[default]
    Attachment,
    Inline,
}

impl DispositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionMode::Attachment => "attachment",
            DispositionMode::Inline => "inline",
        }
    }
}

impl FromStr for DispositionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "attachment" | "download" => Ok(DispositionMode::Attachment),
            "inline" | "view" => Ok(DispositionMode::Inline),
            other => Err(format!("unknown disposition mode: {}", other)),
        }
    }
}

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ą' => "A",
        'æ' => "ae",
        'Æ' => "AE",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'ď' | 'đ' => "d",
        'Ď' | 'Đ' => "D",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ę' | 'Ě' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' => "I",
        'ł' => "l",
        'Ł' => "L",
        'ñ' | 'ń' | 'ň' => "n",
        'Ñ' | 'Ń' | 'Ň' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => "O",
        'œ' => "oe",
        'Œ' => "OE",
        'ř' => "r",
        'Ř' => "R",
        'ś' | 'š' | 'ş' => "s",
        'Ś' | 'Š' | 'Ş' => "S",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'Ť' | 'Ţ' => "T",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' | 'Ÿ' => "Y",
        'ź' | 'ż' | 'ž' => "z",
        'Ź' | 'Ż' | 'Ž' => "Z",
        ' ' => "_",
        _ => return None,
    };
    Some(folded)
}

/// ASCII-only rendition of `name` for the plain `filename=` parameter.
///
/// Common Latin letters are transliterated, spaces become `_`, and anything
/// outside `[A-Za-z0-9._-]` is dropped.
pub fn ascii_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else if let Some(folded) = fold_char(c) {
            out.push_str(folded);
        }
    }

    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.' || c == '_' || c == '-') {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` value with both an ASCII `filename` and a UTF-8 `filename*`.
pub fn content_disposition(mode: DispositionMode, name: &str) -> String {
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        mode.as_str(),
        ascii_filename(name),
        utf8_percent_encode(name, ATTR_CHAR)
    )
}
