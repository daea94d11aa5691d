//! Text recovery from the markup inside office documents: WordprocessingML
//! (DOCX), OpenDocument (ODT) and RTF.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| compile(r"<[^>]*>"));

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| compile(r"&(#x[0-9A-Fa-f]+|#[0-9]+|amp|lt|gt|quot|apos);"));

/// (tag, replacement) rules applied before tags are stripped.
type StructuralRules = Vec<(Regex, &'static str)>;

static WORDPROCESSING_RULES: Lazy<StructuralRules> = Lazy::new(|| {
    vec![
        (compile(r"</w:p>"), "\n"),
        (compile(r"<w:br\b[^>]*/>"), "\n"),
        (compile(r"<w:cr\b[^>]*/>"), "\n"),
        (compile(r"<w:tab\b[^>]*/>"), "\t"),
    ]
});

static OPEN_DOCUMENT_RULES: Lazy<StructuralRules> = Lazy::new(|| {
    vec![
        (compile(r"</text:p>"), "\n"),
        (compile(r"</text:h>"), "\n"),
        (compile(r"<text:line-break\b[^>]*/>"), "\n"),
        (compile(r"<text:tab\b[^>]*/>"), "\t"),
        (compile(r"<text:s\b[^>]*/>"), " "),
    ]
});

/// Which XML vocabulary a document body uses.
#[derive(Debug, Clone, Copy)]
pub enum XmlDialect {
    WordprocessingMl,
    OpenDocument,
}

impl XmlDialect {
    fn structural_rules(&self) -> &'static StructuralRules {
        match self {
            XmlDialect::WordprocessingMl => &WORDPROCESSING_RULES,
            XmlDialect::OpenDocument => &OPEN_DOCUMENT_RULES,
        }
    }
}

/// Flattens a document XML body to text: paragraph ends and breaks become
/// newlines, all other tags are removed, entities are decoded.
pub fn xml_to_text(xml: &str, dialect: XmlDialect) -> String {
    let mut text = xml.to_string();
    for (re, replacement) in dialect.structural_rules() {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    let stripped = TAG_RE.replace_all(&text, "");
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                _ => {
                    let code = if let Some(hex) = entity.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity[1..].parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_default()
                }
            }
        })
        .into_owned()
}

/// Destination groups whose content is never body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "footer",
    "headerl",
    "headerr",
    "footerl",
    "footerr",
    "object",
    "themedata",
    "datastore",
    "latentstyles",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "xmlnstbl",
    "generator",
];

/// Extracts body text from RTF.
///
/// Control words are dropped except `\par`, `\line` (newline) and `\tab`;
/// `\'hh` escapes decode as Windows-1252/Latin-1; `\uN` decodes as Unicode and
/// skips its one-character fallback; `{\* ...}` and known non-text
/// destinations are skipped entirely.
pub fn rtf_to_text(rtf: &str) -> String {
    let chars: Vec<char> = rtf.chars().collect();
    let mut out = String::new();
    let mut depth = 0usize;
    // Depth at which skipping began; content at depth >= this is ignored.
    let mut skip_from: Option<usize> = None;
    let mut skip_fallback = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                depth += 1;
                i += 1;
                if skip_from.is_none() {
                    if chars.get(i) == Some(&'\\') && chars.get(i + 1) == Some(&'*') {
                        skip_from = Some(depth);
                    } else if chars.get(i) == Some(&'\\') {
                        let word: String = chars[i + 1..]
                            .iter()
                            .take_while(|c| c.is_ascii_alphabetic())
                            .collect();
                        if SKIPPED_DESTINATIONS.contains(&word.as_str()) {
                            skip_from = Some(depth);
                        }
                    }
                }
            }
            '}' => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next == '\'' {
                    let hex: String = chars.iter().skip(i + 1).take(2).collect();
                    i += 1 + hex.len();
                    if skip_from.is_none() {
                        if skip_fallback > 0 {
                            skip_fallback -= 1;
                        } else if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                            out.push(char::from(byte));
                        }
                    }
                } else if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let num_start = i;
                    if i < chars.len() && chars[i] == '-' {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param: String = chars[num_start..i].iter().collect();
                    // A single space delimits the control word.
                    if i < chars.len() && chars[i] == ' ' {
                        i += 1;
                    }
                    if skip_from.is_some() {
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" | "sect" | "page" => out.push('\n'),
                        "tab" => out.push('\t'),
                        "u" => {
                            if let Ok(code) = param.parse::<i32>() {
                                let code = if code < 0 { code + 65536 } else { code };
                                if let Some(ch) = char::from_u32(code as u32) {
                                    out.push(ch);
                                }
                                skip_fallback = 1;
                            }
                        }
                        _ => {}
                    }
                } else {
                    // Escaped symbol: \\ \{ \} or control symbols like \~ \-
                    i += 1;
                    if skip_from.is_none() {
                        match next {
                            '\\' | '{' | '}' => out.push(next),
                            '~' => out.push(' '),
                            '\n' | '\r' => out.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                i += 1;
                if skip_from.is_none() {
                    if skip_fallback > 0 {
                        skip_fallback -= 1;
                    } else {
                        out.push(c);
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_paragraphs_and_entities() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p><w:p><w:r><w:t>R&amp;D</w:t><w:tab/><w:t>Engineer</w:t><w:br/><w:t>caf&#233;</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(
            xml_to_text(xml, XmlDialect::WordprocessingMl),
            "Jane Doe\nR&D\tEngineer\ncafé\n"
        );
    }

    #[test]
    fn test_odt_headings_and_spaces() {
        let xml = r#"<office:text><text:h text:outline-level="1">Experience</text:h><text:p>Acme<text:s/>Corp<text:line-break/>2019 &#x2013; 2023</text:p></office:text>"#;
        assert_eq!(
            xml_to_text(xml, XmlDialect::OpenDocument),
            "Experience\nAcme Corp\n2019 \u{2013} 2023\n"
        );
    }

    #[test]
    fn test_rtf_body_text() {
        let rtf = r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}{\colortbl;\red0\green0\blue0;}\f0 Jane Doe\par Caf\'e9 \{owner\}\tab Rust\par}";
        assert_eq!(rtf_to_text(rtf), "Jane Doe\nCafé {owner}\tRust\n");
    }

    #[test]
    fn test_rtf_skips_ignorable_destinations_and_unicode_fallback() {
        let rtf = r"{\rtf1{\*\generator Riched20;}Hello \u8364?50\par}";
        assert_eq!(rtf_to_text(rtf), "Hello €50\n");
    }
}
