/// Tags whose boundaries separate words when rendered.
const BLOCK_TAGS: [&str; 5] = ["div", "br", "p", "li", "wbr"];

/// Reduce a marked-up instruction such as `Turn <b>left</b><div>Destination</div>` to plain
/// text: tags are dropped, block-level tags become a single space, a handful of common
/// entities are decoded and whitespace is collapsed.
pub fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) => {
                if is_block_tag(&after[..close]) {
                    text.push(' ');
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unterminated tag, keep it verbatim.
                text.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    decode_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_block_tag(tag: &str) -> bool {
    let name: String = tag
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    BLOCK_TAGS.contains(&name.as_str())
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_inline_tags() {
        assert_eq!(
            strip_markup("Turn <b>left</b> onto <b>Av. Juárez</b>"),
            "Turn left onto Av. Juárez"
        );
    }

    #[test]
    fn test_block_tags_separate_words() {
        let html = r#"Head <b>north</b><div style="font-size:0.9em">On the right</div>"#;
        assert_eq!(strip_markup(html), "Head north On the right");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(strip_markup("Keep&nbsp;right at &amp; exit"), "Keep right at & exit");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_markup("Continue straight"), "Continue straight");
        assert_eq!(strip_markup(""), "");
    }

    #[test]
    fn test_unterminated_tag_kept() {
        assert_eq!(strip_markup("Walk 5 < 10 m"), "Walk 5 < 10 m");
    }
}
