/// Sanitize a filename for Linux: strip path separators, NUL and control characters,
/// trim leading/trailing dots and whitespace, and cap at 255 bytes while keeping
/// the extension intact.
pub fn sanitize_filename_for_linux(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_space = false;
    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' {
            '-'
        } else if c.is_control() || c.is_whitespace() {
            ' '
        } else {
            c
        };
        if replacement == ' ' {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(replacement);
            prev_space = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.');
    if trimmed.len() <= NAME_MAX {
        return trimmed.to_string();
    }

    let (stem, ext) = match trimmed.rfind('.') {
        Some(i) if trimmed.len() - i <= 8 => (&trimmed[..i], &trimmed[i..]),
        _ => (trimmed, ""),
    };
    let mut take = NAME_MAX.saturating_sub(ext.len());
    while take > 0 && !stem.is_char_boundary(take) {
        take -= 1;
    }
    format!("{}{}", stem[..take].trim_end(), ext)
}
