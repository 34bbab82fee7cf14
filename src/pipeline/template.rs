use crate::error::TemplateError;

/// Substitute `{name}` placeholders in a pipeline template
///
/// `{{` and `}}` produce literal braces. Every placeholder must be present in
/// `args`; rendering fails on the first unknown one rather than handing a
/// half-rendered description to the media engine.
pub fn render(template: &str, args: &[(&str, String)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template.char_indices().peekable();

    while let Some((pos, c)) = rest.next() {
        match c {
            '{' => {
                if matches!(rest.peek(), Some((_, '{'))) {
                    rest.next();
                    out.push('{');
                    continue;
                }
                let start = pos + 1;
                let end = loop {
                    match rest.next() {
                        Some((end, '}')) => break end,
                        Some(_) => {}
                        None => return Err(TemplateError::Unterminated(pos)),
                    }
                };
                let name = template[start..end].trim();
                let value = args
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
                out.push_str(value);
            }
            '}' => {
                if matches!(rest.peek(), Some((_, '}'))) {
                    rest.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::UnmatchedBrace(pos));
                }
            }
            c => out.push(c),
        }
    }

    Ok(out)
}
