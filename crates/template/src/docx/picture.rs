//! Image placeholders in word-processing parts

use super::{Assets, Scope};
use crate::image::{ImageArgs, ImageSource, ImageSpec};
use crate::scalar::substitute;
use crate::scanner::scan;
use crate::Result;
use opc_core::{content_type, rel_types, rels_path_for, ImageInfo, Relationships};
use regex::Regex;
use serde_json::Value;
use std::collections::btree_map::Entry;
use tracing::{debug, trace, warn};

impl Assets {
    /// Relationship registry of a part, loaded or created on first use
    fn relationships(&mut self, part: &str) -> Result<&mut Relationships> {
        let rels = match self.relations.entry(part.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = rels_path_for(part);
                let rels = match self.package.read_xml_opt(&path)? {
                    Some(xml) => Relationships::parse(&xml),
                    None => {
                        self.content_types
                            .add_override(&path, content_type::RELATIONSHIPS);
                        Relationships::default()
                    }
                };
                entry.insert(rels)
            }
        };
        Ok(rels)
    }

    /// Store an image (once per source) and relate it to `part`
    ///
    /// Returns the new relationship id.
    fn link_image(&mut self, part: &str, stem: &str, info: &ImageInfo) -> Result<String> {
        let rid = self.relationships(part)?.next_id();
        let media_part = self.media.store(
            &mut self.package,
            &mut self.content_types,
            info,
            |info| format!("word/media/image_{}_{}.{}", rid, stem, info.format.extension()),
        )?;
        let target = relative_target(part, &media_part);
        Ok(self.relationships(part)?.add(rel_types::IMAGE, &target))
    }
}

/// Target of `media_part` as seen from `part`
fn relative_target(part: &str, media_part: &str) -> String {
    let dir = part.rfind('/').map(|pos| &part[..=pos]).unwrap_or("");
    match media_part.strip_prefix(dir) {
        Some(relative) if !dir.is_empty() => relative.to_string(),
        _ => format!("/{media_part}"),
    }
}

/// VML picture reference
fn picture_xml(rid: &str, spec: &ImageSpec) -> String {
    format!(
        concat!(
            r##"<w:pict><v:shape type="#_x0000_t75" style="width:{};height:{}">"##,
            r#"<v:imagedata r:id="{}" o:title=""/></v:shape></w:pict>"#
        ),
        spec.width, spec.height, rid
    )
}

/// Pattern capturing the tags around one placeholder token
fn enclosing_re(token: &str) -> Option<Regex> {
    let pattern = format!(
        r"(<[^<>]+>)([^<]*?){}([^<]*?)(<[^<>]+>)",
        regex::escape(token)
    );
    Regex::new(&pattern).ok()
}

/// Replace every `${name...}` placeholder with a picture
///
/// Each occurrence splits its enclosing element in two and gets its own
/// relationship. An empty value removes the placeholders instead.
pub(super) fn embed(
    mut xml: String,
    name: &str,
    value: &Value,
    scope: &mut Scope<'_>,
) -> Result<String> {
    let limit = scope.options.replacement_limit();

    let Some(source) = ImageSource::from_value(value)? else {
        let (out, count) = substitute(&xml, name, "", limit);
        debug!(part = scope.part, name, count, "removed image placeholders without a value");
        return Ok(out);
    };

    let mut tokens: Vec<(String, Vec<String>)> = Vec::new();
    for placeholder in scan(&xml) {
        if placeholder.name.eq_ignore_ascii_case(name)
            && !tokens.iter().any(|(raw, _)| raw == placeholder.raw)
        {
            let args = placeholder.arg_list().into_iter().map(str::to_string).collect();
            tokens.push((placeholder.raw.to_string(), args));
        }
    }
    if tokens.is_empty() {
        debug!(part = scope.part, name, "no image placeholder");
        return Ok(xml);
    }

    let mut replaced = 0;
    for (token, args) in tokens {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let spec = ImageSpec::resolve(&source, &ImageArgs::parse(&args), scope.options)?;
        let Some(re) = enclosing_re(&token) else {
            continue;
        };

        while limit == 0 || replaced < limit {
            let Some(caps) = re.captures(&xml) else {
                break;
            };
            let (Some(whole), Some(open), Some(prefix), Some(postfix), Some(close)) =
                (caps.get(0), caps.get(1), caps.get(2), caps.get(3), caps.get(4))
            else {
                break;
            };

            let rid = scope.assets.link_image(scope.part, scope.stem, &spec.info)?;
            let replacement = format!(
                "{open}{prefix}{close}{picture}{open}{postfix}{close}",
                open = open.as_str(),
                prefix = prefix.as_str(),
                close = close.as_str(),
                postfix = postfix.as_str(),
                picture = picture_xml(&rid, &spec),
            );
            let range = whole.range();
            xml.replace_range(range, &replacement);
            replaced += 1;
            trace!(part = scope.part, token = %token, rid = %rid, "embedded image");
        }

        if xml.contains(&token) && (limit == 0 || replaced < limit) {
            warn!(part = scope.part, token = %token, "image placeholder is not inside an element, left in place");
        }
    }

    Ok(xml)
}
