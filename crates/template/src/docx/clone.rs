//! Repeating table rows and paragraph blocks

use super::{process_node, Scope};
use crate::node::{is_container_prefix, iterations, membership, sorted_nodes, Membership, NodeKind};
use crate::scanner::{rewrite, scan, token, Placeholder};
use crate::{Result, TemplateError};
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::OnceLock;
use tracing::debug;

const ROW_END: &str = "</w:tr>";
const PARAGRAPH_END: &str = "</w:p>";
const TABLE_END: &str = "</w:tbl>";

fn vmerge_continue_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<w:vMerge/>|<w:vMerge w:val="continue"\s*/>"#).expect("valid regex")
    })
}

/// Expand every table row marked for container `name`
pub(super) fn expand_rows(
    mut xml: String,
    name: &str,
    value: &Value,
    scope: &mut Scope<'_>,
) -> Result<String> {
    let items = iterations(value);
    let mut from = 0;
    let mut expanded = 0;

    while let Some(marker) = find_marker(&xml, from, |p| membership(p, NodeKind::Row, name).marks_container()) {
        let region = row_region(&xml, marker.start)?;
        let copies = clone_region(&xml[region.clone()], NodeKind::Row, name, &items, scope)?;
        from = region.start + copies.len();
        xml.replace_range(region, &copies);
        expanded += 1;
    }

    if expanded == 0 {
        debug!(part = scope.part, container = name, "no row marked for container");
    } else {
        debug!(part = scope.part, container = name, rows = expanded, iterations = items.len(), "expanded rows");
    }
    Ok(xml)
}

/// Expand every `${name}` … `${/name}` paragraph block
pub(super) fn expand_blocks(
    mut xml: String,
    name: &str,
    value: &Value,
    scope: &mut Scope<'_>,
) -> Result<String> {
    let items = iterations(value);
    let end_name = format!("/{name}");
    let mut from = 0;
    let mut expanded = 0;

    while let Some(start) = find_marker(&xml, from, |p| {
        membership(p, NodeKind::Block, name) == Membership::Anchor
    }) {
        let (region, body) = block_region(&xml, start, &end_name)?;
        let copies = clone_region(&xml[body], NodeKind::Block, name, &items, scope)?;
        from = region.start + copies.len();
        xml.replace_range(region, &copies);
        expanded += 1;
    }

    if expanded == 0 {
        debug!(part = scope.part, container = name, "no block marked for container");
    }
    Ok(xml)
}

/// First placeholder at or after `from` accepted by `accept`
fn find_marker<F>(xml: &str, from: usize, accept: F) -> Option<Range<usize>>
where
    F: Fn(&Placeholder<'_>) -> bool,
{
    scan(&xml[from..])
        .find(|p| accept(p))
        .map(|p| p.span.start + from..p.span.end + from)
}

/// Start of the last `<tag>` or `<tag ...>` element opening before `pos`
fn element_start_before(xml: &str, pos: usize, tag: &str) -> Option<usize> {
    let bare = format!("<{tag}>");
    let with_attrs = format!("<{tag} ");
    let head = &xml[..pos];
    match (head.rfind(&bare), head.rfind(&with_attrs)) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// End (exclusive) of the first `closing` tag at or after `pos`
fn element_end_after(xml: &str, pos: usize, closing: &str) -> Option<usize> {
    xml[pos..].find(closing).map(|i| pos + i + closing.len())
}

/// Byte range of the table row holding `pos`
///
/// A row that opens a vertical merge extends through the continuation rows
/// below it.
fn row_region(xml: &str, pos: usize) -> Result<Range<usize>> {
    let start = element_start_before(xml, pos, "w:tr").ok_or_else(|| {
        TemplateError::Malformed("row placeholder is not inside a table row".to_string())
    })?;
    let mut end = element_end_after(xml, pos, ROW_END).ok_or_else(|| {
        TemplateError::Malformed("table row holding a row placeholder is not closed".to_string())
    })?;

    // both ends must belong to the row around `pos`
    let before = &xml[start..pos];
    let after = &xml[pos..end];
    if before.contains(ROW_END)
        || before.contains(TABLE_END)
        || after.contains("<w:tr>")
        || after.contains("<w:tr ")
        || after.contains(TABLE_END)
    {
        return Err(TemplateError::Malformed(
            "row placeholder is not inside a table row".to_string(),
        ));
    }

    if xml[start..end].contains(r#"<w:vMerge w:val="restart"/>"#) {
        while let Some(next_end) = element_end_after(xml, end, ROW_END) {
            let next = &xml[end..next_end];
            if next.contains(TABLE_END) || !vmerge_continue_re().is_match(next) {
                break;
            }
            end = next_end;
        }
    }

    Ok(start..end)
}

/// Byte ranges of a whole block (markers included) and of its body
fn block_region(xml: &str, marker: Range<usize>, end_name: &str) -> Result<(Range<usize>, Range<usize>)> {
    let malformed = |what: &str| TemplateError::Malformed(format!("block {what}"));

    let start = element_start_before(xml, marker.start, "w:p")
        .ok_or_else(|| malformed("start marker is not inside a paragraph"))?;
    let body_start = element_end_after(xml, marker.end, PARAGRAPH_END)
        .ok_or_else(|| malformed("start paragraph is not closed"))?;

    let end_marker = find_marker(xml, body_start, |p| is_block_end(p, end_name))
        .ok_or_else(|| malformed(&format!("has no closing ${{{end_name}}} marker")))?;
    let body_end = element_start_before(xml, end_marker.start, "w:p")
        .filter(|&pos| pos >= body_start)
        .ok_or_else(|| malformed("end marker is not inside its own paragraph"))?;
    let end = element_end_after(xml, end_marker.end, PARAGRAPH_END)
        .ok_or_else(|| malformed("end paragraph is not closed"))?;

    Ok((start..end, body_start..body_end))
}

fn is_block_end(placeholder: &Placeholder<'_>, end_name: &str) -> bool {
    placeholder.name == end_name || (placeholder.name == "b" && placeholder.args == end_name)
}

/// One processed copy of `template` per iteration, concatenated
fn clone_region(
    template: &str,
    kind: NodeKind,
    container: &str,
    items: &[Map<String, Value>],
    scope: &mut Scope<'_>,
) -> Result<String> {
    let mut out = String::new();
    for (i, vars) in items.iter().enumerate() {
        let index = i + 1;
        let mut copy = index_placeholders(template, kind, container, index);
        for (key, value) in sorted_nodes(vars) {
            copy = process_node(copy, &key.indexed(index), value, scope)?;
        }
        out.push_str(&restore_placeholders(&copy, index));
    }
    Ok(out)
}

/// Give every placeholder in one copy the `#index` suffix
///
/// Container markers are dropped and container fields become plain
/// iteration names: inside container `rows`, `${rows->qty:x}` turns into
/// `${qty#2:x}` in the second copy. Qualified names of other containers
/// carry the suffix on the container part (`${sub->f}` → `${sub#2->f}`).
fn index_placeholders(template: &str, kind: NodeKind, container: &str, index: usize) -> String {
    rewrite(template, |p| {
        Some(match membership(p, kind, container) {
            Membership::Anchor => String::new(),
            Membership::Field { field, args } => token(&format!("{field}#{index}"), args),
            Membership::Unrelated => map_head(p, |head| suffix_head(head, index)),
        })
    })
    .into_owned()
}

/// Drop the `#index` suffix from placeholders the iteration left in place
fn restore_placeholders(copy: &str, index: usize) -> String {
    let suffix = format!("#{index}");
    rewrite(copy, |p| {
        let restored = map_head(p, |head| match head.split_once("->") {
            Some((container, field)) => match container.strip_suffix(&suffix) {
                Some(bare) => format!("{bare}->{field}"),
                None => head.to_string(),
            },
            None => head.strip_suffix(&suffix).unwrap_or(head).to_string(),
        });
        (restored != p.raw).then_some(restored)
    })
    .into_owned()
}

fn suffix_head(head: &str, index: usize) -> String {
    match head.split_once("->") {
        Some((container, field)) => format!("{container}#{index}->{field}"),
        None => format!("{head}#{index}"),
    }
}

/// Rebuild a placeholder with its name part rewritten
///
/// For `${t:rows->f:args}` the name part is `rows->f`, not the `t` prefix.
fn map_head<F>(p: &Placeholder<'_>, f: F) -> String
where
    F: Fn(&str) -> String,
{
    if is_container_prefix(p.name) && !p.args.is_empty() {
        let (head, rest) = match p.args.split_once(':') {
            Some((head, rest)) => (head, Some(rest)),
            None => (p.args, None),
        };
        let args = match rest {
            Some(rest) => format!("{}:{}", f(head), rest),
            None => f(head),
        };
        token(p.name, &args)
    } else {
        token(&f(p.name), p.args)
    }
}
