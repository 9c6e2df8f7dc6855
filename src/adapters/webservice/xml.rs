//! Bounded XML decoding.
//!
//! The decoder is iterative (explicit element stack) and enforces three hard
//! limits: total input size, element nesting depth and element count. SOAP
//! multi-references (`href="#id"`) are inlined afterwards under the same depth
//! and count limits, with cycle detection.

use crate::domain::payload::XmlNode;
use crate::utils::error::TransportError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

/// Deepest nesting any configuration may ask for. Reference expansion and
/// tree teardown recurse once per level, so this keeps them on the stack.
pub const MAX_DEPTH_CEILING: usize = 256;
pub const MAX_NODES_CEILING: usize = 1_000_000;
pub const MAX_BYTES_CEILING: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_depth: usize,
    pub max_bytes: usize,
    pub max_nodes: usize,
}

impl DecodeLimits {
    fn depth(&self) -> usize {
        self.max_depth.min(MAX_DEPTH_CEILING)
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_bytes: 4 * 1024 * 1024,
            max_nodes: 100_000,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{0}")]
    TooComplex(String),

    #[error("{0}")]
    Malformed(String),
}

impl From<DecodeError> for TransportError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::TooComplex(reason) => TransportError::ResponseTooComplex { reason },
            DecodeError::Malformed(reason) => TransportError::MalformedResponse { reason },
        }
    }
}

pub fn decode(input: &[u8], limits: &DecodeLimits) -> Result<XmlNode, DecodeError> {
    if input.len() > limits.max_bytes {
        return Err(DecodeError::TooComplex(format!(
            "response is {} bytes, limit is {}",
            input.len(),
            limits.max_bytes
        )));
    }

    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut nodes = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            DecodeError::Malformed(format!(
                "invalid XML at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(start) => {
                let node = open_element(&start, stack.len() + 1, &mut nodes, limits)?;
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = open_element(&start, stack.len() + 1, &mut nodes, limits)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| DecodeError::Malformed("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| DecodeError::Malformed(format!("invalid text: {}", e)))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&value),
                    None if value.trim().is_empty() => {}
                    None => {
                        return Err(DecodeError::Malformed(
                            "text outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|_| DecodeError::Malformed("CDATA is not UTF-8".to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Event::DocType(_) => {
                return Err(DecodeError::TooComplex(
                    "document type declarations are not accepted".to_string(),
                ))
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(DecodeError::Malformed(format!(
            "document ends inside <{}>",
            open.name
        )));
    }
    root.ok_or_else(|| DecodeError::Malformed("empty document".to_string()))
}

fn open_element(
    start: &BytesStart<'_>,
    depth: usize,
    nodes: &mut usize,
    limits: &DecodeLimits,
) -> Result<XmlNode, DecodeError> {
    if depth > limits.depth() {
        return Err(DecodeError::TooComplex(format!(
            "nesting deeper than {} elements",
            limits.depth()
        )));
    }
    *nodes += 1;
    if *nodes > limits.max_nodes {
        return Err(DecodeError::TooComplex(format!(
            "more than {} elements",
            limits.max_nodes
        )));
    }

    let name = std::str::from_utf8(start.local_name().as_ref())
        .map_err(|_| DecodeError::Malformed("element name is not UTF-8".to_string()))?
        .to_string();
    let mut node = XmlNode::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| DecodeError::Malformed(format!("invalid attribute: {}", e)))?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = std::str::from_utf8(attr.key.local_name().as_ref())
            .map_err(|_| DecodeError::Malformed("attribute name is not UTF-8".to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| DecodeError::Malformed(format!("invalid attribute value: {}", e)))?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> Result<(), DecodeError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(DecodeError::Malformed("multiple root elements".to_string()));
    }
    *root = Some(node);
    Ok(())
}

/// Inlines `href="#id"` references. Trees without references are returned as is.
pub fn resolve_references(root: XmlNode, limits: &DecodeLimits) -> Result<XmlNode, DecodeError> {
    if !has_reference(&root) {
        return Ok(root);
    }

    let targets = collect_targets(&root)?;

    let mut visiting = Vec::new();
    let mut budget = limits.max_nodes;
    expand(&root, &root, &targets, &mut visiting, 1, &mut budget, limits)
}

fn has_reference(root: &XmlNode) -> bool {
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if node.attribute("href").is_some() {
            return true;
        }
        pending.extend(node.children.iter());
    }
    false
}

fn collect_targets(root: &XmlNode) -> Result<HashMap<&str, &XmlNode>, DecodeError> {
    let mut targets = HashMap::new();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let Some(id) = node.attribute("id") {
            if targets.insert(id, node).is_some() {
                return Err(DecodeError::Malformed(format!("duplicate id '{}'", id)));
            }
        }
        pending.extend(node.children.iter());
    }
    Ok(targets)
}

fn expand<'a>(
    node: &'a XmlNode,
    content: &'a XmlNode,
    targets: &HashMap<&'a str, &'a XmlNode>,
    visiting: &mut Vec<&'a str>,
    depth: usize,
    budget: &mut usize,
    limits: &DecodeLimits,
) -> Result<XmlNode, DecodeError> {
    if depth > limits.depth() {
        return Err(DecodeError::TooComplex(format!(
            "references nest deeper than {} elements",
            limits.depth()
        )));
    }
    if *budget == 0 {
        return Err(DecodeError::TooComplex(format!(
            "reference expansion exceeds {} elements",
            limits.max_nodes
        )));
    }
    *budget -= 1;

    if let Some(href) = content.attribute("href") {
        let id = href.strip_prefix('#').ok_or_else(|| {
            DecodeError::Malformed(format!("unsupported external reference '{}'", href))
        })?;
        if visiting.contains(&id) {
            return Err(DecodeError::TooComplex(format!(
                "cyclic reference to '#{}'",
                id
            )));
        }
        let target = targets
            .get(id)
            .copied()
            .ok_or_else(|| DecodeError::Malformed(format!("dangling reference '#{}'", id)))?;

        visiting.push(id);
        // The referring element keeps its own name and takes the target's content.
        let resolved = expand(node, target, targets, visiting, depth, budget, limits);
        visiting.pop();
        return resolved;
    }

    let mut out = XmlNode::new(node.name.clone());
    out.attributes = content
        .attributes
        .iter()
        .filter(|(key, _)| key != "id" && key != "href")
        .cloned()
        .collect();
    out.text = content.text.clone();
    for child in &content.children {
        out.children.push(expand(
            child,
            child,
            targets,
            visiting,
            depth + 1,
            budget,
            limits,
        )?);
    }
    Ok(out)
}
