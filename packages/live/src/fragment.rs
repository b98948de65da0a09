//! Reader for the canonical markup format.
//!
//! Backs [`LiveDom::set_inner_content`] for hosts without a native parser.
//! Mounting builds nodes directly and never goes through it.
//!
//! Children in that format are joined by a single newline, so one newline is
//! dropped at each boundary between a text run and a neighbouring element.
//! Two adjacent text children cannot be told apart once joined and come back
//! as a single text node. Values are not escaped: an attribute value holding
//! its own quote, or text holding `<`, does not read back.

use crate::dom::LiveDom;
use crate::error::{DomError, DomResult};

/// Build host nodes for `raw`, returning the top-level nodes in order.
pub fn read<D: LiveDom>(dom: &mut D, raw: &str) -> DomResult<Vec<D::Node>> {
    let mut reader = Reader { src: raw, pos: 0 };
    reader.children(dom, None)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        let src = self.src;
        &src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn name(&mut self) -> String {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'))
            .unwrap_or(rest.len());
        self.pos += len;
        rest[..len].to_string()
    }

    fn quoted(&mut self) -> DomResult<String> {
        let start = self.pos;
        let quote = match self.rest().chars().next() {
            Some(c @ ('\'' | '"')) => c,
            _ => return Err(DomError::malformed(start, "Expected a quoted value")),
        };
        self.pos += 1;
        let rest = self.rest();
        let len = rest
            .find(quote)
            .ok_or_else(|| DomError::malformed(start, "Unterminated attribute value"))?;
        self.pos += len + 1;
        Ok(rest[..len].to_string())
    }

    fn children<D: LiveDom>(&mut self, dom: &mut D, closing: Option<&str>) -> DomResult<Vec<D::Node>> {
        let mut nodes = Vec::new();
        loop {
            if self.at_end() {
                return match closing {
                    Some(tag) => Err(DomError::malformed(self.pos, format!("Unclosed <{}>", tag))),
                    None => Ok(nodes),
                };
            }

            let rest = self.rest();
            if rest.starts_with("</") {
                let start = self.pos;
                self.pos += 2;
                let name = self.name();
                if !self.eat(">") {
                    return Err(DomError::malformed(self.pos, "Expected '>'"));
                }
                return match closing {
                    Some(tag) if tag == name => Ok(nodes),
                    _ => Err(DomError::malformed(start, format!("Unexpected </{}>", name))),
                };
            }

            if rest.starts_with('<') {
                nodes.push(self.element(dom)?);
                continue;
            }

            let len = rest.find('<').unwrap_or(rest.len());
            let mut text = &rest[..len];
            self.pos += len;

            if !nodes.is_empty() {
                text = text.strip_prefix('\n').unwrap_or(text);
            }
            let next = self.rest();
            if next.starts_with('<') && !next.starts_with("</") {
                text = text.strip_suffix('\n').unwrap_or(text);
            }
            if !text.is_empty() {
                nodes.push(dom.create_text(text));
            }
        }
    }

    fn element<D: LiveDom>(&mut self, dom: &mut D) -> DomResult<D::Node> {
        let start = self.pos;
        self.pos += 1;
        let tag = self.name();
        if tag.is_empty() {
            return Err(DomError::malformed(start, "Expected a tag name"));
        }

        let mut attributes = Vec::new();
        let auto_closed = loop {
            self.skip_whitespace();
            if self.eat("/>") {
                break true;
            }
            if self.eat(">") {
                break false;
            }
            if self.at_end() {
                return Err(DomError::malformed(start, format!("Unterminated <{}>", tag)));
            }
            let name = self.name();
            if name.is_empty() {
                return Err(DomError::malformed(self.pos, "Expected an attribute name"));
            }
            let value = if self.eat("=") { self.quoted()? } else { String::new() };
            attributes.push((name, value));
        };

        let node = dom.create_element(&tag, auto_closed);
        for (name, value) in &attributes {
            dom.set_attribute(&node, name, value)?;
        }
        if !auto_closed {
            for child in self.children(dom, Some(tag.as_str()))? {
                dom.append_child(&node, &child)?;
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaDom;

    fn render(raw: &str) -> DomResult<String> {
        let mut dom = ArenaDom::new();
        let root = dom.create_element("root", false);
        dom.set_inner_content(&root, raw)?;
        Ok(dom.inner_markup(&root))
    }

    #[test]
    fn test_reads_nested_markup() {
        let raw = "<form hash='h1' uid='u1'><select hash='h2' uid='u2' name='role'><option value='a'>a</option>\n<option value='b'>b</option></select></form>";
        assert_eq!(render(raw).unwrap(), raw);
    }

    #[test]
    fn test_reads_styles_and_void_elements() {
        let raw = "<p class='lead' style=\"color:red; margin:0;\">hello\n<br/>\nworld</p>";
        assert_eq!(render(raw).unwrap(), raw);
    }

    #[test]
    fn test_joining_newlines_are_dropped() {
        let mut dom = ArenaDom::new();
        let root = dom.create_element("root", false);
        dom.set_inner_content(&root, "<b>x</b>\ntail").unwrap();

        let children = dom.child_nodes(&root);
        assert_eq!(children.len(), 2);
        assert_eq!(dom.text(&children[1]), Some("tail"));
    }

    #[test]
    fn test_bare_attribute_is_empty() {
        let mut dom = ArenaDom::new();
        let root = dom.create_element("root", false);
        dom.set_inner_content(&root, "<input disabled/>").unwrap();

        let input = dom.child_nodes(&root)[0];
        assert_eq!(dom.get_attribute(&input, "disabled").as_deref(), Some(""));
    }

    #[test]
    fn test_mismatched_close_is_malformed() {
        let err = render("<div><span></div>").unwrap_err();
        assert!(matches!(err, DomError::Malformed { .. }));
    }

    #[test]
    fn test_unclosed_and_stray_tags_are_malformed() {
        assert!(matches!(render("<div>"), Err(DomError::Malformed { .. })));
        assert!(matches!(render("</div>"), Err(DomError::Malformed { .. })));
        assert!(matches!(render("<div class=open>"), Err(DomError::Malformed { .. })));
        assert!(matches!(render("<>"), Err(DomError::Malformed { .. })));
    }
}
