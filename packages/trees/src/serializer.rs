use crate::config::SerializerOptions;
use crate::markup::{Element, Markup, Node, Style, Text};
use crate::selector::{HASH_ATTR, UID_ATTR};

/// Serializer renders a markup tree to its canonical text form
///
/// ```text
/// <tag hash='H' uid='U' name='value' style="prop:value; prop:value;">CHILDREN</tag>
/// ```
///
/// - `hash` and `uid` come first, and only for tracked elements
/// - user attributes follow in insertion order, then the `style` attribute
/// - children are joined with newlines; text renders its raw payload
/// - auto-closed elements render as `<tag .../>`
///
/// Removed children are skipped unless the instance is toggled to include
/// them. The node passed to `serialize` is always rendered.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    options: SerializerOptions,
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SerializerOptions) -> Self {
        Self { options }
    }

    pub fn set_include_removed(&mut self, include: bool) {
        self.options.include_removed = include;
    }

    pub fn includes_removed(&self) -> bool {
        self.options.include_removed
    }

    pub fn serialize(&self, element: &Element) -> String {
        let mut output = String::new();
        self.write_element(element, &mut output);
        output
    }

    pub fn serialize_markup(&self, markup: &Markup) -> String {
        let mut output = String::new();
        self.write_markup(markup, &mut output);
        output
    }

    /// Render only the children, as they would appear inside the element.
    pub fn serialize_children(&self, element: &Element) -> String {
        let mut output = String::new();
        self.write_children(element, &mut output);
        output
    }

    fn write_markup(&self, markup: &Markup, output: &mut String) {
        match markup {
            Markup::Element(element) => self.write_element(element, output),
            Markup::Text(text) => self.write_text(text, output),
        }
    }

    fn write_text(&self, text: &Text, output: &mut String) {
        output.push_str(text.value());
    }

    fn write_element(&self, element: &Element, output: &mut String) {
        output.push('<');
        output.push_str(element.tag());

        if element.is_tracked() {
            write_attribute(HASH_ATTR, element.hash().as_str(), output);
            write_attribute(UID_ATTR, element.uid().as_str(), output);
        }

        for attr in element.attributes() {
            write_attribute(&attr.name, &attr.value, output);
        }

        if let Some(declarations) = style_declarations(element.styles()) {
            output.push_str(" style=\"");
            output.push_str(&declarations);
            output.push('"');
        }

        if element.auto_closed() {
            output.push_str("/>");
            return;
        }

        output.push('>');
        self.write_children(element, output);
        output.push_str("</");
        output.push_str(element.tag());
        output.push('>');
    }

    fn write_children(&self, element: &Element, output: &mut String) {
        let mut first = true;
        for child in element.children() {
            if child.is_removed() && !self.options.include_removed {
                continue;
            }
            if !first {
                output.push('\n');
            }
            first = false;
            self.write_markup(child, output);
        }
    }
}

fn write_attribute(name: &str, value: &str, output: &mut String) {
    output.push(' ');
    output.push_str(name);
    output.push_str("='");
    output.push_str(value);
    output.push('\'');
}

/// Inline style text, `None` when there are no styles
pub fn style_declarations(styles: &[Style]) -> Option<String> {
    if styles.is_empty() {
        return None;
    }
    let declarations: Vec<String> = styles
        .iter()
        .map(|style| format!("{}:{};", style.name, style.value))
        .collect();
    Some(declarations.join(" "))
}

/// Serialize with default options (removed nodes excluded)
pub fn serialize(element: &Element) -> String {
    Serializer::new().serialize(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::Factory;
    use crate::identity::SequentialTokens;
    use crate::markup::Attribute;

    fn factory() -> Factory {
        Factory::new(SequentialTokens::from_seed("s"))
    }

    #[test]
    fn test_element_format() {
        let f = factory();
        let div = f
            .element("div")
            .with(Attribute::new("class", "box"))
            .with(Style::new("color", "red"))
            .with(Style::new("width", "10px"))
            .with(f.text("hi"))
            .with(f.element("br").auto_closing());

        assert_eq!(
            serialize(&div),
            "<div hash='s-h2' uid='s-u1' class='box' style=\"color:red; width:10px;\">hi\n<br hash='s-h6' uid='s-u5'/></div>"
        );
    }

    #[test]
    fn test_anonymous_elements_skip_identity() {
        let f = factory();
        let p = f.element("p").anonymous().with(Attribute::new("id", "intro"));

        assert_eq!(serialize(&p), "<p id='intro'></p>");
    }

    #[test]
    fn test_removed_children_follow_mode() {
        let f = factory();
        let mut ul = f
            .element("ul")
            .anonymous()
            .with(f.text("a"))
            .with(f.text("b"))
            .with(f.text("c"));
        ul.children_mut()[1].remove();

        let mut serializer = Serializer::new();
        assert_eq!(serializer.serialize(&ul), "<ul>a\nc</ul>");

        serializer.set_include_removed(true);
        assert_eq!(serializer.serialize(&ul), "<ul>a\nb\nc</ul>");
    }

    #[test]
    fn test_serialization_is_repeatable() {
        let f = factory();
        let div = f.element("div").with(f.element("span").with(f.text("x")));

        assert_eq!(serialize(&div), serialize(&div));
    }
}
