//! Codec-neutral request and response shapes exchanged with the webservice.
//!
//! Requests are a method name plus a tree of named parameters; responses are
//! the decoded element tree of the method's response element. Codecs translate
//! both to and from their own envelope layout.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Group(Vec<Param>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Text(value.into()),
        }
    }

    pub fn group(name: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Group(params),
        }
    }

    /// Optional fields are simply left out of the request.
    pub fn optional(name: impl Into<String>, value: Option<&str>) -> Option<Self> {
        value.map(|value| Self::text(name, value))
    }

    pub fn find(&self, name: &str) -> Option<&Param> {
        match &self.value {
            ParamValue::Group(params) => params.iter().find(|param| param.name == name),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ParamValue::Text(text) => Some(text),
            ParamValue::Group(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    pub method: String,
    pub params: Vec<Param>,
}

impl RequestPayload {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }
}

/// Element tree with namespace prefixes stripped from names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Follows a chain of child names, first match at each level.
    pub fn path(&self, names: &[&str]) -> Option<&XmlNode> {
        names
            .iter()
            .try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed text of a child, `None` when absent or empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|child| child.text.trim())
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    pub method: String,
    pub body: XmlNode,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlNode {
        let mut label = XmlNode::new("label");
        label.text = "  JVBERi0=  ".to_string();
        let mut parcel = XmlNode::new("parcelNumber");
        parcel.text = "6A12345678901".to_string();
        let mut ret = XmlNode::new("return");
        ret.children = vec![parcel, label, XmlNode::new("empty")];
        let mut root = XmlNode::new("generateLabelResponse");
        root.children = vec![ret];
        root
    }

    #[test]
    fn test_path_and_child_text() {
        let root = sample();
        let ret = root.path(&["return"]).unwrap();
        assert_eq!(ret.child_text("parcelNumber"), Some("6A12345678901"));
        assert_eq!(ret.child_text("label"), Some("JVBERi0="));
        assert_eq!(ret.child_text("empty"), None);
        assert!(root.path(&["return", "missing"]).is_none());
    }

    #[test]
    fn test_param_lookup() {
        let payload = RequestPayload::new("generateLabel").with_params(vec![Param::group(
            "letter",
            vec![Param::text("service", "DOM")],
        )]);
        let letter = payload.param("letter").unwrap();
        assert_eq!(letter.find("service").and_then(Param::as_text), Some("DOM"));
        assert!(Param::optional("phone", None).is_none());
    }
}
