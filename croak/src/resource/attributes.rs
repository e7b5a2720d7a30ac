use croak_msg::ContentFormat;
use serde::Serialize;

/// Link-format attributes of a resource (RFC6690 section 3)
///
/// ```
/// use croak::resource::Attributes;
/// use croak::msg::ContentFormat;
///
/// let attrs = Attributes::default().title("Temperature")
///                                  .resource_type("temperature-c")
///                                  .content_type(ContentFormat::Json);
///
/// assert_eq!(attrs.resource_types, vec!["temperature-c".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
  /// `title`
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  /// `rt`
  #[serde(rename = "rt", skip_serializing_if = "Vec::is_empty")]
  pub resource_types: Vec<String>,
  /// `if`
  #[serde(rename = "if", skip_serializing_if = "Vec::is_empty")]
  pub interfaces: Vec<String>,
  /// `sz`
  #[serde(rename = "sz", skip_serializing_if = "Option::is_none")]
  pub max_size_hint: Option<u64>,
  /// `ct`
  #[serde(rename = "ct", skip_serializing_if = "Vec::is_empty")]
  pub content_types: Vec<u16>,
}

impl Attributes {
  /// Set the title
  pub fn title(mut self, title: impl ToString) -> Self {
    self.title = Some(title.to_string());
    self
  }

  /// Add a resource type
  pub fn resource_type(mut self, rt: impl ToString) -> Self {
    self.resource_types.push(rt.to_string());
    self
  }

  /// Add an interface description
  pub fn interface(mut self, iface: impl ToString) -> Self {
    self.interfaces.push(iface.to_string());
    self
  }

  /// Set the maximum size estimate
  pub fn max_size_hint(mut self, sz: u64) -> Self {
    self.max_size_hint = Some(sz);
    self
  }

  /// Add a content format the resource can produce
  pub fn content_type(mut self, ct: ContentFormat) -> Self {
    self.content_types.push(ct.into());
    self
  }
}
