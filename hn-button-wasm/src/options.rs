//! Per-button options read from placeholder attributes.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::page::{FrameSpec, Page, Placeholder};
use crate::settings::Settings;

/// Characters escaped by JS `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Attribute holding the remote host. Never forwarded to the frame.
pub const HOST_ATTRIBUTE: &str = "data-host";

/// `data-count` value selecting the tall layout.
pub const VERTICAL_COUNT: &str = "vertical";

/// Display options for one button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonOptions {
    pub title: Option<String>,
    pub url: Option<String>,
    pub style: Option<String>,
    pub count: Option<String>,
}

impl ButtonOptions {
    /// Read options from `element`, falling back to the page title and URL.
    pub fn from_placeholder(element: &dyn Placeholder, page: &dyn Page) -> Self {
        Self {
            title: attribute(element, "data-title").or_else(|| non_empty(page.title())),
            url: attribute(element, "data-url").or_else(|| non_empty(page.location())),
            style: attribute(element, "data-style"),
            count: attribute(element, "data-count"),
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.count.as_deref() == Some(VERTICAL_COUNT)
    }

    /// Options as `(key, value)` pairs in query order, skipping empty ones.
    fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("title", &self.title),
            ("url", &self.url),
            ("style", &self.style),
            ("count", &self.count),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
    }

    /// Query string for the frame URL, e.g. `?title=T&url=U&count=vertical`.
    ///
    /// Empty when no option has a value.
    pub fn query_string(&self) -> String {
        let mut query = String::new();
        for (key, value) in self.pairs() {
            query.push(if query.is_empty() { '?' } else { '&' });
            query.push_str(key);
            query.push('=');
            query.extend(utf8_percent_encode(value, URI_COMPONENT));
        }
        query
    }

    /// Describe the frame replacing a placeholder.
    pub fn frame_spec(&self, id: &str, origin: &str, settings: &Settings) -> FrameSpec {
        let mut data_attributes = vec![
            (
                "data-title".to_string(),
                self.title.clone().unwrap_or_default(),
            ),
            ("data-url".to_string(), self.url.clone().unwrap_or_default()),
        ];
        if let Some(style) = &self.style {
            data_attributes.push(("data-style".to_string(), style.clone()));
        }
        if let Some(count) = &self.count {
            data_attributes.push(("data-count".to_string(), count.clone()));
        }

        FrameSpec {
            id: id.to_string(),
            class_name: settings.marker_class.clone(),
            src: format!("{origin}{}", self.query_string()),
            title: settings.frame_title.clone(),
            width: settings.initial_width,
            height: settings.frame_height(self.is_vertical()),
            frame_border: 0,
            data_attributes,
        }
    }
}

fn attribute(element: &dyn Placeholder, name: &str) -> Option<String> {
    element.attribute(name).and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
