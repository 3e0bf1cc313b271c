//! Page identity, read once at startup from values the server renders
//! into the document.

use web_sys::Document;

use crate::web_unchecked::DocumentUnchecked;

/// The opaque session identifier and the endpoint prefix every request
/// carries. An empty base URL means same-origin relative paths.
#[derive(Clone)]
pub(crate) struct Session {
    pub(crate) ssid: String,
    pub(crate) base_url: String,
}

impl Session {
    pub(crate) fn from_document(document: &Document) -> Self {
        let ssid = document.input_by_id_unchecked("SSID").value();
        let base_url = document
            .body_unchecked()
            .get_attribute("data-base-url")
            .unwrap_or_default();
        Self { ssid, base_url }
    }
}

/// Which of the three editor pages the document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageKind {
    Check,
    Constraints,
    Macros,
}

impl PageKind {
    pub(crate) fn from_attribute(value: &str) -> Option<Self> {
        Some(match value {
            "check" => PageKind::Check,
            "constraints" => PageKind::Constraints,
            "macros" => PageKind::Macros,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::PageKind;

    #[test]
    fn page_kinds_from_body_attribute() {
        assert_eq!(PageKind::from_attribute("check"), Some(PageKind::Check));
        assert_eq!(
            PageKind::from_attribute("constraints"),
            Some(PageKind::Constraints)
        );
        assert_eq!(PageKind::from_attribute("macros"), Some(PageKind::Macros));
        assert_eq!(PageKind::from_attribute("about"), None);
    }
}
