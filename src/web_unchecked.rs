use wasm_bindgen::JsCast;
use web_sys::{
    window, Document, Element, HtmlElement, HtmlFormElement, HtmlInputElement,
    HtmlTextAreaElement, Node, Window,
};

pub(crate) trait NodeUnchecked {
    fn append_child_unchecked(&self, child: &Node) -> Node;
}

impl NodeUnchecked for Node {
    fn append_child_unchecked(&self, child: &Node) -> Node {
        self.append_child(child).expect("append child must work")
    }
}

pub(crate) trait ElementUnchecked {
    fn set_attribute_unchecked(&self, name: &str, value: &str);

    fn query_selector_unchecked(&self, selector: &str) -> Option<Element>;
}

impl ElementUnchecked for Element {
    fn set_attribute_unchecked(&self, name: &str, value: &str) {
        self.set_attribute(name, value)
            .expect("set attribute must succeed");
    }

    fn query_selector_unchecked(&self, selector: &str) -> Option<Element> {
        self.query_selector(selector)
            .expect("selector must be valid")
    }
}

pub(crate) trait DocumentUnchecked {
    fn create_element_unchecked(&self, element: &str) -> Element;

    fn html_element_by_id_unchecked(&self, id: &str) -> HtmlElement;

    fn body_unchecked(&self) -> HtmlElement;

    fn elements_by_selector_unchecked(&self, selector: &str) -> Vec<Element>;

    fn input_by_id_unchecked(&self, id: &str) -> HtmlInputElement {
        self.html_element_by_id_unchecked(id).unchecked_into()
    }

    fn textarea_by_id_unchecked(&self, id: &str) -> HtmlTextAreaElement {
        self.html_element_by_id_unchecked(id).unchecked_into()
    }

    fn form_by_id_unchecked(&self, id: &str) -> HtmlFormElement {
        self.html_element_by_id_unchecked(id).unchecked_into()
    }
}

impl DocumentUnchecked for Document {
    fn create_element_unchecked(&self, element: &str) -> Element {
        self.create_element(element)
            .expect("create element must work")
    }

    fn html_element_by_id_unchecked(&self, id: &str) -> HtmlElement {
        self.get_element_by_id(id)
            .unwrap_or_else(|| panic!("element with id '{id}' must exist"))
            .unchecked_into()
    }

    fn body_unchecked(&self) -> HtmlElement {
        self.body().expect("body must exist")
    }

    fn elements_by_selector_unchecked(&self, selector: &str) -> Vec<Element> {
        let list = self
            .query_selector_all(selector)
            .expect("selector must be valid");
        (0..list.length())
            .filter_map(|index| list.get(index))
            .map(|node| node.unchecked_into())
            .collect()
    }
}

pub(crate) trait WindowUnchecked {
    fn document_unchecked(&self) -> Document;
}

impl WindowUnchecked for Window {
    fn document_unchecked(&self) -> Document {
        self.document().expect("document must exist")
    }
}

pub(crate) fn document_unchecked() -> Document {
    window_unchecked().document_unchecked()
}

pub(crate) fn window_unchecked() -> Window {
    window().expect("there should be a window")
}
