//! DOM wiring for the three editor pages.
//!
//! Each page owns one edit field with a shadow underline for error
//! positions, an up/down-navigable input history, and a listing of rows
//! (results, constraints or macros) whose controls are collected into
//! explicit view-models at load instead of being re-looked-up by
//! constructed id strings.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use wasm_bindgen::prelude::*;
use web_sys::{console, Document, HtmlElement, HtmlInputElement, HtmlTextAreaElement, KeyboardEvent};

use crate::{
    protocol::SyntaxError,
    session::{PageKind, Session},
    web_unchecked::{document_unchecked, DocumentUnchecked, ElementUnchecked},
};

pub(crate) async fn setup() {
    let document = document_unchecked();
    let body = document.body_unchecked();
    body.set_attribute_unchecked("data-webassembly-ready", "");

    let session = Session::from_document(&document);
    let page = body
        .get_attribute("data-witip-page")
        .as_deref()
        .and_then(PageKind::from_attribute);
    match page {
        Some(PageKind::Check) => check_page::setup(document, session),
        Some(PageKind::Constraints) => constraint_page::setup(document, session).await,
        Some(PageKind::Macros) => macro_page::setup(document, session).await,
        None => console::warn_1(&"unknown page kind, nothing to wire".into()),
    }
}

/// The edit field and its companions: a shadow textarea carrying the
/// error-position underline, and the primary/auxiliary message cells.
pub(crate) struct EditorView {
    input: HtmlTextAreaElement,
    shadow: HtmlTextAreaElement,
    message: HtmlElement,
    aux_message: HtmlElement,
    frame: HtmlElement,
    /// Grow-only: the field height never shrinks back.
    last_height: Cell<i32>,
}

impl EditorView {
    pub(crate) fn get_in(document: &Document, prefix: &str) -> Self {
        Self {
            input: document.textarea_by_id_unchecked(&format!("{prefix}_input")),
            shadow: document.textarea_by_id_unchecked(&format!("{prefix}_shadow")),
            message: document.html_element_by_id_unchecked(&format!("{prefix}_errmsg")),
            aux_message: document.html_element_by_id_unchecked(&format!("{prefix}_auxmsg")),
            frame: document.html_element_by_id_unchecked("iddblinput"),
            last_height: Cell::new(0),
        }
    }

    pub(crate) fn input(&self) -> &HtmlTextAreaElement {
        &self.input
    }

    pub(crate) fn value(&self) -> String {
        self.input.value()
    }

    pub(crate) fn set_value(&self, text: &str) {
        self.input.set_value(text);
        self.auto_resize();
        self.set_caret(utf16_length(text));
    }

    pub(crate) fn clear_input(&self) {
        self.input.set_value("");
    }

    pub(crate) fn set_caret(&self, position: u32) {
        self.input.focus().expect("focus must work");
        self.input
            .set_selection_range(position, position)
            .expect("set selection range must work");
    }

    pub(crate) fn focus_with_caret_at_end(&self) {
        self.set_caret(utf16_length(&self.input.value()));
    }

    /// Underlines the text up to the error offset in the shadow field,
    /// shows the messages and moves the caret onto the offending spot.
    pub(crate) fn show_error(&self, error: &SyntaxError) {
        self.shadow.set_value(&"_".repeat(error.position));
        self.message.set_text_content(Some(&error.message));
        self.aux_message.set_text_content(Some(&error.aux));
        self.set_caret(error.position as u32);
    }

    pub(crate) fn show_note(&self, message: &str, aux: &str) {
        self.message.set_text_content(Some(message));
        self.aux_message.set_text_content(Some(aux));
    }

    pub(crate) fn clear_shadow(&self) {
        self.shadow.set_value("");
    }

    pub(crate) fn clear_messages(&self) {
        self.message.set_text_content(None);
        self.aux_message.set_text_content(None);
    }

    pub(crate) fn auto_resize(&self) {
        let scroll_height = self.input.scroll_height();
        if scroll_height - self.last_height.get() > 4 {
            let height = self.input.scroll_top() + scroll_height;
            set_style(&self.input, "height", &format!("{height}px"));
            self.last_height.set(scroll_height);
            set_style(&self.shadow, "height", &format!("{scroll_height}px"));
            set_style(&self.frame, "height", &format!("{}px", scroll_height + 4));
        }
    }
}

enum EditKey {
    HistoryUp,
    HistoryDown,
    Submit,
    Tab,
    Other,
}

fn classify_key(key: &str) -> EditKey {
    match key {
        "ArrowUp" | "Up" => EditKey::HistoryUp,
        "ArrowDown" | "Down" => EditKey::HistoryDown,
        "Enter" => EditKey::Submit,
        "Tab" => EditKey::Tab,
        _ => EditKey::Other,
    }
}

fn kill_event(event: &KeyboardEvent) {
    event.stop_propagation();
    event.prevent_default();
}

/// Attaches the shared keyboard contract to the edit field: up/down walk
/// the history, Enter submits, Tab always passes through, anything else
/// leaves browsing mode. While a guard is active every non-Tab key is
/// swallowed.
fn wire_edit_keys(
    editor: Rc<EditorView>,
    history: Rc<RefCell<crate::history::HistoryBuffer>>,
    guards: Rc<crate::guards::UiGuards>,
    submit: Rc<dyn Fn()>,
) {
    let input = editor.input().clone();
    let handler: Closure<dyn FnMut(KeyboardEvent)> =
        Closure::wrap(Box::new(move |event: KeyboardEvent| {
            let key = classify_key(&event.key());
            if guards.any_active() {
                if !matches!(key, EditKey::Tab) {
                    kill_event(&event);
                }
                return;
            }
            editor.clear_shadow();
            match key {
                EditKey::HistoryUp => {
                    kill_event(&event);
                    editor.clear_messages();
                    let current = editor.value();
                    let recalled = history.borrow_mut().move_up(&current).map(str::to_owned);
                    if let Some(text) = recalled {
                        editor.set_value(&text);
                    }
                }
                EditKey::HistoryDown => {
                    kill_event(&event);
                    editor.clear_messages();
                    let recalled = history.borrow_mut().move_down().map(str::to_owned);
                    if let Some(text) = recalled {
                        editor.set_value(&text);
                    }
                }
                EditKey::Submit => {
                    kill_event(&event);
                    submit();
                }
                EditKey::Tab => {}
                EditKey::Other => history.borrow_mut().reset_navigation(),
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);
    input.set_onkeydown(Some(handler.as_ref().unchecked_ref()));
    handler.forget();
}

fn on_click(target: &HtmlElement, callback: impl FnMut() + 'static) {
    let callback: Closure<dyn FnMut()> = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
    target.set_onclick(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

fn on_change(target: &HtmlElement, callback: impl FnMut() + 'static) {
    let callback: Closure<dyn FnMut()> = Closure::wrap(Box::new(callback) as Box<dyn FnMut()>);
    target.set_onchange(Some(callback.as_ref().unchecked_ref()));
    callback.forget();
}

fn set_style(element: &HtmlElement, property: &str, value: &str) {
    element
        .style()
        .set_property(property, value)
        .expect("set style property must work");
}

fn utf16_length(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

fn confirm(message: &str) -> bool {
    crate::web_unchecked::window_unchecked()
        .confirm_with_message(message)
        .unwrap_or(false)
}

/// The delete-marked controls: the button strip shown while marks are
/// set, the optional page cover, and the confirm button whose caption
/// changes with the pending action.
struct DeletePanel {
    container: HtmlElement,
    cover: Option<HtmlElement>,
    confirm_button: HtmlInputElement,
}

impl DeletePanel {
    fn get_in(document: &Document, with_cover: bool) -> Self {
        Self {
            container: document.html_element_by_id_unchecked("delmarked"),
            cover: with_cover.then(|| document.html_element_by_id_unchecked("id-cover")),
            confirm_button: document.input_by_id_unchecked("id-deletemarked"),
        }
    }

    fn show(&self) {
        set_style(&self.container, "visibility", "visible");
        if let Some(cover) = &self.cover {
            set_style(cover, "display", "block");
        }
    }

    fn hide(&self) {
        set_style(&self.container, "visibility", "hidden");
        if let Some(cover) = &self.cover {
            set_style(cover, "display", "none");
        }
    }

    fn set_caption(&self, caption: &str) {
        self.confirm_button.set_value(caption);
    }
}

pub(crate) mod result_table {
    use wasm_bindgen::JsCast;
    use web_sys::{Document, HtmlElement, HtmlInputElement, HtmlTableElement, HtmlTableRowElement};

    use crate::{
        protocol::ResultKind,
        web_unchecked::{DocumentUnchecked, ElementUnchecked, NodeUnchecked},
    };

    /// One result line with its own control handles.
    pub(crate) struct ResultRow {
        label: u32,
        expression: String,
        kind: ResultKind,
        row: HtmlElement,
        kind_cell: HtmlElement,
        expression_cell: HtmlElement,
        delete_box: HtmlInputElement,
    }

    impl ResultRow {
        pub(crate) fn expression(&self) -> &str {
            &self.expression
        }

        pub(crate) fn expression_cell(&self) -> &HtmlElement {
            &self.expression_cell
        }

        pub(crate) fn delete_box(&self) -> &HtmlInputElement {
            &self.delete_box
        }
    }

    /// The ordered collection of result lines, oldest first (table order).
    pub(crate) struct ResultTable {
        table: HtmlTableElement,
        rows: Vec<ResultRow>,
    }

    impl ResultTable {
        /// Collects the rows the server rendered into the page. A result
        /// line carries `data-label` and `data-result` on its `tr`, the
        /// expression as `data-expr` on the query cell, and a delete
        /// checkbox.
        pub(crate) fn collect_in(document: &Document) -> Self {
            let table: HtmlTableElement = document
                .html_element_by_id_unchecked("resulttable")
                .unchecked_into();
            let mut rows = Vec::new();
            for element in document.elements_by_selector_unchecked("#resulttable tr.resultline") {
                let row: HtmlElement = element.unchecked_into();
                let Some(label) = row
                    .get_attribute("data-label")
                    .and_then(|label| label.parse().ok())
                else {
                    continue;
                };
                let Some(kind) = row
                    .get_attribute("data-result")
                    .and_then(|name| ResultKind::from_name(&name))
                else {
                    continue;
                };
                let Some(expression_cell) = row.query_selector_unchecked("[data-expr]") else {
                    continue;
                };
                let Some(kind_cell) = row.query_selector_unchecked(".rescode") else {
                    continue;
                };
                let Some(delete_box) = row.query_selector_unchecked("input.resdel") else {
                    continue;
                };
                let expression = expression_cell.get_attribute("data-expr").unwrap_or_default();
                rows.push(ResultRow {
                    label,
                    expression,
                    kind,
                    row,
                    kind_cell: kind_cell.unchecked_into(),
                    expression_cell: expression_cell.unchecked_into(),
                    delete_box: delete_box.unchecked_into(),
                });
            }
            Self { table, rows }
        }

        /// Appends a result line (and an auxiliary line when `aux` is
        /// non-empty) and scrolls it into view.
        pub(crate) fn add_line(
            &mut self,
            document: &Document,
            label: u32,
            kind: ResultKind,
            constrained: bool,
            expression: &str,
            aux: &str,
        ) {
            let row: HtmlTableRowElement = self
                .table
                .insert_row()
                .expect("insert row must work")
                .unchecked_into();
            row.set_class_name("resultline");
            row.set_attribute_unchecked("data-label", &label.to_string());
            row.set_attribute_unchecked("data-result", kind.name());

            let delete_cell = row.insert_cell().expect("insert cell must work");
            delete_cell.set_class_name("resdel");
            delete_cell.set_title("delete this query");
            let delete_box: HtmlInputElement = document
                .create_element_unchecked("input")
                .unchecked_into();
            delete_box.set_type("checkbox");
            delete_box.set_class_name("resdel");
            delete_cell.append_child_unchecked(&delete_box);

            let kind_cell = row.insert_cell().expect("insert cell must work");
            kind_cell.set_class_name("rescode");
            kind_cell.set_text_content(Some(kind.name()));

            let constraint_cell = row.insert_cell().expect("insert cell must work");
            constraint_cell.set_class_name(if constrained { "constraint" } else { "noconstraint" });

            let expression_cell = row.insert_cell().expect("insert cell must work");
            expression_cell.set_class_name("query1");
            expression_cell.set_attribute_unchecked("data-expr", expression);
            expression_cell.append_child_unchecked(&document.create_text_node(expression));

            if !aux.is_empty() {
                let aux_row: HtmlTableRowElement = self
                    .table
                    .insert_row()
                    .expect("insert row must work")
                    .unchecked_into();
                aux_row.set_class_name("auxline");
                for _ in 0..3 {
                    let cell = aux_row.insert_cell().expect("insert cell must work");
                    cell.set_class_name("skip");
                }
                let aux_cell = aux_row.insert_cell().expect("insert cell must work");
                aux_cell.set_class_name("query2");
                aux_cell.append_child_unchecked(&document.create_text_node(aux));
            }

            row.scroll_into_view();
            self.rows.push(ResultRow {
                label,
                expression: expression.to_owned(),
                kind,
                row: row.unchecked_into(),
                kind_cell,
                expression_cell,
                delete_box,
            });
        }

        /// Swaps the result cell of `label` in place; returns whether the
        /// row was found.
        pub(crate) fn replace_result(&mut self, label: u32, kind: ResultKind) -> bool {
            let Some(row) = self.rows.iter_mut().find(|row| row.label == label) else {
                return false;
            };
            row.kind = kind;
            row.kind_cell.set_text_content(Some(kind.name()));
            row.row.set_attribute_unchecked("data-result", kind.name());
            true
        }

        pub(crate) fn row(&self, label: u32) -> Option<&ResultRow> {
            self.rows.iter().find(|row| row.label == label)
        }

        pub(crate) fn labels(&self) -> Vec<u32> {
            self.rows.iter().map(|row| row.label).collect()
        }

        /// 1-based position counted from the newest row, the index the
        /// history buffer expects.
        pub(crate) fn newest_first_index(&self, label: u32) -> Option<usize> {
            let position = self.rows.iter().position(|row| row.label == label)?;
            Some(self.rows.len() - position)
        }

        pub(crate) fn expressions_newest_first(&self) -> Vec<String> {
            self.rows
                .iter()
                .rev()
                .map(|row| row.expression.clone())
                .collect()
        }

        pub(crate) fn waiting_labels(&self) -> Vec<u32> {
            self.rows
                .iter()
                .filter(|row| row.kind == ResultKind::Waiting)
                .map(|row| row.label)
                .collect()
        }

        pub(crate) fn any_marked(&self) -> bool {
            self.rows.iter().any(|row| row.delete_box.checked())
        }

        pub(crate) fn mark_all(&self) {
            for row in &self.rows {
                row.delete_box.set_checked(true);
            }
        }

        pub(crate) fn unmark_all(&self) {
            for row in &self.rows {
                row.delete_box.set_checked(false);
            }
        }

        pub(crate) fn scroll_last_into_view(&self) {
            if let Some(row) = self.rows.last() {
                row.row.scroll_into_view();
            }
        }
    }
}

mod check_page {
    use std::{
        cell::RefCell,
        rc::{Rc, Weak},
    };

    use wasm_bindgen_futures::spawn_local;
    use web_sys::{console, Document, HtmlElement, HtmlFormElement, HtmlInputElement};

    use super::{confirm, on_change, on_click, result_table::ResultTable, wire_edit_keys, DeletePanel, EditorView};
    use crate::{
        guards::UiGuards,
        history::HistoryBuffer,
        pending::PendingPoller,
        protocol::{self, ExprResponse, ResultKind},
        request::{self, Endpoint},
        session::Session,
        web_unchecked::DocumentUnchecked,
    };

    struct CheckPage {
        document: Document,
        session: Session,
        guards: Rc<UiGuards>,
        editor: Rc<EditorView>,
        history: Rc<RefCell<HistoryBuffer>>,
        results: RefCell<ResultTable>,
        poller: Rc<PendingPoller>,
        with_constraints: HtmlInputElement,
        form: HtmlFormElement,
        delete_panel: DeletePanel,
        modified_marker: HtmlElement,
    }

    pub(super) fn setup(document: Document, session: Session) {
        let editor = Rc::new(EditorView::get_in(&document, "expr"));
        editor.auto_resize();
        editor.focus_with_caret_at_end();

        let results = ResultTable::collect_in(&document);
        results.scroll_last_into_view();
        let waiting = results.waiting_labels();
        let history = Rc::new(RefCell::new(HistoryBuffer::from_entries(
            results.expressions_newest_first(),
        )));
        let guards = Rc::new(UiGuards::default());

        let with_constraints = document.input_by_id_unchecked("id-chkwith");
        let form = document.form_by_id_unchecked("form-main");
        let delete_panel = DeletePanel::get_in(&document, true);
        let modified_marker = document.html_element_by_id_unchecked("wi_modified");

        let page = Rc::new_cyclic(|page: &Weak<CheckPage>| {
            let page = page.clone();
            let poller = PendingPoller::new(session.clone(), move |label, kind| {
                if let Some(page) = page.upgrade() {
                    page.results.borrow_mut().replace_result(label, kind);
                }
            });
            CheckPage {
                document: document.clone(),
                session,
                guards: guards.clone(),
                editor: editor.clone(),
                history: history.clone(),
                results: RefCell::new(results),
                poller,
                with_constraints,
                form,
                delete_panel,
                modified_marker,
            }
        });

        for label in page.results.borrow().labels() {
            page.wire_row(label);
        }
        page.poller.seed(waiting);

        let submit: Rc<dyn Fn()> = {
            let page = page.clone();
            Rc::new(move || page.clone().submit_expression())
        };
        wire_edit_keys(editor, history, guards, submit);
        page.wire_buttons();
    }

    impl CheckPage {
        fn submit_expression(self: Rc<Self>) {
            if self.guards.any_active() {
                return;
            }
            self.guards.submit_in_flight.set(true);
            self.history.borrow_mut().reset_navigation();
            let page = self;
            spawn_local(async move {
                let text = page.editor.value();
                let with_constraints = page.with_constraints.checked();
                let response = request::get_text(
                    &page.session,
                    Endpoint::CheckExpression,
                    &[
                        ("text", text.as_str()),
                        ("cstr", if with_constraints { "1" } else { "0" }),
                    ],
                )
                .await;
                if let Ok(body) = response {
                    match protocol::parse_expr(&body) {
                        Ok(ExprResponse::Rejected(error)) => page.editor.show_error(&error),
                        Ok(ExprResponse::Evaluated { kind, label, aux }) => {
                            page.accept_result(kind, label, &aux, with_constraints, text)
                        }
                        Err(error) => console::warn_1(
                            &format!("malformed chkexpr response: {error:?}").into(),
                        ),
                    }
                }
                page.guards.submit_in_flight.set(false);
                page.editor.focus_with_caret_at_end();
            });
        }

        fn accept_result(
            self: &Rc<Self>,
            kind: ResultKind,
            label: u32,
            aux: &str,
            with_constraints: bool,
            text: String,
        ) {
            // An unrolled-only answer ignores the constraint setting.
            let constrained = with_constraints && kind != ResultKind::Zap;
            self.results.borrow_mut().add_line(
                &self.document,
                label,
                kind,
                constrained,
                &text,
                aux,
            );
            self.wire_row(label);
            self.history.borrow_mut().record_submission(text);
            self.editor.clear_input();
            self.editor.clear_shadow();
            self.editor.clear_messages();
            if kind == ResultKind::Waiting {
                self.poller.add_label(label);
            }
            self.modified_marker.set_text_content(Some("*"));
        }

        fn wire_row(self: &Rc<Self>, label: u32) {
            let (expression_cell, delete_box) = {
                let results = self.results.borrow();
                let Some(row) = results.row(label) else { return };
                (row.expression_cell().clone(), row.delete_box().clone())
            };
            let page = self.clone();
            on_click(&expression_cell, move || page.copy_line_to_edit(label));
            let page = self.clone();
            on_change(&delete_box, move || page.delete_mark_changed());
        }

        fn copy_line_to_edit(&self, label: u32) {
            if self.guards.any_active() {
                return;
            }
            let (index, text) = {
                let results = self.results.borrow();
                let Some(index) = results.newest_first_index(label) else {
                    return;
                };
                let Some(row) = results.row(label) else { return };
                (index, row.expression().to_owned())
            };
            self.history
                .borrow_mut()
                .capture_before_overwrite(&self.editor.value(), index);
            self.editor.set_value(&text);
        }

        fn delete_mark_changed(&self) {
            if self.results.borrow().any_marked() {
                if self.guards.delete_in_progress.get() {
                    return;
                }
                self.guards.delete_in_progress.set(true);
                self.delete_panel.show();
            } else {
                self.guards.delete_in_progress.set(false);
                self.delete_panel.hide();
            }
        }

        fn reset_delete(&self) {
            self.results.borrow().unmark_all();
            self.guards.delete_in_progress.set(false);
            self.delete_panel.hide();
        }

        fn submit_delete(&self) {
            self.document
                .input_by_id_unchecked("goingto")
                .set_value("delete");
            self.form.submit().expect("form submit must work");
        }

        fn delete_marked(&self) {
            if !confirm("Marked result lines will be deleted.\nProceed?") {
                return;
            }
            self.submit_delete();
        }

        fn delete_all(&self) {
            self.results.borrow().mark_all();
            if !confirm(
                "You are going to delete all result lines. They will be irrecoverably lost.\nProceed?",
            ) {
                return;
            }
            self.submit_delete();
        }

        fn wire_buttons(self: &Rc<Self>) {
            let page = self.clone();
            on_click(
                &self.document.html_element_by_id_unchecked("id-delcancel"),
                move || page.reset_delete(),
            );
            let page = self.clone();
            on_click(&self.delete_panel.confirm_button.clone().into(), move || {
                page.delete_marked()
            });
            let page = self.clone();
            on_click(
                &self.document.html_element_by_id_unchecked("id-deleteall"),
                move || page.delete_all(),
            );
        }
    }
}

mod constraint_page {
    use std::{cell::RefCell, rc::Rc};

    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{console, Document, HtmlElement, HtmlFormElement, HtmlInputElement};

    use super::{
        confirm, on_change, on_click, set_style, wire_edit_keys, DeletePanel, EditorView,
    };
    use crate::{
        guards::UiGuards,
        history::HistoryBuffer,
        log::measure,
        protocol::{self, CheckResponse},
        request::{self, Endpoint},
        session::Session,
        web_unchecked::{DocumentUnchecked, ElementUnchecked},
    };

    /// One constraint line with its paired "use" and "delete" checkboxes.
    struct ConstraintRow {
        row: HtmlElement,
        text: String,
        used_box: HtmlInputElement,
        delete_box: HtmlInputElement,
        initially_used: bool,
    }

    impl ConstraintRow {
        fn apply_used_class(&self) {
            self.row.set_class_name(if self.used_box.checked() {
                "conline-used"
            } else {
                "conline-unused"
            });
        }
    }

    struct ConstraintPage {
        session: Session,
        guards: Rc<UiGuards>,
        editor: Rc<EditorView>,
        history: Rc<RefCell<HistoryBuffer>>,
        rows: Vec<ConstraintRow>,
        form: HtmlFormElement,
        goingto: HtmlInputElement,
        delete_panel: DeletePanel,
        delete_all_button: HtmlElement,
    }

    fn collect_rows(document: &Document) -> Vec<ConstraintRow> {
        let mut rows = Vec::new();
        for element in document.elements_by_selector_unchecked("#id-contable tr[data-con]") {
            let row: HtmlElement = element.unchecked_into();
            let text = row.get_attribute("data-con").unwrap_or_default();
            let Some(used_box) = row.query_selector_unchecked("input.conused") else {
                continue;
            };
            let Some(delete_box) = row.query_selector_unchecked("input.condel") else {
                continue;
            };
            let used_box: HtmlInputElement = used_box.unchecked_into();
            let initially_used = used_box.checked();
            rows.push(ConstraintRow {
                row,
                text,
                used_box,
                delete_box: delete_box.unchecked_into(),
                initially_used,
            });
        }
        rows
    }

    pub(super) async fn setup(document: Document, session: Session) {
        let editor = Rc::new(EditorView::get_in(&document, "constr"));
        editor.auto_resize();
        editor.focus_with_caret_at_end();

        let history = Rc::new(RefCell::new(HistoryBuffer::new()));
        let guards = Rc::new(UiGuards::default());
        let rows = collect_rows(&document);
        if let Some(row) = rows.last() {
            row.row.scroll_into_view();
        }

        let page = Rc::new(ConstraintPage {
            session: session.clone(),
            guards: guards.clone(),
            editor: editor.clone(),
            history: history.clone(),
            rows,
            form: document.form_by_id_unchecked("form-main"),
            goingto: document.input_by_id_unchecked("goingto"),
            delete_panel: DeletePanel::get_in(&document, false),
            delete_all_button: document.html_element_by_id_unchecked("id-deleteall"),
        });

        page.wire_rows();
        page.wire_buttons(&document);

        let submit: Rc<dyn Fn()> = {
            let page = page.clone();
            Rc::new(move || page.clone().submit_constraint())
        };
        wire_edit_keys(editor, history.clone(), guards, submit);

        // Past submissions arrive asynchronously; navigation stays a
        // no-op until they do, and a failed fetch is not reported.
        let response = measure!(
            "constraint history load",
            request::get_text(&session, Endpoint::History, &[("what", "cons")]).await
        );
        if let Ok(body) = response {
            history
                .borrow_mut()
                .replace_entries(protocol::parse_history(&body));
        }
    }

    impl ConstraintPage {
        fn submit_constraint(self: Rc<Self>) {
            if self.guards.any_active() {
                return;
            }
            self.guards.submit_in_flight.set(true);
            self.history.borrow_mut().reset_navigation();
            let page = self;
            spawn_local(async move {
                let text = page.editor.value();
                let response = request::get_text(
                    &page.session,
                    Endpoint::CheckConstraint,
                    &[("text", text.as_str())],
                )
                .await;
                if let Ok(body) = response {
                    match protocol::parse_check(&body) {
                        Ok(CheckResponse::Rejected(error)) => page.editor.show_error(&error),
                        Ok(CheckResponse::Accepted) => {
                            page.editor.clear_input();
                            page.form.submit().expect("form submit must work");
                        }
                        Err(error) => console::warn_1(
                            &format!("malformed chkconstr response: {error:?}").into(),
                        ),
                    }
                }
                page.guards.submit_in_flight.set(false);
            });
        }

        fn wire_rows(self: &Rc<Self>) {
            for index in 0..self.rows.len() {
                let page = self.clone();
                on_change(&self.rows[index].used_box.clone().into(), move || {
                    page.used_changed(index)
                });
                let page = self.clone();
                on_change(&self.rows[index].delete_box.clone().into(), move || {
                    page.delete_changed(index)
                });
                let page = self.clone();
                on_click(&self.rows[index].row.clone(), move || {
                    page.copy_line_to_edit(index)
                });
            }
        }

        fn used_changed(&self, index: usize) {
            self.rows[index].apply_used_class();
            if self.guards.use_edit_in_progress.get() {
                return;
            }
            self.guards.use_edit_in_progress.set(true);
            for row in &self.rows {
                row.delete_box.set_disabled(true);
            }
            set_style(&self.delete_all_button, "visibility", "hidden");
            self.delete_panel.set_caption("save changes");
            self.delete_panel.show();
        }

        fn delete_changed(&self, index: usize) {
            // Unchecking a delete box does not leave delete mode here;
            // only cancel restores the page.
            if !self.rows[index].delete_box.checked() {
                return;
            }
            if self.guards.delete_in_progress.get() {
                return;
            }
            self.guards.delete_in_progress.set(true);
            for row in &self.rows {
                row.used_box.set_disabled(true);
            }
            set_style(&self.delete_all_button, "visibility", "visible");
            self.delete_panel.set_caption("delete marked constraints");
            self.delete_panel.show();
        }

        fn copy_line_to_edit(&self, index: usize) {
            if self.guards.any_active() {
                return;
            }
            self.history
                .borrow_mut()
                .capture_before_overwrite(&self.editor.value(), 1);
            self.editor.set_value(&self.rows[index].text);
            self.editor.clear_messages();
        }

        fn reset_delete(&self) {
            set_style(&self.delete_all_button, "visibility", "hidden");
            self.delete_panel.hide();
            self.guards.delete_in_progress.set(false);
            self.guards.use_edit_in_progress.set(false);
            for row in &self.rows {
                row.delete_box.set_disabled(false);
                row.delete_box.set_checked(false);
                row.used_box.set_disabled(false);
                row.used_box.set_checked(row.initially_used);
                row.apply_used_class();
            }
        }

        fn confirm_marked(&self) {
            // Saving use-flag changes and deleting marked lines share the
            // button; the caption and the pending guard tell them apart.
            self.goingto.set_value(if self.guards.use_edit_in_progress.get() {
                "save"
            } else {
                "delete"
            });
            self.form.submit().expect("form submit must work");
        }

        fn delete_all(&self) {
            for row in &self.rows {
                row.delete_box.set_checked(true);
            }
            if !confirm("You are going to delete all constraints.\nProceed?") {
                return;
            }
            self.goingto.set_value("delete");
            self.form.submit().expect("form submit must work");
        }

        fn wire_buttons(self: &Rc<Self>, document: &Document) {
            let page = self.clone();
            on_click(
                &document.html_element_by_id_unchecked("id-delcancel"),
                move || page.reset_delete(),
            );
            let page = self.clone();
            on_click(&self.delete_panel.confirm_button.clone().into(), move || {
                page.confirm_marked()
            });
            let page = self.clone();
            on_click(&self.delete_all_button.clone(), move || page.delete_all());
        }
    }
}

mod macro_page {
    use std::{cell::RefCell, rc::Rc};

    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{console, Document, HtmlElement, HtmlFormElement, HtmlInputElement};

    use super::{confirm, on_change, on_click, wire_edit_keys, DeletePanel, EditorView};
    use crate::{
        guards::UiGuards,
        history::HistoryBuffer,
        log::measure,
        protocol::{self, CheckResponse},
        request::{self, Endpoint},
        session::Session,
        web_unchecked::{DocumentUnchecked, ElementUnchecked},
    };

    /// One macro line; clicking it recalls the definition and shows the
    /// unrolled internal form.
    struct MacroRow {
        row: HtmlElement,
        text: String,
        unrolled: String,
        delete_box: HtmlInputElement,
    }

    struct MacroPage {
        session: Session,
        guards: Rc<UiGuards>,
        editor: Rc<EditorView>,
        history: Rc<RefCell<HistoryBuffer>>,
        rows: Vec<MacroRow>,
        form: HtmlFormElement,
        goingto: HtmlInputElement,
        delete_panel: DeletePanel,
    }

    fn collect_rows(document: &Document) -> Vec<MacroRow> {
        let mut rows = Vec::new();
        for element in document.elements_by_selector_unchecked("#macrotable tr[data-macro]") {
            let row: HtmlElement = element.unchecked_into();
            let text = row.get_attribute("data-macro").unwrap_or_default();
            let unrolled = row.get_attribute("data-unrolled").unwrap_or_default();
            let Some(delete_box) = row.query_selector_unchecked("input.mdel") else {
                continue;
            };
            rows.push(MacroRow {
                row,
                text,
                unrolled,
                delete_box: delete_box.unchecked_into(),
            });
        }
        rows
    }

    pub(super) async fn setup(document: Document, session: Session) {
        let editor = Rc::new(EditorView::get_in(&document, "macro"));
        editor.auto_resize();
        editor.focus_with_caret_at_end();

        let history = Rc::new(RefCell::new(HistoryBuffer::new()));
        let guards = Rc::new(UiGuards::default());
        let rows = collect_rows(&document);
        for row in &rows {
            row.delete_box.set_checked(false);
        }
        if let Some(row) = rows.last() {
            row.row.scroll_into_view();
        }

        let page = Rc::new(MacroPage {
            session: session.clone(),
            guards: guards.clone(),
            editor: editor.clone(),
            history: history.clone(),
            rows,
            form: document.form_by_id_unchecked("form-main"),
            goingto: document.input_by_id_unchecked("goingto"),
            delete_panel: DeletePanel::get_in(&document, true),
        });

        page.wire_rows();
        page.wire_buttons(&document);

        let submit: Rc<dyn Fn()> = {
            let page = page.clone();
            Rc::new(move || page.clone().submit_macro())
        };
        wire_edit_keys(editor, history.clone(), guards, submit);

        let response = measure!(
            "macro history load",
            request::get_text(&session, Endpoint::History, &[("what", "macro")]).await
        );
        if let Ok(body) = response {
            history
                .borrow_mut()
                .replace_entries(protocol::parse_history(&body));
        }
    }

    impl MacroPage {
        fn submit_macro(self: Rc<Self>) {
            if self.guards.any_active() {
                return;
            }
            self.guards.submit_in_flight.set(true);
            self.history.borrow_mut().reset_navigation();
            let page = self;
            spawn_local(async move {
                let text = page.editor.value();
                let response = request::get_text(
                    &page.session,
                    Endpoint::CheckMacro,
                    &[("text", text.as_str())],
                )
                .await;
                if let Ok(body) = response {
                    match protocol::parse_check(&body) {
                        Ok(CheckResponse::Rejected(error)) => page.editor.show_error(&error),
                        Ok(CheckResponse::Accepted) => {
                            page.editor.clear_input();
                            page.form.submit().expect("form submit must work");
                        }
                        Err(error) => console::warn_1(
                            &format!("malformed chkmacro response: {error:?}").into(),
                        ),
                    }
                }
                page.guards.submit_in_flight.set(false);
            });
        }

        fn wire_rows(self: &Rc<Self>) {
            for index in 0..self.rows.len() {
                let page = self.clone();
                on_change(&self.rows[index].delete_box.clone().into(), move || {
                    page.delete_mark_changed()
                });
                let page = self.clone();
                on_click(&self.rows[index].row.clone(), move || {
                    page.copy_line_to_edit(index)
                });
            }
        }

        fn copy_line_to_edit(&self, index: usize) {
            if self.guards.any_active() {
                return;
            }
            self.history
                .borrow_mut()
                .capture_before_overwrite(&self.editor.value(), 1);
            self.editor.set_value(&self.rows[index].text);
            self.editor.show_note(
                "expanded (internal) form of this macro:",
                &self.rows[index].unrolled,
            );
        }

        fn any_marked(&self) -> bool {
            self.rows.iter().any(|row| row.delete_box.checked())
        }

        fn delete_mark_changed(&self) {
            if self.any_marked() {
                if self.guards.delete_in_progress.get() {
                    return;
                }
                self.guards.delete_in_progress.set(true);
                self.delete_panel.show();
            } else {
                self.guards.delete_in_progress.set(false);
                self.delete_panel.hide();
            }
        }

        fn reset_delete(&self) {
            for row in &self.rows {
                row.delete_box.set_checked(false);
            }
            self.guards.delete_in_progress.set(false);
            self.delete_panel.hide();
        }

        fn submit_delete(&self) {
            self.goingto.set_value("delete");
            self.form.submit().expect("form submit must work");
        }

        fn delete_marked(&self) {
            if !confirm("Marked macro lines will be deleted.\nProceed?") {
                return;
            }
            self.submit_delete();
        }

        fn delete_all(&self) {
            for row in &self.rows {
                row.delete_box.set_checked(true);
            }
            if !confirm("You are going to delete all macros.\nProceed?") {
                return;
            }
            self.submit_delete();
        }

        fn wire_buttons(self: &Rc<Self>, document: &Document) {
            let page = self.clone();
            on_click(
                &document.html_element_by_id_unchecked("id-delcancel"),
                move || page.reset_delete(),
            );
            let page = self.clone();
            on_click(&self.delete_panel.confirm_button.clone().into(), move || {
                page.delete_marked()
            });
            let page = self.clone();
            on_click(
                &document.html_element_by_id_unchecked("id-deleteall"),
                move || page.delete_all(),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use super::{classify_key, utf16_length, EditKey};

    #[test]
    fn arrow_keys_map_to_history_navigation() {
        assert!(matches!(classify_key("ArrowUp"), EditKey::HistoryUp));
        assert!(matches!(classify_key("Up"), EditKey::HistoryUp));
        assert!(matches!(classify_key("ArrowDown"), EditKey::HistoryDown));
        assert!(matches!(classify_key("Down"), EditKey::HistoryDown));
        assert!(matches!(classify_key("Enter"), EditKey::Submit));
        assert!(matches!(classify_key("Tab"), EditKey::Tab));
        assert!(matches!(classify_key("a"), EditKey::Other));
        assert!(matches!(classify_key("Backspace"), EditKey::Other));
    }

    #[test]
    fn caret_positions_count_utf16_units() {
        assert_eq!(utf16_length("I(a;b)"), 6);
        assert_eq!(utf16_length("H(x\u{2223}y)"), 6);
        // Characters beyond the BMP take two units.
        assert_eq!(utf16_length("H(\u{1D465})"), 5);
    }
}
