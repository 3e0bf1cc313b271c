use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen_futures::spawn_local;

mod guards;
mod history;
mod log;
mod pending;
mod protocol;
mod request;
mod session;
mod timeout;
mod ui;
mod web_unchecked;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    spawn_local(ui::setup());
}
