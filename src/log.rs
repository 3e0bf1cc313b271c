//! Console timing for the slower startup steps.

use wasm_bindgen::prelude::wasm_bindgen;

/// Evaluates an expression and logs how long it took, via
/// `performance.now()`. The label names the step in the console.
macro_rules! measure {
    ($label:expr, $code:expr) => {{
        let start = crate::log::now();
        let result = $code;
        let elapsed = crate::log::now() - start;
        web_sys::console::log_1(&format!("{}: {elapsed:.1} ms", $label).into());
        result
    }};
}

pub(crate) use measure;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = performance)]
    static PERFORMANCE: web_sys::Performance;
}

pub(crate) fn now() -> f64 {
    PERFORMANCE.now()
}
