//! A one-shot `setTimeout` as a future. Dropping the future before it
//! fires clears the browser timer, which is what lets an `Abortable`
//! wrapper cancel an armed poll timer.

use std::{cell::RefCell, pin::Pin, rc::Rc, task::Waker};

use futures::Future;
use wasm_bindgen::{prelude::Closure, JsCast};

use crate::web_unchecked::window_unchecked;

struct SetTimeoutFuture {
    timeout_id: i32,
    waker: Rc<RefCell<Option<Waker>>>,
    fired: Rc<RefCell<bool>>,
}

impl SetTimeoutFuture {
    fn new(milliseconds: i32) -> Self {
        let waker: Rc<RefCell<Option<Waker>>> = Rc::new(RefCell::new(None));
        let fired: Rc<RefCell<bool>> = Rc::new(RefCell::new(false));

        let waker_clone = waker.clone();
        let fired_clone = fired.clone();
        let callback = Closure::once(Box::new(move || {
            *fired_clone.borrow_mut() = true;
            if let Some(waker) = waker_clone.borrow_mut().take() {
                waker.wake()
            }
        }) as Box<dyn FnMut()>);
        let timeout_id = window_unchecked()
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                milliseconds,
            )
            .expect("set timeout should work");
        callback.forget();

        Self {
            timeout_id,
            waker,
            fired,
        }
    }
}

impl Drop for SetTimeoutFuture {
    fn drop(&mut self) {
        window_unchecked().clear_timeout_with_handle(self.timeout_id);
    }
}

impl Future for SetTimeoutFuture {
    type Output = ();

    fn poll(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        if *self.fired.borrow() {
            std::task::Poll::Ready(())
        } else {
            self.waker.borrow_mut().replace(cx.waker().clone());
            std::task::Poll::Pending
        }
    }
}

pub(crate) async fn timeout(milliseconds: i32) {
    SetTimeoutFuture::new(milliseconds).await
}
