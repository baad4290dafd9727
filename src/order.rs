// src/order.rs
//
// Well-known drawing orders. Anything in the modal band blocks input dispatch
// to ordinary input callers for that tick.

pub const BACK: i32 = -1;
pub const DEFAULT: i32 = 0;
pub const FRONT: i32 = 1;

pub const MODAL_MIN: i32 = 100_000;
pub const MODAL_BACK: i32 = 149_999;
pub const MODAL: i32 = 150_000;
pub const MODAL_FRONT: i32 = 150_001;
pub const MODAL_MAX: i32 = 199_999;

/// True if `order` falls inside the modal band.
pub fn is_modal(order: i32) -> bool {
    (MODAL_MIN..=MODAL_MAX).contains(&order)
}
