use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run plugin-supplied code, logging and swallowing a panic instead of letting
/// it unwind into the RPC loop. Returns `None` if `f` panicked.
pub fn recover<T>(context: &str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!(context, panic = %panic_message(payload.as_ref()), "Recovered from panic");
            None
        }
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_when_nothing_panics() {
        assert_eq!(recover("sum", || 1 + 1), Some(2));
    }

    #[test]
    fn swallows_panics() {
        let result: Option<()> = recover("boom", || panic!("exploded"));
        assert!(result.is_none());
    }

    #[test]
    fn formats_both_payload_kinds() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
    }
}
